use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::scan::{join_scope, Scanner, VarScope};
use crate::section::{CodeFunctionArgument, CodeSection, CodeVariable, SectionType};

/// Addresses one extracted symbol by its region and position in that
/// region's symbol set. Indices are only valid against the parse they were
/// taken from; every rename ends in a full rebuild that invalidates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "symbol", rename_all = "lowercase")]
pub enum SymbolRef {
    Variable { section: usize, index: usize },
    Option { section: usize, index: usize },
    OptionReference { section: usize, index: usize },
    FunctionArgument { section: usize, index: usize },
}

/// Dispatch a rename request against the document line buffer.
///
/// All variants mutate `lines` in place and leave the symbol tables stale;
/// the caller must rebuild afterwards. Nothing is mutated when an error is
/// returned.
pub fn rename_symbol(
    symbol: SymbolRef,
    new_name: &str,
    sections: &[CodeSection],
    lines: &mut [String],
    scanner: &Scanner,
) -> Result<(), EngineError> {
    match symbol {
        SymbolRef::Variable { section, index } => {
            let sec = sections.get(section).ok_or(EngineError::UnknownSymbol)?;
            let variable = sec.variables.get(index).ok_or(EngineError::UnknownSymbol)?;
            rename_variable(variable, section, new_name, sections, lines, scanner, false)
        }
        SymbolRef::Option { section, index } => {
            let sec = sections.get(section).ok_or(EngineError::UnknownSymbol)?;
            let option = sec.options.get(index).ok_or(EngineError::UnknownSymbol)?;
            rename_option(&option.clone(), new_name, sections, lines);
            Ok(())
        }
        SymbolRef::OptionReference { section, index } => {
            let sec = sections.get(section).ok_or(EngineError::UnknownSymbol)?;
            let reference = sec
                .option_references
                .get(index)
                .ok_or(EngineError::UnknownSymbol)?;
            // References never rename themselves: delegate to the matching
            // definition so the declaration and every similar reference move
            // together.
            let options_section = sections
                .iter()
                .find(|s| s.section_type == SectionType::Options)
                .ok_or(EngineError::MissingOptionsSection)?;
            let definition = options_section
                .options
                .iter()
                .find(|o| o.name == reference.name)
                .ok_or_else(|| EngineError::UnknownOption(reference.name.clone()))?;
            rename_option(&definition.clone(), new_name, sections, lines);
            Ok(())
        }
        SymbolRef::FunctionArgument { section, index } => {
            let sec = sections.get(section).ok_or(EngineError::UnknownSymbol)?;
            let argument = sec
                .function_arguments
                .get(index)
                .ok_or(EngineError::UnknownSymbol)?;
            rename_argument(&argument.clone(), section, new_name, sections, lines, scanner);
            Ok(())
        }
    }
}

/// Rename an option definition: rewrite its declaration line, then cascade
/// into every `{@name}` reference across the whole document.
fn rename_option(
    option: &crate::section::CodeOption,
    new_name: &str,
    sections: &[CodeSection],
    lines: &mut [String],
) {
    tracing::debug!(old = %option.name, new = %new_name, "renaming option definition");
    if let Some(line) = lines.get_mut(option.line - 1) {
        *line = line.replacen(&option.name, new_name, 1);
    }

    let old_token = format!("{{@{}}}", option.name);
    let new_token = format!("{{@{}}}", new_name);
    for section in sections {
        if section.section_type == SectionType::Options {
            continue;
        }
        for reference in &section.option_references {
            if reference.name != option.name {
                continue;
            }
            if let Some(line) = lines.get_mut(reference.line - 1) {
                *line = line.replace(&old_token, &new_token);
            }
        }
    }
}

/// Rename a variable. Locals are rewritten only inside their declaring
/// region; globals and memory variables are rewritten across every region.
/// A local shadowed by a governing function argument delegates to the
/// argument rename instead (unless that is where the call came from).
fn rename_variable(
    variable: &CodeVariable,
    section_index: usize,
    new_name: &str,
    sections: &[CodeSection],
    lines: &mut [String],
    scanner: &Scanner,
    from_argument: bool,
) -> Result<(), EngineError> {
    let section = &sections[section_index];
    if !from_argument {
        if let Some(argument) = section.shadowing_argument(variable) {
            rename_argument(
                &argument.clone(),
                section_index,
                new_name,
                sections,
                lines,
                scanner,
            );
            return Ok(());
        }
    }

    tracing::debug!(old = %variable.name, new = %new_name, scope = ?variable.scope, "renaming variable");
    let range = match variable.scope {
        VarScope::Local => {
            let start = section.starting_line - 1;
            start..start + section.lines.len()
        }
        VarScope::Global | VarScope::Memory => 0..lines.len(),
    };
    for line in &mut lines[range] {
        rewrite_variable_tokens(line, &variable.name, variable.scope, new_name, scanner);
    }
    Ok(())
}

/// Rename a function argument: rewrite the declaration line at the
/// argument's exact anchor, then cascade into every definition-matching
/// local variable in the function body.
fn rename_argument(
    argument: &CodeFunctionArgument,
    section_index: usize,
    new_name: &str,
    sections: &[CodeSection],
    lines: &mut [String],
    scanner: &Scanner,
) {
    tracing::debug!(old = %argument.name, new = %new_name, "renaming function argument");
    if let Some(line) = lines.get_mut(argument.line - 1) {
        let end = argument.column + argument.length;
        if line.is_char_boundary(argument.column) && line.is_char_boundary(end) && end <= line.len()
        {
            line.replace_range(argument.column..end, new_name);
        }
    }

    let shadow = CodeVariable {
        name: argument.name.clone(),
        scope: VarScope::Local,
        line: argument.line,
        column: argument.column,
        length: argument.length,
    };
    // The origin flag stops the variable side from delegating straight back.
    let _ = rename_variable(
        &shadow,
        section_index,
        new_name,
        sections,
        lines,
        scanner,
        true,
    );
}

/// Re-scan one line and substitute every variable token whose parsed
/// `(name, scope)` is similar to the target. Returns true when the line
/// changed.
fn rewrite_variable_tokens(
    line: &mut String,
    name: &str,
    scope: VarScope,
    new_name: &str,
    scanner: &Scanner,
) -> bool {
    let matches: Vec<_> = scanner
        .variables(line)
        .into_iter()
        .filter(|t| t.name == name && t.scope == scope)
        .collect();
    if matches.is_empty() {
        return false;
    }
    let replacement = format!("{{{}}}", join_scope(scope, new_name));
    // Right to left so earlier offsets stay valid.
    for token in matches.iter().rev() {
        line.replace_range(token.offset..token.offset + token.length, &replacement);
    }
    true
}

use serde::Serialize;

use crate::analyzer::parse_function_declaration;
use crate::error::Diagnostic;
use crate::scan::{Scanner, VarScope};

/// Region kind, classified from the region's first line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionType {
    Command,
    Event,
    Options,
    Function,
}

/// A `{name}` variable anchored to its source position. Two variables are
/// similar (the same referent) iff name and scope are both equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeVariable {
    pub name: String,
    pub scope: VarScope,
    /// 1-indexed line.
    pub line: usize,
    /// 0-indexed column of the opening `{`.
    pub column: usize,
    pub length: usize,
}

impl CodeVariable {
    pub fn is_local(&self) -> bool {
        self.scope == VarScope::Local
    }

    pub fn is_similar(&self, other: &CodeVariable) -> bool {
        self.name == other.name && self.scope == other.scope
    }
}

/// An option definition line inside the options region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeOption {
    pub name: String,
    pub value: String,
    pub line: usize,
    /// 0-indexed column of the first character of the name.
    pub column: usize,
    pub length: usize,
}

/// A `{@name}` reference. Similar iff names match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeOptionReference {
    pub name: String,
    pub line: usize,
    /// 0-indexed column of the opening `{`.
    pub column: usize,
    pub length: usize,
}

impl CodeOptionReference {
    pub fn is_similar(&self, other: &CodeOptionReference) -> bool {
        self.name == other.name
    }
}

/// A `name: type` pair from a function declaration's parentheses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeFunctionArgument {
    pub name: String,
    pub arg_type: String,
    pub line: usize,
    /// 0-indexed column of the first character of the name.
    pub column: usize,
    pub length: usize,
}

/// A contiguous top-level region of the document with its extracted symbol
/// sets. Owns a copy of its raw lines, used both for re-derivation and for
/// rewriting during a rename.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodeSection {
    /// 1-indexed first line of the region.
    pub starting_line: usize,
    pub section_type: SectionType,
    pub lines: Vec<String>,
    pub variables: Vec<CodeVariable>,
    pub option_references: Vec<CodeOptionReference>,
    pub options: Vec<CodeOption>,
    pub function_arguments: Vec<CodeFunctionArgument>,
}

impl CodeSection {
    /// Build a section from its raw line range and extract its symbols.
    /// Structural oddities are reported into `diagnostics`, never rejected.
    pub fn parse(
        starting_line: usize,
        lines: Vec<String>,
        scanner: &Scanner,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Self {
        let section_type = classify(lines.first().map(String::as_str).unwrap_or(""));
        let mut section = CodeSection {
            starting_line,
            section_type,
            lines,
            variables: Vec::new(),
            option_references: Vec::new(),
            options: Vec::new(),
            function_arguments: Vec::new(),
        };
        section.extract(scanner, diagnostics);
        section
    }

    /// 1-indexed last line, trimmed backward over trailing blank lines.
    pub fn ending_line(&self) -> usize {
        let trailing_blanks = self
            .lines
            .iter()
            .rev()
            .take_while(|l| l.trim().is_empty())
            .count();
        let used = self.lines.len().saturating_sub(trailing_blanks).max(1);
        self.starting_line + used - 1
    }

    /// True when the 1-indexed line falls inside this region.
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.starting_line && line < self.starting_line + self.lines.len()
    }

    fn extract(&mut self, scanner: &Scanner, diagnostics: &mut Vec<Diagnostic>) {
        match self.section_type {
            SectionType::Options => self.extract_options(diagnostics),
            other => {
                self.extract_tokens(scanner);
                if other == SectionType::Function {
                    self.extract_function_arguments(diagnostics);
                }
            }
        }
    }

    /// Every non-comment, non-blank `key: value` line after the header
    /// becomes an option definition. Structurally wrong lines warn.
    fn extract_options(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        for (i, raw) in self.lines.iter().enumerate().skip(1) {
            let line_no = self.starting_line + i;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let Some((key, value)) = text.split_once(':') else {
                diagnostics.push(Diagnostic::warning(
                    "malformed-option",
                    format!("expected `key: value`, found `{text}`"),
                    line_no,
                    None,
                ));
                continue;
            };
            let name = key.trim();
            if name.is_empty() || name.contains('{') || name.contains('}') {
                diagnostics.push(Diagnostic::warning(
                    "suspicious-option-key",
                    format!("option key `{name}` looks structurally wrong"),
                    line_no,
                    None,
                ));
            }
            // Column of the name within the raw line.
            let column = raw.find(name).unwrap_or(0);
            self.options.push(CodeOption {
                name: name.to_string(),
                value: value.trim().to_string(),
                line: line_no,
                column,
                length: name.len(),
            });
        }
    }

    /// Line-by-line scan for `{...}` and `{@...}` tokens, anchored to their
    /// 1-indexed line and raw column.
    fn extract_tokens(&mut self, scanner: &Scanner) {
        for (i, raw) in self.lines.iter().enumerate() {
            let line_no = self.starting_line + i;
            for token in scanner.variables(raw) {
                self.variables.push(CodeVariable {
                    name: token.name,
                    scope: token.scope,
                    line: line_no,
                    column: token.offset,
                    length: token.length,
                });
            }
            for token in scanner.option_refs(raw) {
                self.option_references.push(CodeOptionReference {
                    name: token.name,
                    line: line_no,
                    column: token.offset,
                    length: token.length,
                });
            }
        }
    }

    /// Parse `name: type` argument pairs from the declaration line only.
    fn extract_function_arguments(&mut self, diagnostics: &mut Vec<Diagnostic>) {
        let Some(raw) = self.lines.first() else {
            return;
        };
        let declaration = raw.trim().trim_end_matches(':');
        let element = match parse_function_declaration(declaration, self.starting_line) {
            Ok(el) => el,
            Err(err) => {
                diagnostics.push(Diagnostic::warning(
                    "malformed-function",
                    err.to_string(),
                    self.starting_line,
                    None,
                ));
                return;
            }
        };
        // Anchor each argument at its first occurrence after the paren,
        // searching forward so repeated type names cannot re-anchor earlier.
        let mut cursor = raw.find('(').map(|p| p + 1).unwrap_or(0);
        for arg in element.arguments {
            let column = raw[cursor..]
                .find(&arg.name)
                .map(|p| cursor + p)
                .unwrap_or(cursor);
            cursor = column + arg.name.len();
            self.function_arguments.push(CodeFunctionArgument {
                length: arg.name.len(),
                name: arg.name,
                arg_type: arg.arg_type,
                line: self.starting_line,
                column,
            });
        }
    }

    /// The first occurrence of each distinct `(name, scope)` variable.
    /// Repeated occurrences of the same logical variable collapse to the
    /// earliest one.
    pub fn unique_variables(&self) -> Vec<&CodeVariable> {
        let mut out: Vec<&CodeVariable> = Vec::new();
        for var in &self.variables {
            if !out.iter().any(|kept| kept.is_similar(var)) {
                out.push(var);
            }
        }
        out
    }

    /// The first occurrence of each distinct option reference name.
    pub fn unique_option_references(&self) -> Vec<&CodeOptionReference> {
        let mut out: Vec<&CodeOptionReference> = Vec::new();
        for reference in &self.option_references {
            if !out.iter().any(|kept| kept.is_similar(reference)) {
                out.push(reference);
            }
        }
        out
    }

    /// The governing argument that shadows a local variable, if any.
    pub fn shadowing_argument(&self, variable: &CodeVariable) -> Option<&CodeFunctionArgument> {
        if self.section_type != SectionType::Function || !variable.is_local() {
            return None;
        }
        self.function_arguments
            .iter()
            .find(|arg| arg.name == variable.name)
    }
}

/// Classify a region from its (trimmed) first line.
fn classify(first_line: &str) -> SectionType {
    let text = first_line.trim();
    if text.starts_with("command ") || text.starts_with("discord command ") {
        SectionType::Command
    } else if text == "options:" {
        SectionType::Options
    } else if text.starts_with("function ") || text.starts_with("local function ") {
        SectionType::Function
    } else {
        SectionType::Event
    }
}

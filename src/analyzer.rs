use std::collections::HashSet;

use crate::element::{
    CommandElement, DeclaredArgument, Element, EventElement, ExtractedTokens, FunctionElement,
    OptionEntry, OptionsElement,
};
use crate::error::{Diagnostic, EngineError};
use crate::scan::Scanner;
use crate::tree::{NodeId, NodeKind, Tree};

/// Transient state for one recognition pass. Not persisted across parses.
#[derive(Debug, Default)]
pub struct ParsingContext {
    /// Warnings and per-branch errors accumulated during the pass.
    pub diagnostics: Vec<Diagnostic>,
    /// Nodes some analyzer has already traversed.
    pub visited: HashSet<NodeId>,
    pub debug: bool,
    /// Line of the first options section seen, for duplicate detection.
    options_line: Option<usize>,
}

impl ParsingContext {
    pub fn new(debug: bool) -> Self {
        ParsingContext {
            debug,
            ..ParsingContext::default()
        }
    }
}

/// Predicate deciding whether an analyzer claims a node.
pub type MatchFn = fn(&Tree, NodeId) -> bool;

/// Loader building the semantic payload for a claimed node. A loader may
/// attach leaf elements to child nodes (the options loader does) and decides
/// its own recursion: command loads descend only into the trigger child,
/// event/function loads blind-recurse the whole subtree.
pub type LoadFn =
    fn(&mut Tree, NodeId, &Scanner, &mut ParsingContext) -> Result<Element, EngineError>;

/// One registered analyzer.
pub struct AnalyzerEntry {
    pub name: &'static str,
    pub priority: i32,
    pub matches: MatchFn,
    pub load: LoadFn,
}

/// The built-in registry, sorted by descending priority.
pub fn default_registry() -> Vec<AnalyzerEntry> {
    let mut entries = vec![
        AnalyzerEntry {
            name: "command",
            priority: 30,
            matches: command_matches,
            load: command_load,
        },
        AnalyzerEntry {
            name: "function",
            priority: 20,
            matches: function_matches,
            load: function_load,
        },
        AnalyzerEntry {
            name: "options",
            priority: 10,
            matches: options_matches,
            load: options_load,
        },
        AnalyzerEntry {
            name: "event",
            priority: 0,
            matches: event_matches,
            load: event_load,
        },
    ];
    entries.sort_by_key(|e| std::cmp::Reverse(e.priority));
    entries
}

/// Run recognition over every root node whose element is still unset.
///
/// First-match-wins dispatch: the highest-priority analyzer whose predicate
/// accepts the node runs its loader and its payload becomes the node's
/// element. A loader error is recorded and logged at the per-node call site;
/// the node is left unclaimed and recognition continues with the remaining
/// roots.
pub fn recognize(
    tree: &mut Tree,
    registry: &[AnalyzerEntry],
    scanner: &Scanner,
    ctx: &mut ParsingContext,
) {
    for &root in tree.roots().to_vec().iter() {
        if tree.node(root).element.is_some() {
            continue;
        }
        for entry in registry {
            if !(entry.matches)(tree, root) {
                continue;
            }
            match (entry.load)(tree, root, scanner, ctx) {
                Ok(element) => {
                    if ctx.debug {
                        tracing::debug!(
                            analyzer = entry.name,
                            line = tree.node(root).line,
                            kind = element.kind_name(),
                            "claimed node"
                        );
                    }
                    tree.node_mut(root).element = Some(element);
                    ctx.visited.insert(root);
                }
                Err(err) => {
                    let line = tree.node(root).line;
                    tracing::warn!(analyzer = entry.name, line, error = %err, "analyzer failed; node left unclaimed");
                    ctx.diagnostics.push(Diagnostic::error(
                        "analyzer-failed",
                        err.to_string(),
                        line,
                        Some(root),
                    ));
                }
            }
            break;
        }
    }
}

// ── Command ─────────────────────────────────────────────────────────

fn command_matches(tree: &Tree, id: NodeId) -> bool {
    let node = tree.node(id);
    node.is_section()
        && node.parent.is_none()
        && command_name(&node.key).is_some()
}

/// The name after `command ` / `discord command `, if the key has that shape.
fn command_name(key: &str) -> Option<&str> {
    let rest = key
        .strip_prefix("discord command ")
        .or_else(|| key.strip_prefix("command "))?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

fn command_load(
    tree: &mut Tree,
    id: NodeId,
    scanner: &Scanner,
    ctx: &mut ParsingContext,
) -> Result<Element, EngineError> {
    let name = command_name(&tree.node(id).key)
        .ok_or_else(|| EngineError::MalformedBranch {
            line: tree.node(id).line,
            message: "command section has no name".to_string(),
        })?
        .to_string();

    let mut element = CommandElement {
        name,
        ..CommandElement::default()
    };
    for &child in tree.children(id).to_vec().iter() {
        let node = tree.node(child);
        let value = match node.simple_value() {
            Some(v) => v.to_string(),
            None => continue,
        };
        ctx.visited.insert(child);
        match node.key.as_str() {
            "aliases" => {
                element.aliases = value
                    .split(',')
                    .map(|a| a.trim().trim_start_matches('/').to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
            }
            "permission" => element.permission = Some(value),
            "permission message" => element.permission_message = Some(value),
            "cooldown" => element.cooldown = Some(value),
            "usage" => element.usage = Some(value),
            "description" => element.description = Some(value),
            _ => {}
        }
    }

    // Explicit recursion: only the trigger child's subtree is descended.
    if let Some(trigger) = tree.section_child(id, "trigger") {
        element.tokens = collect_tokens(tree, trigger, scanner, ctx);
    }
    Ok(Element::Command(element))
}

// ── Function ────────────────────────────────────────────────────────

fn function_matches(tree: &Tree, id: NodeId) -> bool {
    let node = tree.node(id);
    node.is_section() && node.parent.is_none() && {
        let key = node.key.as_str();
        key.starts_with("function ") || key.starts_with("local function ")
    }
}

fn function_load(
    tree: &mut Tree,
    id: NodeId,
    scanner: &Scanner,
    ctx: &mut ParsingContext,
) -> Result<Element, EngineError> {
    let (line, key) = {
        let node = tree.node(id);
        (node.line, node.key.clone())
    };
    let mut element = parse_function_declaration(&key, line)?;
    element.tokens = collect_tokens(tree, id, scanner, ctx);
    Ok(Element::Function(element))
}

/// Parse a declaration key of the shape
/// `[local ]function name(arg: type, ...) [:: return type]`.
pub fn parse_function_declaration(key: &str, line: usize) -> Result<FunctionElement, EngineError> {
    let local = key.starts_with("local ");
    let rest = key
        .strip_prefix("local ")
        .unwrap_or(key)
        .strip_prefix("function ")
        .ok_or(EngineError::InvalidFunctionDeclaration(line))?;

    let open = rest
        .find('(')
        .ok_or(EngineError::InvalidFunctionDeclaration(line))?;
    let close = rest
        .rfind(')')
        .filter(|&c| c > open)
        .ok_or(EngineError::InvalidFunctionDeclaration(line))?;

    let name = rest[..open].trim();
    if name.is_empty() {
        return Err(EngineError::InvalidFunctionDeclaration(line));
    }

    let mut arguments = Vec::new();
    for part in rest[open + 1..close].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        // Default values after `=` do not affect the symbol name.
        let part = part.split('=').next().unwrap_or(part).trim();
        match part.split_once(':') {
            Some((arg_name, arg_type)) => arguments.push(DeclaredArgument {
                name: arg_name.trim().to_string(),
                arg_type: arg_type.trim().to_string(),
            }),
            None => return Err(EngineError::InvalidFunctionDeclaration(line)),
        }
    }

    let return_type = rest[close + 1..]
        .trim()
        .strip_prefix("::")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(FunctionElement {
        name: name.to_string(),
        local,
        arguments,
        return_type,
        tokens: ExtractedTokens::default(),
    })
}

// ── Options ─────────────────────────────────────────────────────────

fn options_matches(tree: &Tree, id: NodeId) -> bool {
    let node = tree.node(id);
    node.is_section() && node.parent.is_none() && node.key == "options"
}

fn options_load(
    tree: &mut Tree,
    id: NodeId,
    _scanner: &Scanner,
    ctx: &mut ParsingContext,
) -> Result<Element, EngineError> {
    let line = tree.node(id).line;
    // A second options section is suspicious but never fatal.
    match ctx.options_line {
        Some(first) => ctx.diagnostics.push(Diagnostic::warning(
            "duplicate-options",
            format!("duplicate options section; first defined on line {first}"),
            line,
            Some(id),
        )),
        None => ctx.options_line = Some(line),
    }

    let mut element = OptionsElement::default();
    for &child in tree.children(id).to_vec().iter() {
        ctx.visited.insert(child);
        let node = tree.node(child);
        match &node.kind {
            NodeKind::Simple { value } => {
                let entry = OptionEntry {
                    key: node.key.clone(),
                    value: value.clone(),
                    line: node.line,
                };
                element.entries.push(entry.clone());
                tree.node_mut(child).element = Some(Element::OptionEntry(entry));
            }
            _ => ctx.diagnostics.push(Diagnostic::warning(
                "malformed-option",
                format!("expected `key: value` inside options, found `{}`", node.key),
                node.line,
                Some(child),
            )),
        }
    }
    Ok(Element::Options(element))
}

// ── Event (fallback) ────────────────────────────────────────────────

fn event_matches(tree: &Tree, id: NodeId) -> bool {
    let node = tree.node(id);
    node.is_section() && node.parent.is_none()
}

fn event_load(
    tree: &mut Tree,
    id: NodeId,
    scanner: &Scanner,
    ctx: &mut ParsingContext,
) -> Result<Element, EngineError> {
    let pattern = tree.node(id).key.clone();
    let tokens = collect_tokens(tree, id, scanner, ctx);
    Ok(Element::Event(EventElement { pattern, tokens }))
}

// ── Shared traversal ────────────────────────────────────────────────

/// Scan every line of a subtree for variables, option references, and
/// colors. Offsets are relative to each node's trimmed line text.
fn collect_tokens(
    tree: &Tree,
    id: NodeId,
    scanner: &Scanner,
    ctx: &mut ParsingContext,
) -> ExtractedTokens {
    let mut tokens = ExtractedTokens::default();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        ctx.visited.insert(current);
        let node = tree.node(current);
        let text = match &node.kind {
            NodeKind::Simple { value } => format!("{}: {}", node.key, value),
            NodeKind::Effect { effect } => effect.clone(),
            NodeKind::Section { .. } => node.key.clone(),
        };
        tokens.variables.extend(scanner.variables(&text));
        tokens.option_refs.extend(scanner.option_refs(&text));
        tokens.colors.extend(scanner.colors(&text));
        for &child in tree.children(current).iter().rev() {
            stack.push(child);
        }
    }
    tokens
}

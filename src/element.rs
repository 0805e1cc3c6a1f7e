use serde::Serialize;

use crate::scan::{ColorToken, OptionRefToken, VariableToken};

/// Tokens extracted from the text a structural element governs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExtractedTokens {
    pub variables: Vec<VariableToken>,
    pub option_refs: Vec<OptionRefToken>,
    pub colors: Vec<ColorToken>,
}

impl ExtractedTokens {
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.option_refs.is_empty() && self.colors.is_empty()
    }

    pub fn extend(&mut self, other: ExtractedTokens) {
        self.variables.extend(other.variables);
        self.option_refs.extend(other.option_refs);
        self.colors.extend(other.colors);
    }
}

/// A recognized command: `command /name:` with metadata children and a
/// `trigger:` body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandElement {
    /// Name as written after the `command` keyword (leading `/` kept).
    pub name: String,
    pub aliases: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tokens found in the trigger body.
    pub tokens: ExtractedTokens,
}

/// Fallback payload for any top-level section no other analyzer claims.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventElement {
    /// The section key, e.g. `on join`.
    pub pattern: String,
    pub tokens: ExtractedTokens,
}

/// One `key: value` definition inside an options section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionEntry {
    pub key: String,
    pub value: String,
    /// 1-indexed source line of the definition.
    pub line: usize,
}

/// The document's `options:` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionsElement {
    pub entries: Vec<OptionEntry>,
}

/// A declared function argument: `name: type` inside the declaration
/// parentheses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeclaredArgument {
    pub name: String,
    pub arg_type: String,
}

/// A recognized function declaration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FunctionElement {
    pub name: String,
    pub local: bool,
    pub arguments: Vec<DeclaredArgument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    pub tokens: ExtractedTokens,
}

/// Semantic payload attached to exactly one tree node after recognition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Element {
    Command(CommandElement),
    Event(EventElement),
    Options(OptionsElement),
    Function(FunctionElement),
    /// Leaf payload for each simple child of an options section.
    OptionEntry(OptionEntry),
}

impl Element {
    /// Short display name for diagnostics and the CLI report.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Element::Command(_) => "command",
            Element::Event(_) => "event",
            Element::Options(_) => "options",
            Element::Function(_) => "function",
            Element::OptionEntry(_) => "option",
        }
    }
}

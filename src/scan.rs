use regex::Regex;
use serde::Serialize;

/// Scoping class of a `{name}` token, derived from its prefix character:
/// `_` local, `-` memory, no prefix global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarScope {
    Local,
    Global,
    Memory,
}

/// A `{name}` variable occurrence inside scanned text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableToken {
    /// Name without its scope prefix.
    pub name: String,
    pub scope: VarScope,
    /// Byte offset of the opening `{` within the scanned text.
    pub offset: usize,
    /// Length of the whole token including braces.
    pub length: usize,
}

/// A `{@key}` option reference occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionRefToken {
    pub name: String,
    pub offset: usize,
    pub length: usize,
}

/// Which markup form produced a color token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase", tag = "form", content = "value")]
pub enum ColorForm {
    /// `<#RRGGBB>`; carries the six hex digits.
    Hex(String),
    /// `<tag>` against the fixed palette/style table; carries the tag name.
    Named(String),
    /// Legacy `&X` two-character code; carries the code character.
    Legacy(char),
}

/// An inline color/style markup occurrence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorToken {
    pub form: ColorForm,
    pub offset: usize,
    pub length: usize,
}

/// The fixed palette of named color tags.
pub const PALETTE: [&str; 16] = [
    "black",
    "dark_blue",
    "dark_green",
    "dark_aqua",
    "dark_red",
    "dark_purple",
    "gold",
    "gray",
    "dark_gray",
    "blue",
    "green",
    "aqua",
    "red",
    "light_purple",
    "yellow",
    "white",
];

/// Style tags accepted alongside the palette.
pub const STYLE_TAGS: [&str; 5] = ["bold", "italic", "underline", "strikethrough", "reset"];

/// Compiled token patterns. One per engine instance; the patterns are fixed
/// so compilation cannot fail after the unit tests pass once.
pub struct Scanner {
    variable: Regex,
    option_ref: Regex,
    hex_color: Regex,
    named_tag: Regex,
    legacy_code: Regex,
}

impl Scanner {
    pub fn new() -> Self {
        Scanner {
            // {@...} is an option reference, not a variable, so the first
            // character inside the braces must not be `@`.
            variable: Regex::new(r"\{([^{}@][^{}]*)\}").unwrap(),
            option_ref: Regex::new(r"\{@([^{}]+)\}").unwrap(),
            hex_color: Regex::new(r"<#([0-9A-Fa-f]{6})>").unwrap(),
            named_tag: Regex::new(r"<([a-z_]+)>").unwrap(),
            legacy_code: Regex::new(r"&[0-9A-Za-z]").unwrap(),
        }
    }

    /// Find every `{name}` variable token in `text`.
    pub fn variables(&self, text: &str) -> Vec<VariableToken> {
        self.variable
            .captures_iter(text)
            .map(|cap| {
                let whole = cap.get(0).unwrap();
                let inner = cap.get(1).unwrap().as_str();
                let (scope, name) = split_scope(inner);
                VariableToken {
                    name: name.to_string(),
                    scope,
                    offset: whole.start(),
                    length: whole.len(),
                }
            })
            .collect()
    }

    /// Find every `{@key}` option reference in `text`.
    pub fn option_refs(&self, text: &str) -> Vec<OptionRefToken> {
        self.option_ref
            .captures_iter(text)
            .map(|cap| {
                let whole = cap.get(0).unwrap();
                OptionRefToken {
                    name: cap.get(1).unwrap().as_str().to_string(),
                    offset: whole.start(),
                    length: whole.len(),
                }
            })
            .collect()
    }

    /// Find every inline color/style markup occurrence in `text`, in all
    /// three forms, sorted by ascending offset for deterministic
    /// left-to-right presentation.
    pub fn colors(&self, text: &str) -> Vec<ColorToken> {
        let mut out = Vec::new();
        for m in self.hex_color.captures_iter(text) {
            let whole = m.get(0).unwrap();
            out.push(ColorToken {
                form: ColorForm::Hex(m.get(1).unwrap().as_str().to_string()),
                offset: whole.start(),
                length: whole.len(),
            });
        }
        for m in self.named_tag.captures_iter(text) {
            let whole = m.get(0).unwrap();
            let tag = m.get(1).unwrap().as_str();
            if PALETTE.contains(&tag) || STYLE_TAGS.contains(&tag) {
                out.push(ColorToken {
                    form: ColorForm::Named(tag.to_string()),
                    offset: whole.start(),
                    length: whole.len(),
                });
            }
        }
        for m in self.legacy_code.find_iter(text) {
            out.push(ColorToken {
                form: ColorForm::Legacy(m.as_str().chars().nth(1).unwrap()),
                offset: m.start(),
                length: m.len(),
            });
        }
        out.sort_by_key(|c| c.offset);
        out
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the scope prefix from a raw `{...}` token body.
pub fn split_scope(inner: &str) -> (VarScope, &str) {
    if let Some(rest) = inner.strip_prefix('_') {
        (VarScope::Local, rest)
    } else if let Some(rest) = inner.strip_prefix('-') {
        (VarScope::Memory, rest)
    } else {
        (VarScope::Global, inner)
    }
}

/// Rebuild a raw token body from a scope and name, the inverse of
/// [`split_scope`]. Used when rewriting variable tokens in place.
pub fn join_scope(scope: VarScope, name: &str) -> String {
    match scope {
        VarScope::Local => format!("_{name}"),
        VarScope::Memory => format!("-{name}"),
        VarScope::Global => name.to_string(),
    }
}

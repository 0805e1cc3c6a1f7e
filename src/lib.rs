pub mod analyzer;
pub mod element;
pub mod engine;
pub mod error;
pub mod parser;
pub mod rename;
pub mod scan;
pub mod section;
pub mod tree;

pub use engine::{EngineConfig, FoldRange, ScriptEngine};
pub use error::{Diagnostic, EngineError, Severity};
pub use rename::SymbolRef;
pub use scan::VarScope;
pub use section::{CodeSection, SectionType};

/// Parse source text into a fresh single-document engine.
///
/// Equivalent to constructing a [`ScriptEngine`] and calling
/// [`ScriptEngine::parse`]; hosts that keep a document open should hold the
/// engine and reparse through it instead.
pub fn parse_script(text: &str) -> ScriptEngine {
    let mut engine = ScriptEngine::new();
    engine.parse(text);
    engine
}

#[cfg(test)]
mod tests;

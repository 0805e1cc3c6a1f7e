use std::collections::HashSet;

use serde::Serialize;

use crate::analyzer::{default_registry, recognize, AnalyzerEntry, ParsingContext};
use crate::error::{Diagnostic, EngineError, Severity};
use crate::parser::build_tree;
use crate::rename::{rename_symbol, SymbolRef};
use crate::scan::Scanner;
use crate::section::CodeSection;
use crate::tree::{NodeId, Tree};

/// Per-engine settings, fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Verbose recognition tracing.
    pub debug: bool,
}

/// A foldable range the hosting editor can collapse. Ranges are matched
/// across rebuilds by exact `(start_line, end_line)` so collapsed state
/// survives a reparse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FoldRange {
    /// 1-indexed first line (the section header).
    pub start_line: usize,
    /// 1-indexed last line of the folded body.
    pub end_line: usize,
    /// Display title shown on the collapsed row.
    pub title: String,
}

/// One document's parser and symbol-resolution state.
///
/// Constructed when the document opens and torn down when it closes; every
/// operation goes through the instance, never through ambient state. The
/// tree and all derived symbol sets are rebuilt wholesale on every parse —
/// there is no incremental diff, and a rename runs to completion (including
/// its terminal rebuild) before anything else can observe the document.
pub struct ScriptEngine {
    config: EngineConfig,
    registry: Vec<AnalyzerEntry>,
    scanner: Scanner,
    lines: Vec<String>,
    tree: Tree,
    sections: Vec<CodeSection>,
    diagnostics: Vec<Diagnostic>,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        ScriptEngine {
            config,
            registry: default_registry(),
            scanner: Scanner::new(),
            lines: Vec::new(),
            tree: Tree::new(),
            sections: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Register an additional analyzer. The registry stays sorted by
    /// descending priority; within equal priorities, earlier registration
    /// wins.
    pub fn register(&mut self, entry: AnalyzerEntry) {
        self.registry.push(entry);
        self.registry.sort_by_key(|e| std::cmp::Reverse(e.priority));
    }

    /// Parse the given source text, replacing all previous state.
    pub fn parse(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_string).collect();
        self.rebuild();
    }

    /// Parse an already-split line buffer, replacing all previous state.
    pub fn parse_lines(&mut self, lines: Vec<String>) {
        self.lines = lines;
        self.rebuild();
    }

    /// Rebuild the tree and symbol sets from the current line buffer.
    /// Invoked by the host's text-changed signal and after every rename.
    pub fn reparse(&mut self) {
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.tree = build_tree(&self.lines);
        let mut ctx = ParsingContext::new(self.config.debug);
        recognize(&mut self.tree, &self.registry, &self.scanner, &mut ctx);
        self.diagnostics = ctx.diagnostics;
        self.sections = self.derive_sections();
        tracing::trace!(
            nodes = self.tree.len(),
            sections = self.sections.len(),
            diagnostics = self.diagnostics.len(),
            "rebuilt document"
        );
    }

    /// Split the document into regions at top-level section roots. Each
    /// region runs to the line before the next top-level section (or the end
    /// of the document); stray top-level lines stay with the region above.
    fn derive_sections(&mut self) -> Vec<CodeSection> {
        let section_roots: Vec<usize> = self
            .tree
            .roots()
            .iter()
            .filter(|&&id| self.tree.node(id).is_section())
            .map(|&id| self.tree.node(id).line)
            .collect();

        let mut sections = Vec::with_capacity(section_roots.len());
        for (i, &start) in section_roots.iter().enumerate() {
            let end = section_roots
                .get(i + 1)
                .map(|&next| next - 1)
                .unwrap_or(self.lines.len());
            let lines = self.lines[start - 1..end].to_vec();
            sections.push(CodeSection::parse(
                start,
                lines,
                &self.scanner,
                &mut self.diagnostics,
            ));
        }
        sections
    }

    // ── Host-facing queries ─────────────────────────────────────────

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn sections(&self) -> &[CodeSection] {
        &self.sections
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// The structural node on a 1-indexed line, if any.
    pub fn node_at_line(&self, line: usize) -> Option<NodeId> {
        self.tree.node_at_line(line)
    }

    /// The region containing a 1-indexed line, with its index for building
    /// [`SymbolRef`]s.
    pub fn section_at_line(&self, line: usize) -> Option<(usize, &CodeSection)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(_, s)| s.contains_line(line))
    }

    /// Fold candidates: every section node with at least one child. Nested
    /// sections (e.g. a command's trigger) fold independently of their
    /// region.
    pub fn fold_ranges(&self) -> Vec<FoldRange> {
        self.tree
            .iter_depth_first()
            .into_iter()
            .filter(|&id| !self.tree.children(id).is_empty())
            .map(|id| {
                let node = self.tree.node(id);
                FoldRange {
                    start_line: node.line,
                    end_line: self.tree.subtree_end_line(id),
                    title: node.key.clone(),
                }
            })
            .collect()
    }

    /// The subset of current fold ranges whose exact `(start, end)` offsets
    /// also existed before a rebuild — the ones whose collapsed state the
    /// editor should restore.
    pub fn retained_folds(&self, previous: &HashSet<(usize, usize)>) -> Vec<FoldRange> {
        self.fold_ranges()
            .into_iter()
            .filter(|f| previous.contains(&(f.start_line, f.end_line)))
            .collect()
    }

    /// Rename a symbol and force a full rebuild. The symbol tables are never
    /// patched in place: on success, every derived set reflects a fresh
    /// parse of the mutated text. On error nothing changes.
    pub fn rename(&mut self, symbol: SymbolRef, new_name: &str) -> Result<(), EngineError> {
        rename_symbol(
            symbol,
            new_name,
            &self.sections,
            &mut self.lines,
            &self.scanner,
        )?;
        self.reparse();
        Ok(())
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}

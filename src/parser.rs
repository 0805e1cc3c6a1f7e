use crate::tree::{Node, NodeId, NodeKind, Tree};

/// Build the structural forest from 1-indexed raw source lines.
///
/// Comments are assumed stripped upstream. Blank lines never close a section
/// and are skipped entirely. Classification tries three mutually exclusive
/// shapes in priority order: `key: value`, `key:`, then a bare effect line.
pub fn build_tree(lines: &[String]) -> Tree {
    let mut tree = Tree::new();
    // (open section, raw indentation column it was opened at)
    let mut stack: Vec<(NodeId, usize)> = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let line_no = i + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let indent = leading_whitespace(raw);
        let text = raw.trim();

        // Sections whose recorded column is at or past this line's indent
        // have ended.
        while matches!(stack.last(), Some(&(_, col)) if col >= indent) {
            stack.pop();
        }
        let parent = stack.last().map(|&(id, _)| id);

        let node = classify(text, line_no);
        let opened = node.is_section();
        let id = tree.push(node, parent);
        if opened {
            stack.push((id, indent));
        }
    }

    tree.normalize_indents();
    tree
}

/// Number of leading whitespace characters. Tabs and spaces both count one:
/// only relative nesting matters here, and depth is renormalized after the
/// build pass.
fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Classify one trimmed line into its node shape.
///
/// A trailing colon always opens a section, even when the line also has an
/// inner colon (`function f(arg: text):`). Otherwise a colon with a
/// non-empty remainder is a `key: value` line, and anything else is an
/// effect statement.
fn classify(text: &str, line: usize) -> Node {
    let (key, kind) = if let Some(key) = text.strip_suffix(':') {
        (
            key.trim_end().to_string(),
            NodeKind::Section {
                children: Vec::new(),
            },
        )
    } else if let Some(pos) = text.find(':') {
        (
            text[..pos].trim_end().to_string(),
            NodeKind::Simple {
                value: text[pos + 1..].trim().to_string(),
            },
        )
    } else {
        (
            text.to_string(),
            NodeKind::Effect {
                effect: text.to_string(),
            },
        )
    };
    Node {
        key,
        line,
        indent: 0,
        parent: None,
        element: None,
        kind,
    }
}

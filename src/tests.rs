use std::collections::HashSet;

use crate::analyzer::AnalyzerEntry;
use crate::element::Element;
use crate::engine::ScriptEngine;
use crate::error::{EngineError, Severity};
use crate::parser::build_tree;
use crate::scan::{ColorForm, Scanner, VarScope};
use crate::section::SectionType;
use crate::tree::{NodeId, NodeKind, Tree};
use crate::{parse_script, SymbolRef};

// ── Helpers ─────────────────────────────────────────────────────────

fn engine_from(lines: &[&str]) -> ScriptEngine {
    parse_script(&lines.join("\n"))
}

fn to_lines(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

// ── Structural tree builder ─────────────────────────────────────────

#[test]
fn scenario_a_tree_shape() {
    let tree = build_tree(&to_lines(&[
        "command /test:",
        "\tset {_x} to 5",
        "\tbroadcast \"%{_x}%\"",
    ]));

    assert_eq!(tree.roots().len(), 1, "expected a single root");
    let root = tree.node(tree.roots()[0]);
    assert!(root.is_section());
    assert_eq!(root.key, "command /test");
    assert_eq!(root.line, 1);
    assert_eq!(root.indent, 0);

    let children = tree.children(tree.roots()[0]);
    assert_eq!(children.len(), 2);
    for (&child, line) in children.iter().zip([2, 3]) {
        let node = tree.node(child);
        assert!(
            matches!(node.kind, NodeKind::Effect { .. }),
            "line {line} should be an effect, got {:?}",
            node.kind
        );
        assert_eq!(node.line, line);
        assert_eq!(node.indent, 1);
        assert_eq!(node.parent, Some(tree.roots()[0]));
    }
}

#[test]
fn indent_is_normalized_across_tabs_and_spaces() {
    let tree = build_tree(&to_lines(&["on join:", "  send \"a\"", "\tsend \"b\""]));

    let root = tree.roots()[0];
    let children = tree.children(root);
    assert_eq!(children.len(), 2, "both lines nest under the section");
    // Two spaces vs one tab: raw widths differ, normalized depth does not.
    assert_eq!(tree.node(children[0]).indent, 1);
    assert_eq!(tree.node(children[1]).indent, 1);
}

#[test]
fn blank_lines_do_not_close_sections() {
    let tree = build_tree(&to_lines(&[
        "command /x:",
        "\ttrigger:",
        "\t\tsend \"a\"",
        "",
        "\t\tsend \"b\"",
    ]));

    let root = tree.roots()[0];
    let trigger = tree.section_child(root, "trigger").expect("trigger child");
    assert_eq!(
        tree.children(trigger).len(),
        2,
        "the effect after the blank line still belongs to the trigger"
    );
}

#[test]
fn sibling_sections_close_at_equal_indent() {
    let tree = build_tree(&to_lines(&[
        "on join:",
        "\tsend \"a\"",
        "on quit:",
        "\tsend \"b\"",
    ]));

    assert_eq!(tree.roots().len(), 2);
    assert_eq!(tree.node(tree.roots()[1]).key, "on quit");
    assert_eq!(tree.node(tree.roots()[1]).indent, 0);
}

#[test]
fn unrecognized_line_shapes_fall_back_to_effects() {
    let tree = build_tree(&to_lines(&["just some words"]));
    let root = tree.node(tree.roots()[0]);
    assert_eq!(
        root.kind,
        NodeKind::Effect {
            effect: "just some words".to_string()
        }
    );
}

#[test]
fn trailing_colon_wins_over_inner_colon() {
    // A function header has an inner colon in its argument list but still
    // opens a section.
    let tree = build_tree(&to_lines(&["function f(x: text):", "\treturn {_x}"]));
    let root = tree.node(tree.roots()[0]);
    assert!(root.is_section());
    assert_eq!(root.key, "function f(x: text)");
}

#[test]
fn parsing_twice_is_idempotent() {
    let text = [
        "options:",
        "\tprefix: &c[Test]",
        "",
        "command /greet:",
        "\ttrigger:",
        "\t\tbroadcast \"{@prefix} hi\"",
    ]
    .join("\n");

    let first = parse_script(&text);
    let second = parse_script(&text);
    assert_eq!(first.tree(), second.tree());
    assert_eq!(first.sections(), second.sections());
    assert_eq!(first.diagnostics(), second.diagnostics());
}

// ── Element recognition ─────────────────────────────────────────────

#[test]
fn scenario_a_is_classified_as_command() {
    let engine = engine_from(&[
        "command /test:",
        "\tset {_x} to 5",
        "\tbroadcast \"%{_x}%\"",
    ]);

    let root = engine.tree().roots()[0];
    match &engine.tree().node(root).element {
        Some(Element::Command(cmd)) => assert_eq!(cmd.name, "/test"),
        other => panic!("expected a command element, got {other:?}"),
    }
    assert_eq!(engine.sections()[0].section_type, SectionType::Command);
}

#[test]
fn command_metadata_children_are_loaded() {
    let engine = engine_from(&[
        "command /home:",
        "\taliases: /h, /base",
        "\tpermission: homes.use",
        "\tcooldown: 10 seconds",
        "\tusage: /home",
        "\tdescription: teleport home",
        "\ttrigger:",
        "\t\tsend \"<gold>going home\"",
    ]);

    let root = engine.tree().roots()[0];
    let Some(Element::Command(cmd)) = &engine.tree().node(root).element else {
        panic!("expected a command element");
    };
    assert_eq!(cmd.aliases, vec!["h", "base"]);
    assert_eq!(cmd.permission.as_deref(), Some("homes.use"));
    assert_eq!(cmd.cooldown.as_deref(), Some("10 seconds"));
    assert_eq!(cmd.usage.as_deref(), Some("/home"));
    assert_eq!(cmd.description.as_deref(), Some("teleport home"));
    assert_eq!(cmd.tokens.colors.len(), 1, "trigger body color markup");
}

#[test]
fn command_recursion_is_limited_to_the_trigger() {
    let engine = engine_from(&[
        "command /x:",
        "\tusage: {_not_scanned}",
        "\ttrigger:",
        "\t\tset {_scanned} to 1",
    ]);

    let root = engine.tree().roots()[0];
    let Some(Element::Command(cmd)) = &engine.tree().node(root).element else {
        panic!("expected a command element");
    };
    let names: Vec<&str> = cmd.tokens.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["scanned"]);
}

#[test]
fn unclaimed_sections_fall_back_to_events() {
    let engine = engine_from(&["on first join:", "\tbroadcast \"welcome {player}\""]);

    let root = engine.tree().roots()[0];
    match &engine.tree().node(root).element {
        Some(Element::Event(event)) => {
            assert_eq!(event.pattern, "on first join");
            assert_eq!(event.tokens.variables.len(), 1);
        }
        other => panic!("expected an event element, got {other:?}"),
    }
    assert_eq!(engine.sections()[0].section_type, SectionType::Event);
}

#[test]
fn function_declarations_are_recognized() {
    let engine = engine_from(&[
        "local function pay(from: player, amount: number = 10) :: boolean:",
        "\treturn true",
    ]);

    let root = engine.tree().roots()[0];
    let Some(Element::Function(func)) = &engine.tree().node(root).element else {
        panic!("expected a function element");
    };
    assert_eq!(func.name, "pay");
    assert!(func.local);
    assert_eq!(func.return_type.as_deref(), Some("boolean"));
    let args: Vec<(&str, &str)> = func
        .arguments
        .iter()
        .map(|a| (a.name.as_str(), a.arg_type.as_str()))
        .collect();
    assert_eq!(args, vec![("from", "player"), ("amount", "number")]);
}

#[test]
fn duplicate_options_sections_warn_once_and_both_parse() {
    let engine = engine_from(&["options:", "\ta: 1", "options:", "\tb: 2"]);

    let duplicates: Vec<_> = engine
        .diagnostics()
        .iter()
        .filter(|d| d.code == "duplicate-options")
        .collect();
    assert_eq!(duplicates.len(), 1, "exactly one duplicate warning");
    assert_eq!(duplicates[0].severity, Severity::Warning);
    assert_eq!(duplicates[0].line, 3, "warning anchors to the second region");

    for root in engine.tree().roots() {
        match &engine.tree().node(*root).element {
            Some(Element::Options(opts)) => assert_eq!(opts.entries.len(), 1),
            other => panic!("expected options elements on both roots, got {other:?}"),
        }
    }
}

#[test]
fn option_entries_are_attached_to_their_nodes() {
    let engine = engine_from(&["options:", "\tprefix: [S]"]);

    let root = engine.tree().roots()[0];
    let child = engine.tree().children(root)[0];
    match &engine.tree().node(child).element {
        Some(Element::OptionEntry(entry)) => {
            assert_eq!(entry.key, "prefix");
            assert_eq!(entry.value, "[S]");
            assert_eq!(entry.line, 2);
        }
        other => panic!("expected an option entry element, got {other:?}"),
    }
}

fn boom_matches(tree: &Tree, id: NodeId) -> bool {
    tree.node(id).is_section() && tree.node(id).key == "boom"
}

fn boom_load(
    tree: &mut Tree,
    id: NodeId,
    _scanner: &Scanner,
    _ctx: &mut crate::analyzer::ParsingContext,
) -> Result<Element, EngineError> {
    Err(EngineError::MalformedBranch {
        line: tree.node(id).line,
        message: "boom".to_string(),
    })
}

#[test]
fn analyzer_failures_are_isolated_per_node() {
    let mut engine = ScriptEngine::new();
    engine.register(AnalyzerEntry {
        name: "boom",
        priority: 100,
        matches: boom_matches,
        load: boom_load,
    });
    engine.parse("boom:\n\tstuff\non join:\n\tbroadcast \"still parsed\"");

    let boom_root = engine.tree().roots()[0];
    assert!(
        engine.tree().node(boom_root).element.is_none(),
        "the failed node stays unclaimed"
    );
    assert!(engine.has_errors());
    assert!(engine
        .diagnostics()
        .iter()
        .any(|d| d.code == "analyzer-failed" && d.line == 1));

    let event_root = engine.tree().roots()[1];
    assert!(
        matches!(engine.tree().node(event_root).element, Some(Element::Event(_))),
        "siblings keep parsing after a failure"
    );
}

// ── Expression scanning ─────────────────────────────────────────────

#[test]
fn variable_scopes_derive_from_prefixes() {
    let scanner = Scanner::new();
    let tokens = scanner.variables("set {a} to {_b} plus {-c}");

    let summary: Vec<(&str, VarScope)> = tokens
        .iter()
        .map(|t| (t.name.as_str(), t.scope))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("a", VarScope::Global),
            ("b", VarScope::Local),
            ("c", VarScope::Memory),
        ]
    );
    assert_eq!(tokens[0].offset, 4);
    assert_eq!(tokens[0].length, 3);
}

#[test]
fn option_references_are_not_variables() {
    let scanner = Scanner::new();
    assert!(scanner.variables("broadcast \"{@prefix}\"").is_empty());
    let refs = scanner.option_refs("broadcast \"{@prefix}\"");
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].name, "prefix");
}

#[test]
fn colors_come_back_sorted_by_offset() {
    let scanner = Scanner::new();
    let colors = scanner.colors("&c hello <bold> then <#FF0000> and <red> but <nope>");

    let forms: Vec<&ColorForm> = colors.iter().map(|c| &c.form).collect();
    assert_eq!(
        forms,
        vec![
            &ColorForm::Legacy('c'),
            &ColorForm::Named("bold".to_string()),
            &ColorForm::Hex("FF0000".to_string()),
            &ColorForm::Named("red".to_string()),
        ]
    );
    assert!(
        colors.windows(2).all(|w| w[0].offset <= w[1].offset),
        "colors must be sorted left to right"
    );
}

// ── Region symbol tables ────────────────────────────────────────────

#[test]
fn scenario_a_unique_variables_collapse() {
    let engine = engine_from(&[
        "command /test:",
        "\tset {_x} to 5",
        "\tbroadcast \"%{_x}%\"",
    ]);

    let section = &engine.sections()[0];
    assert_eq!(section.variables.len(), 2, "x is found twice");
    let unique = section.unique_variables();
    assert_eq!(unique.len(), 1, "both occurrences are the same referent");
    assert_eq!(unique[0].name, "x");
    assert!(unique[0].is_local());
    assert_eq!(unique[0].line, 2, "the first occurrence survives");
}

#[test]
fn unique_views_keep_first_of_each_referent() {
    let engine = engine_from(&[
        "on chat:",
        "\tset {count} to {_count}",
        "\tbroadcast \"%{count}% {@tag} {@tag}\"",
    ]);

    let section = &engine.sections()[0];
    // {count} global twice, {_count} local once: similar needs name AND
    // scope to match, so both survive the unique view.
    let unique = section.unique_variables();
    assert_eq!(unique.len(), 2);
    assert_eq!(section.unique_option_references().len(), 1);
}

#[test]
fn region_bounds_exclude_trailing_blank_lines() {
    let engine = engine_from(&["on join:", "\tsend \"hi\"", "", ""]);

    let section = &engine.sections()[0];
    assert_eq!(section.ending_line(), 2);
    assert!(section.ending_line() <= engine.lines().len());
}

#[test]
fn malformed_option_lines_warn_without_rejecting_the_region() {
    let engine = engine_from(&["options:", "\tgood: yes", "\tno colon here", "\talso: fine"]);

    assert!(engine
        .diagnostics()
        .iter()
        .any(|d| d.code == "malformed-option" && d.line == 3));
    let section = &engine.sections()[0];
    let names: Vec<&str> = section.options.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["good", "also"]);
}

#[test]
fn function_arguments_come_from_the_declaration_line_only() {
    let engine = engine_from(&[
        "function greet(name: text, times: number) :: text:",
        "\tset {_greeting} to \"hi %{_name}%\"",
        "\treturn {_greeting}",
    ]);

    let section = &engine.sections()[0];
    assert_eq!(section.section_type, SectionType::Function);
    let args: Vec<&str> = section
        .function_arguments
        .iter()
        .map(|a| a.name.as_str())
        .collect();
    assert_eq!(args, vec!["name", "times"]);
    assert_eq!(section.function_arguments[0].line, 1);
    assert_eq!(
        section.function_arguments[0].column,
        "function greet(".len()
    );
    // Body variables are still scanned line by line.
    assert_eq!(section.variables.len(), 3);
}

#[test]
fn lookups_by_line_hit_nodes_and_sections() {
    let engine = engine_from(&["on join:", "\tsend \"hi\"", "on quit:", "\tsend \"bye\""]);

    let node = engine.node_at_line(2).expect("node on line 2");
    assert_eq!(engine.tree().node(node).line, 2);
    let (index, section) = engine.section_at_line(4).expect("section on line 4");
    assert_eq!(index, 1);
    assert_eq!(section.starting_line, 3);
    assert!(engine.node_at_line(99).is_none());
}

// ── Rename engine ───────────────────────────────────────────────────

const SCENARIO_B: [&str; 4] = [
    "options:",
    "\tprefix: &c[Test]",
    "event:",
    "\tbroadcast \"{@prefix}\"",
];

#[test]
fn scenario_b_extraction() {
    let engine = engine_from(&SCENARIO_B);

    let options = &engine.sections()[0];
    assert_eq!(options.section_type, SectionType::Options);
    assert_eq!(options.options.len(), 1);
    assert_eq!(options.options[0].name, "prefix");

    let event = &engine.sections()[1];
    assert_eq!(event.option_references.len(), 1);
    assert_eq!(event.option_references[0].name, "prefix");
    assert_eq!(event.option_references[0].line, 4);
}

#[test]
fn scenario_b_rename_via_definition() {
    let mut engine = engine_from(&SCENARIO_B);
    engine
        .rename(SymbolRef::Option { section: 0, index: 0 }, "pre")
        .expect("rename succeeds");

    assert_eq!(engine.lines()[1], "\tpre: &c[Test]");
    assert_eq!(engine.lines()[3], "\tbroadcast \"{@pre}\"");
    // The rebuild re-derives both ends of the link.
    assert_eq!(engine.sections()[0].options[0].name, "pre");
    assert_eq!(engine.sections()[1].option_references[0].name, "pre");
}

#[test]
fn scenario_b_rename_via_reference_delegates_to_definition() {
    let mut engine = engine_from(&SCENARIO_B);
    engine
        .rename(SymbolRef::OptionReference { section: 1, index: 0 }, "pre")
        .expect("rename succeeds");

    assert_eq!(engine.lines()[1], "\tpre: &c[Test]");
    assert_eq!(engine.lines()[3], "\tbroadcast \"{@pre}\"");
}

#[test]
fn option_reference_rename_needs_an_options_region() {
    let mut engine = engine_from(&["event:", "\tbroadcast \"{@missing}\""]);
    let before = engine.lines().to_vec();

    let err = engine
        .rename(SymbolRef::OptionReference { section: 0, index: 0 }, "x")
        .expect_err("no options region to delegate to");
    assert_eq!(err, EngineError::MissingOptionsSection);
    assert_eq!(engine.lines(), &before[..], "nothing was mutated");
}

#[test]
fn global_variable_rename_is_document_wide() {
    let mut engine = engine_from(&[
        "command /a:",
        "\ttrigger:",
        "\t\tset {score} to 1",
        "on join:",
        "\tbroadcast \"%{score}%\"",
    ]);
    engine
        .rename(SymbolRef::Variable { section: 0, index: 0 }, "points")
        .expect("rename succeeds");

    for section in engine.sections() {
        assert!(
            section.variables.iter().all(|v| v.name != "score"),
            "no region may still reference the old name"
        );
    }
    assert!(engine.lines()[2].contains("{points}"));
    assert!(engine.lines()[4].contains("{points}"));
}

#[test]
fn local_variable_rename_stays_in_its_region() {
    let mut engine = engine_from(&[
        "command /a:",
        "\ttrigger:",
        "\t\tset {_x} to 1",
        "command /b:",
        "\ttrigger:",
        "\t\tset {_x} to 2",
    ]);
    engine
        .rename(SymbolRef::Variable { section: 0, index: 0 }, "z")
        .expect("rename succeeds");

    assert!(engine.lines()[2].contains("{_z}"));
    assert!(
        engine.lines()[5].contains("{_x}"),
        "an unrelated region's local keeps its name"
    );
}

#[test]
fn memory_variable_rename_is_document_wide() {
    let mut engine = engine_from(&[
        "on join:",
        "\tadd 1 to {-logins}",
        "on quit:",
        "\tbroadcast \"%{-logins}%\"",
    ]);
    engine
        .rename(SymbolRef::Variable { section: 0, index: 0 }, "joins")
        .expect("rename succeeds");

    assert!(engine.lines()[1].contains("{-joins}"));
    assert!(engine.lines()[3].contains("{-joins}"));
}

#[test]
fn argument_rename_cascades_into_body_locals() {
    let mut engine = engine_from(&[
        "function greet(name: text) :: text:",
        "\tset {_greeting} to \"hi %{_name}%\"",
        "\treturn {_greeting}",
    ]);
    engine
        .rename(SymbolRef::FunctionArgument { section: 0, index: 0 }, "who")
        .expect("rename succeeds");

    assert_eq!(engine.lines()[0], "function greet(who: text) :: text:");
    assert!(engine.lines()[1].contains("{_who}"));
    assert!(
        !engine.text().contains("{_name}"),
        "every matching body local follows the argument"
    );
}

#[test]
fn shadowed_variable_rename_delegates_to_the_argument() {
    let mut engine = engine_from(&[
        "function greet(name: text) :: text:",
        "\tset {_greeting} to \"hi %{_name}%\"",
        "\treturn {_greeting}",
    ]);
    // Index 1 is {_name} on line 2 ({_greeting} comes first in the scan).
    engine
        .rename(SymbolRef::Variable { section: 0, index: 1 }, "who")
        .expect("rename succeeds");

    assert_eq!(
        engine.lines()[0],
        "function greet(who: text) :: text:",
        "the declaration follows the shadowed local"
    );
    assert!(engine.lines()[1].contains("{_who}"));
}

#[test]
fn rename_completeness_survives_reparse() {
    let mut engine = engine_from(&[
        "command /a:",
        "\ttrigger:",
        "\t\tset {x} to 1",
        "\t\tbroadcast \"%{x}%\"",
        "on join:",
        "\tset {x} to {x} plus 1",
    ]);
    engine
        .rename(SymbolRef::Variable { section: 0, index: 0 }, "y")
        .expect("rename succeeds");

    let mut renamed = 0;
    for section in engine.sections() {
        assert!(section.variables.iter().all(|v| v.name != "x"));
        renamed += section.variables.iter().filter(|v| v.name == "y").count();
    }
    assert_eq!(renamed, 4, "every previous occurrence was rewritten");
}

#[test]
fn out_of_range_symbol_refs_are_rejected() {
    let mut engine = engine_from(&["on join:", "\tsend \"hi\""]);
    let err = engine
        .rename(SymbolRef::Variable { section: 0, index: 7 }, "y")
        .expect_err("index beyond the symbol set");
    assert_eq!(err, EngineError::UnknownSymbol);
}

// ── Fold ranges ─────────────────────────────────────────────────────

#[test]
fn fold_ranges_cover_nested_sections() {
    let engine = engine_from(&["command /test:", "\ttrigger:", "\t\tsend \"hi\""]);

    let folds = engine.fold_ranges();
    let spans: Vec<(usize, usize, &str)> = folds
        .iter()
        .map(|f| (f.start_line, f.end_line, f.title.as_str()))
        .collect();
    assert_eq!(
        spans,
        vec![(1, 3, "command /test"), (2, 3, "trigger")],
        "outer region and nested trigger both fold"
    );
}

#[test]
fn collapsed_state_is_retained_by_exact_offsets() {
    let text = ["command /test:", "\ttrigger:", "\t\tsend \"hi\""].join("\n");
    let engine = parse_script(&text);

    let collapsed: HashSet<(usize, usize)> = [(1, 3)].into_iter().collect();
    let retained = engine.retained_folds(&collapsed);
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].title, "command /test");

    // A rebuild of identical text keeps the same offsets, so the fold
    // survives; shifting the section breaks the exact match.
    let reparsed = parse_script(&text);
    assert_eq!(reparsed.retained_folds(&collapsed).len(), 1);
    let shifted = parse_script(&format!("\n{text}"));
    assert!(shifted.retained_folds(&collapsed).is_empty());
}

use skriptum::{parse_script, Severity};

use std::io::{self, Read};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let input = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) => {
                eprintln!("{path}: {err}");
                std::process::exit(2);
            }
        },
        None => {
            let mut buf = String::new();
            if let Err(err) = io::stdin().read_to_string(&mut buf) {
                eprintln!("stdin: {err}");
                std::process::exit(2);
            }
            buf
        }
    };

    let engine = parse_script(&input);

    let report = serde_json::json!({
        "sections": engine.sections(),
        "folds": engine.fold_ranges(),
        "diagnostics": engine.diagnostics(),
    });
    println!("{}", serde_json::to_string_pretty(&report).unwrap());

    if engine.diagnostics().is_empty() {
        return;
    }

    let lines = engine.lines();
    for diag in engine.diagnostics() {
        let line_text = lines
            .get(diag.line.saturating_sub(1))
            .map(String::as_str)
            .unwrap_or("");
        let label = match diag.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        eprintln!("{} AT LINE {}:", label, diag.line);
        eprintln!("{}", line_text);

        // Underline the whole line; diagnostics anchor to lines, not spans.
        let indent = line_text.len() - line_text.trim_start().len();
        let mut underline = " ".repeat(indent);
        underline.push('^');
        for _ in indent + 1..line_text.trim_end().len() {
            underline.push('_');
        }
        eprintln!("{}", underline);
        eprintln!("{}", diag.message);
        eprintln!();
    }

    if engine.has_errors() {
        std::process::exit(1);
    }
}

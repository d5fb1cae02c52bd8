//! Hygiene: enforces coding standards at test time.
//!
//! Scans the canvas crate's production source for patterns that panic in the
//! browser or silently drop errors. Each pattern has a budget of zero. The
//! wasm build has no useful panic output, so every failure must travel back
//! to JS as a `JsValue`.

use std::fs;
use std::path::{Path, PathBuf};

/// (pattern, why it is banned)
const BANNED: &[(&str, &str)] = &[
    (".unwrap()", "panics"),
    (".expect(", "panics"),
    ("panic!(", "panics"),
    ("unreachable!(", "panics"),
    ("todo!(", "unfinished stub"),
    ("unimplemented!(", "unfinished stub"),
    ("let _ =", "discards a result without inspecting it"),
    (".ok()", "discards an error without inspecting it"),
    ("#[allow(dead_code)]", "hides unused code"),
];

/// Production `.rs` files under `src/`. Sibling `*_test.rs` files are exempt.
fn production_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect(Path::new("src"), &mut files);
    files.sort();
    files
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect(&path, out);
        } else if path.extension().is_some_and(|e| e == "rs") && !path.to_string_lossy().ends_with("_test.rs") {
            out.push(path);
        }
    }
}

fn hits(pattern: &str) -> Vec<String> {
    production_files()
        .iter()
        .filter_map(|path| {
            let content = fs::read_to_string(path).ok()?;
            let lines: Vec<String> = content
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains(pattern))
                .map(|(n, line)| format!("  {}:{}: {}", path.display(), n + 1, line.trim()))
                .collect();
            Some(lines)
        })
        .flatten()
        .collect()
}

#[test]
fn production_source_is_scanned() {
    let files = production_files();
    assert!(
        files.iter().any(|p| p.ends_with("reconcile.rs")),
        "expected to find src/reconcile.rs, found {files:?}"
    );
    assert!(files.iter().all(|p| !p.to_string_lossy().ends_with("_test.rs")));
}

#[test]
fn banned_patterns_stay_at_zero() {
    let mut report = Vec::new();
    for (pattern, why) in BANNED {
        let found = hits(pattern);
        if !found.is_empty() {
            report.push(format!("`{pattern}` ({why}): {} occurrence(s)\n{}", found.len(), found.join("\n")));
        }
    }
    assert!(report.is_empty(), "hygiene budget exceeded:\n{}", report.join("\n"));
}

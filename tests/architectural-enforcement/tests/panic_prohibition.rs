//! Integration Test: Panic Prohibition
//!
//! Engine entry points take whatever the remote actor sends. A malformed
//! directive must degrade into a warning and a skipped payload, never a
//! crash, so fallible paths return `Result` and callers propagate with `?`.
//!
//! **Policy**: Production code MUST NOT contain panicking escapes.
//! **Exception**: Test code (the trailing `#[cfg(test)]` module of each
//! file) asserts freely.

use std::fs;
use std::path::{Path, PathBuf};

/// One source policy rule: a token that may not appear in scanned code,
/// with the label used in violation reports.
struct Rule {
    token: &'static str,
    label: &'static str,
}

const PANIC_RULES: &[Rule] = &[
    Rule {
        token: ".unwrap()",
        label: "Unwrap",
    },
    Rule {
        token: ".expect(",
        label: "Expect",
    },
    Rule {
        token: "panic!(",
        label: "Panic",
    },
    Rule {
        token: "unreachable!(",
        label: "Unreachable",
    },
    Rule {
        token: "todo!(",
        label: "Todo",
    },
    Rule {
        token: "unimplemented!(",
        label: "Unimplemented",
    },
];

/// Test that production code does not contain panicking escapes
#[test]
fn test_no_panicking_escapes_in_production_code() {
    let violations = find_panic_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Panicking escapes found in production code!");
        eprintln!("Remote input must degrade into warnings, not crashes.\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE alternatives:");
        eprintln!("  - Return Result and propagate with ?");
        eprintln!("  - warn!/debug! and skip the malformed payload");
        eprintln!("  - unwrap_or / unwrap_or_default for benign fallbacks");
        eprintln!("\n✅ Test code (trailing #[cfg(test)] modules) asserts freely.");

        panic!(
            "\nFound {} panicking escape(s) in production code.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find panicking escapes in every production file, driver and demo
/// executable included
fn find_panic_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for file in engine_rs_files() {
        check_file(&file, PANIC_RULES, &mut violations);
    }

    violations
}

/// A production source file: the absolute path plus the path relative to
/// the engine source root used in reports.
struct SourceFile {
    path: PathBuf,
    rel: PathBuf,
}

/// Engine source root, resolved from this package's manifest so the scan
/// works no matter which directory cargo launches the test from.
fn core_src_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../marionette/core/src")
}

/// Every .rs file under the engine source root
fn engine_rs_files() -> Vec<SourceFile> {
    let root = core_src_root();
    assert!(
        root.is_dir(),
        "engine source tree not found at {}",
        root.display()
    );

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
            let rel = entry
                .path()
                .strip_prefix(&root)
                .unwrap_or(entry.path())
                .to_path_buf();
            files.push(SourceFile {
                path: entry.path().to_path_buf(),
                rel,
            });
        }
    }
    files
}

fn check_file(file: &SourceFile, rules: &[Rule], violations: &mut Vec<String>) {
    let content = match fs::read_to_string(&file.path) {
        Ok(c) => c,
        Err(_) => return,
    };
    scan_lines(&file.rel, &content, rules, violations);
}

fn scan_lines(rel: &Path, content: &str, rules: &[Rule], violations: &mut Vec<String>) {
    for (idx, line) in content.lines().enumerate() {
        // Unit tests sit in a trailing #[cfg(test)] module; nothing below
        // the marker is production code.
        if line.trim_start().starts_with("#[cfg(test)]") {
            break;
        }

        // Skip comments
        let code_part = line.split("//").next().unwrap_or(line);

        for rule in rules {
            if code_part.contains(rule.token) {
                violations.push(format!(
                    "{}:{} - {}: {}",
                    rel.display(),
                    idx + 1,
                    rule.label,
                    line.trim()
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_is_reported_with_location() {
        let source = "fn bad(v: Option<u32>) -> u32 {\n    v.unwrap()\n}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, PANIC_RULES, &mut violations);

        assert_eq!(violations.len(), 1, "one flagged line: {violations:?}");
        assert!(violations[0].starts_with("sample.rs:2"));
    }

    #[test]
    fn test_fallback_combinators_are_not_flagged() {
        let source = "fn fine(v: Option<u32>) -> u32 {\n    v.unwrap_or(0).max(v.unwrap_or_default())\n}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, PANIC_RULES, &mut violations);

        assert!(violations.is_empty(), "unwrap_or variants are fine");
    }

    #[test]
    fn test_trailing_test_module_is_not_scanned() {
        let source = "fn live() {}\n\n#[cfg(test)]\nmod tests {\n    fn helper() { panic!(\"boom\") }\n}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, PANIC_RULES, &mut violations);

        assert!(violations.is_empty(), "test module content is exempt");
    }

    #[test]
    fn test_comments_are_not_flagged() {
        let source = "// never .unwrap() here, the payload is remote\nfn live() {}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, PANIC_RULES, &mut violations);

        assert!(violations.is_empty(), "comments are exempt");
    }
}

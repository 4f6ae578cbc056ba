//! Integration Test: Engine Purity
//!
//! The reconciliation engine is a synchronous state machine: every stimulus
//! enters through an `Engine` method and every effect leaves through a
//! capability trait. Timers, frame ticks, resource fetches and transports
//! are the driver's business.
//!
//! **Policy**: Engine modules MUST NOT use an async runtime or perform I/O.
//! **Allowed surfaces**: `driver/` and `bin/` own tokio; `config.rs` reads
//! its TOML file with `std::fs` before the driver starts.

use std::fs;
use std::path::{Path, PathBuf};

/// One source policy rule: a token that may not appear in scanned code,
/// with the label used in violation reports.
struct Rule {
    token: &'static str,
    label: &'static str,
}

const RUNTIME_RULES: &[Rule] = &[
    Rule {
        token: "tokio::",
        label: "Async runtime",
    },
    Rule {
        token: "async fn ",
        label: "Async function",
    },
    Rule {
        token: ".await",
        label: "Await point",
    },
    Rule {
        token: "async_trait",
        label: "Async trait",
    },
];

const IO_RULES: &[Rule] = &[
    Rule {
        token: "std::fs::",
        label: "File I/O",
    },
    Rule {
        token: "std::net::",
        label: "Network I/O",
    },
    Rule {
        token: "std::process::",
        label: "Process I/O",
    },
    Rule {
        token: "reqwest::",
        label: "HTTP client",
    },
];

const THREAD_RULES: &[Rule] = &[
    Rule {
        token: "std::thread::",
        label: "Thread primitive",
    },
    Rule {
        token: "thread::sleep(",
        label: "Blocking sleep",
    },
];

/// Test that engine modules never reach for an async runtime
#[test]
fn test_engine_modules_are_runtime_free() {
    let violations = find_runtime_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Async runtime usage found in engine modules!");
        eprintln!("The engine is synchronous; runtime work lives in the driver.\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE runtime surfaces:");
        eprintln!("  - driver/ (timers, frame ticker, resource loader, transport)");
        eprintln!("  - bin/ (demo executable)");
        eprintln!("\n❌ FORBIDDEN in engine modules:");
        eprintln!("  - tokio::* (spawns, channels, timers)");
        eprintln!("  - async fn / .await");
        eprintln!("  - #[async_trait] traits");

        panic!(
            "\nFound {} runtime violation(s) in engine modules.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Test that engine modules perform no I/O of their own
#[test]
fn test_engine_modules_do_no_io() {
    let violations = find_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Direct I/O found in engine modules!");
        eprintln!("Resources arrive through ResourceRequester; actions leave through ActionSink.\n");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE I/O surfaces:");
        eprintln!("  - driver/loader.rs (reqwest resource fetches)");
        eprintln!("  - config.rs (startup TOML read, before the driver runs)");

        panic!(
            "\nFound {} I/O violation(s) in engine modules.\nFix these before merging!",
            violations.len()
        );
    }
}

/// Test that nothing in the tree parks or sleeps an OS thread
#[test]
fn test_no_blocking_thread_primitives() {
    let violations = find_thread_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ CRITICAL: Blocking thread primitives found!");

        for violation in &violations {
            eprintln!("  ❌ {}", violation);
        }

        eprintln!("\n✅ ACCEPTABLE alternatives:");
        eprintln!("  - tokio::time::sleep inside driver timer tasks");
        eprintln!("  - tokio::time::interval for the frame ticker");
        eprintln!("  - tokio::spawn for background work");

        panic!(
            "\nFound {} blocking violation(s).\nFix these before merging!",
            violations.len()
        );
    }
}

/// Find async runtime usage outside the host surfaces
fn find_runtime_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for file in engine_rs_files() {
        if is_host_surface(&file.rel) {
            continue;
        }
        check_file(&file, RUNTIME_RULES, &mut violations);
    }

    violations
}

/// Find direct I/O outside the host surfaces
fn find_io_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for file in engine_rs_files() {
        if is_host_surface(&file.rel) {
            continue;
        }
        // Startup config load is synchronous by design.
        if file.rel == Path::new("config.rs") {
            continue;
        }
        check_file(&file, IO_RULES, &mut violations);
    }

    violations
}

/// Find std::thread usage anywhere in the tree
fn find_thread_violations() -> Vec<String> {
    let mut violations = Vec::new();

    for file in engine_rs_files() {
        check_file(&file, THREAD_RULES, &mut violations);
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

/// driver/ and bin/ are the host surfaces where tokio is at home
fn is_host_surface(rel: &Path) -> bool {
    rel.starts_with("driver") || rel.starts_with("bin")
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
    fn test_runtime_usage_is_reported_with_location() {
        let source = "fn bad() {\n    tokio::spawn(async move {});\n}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, RUNTIME_RULES, &mut violations);

        assert_eq!(violations.len(), 1, "one flagged line: {violations:?}");
        assert!(violations[0].starts_with("sample.rs:2"));
    }

    #[test]
    fn test_trailing_test_module_is_not_scanned() {
        let source = "fn live() {}\n\n#[cfg(test)]\nmod tests {\n    use tokio::time;\n}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, RUNTIME_RULES, &mut violations);

        assert!(violations.is_empty(), "test module content is exempt");
    }

    #[test]
    fn test_comments_are_not_flagged() {
        let source = "// tokio::spawn would be wrong here\nfn live() {}\n";
        let mut violations = Vec::new();
        scan_lines(Path::new("sample.rs"), source, RUNTIME_RULES, &mut violations);

        assert!(violations.is_empty(), "comments are exempt");
    }

    #[test]
    fn test_host_surface_classification() {
        assert!(is_host_surface(Path::new("driver/timers.rs")));
        assert!(is_host_surface(Path::new("bin/marionette-demo.rs")));
        assert!(!is_host_surface(Path::new("reconcile.rs")));
        assert!(!is_host_surface(Path::new("engine.rs")));
    }
}

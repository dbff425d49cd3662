//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async code in `lilguy-core` and `lilguy-cli` must not block the
//! runtime. The render loop, relay task, site timer and flusher all share it.
//! **Required**: `tokio::fs`, `tokio::time::sleep`, async `reqwest`.

use architectural_enforcement::{scan_directory, workspace_root, PRODUCTION_SOURCES};

#[test]
fn test_no_blocking_io_in_production_code() {
    let root = workspace_root();
    let violations: Vec<_> = PRODUCTION_SOURCES
        .iter()
        .flat_map(|dir| scan_directory(&root.join(dir)))
        .collect();

    if !violations.is_empty() {
        eprintln!("\nBlocking calls found in production code:\n");
        for violation in &violations {
            eprintln!("  {violation}");
        }
        eprintln!("\nForbidden in async code:");
        eprintln!("  - std::fs::*, std::net::*, std::process::Command");
        eprintln!("Forbidden everywhere:");
        eprintln!("  - std::thread::sleep, reqwest::blocking::*");
        eprintln!("\nUse instead:");
        eprintln!("  - tokio::fs::read().await, tokio::time::sleep().await");
        eprintln!("  - reqwest::Client with .await");

        panic!(
            "\nFound {} blocking call(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_sources_exist() {
    let root = workspace_root();
    for dir in PRODUCTION_SOURCES {
        assert!(
            root.join(dir).is_dir(),
            "{dir} is missing; update PRODUCTION_SOURCES"
        );
    }
}

//! Architectural Enforcement
//!
//! Source scanners backing the enforcement tests in `tests/`. They read the
//! production crates as text and report lines that break an architectural
//! rule:
//! - No blocking filesystem, network or process I/O inside `async fn`
//! - No `std::thread::sleep` in production code
//! - Test modules (everything after `#[cfg(test)]`) are exempt
//!
//! The scan is lexical. It finds the enclosing function by walking back to
//! the nearest `fn` signature, which is good enough for the flat module
//! layout of this workspace.

use std::fmt;
use std::path::{Path, PathBuf};

/// Production source trees checked by the enforcement tests
pub const PRODUCTION_SOURCES: &[&str] = &["lilguy/core/src", "lilguy/cli/src"];

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Kind of rule a line breaks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rule {
    /// `std::fs` inside async code
    BlockingFs,
    /// `std::net` inside async code
    BlockingNet,
    /// `std::process::Command` inside async code
    BlockingProcess,
    /// `reqwest::blocking` anywhere
    BlockingHttp,
    /// `std::thread::sleep` anywhere
    ThreadSleep,
}

impl Rule {
    /// Short label for reports
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::BlockingFs => "Blocking file I/O",
            Self::BlockingNet => "Blocking network I/O",
            Self::BlockingProcess => "Blocking process I/O",
            Self::BlockingHttp => "Blocking HTTP client",
            Self::ThreadSleep => "Thread sleep",
        }
    }
}

/// One offending line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the line
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Broken rule
    pub rule: Rule,
    /// Trimmed source text
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule.label(),
            self.text
        )
    }
}

/// Scan every `.rs` file under `dir`
#[must_use]
pub fn scan_directory(dir: &Path) -> Vec<Violation> {
    if !dir.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .flat_map(|entry| {
            let content = std::fs::read_to_string(entry.path()).unwrap_or_default();
            scan_source(entry.path(), &content)
        })
        .collect()
}

/// Scan one file's text
#[must_use]
pub fn scan_source(path: &Path, content: &str) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let mut violations = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if line.trim_start().starts_with("#[cfg(test)]") {
            // Test modules sit at the bottom of each file
            break;
        }

        let code = line.split("//").next().unwrap_or(line);
        let mut report = |rule| {
            violations.push(Violation {
                path: path.to_path_buf(),
                line: idx + 1,
                rule,
                text: line.trim().to_string(),
            });
        };

        if code.contains("reqwest::blocking") {
            report(Rule::BlockingHttp);
        }
        if code.contains("std::thread::sleep") || code.contains("thread::sleep(") {
            report(Rule::ThreadSleep);
        }

        if !is_in_async_function(&lines, idx) {
            continue;
        }
        if code.contains("std::fs::") || code.contains("use std::fs") {
            report(Rule::BlockingFs);
        }
        if code.contains("std::net::") || code.contains("use std::net") {
            report(Rule::BlockingNet);
        }
        if code.contains("std::process::Command") {
            report(Rule::BlockingProcess);
        }
    }

    violations
}

/// Whether `line` opens a function signature, and if so whether it is async
fn signature(line: &str) -> Option<bool> {
    let mut rest = line.trim_start();
    for prefix in ["pub(crate) ", "pub(super) ", "pub ", "const ", "unsafe "] {
        rest = rest.strip_prefix(prefix).unwrap_or(rest);
    }
    if rest.starts_with("async fn ") {
        Some(true)
    } else if rest.starts_with("fn ") {
        Some(false)
    } else {
        None
    }
}

/// Whether the line at `current_idx` sits inside an `async fn`
#[must_use]
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for line in lines[..=current_idx].iter().rev() {
        if let Some(is_async) = signature(line) {
            return is_async;
        }
        let trimmed = line.trim_start();
        if trimmed.starts_with("mod ") || (trimmed.starts_with("impl") && trimmed.contains('{')) {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = [
            "pub async fn load() {",
            "    let contents = std::fs::read_to_string(\"file.txt\");",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));
    }

    #[test]
    fn test_sync_function_is_exempt() {
        let code = [
            "pub(crate) fn load_file_layer() {",
            "    let contents = std::fs::read_to_string(\"lilguy.toml\");",
            "}",
        ];
        assert!(!is_in_async_function(&code, 1));
        assert!(scan_source(Path::new("config.rs"), &code.join("\n")).is_empty());
    }

    #[test]
    fn test_reports_blocking_io_in_async_code() {
        let code = "impl Loader {\n    async fn load(&self) {\n        std::fs::read(\"a.png\");\n    }\n}\n";
        let violations = scan_source(Path::new("sheet.rs"), code);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, Rule::BlockingFs);
        assert_eq!(violations[0].line, 3);
    }

    #[test]
    fn test_test_module_is_exempt() {
        let code = "fn real() {}\n#[cfg(test)]\nmod tests {\n    async fn helper() { std::thread::sleep(d); }\n}\n";
        assert!(scan_source(Path::new("x.rs"), code).is_empty());
    }

    #[test]
    fn test_thread_sleep_reported_anywhere() {
        let code = "fn tick() {\n    std::thread::sleep(DELAY);\n}\n";
        let violations = scan_source(Path::new("x.rs"), code);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, Rule::ThreadSleep);
    }
}

// ci.rs — lint 工作流的 PR 评论
// 工作流把每个工具的 step outcome 以 NAME=OUTCOME 传给 `chromadesk ci-summary`，
// 这里把它们渲染成一张表；每个工具的结果互不影响

use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::str::FromStr;

/// GitHub Actions 的 step outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    /// cancelled / skipped 等
    Skipped,
}

impl Outcome {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "pass" | "passed" => Outcome::Passed,
            "failure" | "fail" | "failed" => Outcome::Failed,
            _ => Outcome::Skipped,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Outcome::Passed => "✅ Passed",
            Outcome::Failed => "❌ Failed",
            Outcome::Skipped => "⚪ Skipped",
        }
    }
}

/// 单个工具的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub name: String,
    pub outcome: Outcome,
}

impl ToolResult {
    fn category(&self) -> &'static str {
        match self.name.as_str() {
            "rustfmt" | "fmt" => "formatting",
            "clippy" => "lint",
            "taplo" => "TOML style",
            "check" | "cargo-check" => "type check",
            _ => "other",
        }
    }
}

impl FromStr for ToolResult {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, outcome) = s
            .split_once('=')
            .ok_or_else(|| Error::from(format!("expected NAME=OUTCOME, got '{s}'")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::from(format!("missing tool name in '{s}'")));
        }
        Ok(Self {
            name: name.to_string(),
            outcome: Outcome::parse(outcome),
        })
    }
}

/// 渲染 PR 评论（Markdown）
pub fn render_comment(pr: Option<u64>, results: &[ToolResult]) -> String {
    let mut out = String::from("## Lint results");
    if let Some(pr) = pr {
        let _ = write!(out, " for #{pr}");
    }
    out.push_str("\n\n| Tool | Checks | Result |\n|---|---|---|\n");
    for r in results {
        let _ = writeln!(out, "| `{}` | {} | {} |", r.name, r.category(), r.outcome.label());
    }

    let failed = results.iter().filter(|r| r.outcome == Outcome::Failed).count();
    out.push('\n');
    if failed == 0 {
        out.push_str("All checks passed.\n");
    } else {
        let _ = writeln!(out, "{failed} of {} checks failed.", results.len());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(pairs: &[&str]) -> Vec<ToolResult> {
        pairs.iter().map(|p| p.parse().unwrap()).collect()
    }

    #[test]
    fn only_type_checker_failing() {
        let rs = results(&["rustfmt=success", "clippy=success", "taplo=success", "check=failure"]);
        let comment = render_comment(Some(42), &rs);
        assert!(comment.starts_with("## Lint results for #42"));
        assert!(comment.contains("| `rustfmt` | formatting | ✅ Passed |"));
        assert!(comment.contains("| `clippy` | lint | ✅ Passed |"));
        assert!(comment.contains("| `taplo` | TOML style | ✅ Passed |"));
        assert!(comment.contains("| `check` | type check | ❌ Failed |"));
        assert!(comment.contains("1 of 4 checks failed."));
    }

    #[test]
    fn outcomes() {
        assert_eq!(Outcome::parse("success"), Outcome::Passed);
        assert_eq!(Outcome::parse("FAILURE"), Outcome::Failed);
        assert_eq!(Outcome::parse("cancelled"), Outcome::Skipped);
        assert_eq!(Outcome::parse(""), Outcome::Skipped);
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!("clippy".parse::<ToolResult>().is_err());
        assert!("=success".parse::<ToolResult>().is_err());
    }

    #[test]
    fn all_passing() {
        let comment = render_comment(None, &results(&["clippy=success"]));
        assert!(comment.starts_with("## Lint results\n"));
        assert!(comment.ends_with("All checks passed.\n"));
    }
}

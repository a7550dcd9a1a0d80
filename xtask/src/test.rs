use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, footer, header, OnFailure, LIB_CRATES};

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    header("🧪 Running tests...");
    let start = Instant::now();

    if !integration_only {
        if let Some(output) = cargo(
            "Unit tests",
            &["test", "--lib", "--workspace", "--features", "firmware/std"],
            OnFailure::Fail,
        )? {
            print_summary(&String::from_utf8_lossy(&output.stdout));
        }
    }

    if !unit_only {
        for krate in LIB_CRATES {
            if let Some(output) = cargo(
                &format!("{krate} integration tests"),
                &["test", "-p", krate, "--tests", "--features", "std"],
                OnFailure::Fail,
            )? {
                print_summary(&String::from_utf8_lossy(&output.stdout));
            }
        }
    }

    cargo("Doc tests", &["test", "--doc", "--workspace"], OnFailure::Warn)?;

    footer("All tests", start);
    Ok(())
}

fn print_summary(output: &str) {
    let (passed, failed) = summarize(output);
    println!("    {}", format!("{passed} passed, {failed} failed").dimmed());
    println!();
}

/// Totals over every "test result:" line of a cargo test run.
fn summarize(output: &str) -> (u32, u32) {
    let count = |line: &str, key: &str| -> u32 {
        line.split(';')
            .find(|part| part.contains(key))
            .and_then(|part| part.split_whitespace().rev().nth(1))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    };
    output
        .lines()
        .filter(|line| line.contains("test result:"))
        .fold((0, 0), |(p, f), line| {
            (
                p.saturating_add(count(line, "passed")),
                f.saturating_add(count(line, "failed")),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_adds_up_every_binary() {
        let out = "\
test result: ok. 5 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out
running 2 tests
test result: FAILED. 1 passed; 1 failed; 0 ignored; 0 measured; 0 filtered out";
        assert_eq!(summarize(out), (6, 1));
    }

    #[test]
    fn no_results_is_zero() {
        assert_eq!(summarize("error: could not compile"), (0, 0));
    }
}

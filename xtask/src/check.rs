use anyhow::Result;
use std::time::Instant;

use crate::step::{cargo, footer, header, OnFailure, LIB_CRATES};

/// Bare-metal target the library crates must build for.
pub const DSP_TARGET: &str = "thumbv7em-none-eabihf";

pub fn run(target: &str) -> Result<()> {
    header("🔍 Checking workspace...");
    let start = Instant::now();

    cargo(
        "Host build (std + tracing)",
        &["check", "--workspace", "--all-targets", "--features", "firmware/std,firmware/tracing"],
        OnFailure::Fail,
    )?;

    // Library crates only: xtask and the test harness need std.
    for krate in LIB_CRATES {
        cargo(
            &format!("{krate} no_std build ({target}, defmt)"),
            &["check", "-p", krate, "--target", target, "--features", "defmt"],
            OnFailure::Fail,
        )?;
    }

    cargo(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;

    if cargo("Formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    footer("All checks", start);
    Ok(())
}

use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{cargo, footer, header, OnFailure};

pub fn run(open: bool) -> Result<()> {
    header("📚 Building documentation...");
    let start = Instant::now();

    let mut args = vec!["doc", "--workspace", "--no-deps", "--features", "firmware/std"];
    if open {
        args.push("--open");
    }
    cargo("rustdoc", &args, OnFailure::Fail)?;

    if !open {
        println!(
            "   {}",
            "Open target/doc/firmware/index.html in your browser".dimmed()
        );
        println!("   {}", "Or run 'cargo run -p xtask -- doc --open'".dimmed());
        println!();
    }

    footer("Documentation", start);
    Ok(())
}

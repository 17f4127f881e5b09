use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// Bare-metal target with a prebuilt `core`, used to prove the library
/// crates stay `no_std`. The console target itself needs `-Zbuild-std`.
const NO_STD_TARGET: &str = "thumbv7em-none-eabihf";

/// Outcome policy for one check step.
#[derive(Clone, Copy, PartialEq, Eq)]
enum OnFailure {
    Fail,
    Warn,
}

fn step(label: &str, args: &[&str], on_failure: OnFailure) -> Result<()> {
    println!("{}", format!("  {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if output.status.success() {
        println!(
            "{}",
            format!("  ✓ {label} passed in {:.2}s", start.elapsed().as_secs_f64()).green()
        );
    } else if on_failure == OnFailure::Fail {
        eprintln!("{}", format!("  ✗ {label} failed").red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{label} failed");
    } else {
        eprintln!("{}", format!("  ⚠ {label} reported problems").yellow().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
    }
    println!();
    Ok(())
}

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    step(
        "Checking platform crate (no_std, defmt)",
        &["check", "-p", "platform", "--target", NO_STD_TARGET, "--features", "defmt"],
        OnFailure::Fail,
    )?;
    step(
        "Checking streaming crate (no_std, defmt)",
        &["check", "-p", "streaming", "--target", NO_STD_TARGET, "--features", "defmt"],
        OnFailure::Fail,
    )?;
    step(
        "Checking host build (std, tracing)",
        &["check", "--workspace", "--all-targets", "--features", "streaming/std,streaming/tracing"],
        OnFailure::Fail,
    )?;
    // Don't fail on clippy warnings, just show them
    step(
        "Running clippy lints",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;
    step("Checking code formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?;

    println!(
        "{}",
        format!("✓ All checks completed in {:.2}s", total_start.elapsed().as_secs_f64())
            .green()
            .bold()
    );
    println!();

    Ok(())
}

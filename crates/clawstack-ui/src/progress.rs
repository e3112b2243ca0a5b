use clawstack_core::phase::Phase;
use clawstack_core::report::Warning;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Print a plain progress line.
pub fn emit(msg: &str) {
    println!("{msg}");
}

/// Print the numbered header for a phase.
pub fn step(phase: Phase) {
    println!("\n{}", style(phase.header()).bold());
}

pub fn ok(msg: &str) {
    println!("  {} {msg}", style("✓").green());
}

/// Print a warning as soon as it happens; it is repeated in the summary.
pub fn warn(warning: &Warning) {
    println!("  {} {}", style("!").yellow().bold(), style(&warning.message).yellow());
    for hint in &warning.hints {
        println!("      {hint}");
    }
}

pub fn fail(msg: &str) {
    eprintln!("\n{} {msg}", style("✗").red().bold());
}

/// Create a spinner with a message.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("  {spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

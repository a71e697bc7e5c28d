//! Console status lines for the interactive subcommands.
//!
//! Labels are colored and bolded only when stderr is a TTY; under a build
//! system's captured output the lines degrade to plain text. The hook path
//! itself does not use these helpers; it prints plain `[ota-image-hook]`
//! prefixed lines, since its output is always consumed by the build log.

use console::{Color, Term, style};
use std::io::{self, Write};

fn stderr_is_tty() -> bool {
    Term::stderr().is_term()
}

/// Render `label` with color and bold when `is_tty`, plain otherwise.
fn paint(label: &str, color: Color, is_tty: bool) -> String {
    if is_tty {
        style(label).bold().fg(color).to_string()
    } else {
        label.to_string()
    }
}

fn labeled(w: &mut dyn Write, label: &str, color: Color, msg: &str, is_tty: bool) {
    let label = paint(label, color, is_tty);
    let _ = if msg.is_empty() {
        writeln!(w, "{label}")
    } else {
        writeln!(w, "{label} {msg}")
    };
}

/// A step that is starting (cyan label).
pub fn step_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    labeled(w, label, Color::Cyan, msg, is_tty);
}

/// A step that completed (green label).
pub fn success_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    labeled(w, label, Color::Green, msg, is_tty);
}

/// A non-fatal problem (yellow label).
pub fn warn_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    labeled(w, "Warning", Color::Yellow, msg, is_tty);
}

/// A failed step (red label).
pub fn fail_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    labeled(w, label, Color::Red, msg, is_tty);
}

/// An indented, dimmed detail line under a step.
pub fn detail_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let line = if is_tty {
        style(format!("  {msg}")).dim().to_string()
    } else {
        format!("  {msg}")
    };
    let _ = writeln!(w, "{line}");
}

pub fn step(label: &str, msg: &str) {
    step_to_with_tty(&mut io::stderr(), label, msg, stderr_is_tty());
}

pub fn success(label: &str, msg: &str) {
    success_to_with_tty(&mut io::stderr(), label, msg, stderr_is_tty());
}

pub fn warn(msg: &str) {
    warn_to_with_tty(&mut io::stderr(), msg, stderr_is_tty());
}

pub fn fail(label: &str, msg: &str) {
    fail_to_with_tty(&mut io::stderr(), label, msg, stderr_is_tty());
}

pub fn detail(msg: &str) {
    detail_to_with_tty(&mut io::stderr(), msg, stderr_is_tty());
}

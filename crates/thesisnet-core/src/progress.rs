//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one spinner line per institution while it is probed or harvested.
//! Non-TTY mode: hidden bars; log lines are the only progress indicator.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Width reserved for institution names so spinner messages line up
const PREFIX_WIDTH: usize = 28;

fn institution_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<28.cyan} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Central progress context managing spinner lines.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Spinner line for one institution.
    ///
    /// Update with `pb.set_message(...)` between pages; `finish_with_message`
    /// leaves the final status on screen.
    pub fn institution_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(institution_style());
        pb.set_prefix(truncate_name(name, PREFIX_WIDTH));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Shorten `name` to `width` characters, marking the cut with an ellipsis.
pub fn truncate_name(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut short: String = name.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(0), "0");
        assert_eq!(fmt_num(123), "123");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(123_456), "123,456");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate_name("Wits (WIReDSpace)", 28), "Wits (WIReDSpace)");
    }

    #[test]
    fn truncate_marks_cut() {
        let short = truncate_name("Cape Peninsula University of Technology (CPUT)", 12);
        assert_eq!(short.chars().count(), 12);
        assert!(short.ends_with('…'));
    }
}

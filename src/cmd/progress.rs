//! Progress bar and spinner utilities for CLI operations

use appvault::progress::{ProgressSink, ProgressUpdate};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

/// Create a progress bar for determinate operations
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░ ");
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar
}

/// Helper to finish a spinner with a success message
pub fn finish_spinner_success(spinner: &ProgressBar, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix("✓");
    spinner.finish_with_message(message.to_string());
}

/// Helper to finish a spinner with an error message
pub fn finish_spinner_error(spinner: &ProgressBar, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.red} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix("✗");
    spinner.finish_with_message(message.to_string());
}

/// Helper to finish a progress bar with a success message
pub fn finish_progress_success(bar: &ProgressBar, message: &str) {
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix("✓");
    bar.finish_with_message(message.to_string());
}

/// Helper to finish a progress bar with a warning message
pub fn finish_progress_warning(bar: &ProgressBar, message: &str) {
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{prefix:.yellow} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_prefix("!");
    bar.finish_with_message(message.to_string());
}

/// Renders pipeline progress on an indicatif bar
pub struct IndicatifProgress {
    bar: ProgressBar,
}

impl IndicatifProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressSink for IndicatifProgress {
    fn report(&self, update: ProgressUpdate) {
        self.bar.set_length(update.total as u64);
        self.bar.set_position(update.completed as u64);
        self.bar.set_message(update.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_spinner() {
        let spinner = create_spinner("Testing...");
        assert!(!spinner.is_finished());
        finish_spinner_success(&spinner, "Done");
        assert!(spinner.is_finished());
    }

    #[test]
    fn test_indicatif_sink_tracks_updates() {
        let bar = create_progress_bar(0, "Restoring");
        let sink = IndicatifProgress::new(bar.clone());

        sink.report(ProgressUpdate {
            completed: 3,
            total: 10,
            message: "Restored 3 of 10 applications".into(),
        });

        assert_eq!(bar.length(), Some(10));
        assert_eq!(bar.position(), 3);
        assert_eq!(bar.message(), "Restored 3 of 10 applications");
        finish_progress_warning(&bar, "Stopped");
        assert!(bar.is_finished());
    }
}

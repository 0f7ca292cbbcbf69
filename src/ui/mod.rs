pub mod macros;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub use macros::*;

/// Console status lines for a run: a spinner per long-running step (adapter
/// fan-out, dedup/enrich/filter passes), closed out via `blog_done!`.
pub struct UI;

impl UI {
    pub fn spinner(category: &str, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:.blue.bold} {spinner:.blue} {msg}")
                .expect("Invalid spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        pb.set_prefix(format!("{:>12}", category));
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    pub fn finish_with_message(pb: ProgressBar, completed_category: &str, message: &str) {
        pb.finish_and_clear();
        blog_done!(completed_category, "{}", message);
    }
}

pub fn error_message(err: &str) {
    println!(
        "{}{:>12}{} {}",
        termion::color::Fg(termion::color::Red),
        "Error",
        termion::color::Fg(termion::color::Reset),
        err
    );
}

//! Progress bars for the phase schedulers.

use indicatif::{ProgressBar, ProgressStyle};

/// A bar for `len` units of phase work. Hidden when logging is enabled so bar
/// redraws don't interleave with log lines.
#[must_use]
pub fn phase_bar(len: u64, prefix: &'static str) -> ProgressBar {
    if log::log_enabled!(log::Level::Info) {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::with_template("{prefix:>10} [{bar:40}] {pos}/{len}")
            .expect("invalid progress template")
            .progress_chars("=> "),
    );
    bar.set_prefix(prefix);
    bar
}

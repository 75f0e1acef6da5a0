//! Progress bars for long document transfers.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a bar sized to `total`, a spinner when the total is unknown, or a
/// hidden bar when progress display is off.
#[must_use]
pub fn create_progress_bar(total: Option<u64>, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = match total {
        Some(total) if total > 0 => ProgressBar::new(total),
        _ => ProgressBar::new_spinner(),
    };

    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_bar_is_hidden() {
        let pb = create_progress_bar(Some(10), false);
        assert!(pb.is_hidden());
    }

    #[test]
    fn test_bar_length_follows_total() {
        let pb = create_progress_bar(Some(42), true);
        assert_eq!(pb.length(), Some(42));
        pb.inc(2);
        assert_eq!(pb.position(), 2);
    }
}

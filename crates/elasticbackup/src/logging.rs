//! Log verbosity and subscriber setup shared by both binaries.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Log level selected by the number of `-v` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only (no `-v`).
    #[default]
    Warn,
    /// Progress lines (`-v`).
    Info,
    /// Request-level detail (`-vv` and above).
    Debug,
}

impl Verbosity {
    /// Maps a flag count to a level; counts above 2 clamp to `Debug`.
    #[must_use]
    pub const fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Warn,
            1 => Self::Info,
            _ => Self::Debug,
        }
    }

    /// The matching `tracing` level.
    #[must_use]
    pub const fn level(self) -> Level {
        match self {
            Self::Warn => Level::WARN,
            Self::Info => Level::INFO,
            Self::Debug => Level::DEBUG,
        }
    }

    /// Default filter directive: this crate and the HTTP stack at the same level.
    #[must_use]
    pub fn directive(self) -> String {
        let level = self.level().as_str().to_lowercase();
        format!("elasticbackup={level},elasticrestore={level},reqwest={level},warn")
    }
}

/// Installs the global subscriber. `RUST_LOG` wins over the verbosity flag.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(verbosity: Verbosity) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

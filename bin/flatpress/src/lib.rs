//! flatpress CLI Library
//!
//! Command implementations for the `flatpress` binary, exposed as a library so
//! they can be driven from integration code.
//!
//! # Modules
//!
//! - [`cmd`] - Command implementations (generate, home, page, collection, check)
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use flatpress::cmd;
//!
//! // Regenerate the whole site
//! cmd::generate::all(Path::new("config.toml")).unwrap();
//! ```

pub mod cmd;

pub use flatpress_core::Config;
pub use flatpress_generator::{GenerationResult, Generator};

/// Initialize tracing with the specified verbosity level.
///
/// # Arguments
///
/// * `verbose` - Verbosity level (0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE)
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

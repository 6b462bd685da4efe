//! flatpress CLI
//!
//! Renders flat-file JSON content to static HTML.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for flatpress.
#[derive(Parser)]
#[command(
    name = "flatpress",
    version,
    about = "Render flat-file JSON content to static HTML"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Regenerate every page and collection
    Generate,
    /// Regenerate the home page
    Home,
    /// Regenerate one page type
    Page {
        /// Content type (directory name under pages/)
        content_type: String,
    },
    /// Regenerate a collection
    Collection {
        /// Content type (directory name under collections/)
        content_type: String,
        /// Only regenerate the item with this slug
        #[arg(short, long)]
        slug: Option<String>,
    },
    /// Validate blueprints, templates and content
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    flatpress::init_tracing(cli.verbose);

    match cli.command {
        Commands::Generate => flatpress::cmd::generate::all(&cli.config)?,
        Commands::Home => flatpress::cmd::generate::home(&cli.config)?,
        Commands::Page { content_type } => {
            flatpress::cmd::generate::page(&cli.config, &content_type)?;
        }
        Commands::Collection { content_type, slug } => {
            flatpress::cmd::generate::collection(&cli.config, &content_type, slug.as_deref())?;
        }
        Commands::Check { strict } => flatpress::cmd::check::run(&cli.config, strict)?,
    }

    Ok(())
}

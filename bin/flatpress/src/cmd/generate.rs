//! Generate commands - render content to HTML

use std::{path::Path, time::Instant};

use color_eyre::eyre::{Result, WrapErr, bail};
use flatpress_core::ContentKind;
use flatpress_generator::Generator;

use super::load_config;

/// Regenerate the whole site and print the batch result as JSON.
pub fn all(config_path: &Path) -> Result<()> {
    let start = Instant::now();
    tracing::info!(?config_path, "Starting generation");

    let generator = Generator::new(load_config(config_path)?);
    let result = generator.generate_all();

    let json = serde_json::to_string_pretty(&result).wrap_err("Failed to encode result")?;
    println!("{json}");

    let duration = start.elapsed();
    tracing::info!(
        generated = result.generated_count,
        errors = result.errors.len(),
        skipped = result.skipped.len(),
        ?duration,
        "Generation finished"
    );

    if !result.success {
        bail!("Generation failed with {} error(s)", result.errors.len());
    }
    Ok(())
}

/// Regenerate `index.html`.
pub fn home(config_path: &Path) -> Result<()> {
    let generator = Generator::new(load_config(config_path)?);
    if !generator.generate_home() {
        bail!("Home page was not generated");
    }
    println!("  ✓ index.html");
    Ok(())
}

/// Regenerate a single page type.
pub fn page(config_path: &Path, content_type: &str) -> Result<()> {
    let generator = Generator::new(load_config(config_path)?);
    if !generator.generate_one(content_type, ContentKind::Page, None) {
        bail!("Page `{content_type}` was not generated");
    }
    println!("  ✓ {content_type}");
    Ok(())
}

/// Regenerate a collection, or one item of it when `slug` is given.
pub fn collection(config_path: &Path, content_type: &str, slug: Option<&str>) -> Result<()> {
    let generator = Generator::new(load_config(config_path)?);
    let report = generator
        .generate_collection(content_type, slug)
        .wrap_err_with(|| format!("Collection `{content_type}` was not generated"))?;

    let json = serde_json::to_string_pretty(&report).wrap_err("Failed to encode report")?;
    println!("{json}");

    if report.generated == 0 {
        bail!("No items of `{content_type}` were generated");
    }
    Ok(())
}

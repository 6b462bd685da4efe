//! Check command - validate blueprints, templates and content

use std::path::Path;

use color_eyre::eyre::{Result, bail};
use flatpress_core::{Config, ContentKind, Schema, config::SETTINGS_TYPE};
use flatpress_generator::{CompiledTemplate, ContentStore, Resolver};
use walkdir::WalkDir;

use super::load_config;

/// Validation result.
#[derive(Debug, Default)]
pub(crate) struct ValidationResult {
    pub(crate) errors: Vec<String>,
    pub(crate) warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the check command.
///
/// Loads every blueprint, compiles every template and looks for content
/// types that cannot be generated.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking site");

    println!("Checking configuration...");
    let config = load_config(config_path)?;
    println!("  ✓ Configuration valid");

    let result = validate(&config);

    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

/// Run every check against a loaded configuration.
pub(crate) fn validate(config: &Config) -> ValidationResult {
    let mut result = ValidationResult::default();
    check_blueprints(config, &mut result);
    check_templates(config, &mut result);
    check_content(config, &mut result);
    result
}

fn check_blueprints(config: &Config, result: &mut ValidationResult) {
    let dir = config.blueprints_dir();
    if !dir.is_dir() {
        result.add_warning(format!("Blueprint directory {} does not exist", dir.display()));
        return;
    }

    for path in files_with_extension(&dir, &["yaml", "yml"]) {
        match Schema::load(&path) {
            Ok(schema) => {
                tracing::debug!(path = %path.display(), fields = schema.fields.len(), "blueprint ok");
            }
            Err(e) => result.add_error(format!("{e}")),
        }
    }
}

fn check_templates(config: &Config, result: &mut ValidationResult) {
    let dir = config.templates_dir();
    if !dir.is_dir() {
        result.add_warning(format!("Template directory {} does not exist", dir.display()));
        return;
    }

    let extension = config.build.template_extension.as_str();
    for path in files_with_extension(&dir, &[extension]) {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => {
                result.add_error(format!("{}: {e}", path.display()));
                continue;
            }
        };
        if let Err(e) = CompiledTemplate::compile(&name, &source) {
            result.add_error(format!("{}: {e}", path.display()));
        }
    }
}

fn check_content(config: &Config, result: &mut ValidationResult) {
    let resolver = Resolver::new(config);
    let store = ContentStore::new();

    for content_type in store.list_dirs(&config.pages_dir()) {
        if content_type == SETTINGS_TYPE {
            continue;
        }
        let Some(schema) = known_schema(&resolver, &content_type, ContentKind::Page, result) else {
            continue;
        };
        if let Some(record) = store.load(&config.page_record_path(&content_type)) {
            for field in schema.missing_required(&record) {
                result.add_warning(format!("{content_type}: required field `{field}` is empty"));
            }
        }
    }

    for content_type in store.list_dirs(&config.collections_dir()) {
        let Some(schema) = known_schema(&resolver, &content_type, ContentKind::Collection, result)
        else {
            continue;
        };
        for path in store.list(&config.collection_dir(&content_type)) {
            let Some(record) = store.load(&path) else {
                result.add_error(format!("{}: not a JSON object", path.display()));
                continue;
            };
            for field in schema.missing_required(&record) {
                result.add_warning(format!(
                    "{}: required field `{field}` is empty",
                    path.display()
                ));
            }
        }
    }
}

fn known_schema(
    resolver: &Resolver,
    content_type: &str,
    stored_as: ContentKind,
    result: &mut ValidationResult,
) -> Option<Schema> {
    match resolver.schema_for(content_type) {
        Ok(Some(schema)) => {
            if let Some(declared) = schema.kind.filter(|kind| *kind != stored_as) {
                result.add_warning(format!(
                    "{content_type}: blueprint declares {declared:?} but content is stored as {stored_as:?}"
                ));
            }
            Some(schema)
        }
        Ok(None) => {
            result.add_warning(format!("{content_type}: no blueprint, content is skipped"));
            None
        }
        // Already reported by the blueprint pass.
        Err(_) => None,
    }
}

fn files_with_extension(dir: &Path, extensions: &[&str]) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

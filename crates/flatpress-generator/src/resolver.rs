//! Blueprint and template lookup per content type.

use std::{
    fs, io,
    path::{Path, PathBuf},
    rc::Rc,
};

use flatpress_core::{Config, CoreError, Schema, config::SETTINGS_TYPE};
use thiserror::Error;
use tracing::debug;

use crate::{
    slug::HOME_TYPE,
    template::{
        CompiledTemplate, DEFAULT_HOME_TEMPLATE, Result, TemplateError, TemplateHandle,
        TemplateRegistry,
    },
};

/// Blueprint extensions, in lookup order.
const BLUEPRINT_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

/// Name of the built-in home template.
pub const BUILTIN_HOME: &str = "builtin:home";

/// A blueprint exists but cannot be used.
#[derive(Debug, Error)]
#[error("invalid blueprint for `{content_type}`: {source}")]
pub struct SchemaError {
    /// Content type whose blueprint failed.
    pub content_type: String,
    /// Underlying load or validation error.
    #[source]
    pub source: CoreError,
}

/// Where templates come from.
pub trait TemplateSource {
    /// Load the template called `name`; `Ok(None)` when there is none.
    fn load(&self, name: &str) -> Result<Option<TemplateHandle>>;

    /// Human readable location of `name`, for diagnostics.
    fn describe(&self, name: &str) -> String;
}

/// Templates read from `<dir>/<name>.<ext>` and compiled on load.
#[derive(Debug, Clone)]
pub struct FileTemplates {
    dir: PathBuf,
    extension: String,
}

impl FileTemplates {
    /// Templates under `dir` with the given extension.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Templates configured for a site.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.templates_dir(), &config.build.template_extension)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{}", self.extension))
    }
}

impl TemplateSource for FileTemplates {
    fn load(&self, name: &str) -> Result<Option<TemplateHandle>> {
        let path = self.path(name);
        let source = match fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(TemplateError::Read { path, source }),
        };
        debug!(template = name, path = %path.display(), "compiling template");
        let template = CompiledTemplate::compile(name, &source)?;
        Ok(Some(Rc::new(template)))
    }

    fn describe(&self, name: &str) -> String {
        self.path(name).display().to_string()
    }
}

impl TemplateSource for TemplateRegistry {
    fn load(&self, name: &str) -> Result<Option<TemplateHandle>> {
        Ok(self.get(name))
    }

    fn describe(&self, name: &str) -> String {
        format!("registered template `{name}`")
    }
}

/// Finds the blueprint and template of each content type.
pub struct Resolver {
    blueprints_dir: PathBuf,
    default_template: String,
    templates: Box<dyn TemplateSource>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("blueprints_dir", &self.blueprints_dir)
            .field("default_template", &self.default_template)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Resolver reading blueprints and templates from the site directories.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_templates(config, Box::new(FileTemplates::from_config(config)))
    }

    /// Resolver with a custom template source.
    #[must_use]
    pub fn with_templates(config: &Config, templates: Box<dyn TemplateSource>) -> Self {
        Self {
            blueprints_dir: config.blueprints_dir(),
            default_template: config.build.default_template.clone(),
            templates,
        }
    }

    /// Path of the blueprint of `content_type`, if one exists.
    #[must_use]
    pub fn blueprint_path(&self, content_type: &str) -> Option<PathBuf> {
        BLUEPRINT_EXTENSIONS
            .iter()
            .map(|ext| self.blueprints_dir.join(format!("{content_type}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Blueprint of `content_type`. A missing file is `Ok(None)`; a file that
    /// fails to load or validate is an error.
    pub fn schema_for(&self, content_type: &str) -> std::result::Result<Option<Schema>, SchemaError> {
        let Some(path) = self.blueprint_path(content_type) else {
            debug!(content_type, "no blueprint");
            return Ok(None);
        };
        load_schema(content_type, &path).map(Some)
    }

    /// Template of `content_type`: its own, else the shared default. Settings
    /// never have a template.
    pub fn template_for(&self, content_type: &str) -> Result<Option<TemplateHandle>> {
        if content_type == SETTINGS_TYPE {
            return Ok(None);
        }
        if let Some(template) = self.templates.load(content_type)? {
            return Ok(Some(template));
        }
        let fallback = self.templates.load(&self.default_template)?;
        if fallback.is_some() {
            debug!(content_type, template = %self.default_template, "using default template");
        }
        Ok(fallback)
    }

    /// Template of the home page, falling back to a built-in page.
    pub fn home_template(&self) -> Result<TemplateHandle> {
        if let Some(template) = self.template_for(HOME_TYPE)? {
            return Ok(template);
        }
        debug!("using built-in home template");
        Ok(Rc::new(CompiledTemplate::compile(
            BUILTIN_HOME,
            DEFAULT_HOME_TEMPLATE,
        )?))
    }

    /// The locations searched for a content type's template.
    #[must_use]
    pub fn describe_template_search(&self, content_type: &str) -> String {
        format!(
            "{} or {}",
            self.templates.describe(content_type),
            self.templates.describe(&self.default_template)
        )
    }
}

fn load_schema(content_type: &str, path: &Path) -> std::result::Result<Schema, SchemaError> {
    Schema::load(path).map_err(|source| SchemaError {
        content_type: content_type.to_string(),
        source,
    })
}

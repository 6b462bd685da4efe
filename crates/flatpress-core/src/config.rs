//! Site configuration management.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Name of the page directory that holds site-wide settings.
pub const SETTINGS_TYPE: &str = "settings";

/// Main configuration structure for flatpress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Site-wide settings.
    pub site: SiteConfig,

    /// Directory layout.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Generation settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    root: PathBuf,
}

/// Site-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site title.
    pub title: String,

    /// Base URL for the site (e.g., "https://example.com").
    pub base_url: String,
}

/// Directory layout of a flatpress project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// JSON content root (holds `pages/` and `collections/`).
    #[serde(default = "default_content_dir")]
    pub content_dir: PathBuf,

    /// Blueprint (schema) directory.
    #[serde(default = "default_blueprints_dir")]
    pub blueprints_dir: PathBuf,

    /// Template directory.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: PathBuf,

    /// Output directory for generated HTML.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

/// Generation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Template used when a content type has no template of its own.
    #[serde(default = "default_template")]
    pub default_template: String,

    /// File extension of template files.
    #[serde(default = "default_template_extension")]
    pub template_extension: String,
}

// Default value functions
fn default_content_dir() -> PathBuf {
    PathBuf::from("content")
}

fn default_blueprints_dir() -> PathBuf {
    PathBuf::from("blueprints")
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_template() -> String {
    "default".to_string()
}

fn default_template_extension() -> String {
    "html".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            content_dir: default_content_dir(),
            blueprints_dir: default_blueprints_dir(),
            templates_dir: default_templates_dir(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            default_template: default_template(),
            template_extension: default_template_extension(),
        }
    }
}

impl Config {
    /// Create a configuration with default layout rooted at `root`.
    pub fn new(site: SiteConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            site,
            paths: PathsConfig::default(),
            build: BuildConfig::default(),
            root: root.into(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.root = project_root(path);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, letting `FLATPRESS__<SECTION>__<KEY>` environment
    /// variables override file values.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("FLATPRESS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.root = project_root(path);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.site.title.is_empty() {
            return Err(CoreError::config("site.title cannot be empty"));
        }

        if self.site.base_url.is_empty() {
            return Err(CoreError::config("site.base_url cannot be empty"));
        }

        if self.site.base_url.ends_with('/') {
            tracing::warn!("site.base_url should not have a trailing slash");
        }

        if self.build.default_template.is_empty() {
            return Err(CoreError::config("build.default_template cannot be empty"));
        }

        Ok(())
    }

    /// Project root that relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the full URL for a path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.site.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// JSON content root.
    pub fn content_dir(&self) -> PathBuf {
        self.root.join(&self.paths.content_dir)
    }

    /// Directory holding one sub-directory per page type.
    pub fn pages_dir(&self) -> PathBuf {
        self.content_dir().join("pages")
    }

    /// Directory holding one sub-directory per collection.
    pub fn collections_dir(&self) -> PathBuf {
        self.content_dir().join("collections")
    }

    /// Location of the single record of a page type.
    pub fn page_record_path(&self, content_type: &str) -> PathBuf {
        self.pages_dir()
            .join(content_type)
            .join(format!("{content_type}.json"))
    }

    /// Directory holding the items of a collection.
    pub fn collection_dir(&self, content_type: &str) -> PathBuf {
        self.collections_dir().join(content_type)
    }

    /// Location of the site settings record.
    pub fn settings_path(&self) -> PathBuf {
        self.page_record_path(SETTINGS_TYPE)
    }

    /// Blueprint directory.
    pub fn blueprints_dir(&self) -> PathBuf {
        self.root.join(&self.paths.blueprints_dir)
    }

    /// Template directory.
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join(&self.paths.templates_dir)
    }

    /// Path of the template file with the given name.
    pub fn template_path(&self, name: &str) -> PathBuf {
        self.templates_dir()
            .join(format!("{name}.{}", self.build.template_extension))
    }

    /// Output directory for generated HTML.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.paths.output_dir)
    }
}

fn project_root(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

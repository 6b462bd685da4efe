//! Generation orchestration.
//!
//! Drives content types through blueprint and template resolution, record
//! loading, slug derivation, context binding and sandboxed rendering, then
//! writes the HTML. Nothing raised below this layer escapes it: single-type
//! calls collapse to a boolean, the batch call to a [`GenerationResult`].

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    time::Instant,
};

use flatpress_core::{
    Config, ContentKind, Meta, Record, Schema, Status, Value,
    config::SETTINGS_TYPE,
    content::{self, META_FIELD},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    context::RenderContext,
    output::Output,
    resolver::{Resolver, SchemaError, TemplateSource},
    sandbox::{RenderFailure, Sandbox},
    slug::{self, HOME_TYPE, NOT_FOUND_TYPE, OutputTarget},
    store::ContentStore,
    template::{Template, TemplateError, TemplateHandle},
};

/// Page directories that are never rendered by the batch page loop.
const EXCLUDED_PAGE_TYPES: [&str; 4] = [SETTINGS_TYPE, "users", NOT_FOUND_TYPE, HOME_TYPE];

/// Characters of leaked output quoted in the batch error.
const LEAK_PREVIEW_CHARS: usize = 200;

/// Generation errors.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Settings are data, not a page.
    #[error("settings are never rendered to HTML")]
    SettingsRefused,

    /// The single record of a page type does not exist.
    #[error("no content file for `{content_type}` (expected {})", path.display())]
    MissingContent { content_type: String, path: PathBuf },

    /// The content type has no blueprint.
    #[error("no blueprint for `{0}`")]
    MissingSchema(String),

    /// The collection directory holds no items.
    #[error("collection `{0}` has no items")]
    EmptyCollection(String),

    /// Neither a specific nor the default template exists.
    #[error("no template for `{content_type}` (looked for {searched})")]
    MissingTemplate {
        content_type: String,
        searched: String,
    },

    /// No collection item matches the requested slug.
    #[error("no item with slug `{slug}` in `{content_type}`")]
    ItemNotFound { content_type: String, slug: String },

    /// The blueprint exists but is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The template exists but cannot be loaded.
    #[error("template for `{content_type}` could not be loaded: {source}")]
    Template {
        content_type: String,
        #[source]
        source: TemplateError,
    },

    /// Rendering failed.
    #[error(transparent)]
    Render(#[from] RenderFailure),

    /// Writing the HTML failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A collection item listed in the summary pass could not be reloaded.
    #[error("item {file} of `{content_type}` could not be read")]
    UnreadableItem { content_type: String, file: String },

    /// Two items of one collection resolve to the same slug.
    #[error("slug `{slug}` of {file} is already used by {first} in `{content_type}`")]
    DuplicateSlug {
        content_type: String,
        slug: String,
        file: String,
        first: String,
    },

    /// Every item of a collection failed.
    #[error("all {failed} item(s) of `{content_type}` failed")]
    AllItemsFailed { content_type: String, failed: usize },
}

impl GenerateError {
    /// Whether the batch records this as a skip rather than an error.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::MissingContent { .. }
                | Self::MissingSchema(_)
                | Self::EmptyCollection(_)
                | Self::MissingTemplate { .. }
        )
    }
}

/// Result type for generation operations.
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Report of a batch generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    /// False iff any error was recorded.
    pub success: bool,

    /// Number of HTML files written.
    pub generated_count: usize,

    /// Errors, in the order they occurred.
    pub errors: Vec<String>,

    /// Skips, in the order they occurred.
    pub skipped: Vec<String>,
}

impl GenerationResult {
    fn record(&mut self, content_type: &str, outcome: Result<usize>) {
        match outcome {
            Ok(count) => self.generated_count += count,
            Err(e) if e.is_skip() => {
                warn!(content_type, reason = %e, "skipped");
                self.skipped.push(format!("{content_type}: {e}"));
            }
            Err(e) => {
                warn!(content_type, error = %e, "generation failed");
                self.errors.push(format!("{content_type}: {e}"));
            }
        }
    }
}

/// Outcome of generating one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    /// Items written.
    pub generated: usize,

    /// Items that failed.
    pub failed: usize,
}

/// Data shared by every render of one generation call.
#[derive(Debug, Default)]
struct Pass {
    site: Record,
    listings: Record,
}

/// A collection item as seen by the summary pass.
#[derive(Debug)]
struct Entry {
    path: PathBuf,
    file_name: String,
    slug: String,
    readable: bool,
    summary: Record,
}

/// Site generator that orchestrates page and collection rendering.
#[derive(Debug)]
pub struct Generator {
    config: Config,
    store: ContentStore,
    resolver: Resolver,
    output: Output,
    sandbox: Sandbox,
}

impl Generator {
    /// Create a generator reading templates from the site's template
    /// directory.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let resolver = Resolver::new(&config);
        Self::with_resolver(config, resolver)
    }

    /// Create a generator with a custom template source.
    #[must_use]
    pub fn with_templates(config: Config, templates: Box<dyn TemplateSource>) -> Self {
        let resolver = Resolver::with_templates(&config, templates);
        Self::with_resolver(config, resolver)
    }

    fn with_resolver(config: Config, resolver: Resolver) -> Self {
        let output = Output::new();
        Self {
            config,
            store: ContentStore::new(),
            resolver,
            sandbox: Sandbox::new(output.clone()),
            output,
        }
    }

    /// Route all output through `output`.
    #[must_use]
    pub fn with_output(mut self, output: Output) -> Self {
        self.sandbox = Sandbox::new(output.clone());
        self.output = output;
        self
    }

    /// Output channel templates and collaborators write through.
    #[must_use]
    pub fn output(&self) -> &Output {
        &self.output
    }

    /// Site configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Blueprint and template lookup.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Generate one content type. For collections, `item_slug` restricts
    /// generation to the matching item. Returns true when at least one file
    /// was written.
    pub fn generate_one(
        &self,
        content_type: &str,
        kind: ContentKind,
        item_slug: Option<&str>,
    ) -> bool {
        let pass = self.pass();
        let outcome = match kind {
            ContentKind::Page => self.render_page(content_type, &pass).map(|_| ()),
            ContentKind::Collection => self
                .render_collection(content_type, item_slug, &pass)
                .map(|_| ()),
        };
        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(content_type, error = %e, "generation failed");
                false
            }
        }
    }

    /// Generate every item (or the item matching `item_slug`) of a
    /// collection.
    pub fn generate_collection(
        &self,
        content_type: &str,
        item_slug: Option<&str>,
    ) -> Result<CollectionReport> {
        let pass = self.pass();
        self.render_collection(content_type, item_slug, &pass)
    }

    /// Generate `index.html`.
    pub fn generate_home(&self) -> bool {
        let pass = self.pass();
        match self.render_home(&pass) {
            Ok(_) => true,
            Err(e) => {
                warn!(content_type = HOME_TYPE, error = %e, "generation failed");
                false
            }
        }
    }

    /// Generate the whole site: home, 404, every page, every collection.
    pub fn generate_all(&self) -> GenerationResult {
        let start = Instant::now();
        info!(
            content = %self.config.content_dir().display(),
            output = %self.config.output_dir().display(),
            "starting generation"
        );

        let batch = self.output.capture();
        let pass = self.pass();
        let mut result = GenerationResult::default();

        result.record(HOME_TYPE, self.render_home(&pass).map(|_| 1));
        result.record(NOT_FOUND_TYPE, self.render_page(NOT_FOUND_TYPE, &pass).map(|_| 1));

        for content_type in self.store.list_dirs(&self.config.pages_dir()) {
            if EXCLUDED_PAGE_TYPES.contains(&content_type.as_str()) {
                continue;
            }
            result.record(&content_type, self.render_page(&content_type, &pass).map(|_| 1));
        }

        for collection in self.store.list_dirs(&self.config.collections_dir()) {
            result.record(
                &collection,
                self.render_collection(&collection, None, &pass)
                    .map(|report| report.generated),
            );
        }

        let leaked = batch.finish();
        if !leaked.trim().is_empty() {
            let preview: String = leaked.chars().take(LEAK_PREVIEW_CHARS).collect();
            warn!(bytes = leaked.len(), "unexpected output during generation");
            result
                .errors
                .push(format!("Unexpected output during generation: {preview}"));
        }

        result.success = result.errors.is_empty();
        info!(
            generated = result.generated_count,
            errors = result.errors.len(),
            skipped = result.skipped.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "generation finished"
        );
        result
    }

    fn render_home(&self, pass: &Pass) -> Result<PathBuf> {
        let mut record = self
            .store
            .load(&self.config.page_record_path(HOME_TYPE))
            .unwrap_or_else(default_home_record);
        let schema = self
            .resolver
            .schema_for(HOME_TYPE)?
            .unwrap_or_else(|| Schema::empty(HOME_TYPE));
        let template = self
            .resolver
            .home_template()
            .map_err(|source| GenerateError::Template {
                content_type: HOME_TYPE.to_string(),
                source,
            })?;

        prepare_page(&mut record, OutputTarget::Home);
        self.render_to(template.as_ref(), record, &schema, OutputTarget::Home, pass)
    }

    fn render_page(&self, content_type: &str, pass: &Pass) -> Result<PathBuf> {
        if content_type == SETTINGS_TYPE {
            return Err(GenerateError::SettingsRefused);
        }

        let path = self.config.page_record_path(content_type);
        let Some(mut record) = self.store.load(&path) else {
            return Err(GenerateError::MissingContent {
                content_type: content_type.to_string(),
                path,
            });
        };
        let schema = self
            .resolver
            .schema_for(content_type)?
            .ok_or_else(|| GenerateError::MissingSchema(content_type.to_string()))?;
        let template = self.template_for(content_type)?;

        let target = OutputTarget::for_page(content_type);
        prepare_page(&mut record, target);
        self.render_to(template.as_ref(), record, &schema, target, pass)
    }

    fn render_collection(
        &self,
        content_type: &str,
        item_slug: Option<&str>,
        pass: &Pass,
    ) -> Result<CollectionReport> {
        if content_type == SETTINGS_TYPE {
            return Err(GenerateError::SettingsRefused);
        }

        let schema = self
            .resolver
            .schema_for(content_type)?
            .ok_or_else(|| GenerateError::MissingSchema(content_type.to_string()))?;
        let entries = self.entries(content_type);
        if entries.is_empty() {
            return Err(GenerateError::EmptyCollection(content_type.to_string()));
        }
        let template = self.template_for(content_type)?;

        let wanted = item_slug.map(slug::sanitize);
        let mut report = CollectionReport::default();
        let mut seen: HashMap<&str, &str> = HashMap::new();
        let mut matched = false;

        for entry in &entries {
            if wanted.as_deref().is_some_and(|slug| slug != entry.slug) {
                continue;
            }
            matched = true;

            let outcome = match seen.get(entry.slug.as_str()).copied() {
                Some(first) => Err(GenerateError::DuplicateSlug {
                    content_type: content_type.to_string(),
                    slug: entry.slug.clone(),
                    file: entry.file_name.clone(),
                    first: first.to_string(),
                }),
                // A slug belongs to the first item that actually published it.
                None => self
                    .render_item(content_type, entry, &schema, template.as_ref(), pass)
                    .inspect(|_| {
                        seen.insert(&entry.slug, &entry.file_name);
                    }),
            };

            match outcome {
                Ok(_) => report.generated += 1,
                Err(e) => {
                    warn!(
                        content_type,
                        slug = %entry.slug,
                        file = %entry.file_name,
                        error = %e,
                        "item failed"
                    );
                    report.failed += 1;
                }
            }
        }

        if let Some(slug) = wanted.filter(|_| !matched) {
            return Err(GenerateError::ItemNotFound {
                content_type: content_type.to_string(),
                slug,
            });
        }
        if report.generated == 0 {
            return Err(GenerateError::AllItemsFailed {
                content_type: content_type.to_string(),
                failed: report.failed,
            });
        }

        info!(
            content_type,
            generated = report.generated,
            failed = report.failed,
            "generated collection"
        );
        Ok(report)
    }

    fn render_item(
        &self,
        content_type: &str,
        entry: &Entry,
        schema: &Schema,
        template: &dyn Template,
        pass: &Pass,
    ) -> Result<PathBuf> {
        // Second read: the full record, `_meta` included.
        let mut record =
            self.store
                .load(&entry.path)
                .ok_or_else(|| GenerateError::UnreadableItem {
                    content_type: content_type.to_string(),
                    file: entry.file_name.clone(),
                })?;
        attach_system_fields(&mut record, content_type, &entry.slug);

        let target = OutputTarget::Item {
            collection: content_type,
            slug: &entry.slug,
        };
        self.render_to(template, record, schema, target, pass)
    }

    fn render_to(
        &self,
        template: &dyn Template,
        mut record: Record,
        schema: &Schema,
        target: OutputTarget<'_>,
        pass: &Pass,
    ) -> Result<PathBuf> {
        let url = target.url();
        record
            .entry("permalink".to_string())
            .or_insert_with(|| Value::from(self.config.url_for(&url)));

        let context = RenderContext::bind(record, schema, &pass.site, url)
            .with_listings(&pass.listings);
        let rendered = self.sandbox.render(template, context)?;

        let path = target.path(&self.config.output_dir());
        write_html(&path, &rendered.html)?;
        debug!(path = %path.display(), bytes = rendered.html.len(), "wrote page");
        Ok(path)
    }

    fn template_for(&self, content_type: &str) -> Result<TemplateHandle> {
        self.resolver
            .template_for(content_type)
            .map_err(|source| GenerateError::Template {
                content_type: content_type.to_string(),
                source,
            })?
            .ok_or_else(|| GenerateError::MissingTemplate {
                content_type: content_type.to_string(),
                searched: self.resolver.describe_template_search(content_type),
            })
    }

    fn pass(&self) -> Pass {
        Pass {
            site: self.site_settings(),
            listings: self.listings(),
        }
    }

    /// Site settings with `_meta` removed and defaults from the config.
    fn site_settings(&self) -> Record {
        let mut site = self
            .store
            .load(&self.config.settings_path())
            .unwrap_or_default();
        site.remove(META_FIELD);
        site.entry("site_name".to_string())
            .or_insert_with(|| Value::from(self.config.site.title.as_str()));
        site.entry("base_url".to_string())
            .or_insert_with(|| Value::from(self.config.site.base_url.as_str()));
        site
    }

    /// Summary pass over one collection, in file name order.
    fn entries(&self, content_type: &str) -> Vec<Entry> {
        self.store
            .list(&self.config.collection_dir(content_type))
            .into_iter()
            .map(|path| {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let loaded = self.store.load(&path);
                let readable = loaded.is_some();
                let mut summary = loaded.unwrap_or_default();
                let slug = slug::derive_slug(&summary, &file_name);
                attach_system_fields(&mut summary, content_type, &slug);
                summary.remove(META_FIELD);
                Entry {
                    path,
                    file_name,
                    slug,
                    readable,
                    summary,
                }
            })
            .collect()
    }

    /// Published items of every collection: featured first, then newest,
    /// then by slug.
    fn listings(&self) -> Record {
        let mut listings = Record::new();
        for collection in self.store.list_dirs(&self.config.collections_dir()) {
            let mut items: Vec<_> = self
                .entries(&collection)
                .into_iter()
                .filter(|entry| entry.readable && Status::of(&entry.summary) == Status::Published)
                .collect();
            items.sort_by(|a, b| {
                let featured = |e: &Entry| content::is_featured(&e.summary);
                let created = |e: &Entry| e.summary.get("created_at").and_then(Value::as_datetime);
                featured(b)
                    .cmp(&featured(a))
                    .then_with(|| created(b).cmp(&created(a)))
                    .then_with(|| a.slug.cmp(&b.slug))
            });
            listings.insert(
                collection,
                Value::List(items.into_iter().map(|e| Value::Record(e.summary)).collect()),
            );
        }
        listings
    }
}

fn default_home_record() -> Record {
    let mut record = Record::new();
    record.insert("title".to_string(), Value::from("Home"));
    record.insert("content".to_string(), Value::from("Welcome to the site"));
    record
}

/// Replace `_meta` with its convenience fields and add the page URL.
fn prepare_page(record: &mut Record, target: OutputTarget<'_>) {
    let meta = Meta::of(record);
    record.remove(META_FIELD);
    meta.apply(record);
    record
        .entry("url".to_string())
        .or_insert_with(|| Value::from(target.url()));
}

/// Transient fields every collection item carries into its template.
fn attach_system_fields(record: &mut Record, collection: &str, slug: &str) {
    let meta = Meta::of(record);
    let status = Status::of(record);
    let featured = content::is_featured(record);
    let url = OutputTarget::Item { collection, slug }.url();

    meta.apply(record);
    record.insert("url".to_string(), Value::from(url));
    record.insert("slug".to_string(), Value::from(slug));
    record.insert("status".to_string(), Value::from(status.as_str()));
    record.insert("featured".to_string(), Value::from(featured));
    record.insert("collection".to_string(), Value::from(collection));
}

fn write_html(path: &Path, html: &str) -> Result<()> {
    let write_err = |source| GenerateError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    fs::write(path, html).map_err(write_err)
}

#[cfg(test)]
mod tests {
    use flatpress_core::config::SiteConfig;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::template::TemplateRegistry;

    fn test_config(dir: &TempDir) -> Config {
        Config::new(
            SiteConfig {
                title: "Test Site".to_string(),
                base_url: "https://example.com".to_string(),
            },
            dir.path(),
        )
    }

    fn write_json(path: &Path, value: serde_json::Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    fn write_blueprint(config: &Config, name: &str, source: &str) {
        fs::create_dir_all(config.blueprints_dir()).unwrap();
        fs::write(config.blueprints_dir().join(format!("{name}.yaml")), source).unwrap();
    }

    #[test]
    fn test_generate_empty_site() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let generator = Generator::new(config.clone());

        let result = generator.generate_all();
        assert!(result.success, "{result:?}");
        assert_eq!(result.generated_count, 1);
        assert!(config.output_dir().join("index.html").exists());
        assert_eq!(result.skipped.len(), 1);
        assert!(result.skipped[0].starts_with("404: no content file"));
    }

    #[test]
    fn test_is_skip() {
        assert!(GenerateError::MissingSchema("x".into()).is_skip());
        assert!(GenerateError::EmptyCollection("x".into()).is_skip());
        assert!(!GenerateError::SettingsRefused.is_skip());
        assert!(
            !GenerateError::AllItemsFailed {
                content_type: "x".into(),
                failed: 2
            }
            .is_skip()
        );
    }

    #[test]
    fn test_settings_refused() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_json(&config.settings_path(), json!({"site_name": "S"}));
        write_blueprint(&config, "settings", "fields:\n  site_name: { type: text }\n");
        let mut registry = TemplateRegistry::new();
        registry.register_source("default", "x").unwrap();
        let generator = Generator::with_templates(config.clone(), Box::new(registry));

        assert!(!generator.generate_one("settings", ContentKind::Page, None));
        assert!(!generator.generate_one("settings", ContentKind::Collection, None));
        assert!(!config.output_dir().join("settings.html").exists());
    }

    #[test]
    fn test_page_strips_meta_and_adds_dates() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_json(
            &config.page_record_path("about"),
            json!({"title": "About", "_meta": {"created": "2024-05-01", "updated": 1700000000}}),
        );
        write_blueprint(&config, "about", "fields:\n  title: { type: text }\n");
        let mut registry = TemplateRegistry::new();
        registry
            .register_source(
                "about",
                "{{ title }}|{{ created_at }}|{{ updated_at | date:\"%Y\" }}|{{ _meta }}|{{ url }}|{{ permalink }}",
            )
            .unwrap();
        let generator = Generator::with_templates(config.clone(), Box::new(registry));

        assert!(generator.generate_one("about", ContentKind::Page, None));
        let html = fs::read_to_string(config.output_dir().join("about.html")).unwrap();
        assert_eq!(
            html,
            "About|2024-05-01|2023||/about.html|https://example.com/about.html"
        );
    }

    #[test]
    fn test_collection_system_fields_and_target_slug() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let posts = config.collection_dir("posts");
        write_json(
            &posts.join("first.json"),
            json!({"_slug": "First Post", "_featured": true, "title": "One",
                   "_meta": {"created": "2024-01-01"}}),
        );
        write_json(
            &posts.join("second.json"),
            json!({"title": "Two", "_status": "draft"}),
        );
        write_blueprint(&config, "posts", "fields:\n  title: { type: text }\n");
        let mut registry = TemplateRegistry::new();
        registry
            .register_source(
                "posts",
                "{{ slug }} {{ url }} {{ status }} {{ featured }} {{ collection }} {{ created_at }} {{#if _meta}}meta{{/if}}",
            )
            .unwrap();
        let generator = Generator::with_templates(config.clone(), Box::new(registry));

        let report = generator
            .generate_collection("posts", Some("FIRST post"))
            .unwrap();
        assert_eq!(report, CollectionReport { generated: 1, failed: 0 });
        let html = fs::read_to_string(config.output_dir().join("posts/first-post.html")).unwrap();
        assert_eq!(
            html,
            "first-post /posts/first-post.html published true posts 2024-01-01 meta"
        );
        assert!(!config.output_dir().join("posts/second.html").exists());

        let err = generator
            .generate_collection("posts", Some("missing"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::ItemNotFound { .. }));
        assert!(!generator.generate_one("posts", ContentKind::Collection, Some("missing")));
    }

    #[test]
    fn test_duplicate_slug_is_item_failure() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let posts = config.collection_dir("posts");
        write_json(&posts.join("post-1.json"), json!({"title": "A"}));
        write_json(&posts.join("post-2.json"), json!({"title": "B"}));
        write_blueprint(&config, "posts", "fields:\n  title: { type: text }\n");
        let mut registry = TemplateRegistry::new();
        registry.register_source("posts", "{{ title }}").unwrap();
        let generator = Generator::with_templates(config.clone(), Box::new(registry));

        let report = generator.generate_collection("posts", None).unwrap();
        assert_eq!(report, CollectionReport { generated: 1, failed: 1 });
        let html = fs::read_to_string(config.output_dir().join("posts/post.html")).unwrap();
        assert_eq!(html, "A");
    }

    #[test]
    fn test_failed_item_does_not_claim_slug() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let posts = config.collection_dir("posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(posts.join("post-1.json"), "{broken").unwrap();
        write_json(&posts.join("post-2.json"), json!({"title": "B"}));
        write_json(&posts.join("post-3.json"), json!({"title": "C"}));
        write_blueprint(&config, "posts", "fields:\n  title: { type: text }\n");
        let mut registry = TemplateRegistry::new();
        registry.register_source("posts", "{{ title }}").unwrap();
        let generator = Generator::with_templates(config.clone(), Box::new(registry));

        let report = generator.generate_collection("posts", None).unwrap();
        assert_eq!(report, CollectionReport { generated: 1, failed: 2 });
        let html = fs::read_to_string(config.output_dir().join("posts/post.html")).unwrap();
        assert_eq!(html, "B");
    }

    #[test]
    fn test_listings_order_and_filtering() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let notes = config.collection_dir("notes");
        write_json(&notes.join("a.json"), json!({"title": "Old", "_meta": {"created": "2023-01-01"}}));
        write_json(&notes.join("b.json"), json!({"title": "New", "_meta": {"created": "2024-01-01"}}));
        write_json(&notes.join("c.json"), json!({"title": "Pinned", "_featured": true}));
        write_json(&notes.join("d.json"), json!({"title": "Hidden", "_status": "unlisted"}));
        write_json(&notes.join("e.json"), json!({"title": "Draft", "_status": "draft"}));
        fs::write(notes.join("f.json"), "{broken").unwrap();

        let generator = Generator::new(config);
        let listings = generator.listings();
        let titles: Vec<_> = listings["notes"]
            .as_items()
            .unwrap()
            .iter()
            .map(|item| item["title"].as_text().into_owned())
            .collect();
        assert_eq!(titles, ["Pinned", "New", "Old"]);
        assert!(
            listings["notes"].as_items().unwrap()[0]
                .get(META_FIELD)
                .is_none()
        );
    }

    #[test]
    fn test_site_settings_defaults() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_json(
            &config.settings_path(),
            json!({"tagline": "Hi", "_meta": {"updated": 1}}),
        );

        let site = Generator::new(config).site_settings();
        assert_eq!(site.get("tagline"), Some(&Value::from("Hi")));
        assert_eq!(site.get("site_name"), Some(&Value::from("Test Site")));
        assert!(site.get(META_FIELD).is_none());
    }

    #[test]
    fn test_generation_result_json() {
        let result = GenerationResult {
            success: true,
            generated_count: 3,
            errors: Vec::new(),
            skipped: vec!["404: no content file".to_string()],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            json!({
                "success": true,
                "generatedCount": 3,
                "errors": [],
                "skipped": ["404: no content file"]
            })
        );
    }
}

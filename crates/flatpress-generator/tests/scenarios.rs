//! End-to-end generation scenarios.
//!
//! Each test lays out a throwaway site in a temporary directory and runs the
//! generator over it.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use flatpress_core::{Config, ContentKind, config::SiteConfig};
use flatpress_generator::{
    FieldQuery, FnTemplate, GenerateError, Generator, Output, TemplateRegistry, TemplateSource,
    derive_slug,
    template::{Result as TemplateResult, TemplateHandle},
};
use serde_json::json;
use tempfile::TempDir;

struct Site {
    _dir: TempDir,
    config: Config,
}

impl Site {
    fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = Config::new(
            SiteConfig {
                title: "Scenario Site".to_string(),
                base_url: "https://example.com".to_string(),
            },
            dir.path(),
        );
        Self { _dir: dir, config }
    }

    fn page(&self, content_type: &str, value: serde_json::Value) -> &Self {
        write_json(&self.config.page_record_path(content_type), &value);
        self
    }

    fn item(&self, collection: &str, file: &str, value: serde_json::Value) -> &Self {
        write_json(&self.config.collection_dir(collection).join(file), &value);
        self
    }

    fn blueprint(&self, name: &str, source: &str) -> &Self {
        let path = self.config.blueprints_dir().join(format!("{name}.yaml"));
        write_file(&path, source);
        self
    }

    fn template(&self, name: &str, source: &str) -> &Self {
        write_file(&self.config.template_path(name), source);
        self
    }

    fn output(&self, relative: &str) -> PathBuf {
        self.config.output_dir().join(relative)
    }

    fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.output(relative)).expect("generated file")
    }

    fn generator(&self) -> Generator {
        Generator::new(self.config.clone())
    }
}

fn write_json(path: &Path, value: &serde_json::Value) {
    write_file(path, &serde_json::to_string_pretty(value).expect("json"));
}

fn write_file(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, contents).expect("write");
}

const POSTS_BLUEPRINT: &str = "kind: collection\nfields:\n  title: { type: text, required: true }\n";

fn projects_registry() -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();
    registry.register(FnTemplate::new("projects", |ctx, out| {
        let title = ctx.field("title", FieldQuery::or("Untitled"));
        write!(out, "<h1>{title}</h1>")?;
        if ctx.field("slug", FieldQuery::or("")).starts_with("broken") {
            panic!("template bug while rendering {}", ctx.page_id());
        }
        Ok(())
    }));
    registry
}

#[test]
fn test_posts_slugs_from_explicit_and_filename() {
    let site = Site::new();
    site.blueprint("posts", POSTS_BLUEPRINT)
        .template("posts", "<article><h1>{{ title }}</h1></article>")
        .item(
            "posts",
            "hello.json",
            json!({"_slug": "hello-world", "_status": "published", "title": "Hello"}),
        )
        .item(
            "posts",
            "untitled-17000.json",
            json!({"_slug": "", "title": "Untitled"}),
        );

    let result = site.generator().generate_all();

    assert!(result.success, "{result:?}");
    assert_eq!(
        site.read("posts/hello-world.html"),
        "<article><h1>Hello</h1></article>"
    );
    assert!(site.output("posts/untitled.html").exists());
    // home + two posts
    assert_eq!(result.generated_count, 3);
}

#[test]
fn test_missing_home_uses_fallback_record() {
    let site = Site::new();

    let result = site.generator().generate_all();

    assert!(result.errors.is_empty(), "{result:?}");
    assert!(result.success);
    let html = site.read("index.html");
    assert!(html.contains("<title>Home | Scenario Site</title>"));
    assert!(html.contains("<p>Welcome to the site</p>"));
}

#[test]
fn test_home_uses_default_template_and_stored_record() {
    let site = Site::new();
    site.page("home", json!({"title": "Start", "_meta": {"created": "2024-02-03"}}))
        .template("default", "{{ title }} @ {{ url }} since {{ created_at | date:\"%Y\" }}");

    assert!(site.generator().generate_home());
    assert_eq!(site.read("index.html"), "Start @ / since 2024");
}

#[test]
fn test_missing_template_is_skip_naming_path() {
    let site = Site::new();
    site.page("about", json!({"title": "About us"}))
        .blueprint("about", "fields:\n  title: { type: text }\n");

    let result = site.generator().generate_all();

    assert!(result.success, "{result:?}");
    assert!(result.errors.is_empty());
    let skip = result
        .skipped
        .iter()
        .find(|s| s.starts_with("about:"))
        .expect("about skipped");
    assert!(skip.contains("about.html"), "{skip}");
    assert!(skip.contains("default.html"), "{skip}");
    assert!(!site.output("about.html").exists());
}

#[test]
fn test_batch_skip_precedence() {
    let site = Site::new();
    // Content without blueprint.
    site.page("contact", json!({"title": "Contact"}));
    // Blueprint without content.
    site.blueprint("faq", "fields:\n  q: { type: text }\n");
    fs::create_dir_all(site.config.pages_dir().join("faq")).expect("dir");
    // Collection without items.
    site.blueprint("events", "fields:\n  name: { type: text }\n");
    fs::create_dir_all(site.config.collection_dir("events")).expect("dir");
    site.template("default", "<main>{{ title }}</main>");

    let result = site.generator().generate_all();

    assert!(result.success, "{result:?}");
    let reasons = result.skipped.join("\n");
    assert!(reasons.contains("404: no content file"), "{reasons}");
    assert!(reasons.contains("contact: no blueprint"), "{reasons}");
    assert!(reasons.contains("faq: no content file"), "{reasons}");
    assert!(reasons.contains("events: collection `events` has no items"), "{reasons}");
}

#[test]
fn test_not_found_page_and_excluded_directories() {
    let site = Site::new();
    site.page("404", json!({"title": "Lost"}))
        .blueprint("404", "fields:\n  title: { type: text }\n")
        .page("settings", json!({"site_name": "Configured"}))
        .blueprint("settings", "fields:\n  site_name: { type: text }\n")
        .page("users", json!({"admin": "x"}))
        .blueprint("users", "fields:\n  admin: { type: text }\n")
        .template("default", "{{ title | default:\"?\" }} / {{ site.site_name }}");

    let result = site.generator().generate_all();

    assert!(result.success, "{result:?}");
    assert_eq!(site.read("404.html"), "Lost / Configured");
    assert!(!site.output("settings.html").exists());
    assert!(!site.output("users.html").exists());
    assert_eq!(result.generated_count, 2);
}

#[test]
fn test_panicking_item_is_contained() {
    let site = Site::new();
    site.blueprint("projects", "fields:\n  title: { type: text }\n")
        .item("projects", "alpha.json", json!({"title": "Alpha"}))
        .item("projects", "broken.json", json!({"title": "Broken"}))
        .item("projects", "gamma.json", json!({"title": "Gamma"}));
    let generator =
        Generator::with_templates(site.config.clone(), Box::new(projects_registry()));

    let report = generator
        .generate_collection("projects", None)
        .expect("partial success");

    assert_eq!(report.generated, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(site.read("projects/alpha.html"), "<h1>Alpha</h1>");
    assert_eq!(site.read("projects/gamma.html"), "<h1>Gamma</h1>");
    assert!(!site.output("projects/broken.html").exists());
    assert_eq!(generator.output().depth(), 0);
}

#[test]
fn test_partial_failure_is_batch_success() {
    let site = Site::new();
    site.blueprint("projects", "fields:\n  title: { type: text }\n")
        .item("projects", "alpha.json", json!({"title": "Alpha"}))
        .item("projects", "broken.json", json!({"title": "Broken"}));
    let generator =
        Generator::with_templates(site.config.clone(), Box::new(projects_registry()));

    assert!(generator.generate_one("projects", ContentKind::Collection, None));

    let result = generator.generate_all();
    assert!(result.success, "{result:?}");
    assert!(result.errors.is_empty());
    assert!(result.generated_count >= 1);
}

#[test]
fn test_all_items_failing_is_batch_error() {
    let site = Site::new();
    site.blueprint("projects", "fields:\n  title: { type: text }\n")
        .item("projects", "broken-a.json", json!({"_slug": "broken-a"}))
        .item("projects", "broken-b.json", json!({"_slug": "broken-b"}));
    let generator =
        Generator::with_templates(site.config.clone(), Box::new(projects_registry()));

    assert!(!generator.generate_one("projects", ContentKind::Collection, None));
    let err = generator
        .generate_collection("projects", None)
        .expect_err("all items fail");
    assert!(matches!(err, GenerateError::AllItemsFailed { failed: 2, .. }));
    assert!(!err.is_skip());

    let result = generator.generate_all();
    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].starts_with("projects: all 2 item(s)"), "{result:?}");
}

#[test]
fn test_structure_type_error_fails_only_that_item() {
    let site = Site::new();
    site.blueprint(
        "gallery",
        "fields:\n  shots:\n    type: structure\n    fields:\n      caption: { type: text }\n",
    )
    .template("gallery", "{{#each shots}}<figure>{{ caption }}</figure>{{/each}}")
    .item("gallery", "good.json", json!({"shots": [{"caption": "Sea"}]}))
    .item("gallery", "bad.json", json!({"shots": "not a list"}));

    let report = site
        .generator()
        .generate_collection("gallery", None)
        .expect("partial success");

    assert_eq!((report.generated, report.failed), (1, 1));
    assert_eq!(site.read("gallery/good.html"), "<figure>Sea</figure>");
    assert!(!site.output("gallery/bad.html").exists());
}

#[test]
fn test_invalid_blueprint_and_template_are_errors() {
    let site = Site::new();
    site.page("about", json!({"title": "About"}))
        .blueprint("about", "fields:\n  level: { type: slider, min: 5, max: 1 }\n")
        .page("team", json!({"title": "Team"}))
        .blueprint("team", "fields:\n  title: { type: text }\n")
        .template("team", "{{#each people}}");

    let result = site.generator().generate_all();

    assert!(!result.success);
    let errors = result.errors.join("\n");
    assert!(errors.contains("about: invalid blueprint"), "{errors}");
    assert!(errors.contains("team: template for `team` could not be loaded"), "{errors}");
}

#[test]
fn test_regeneration_is_byte_identical() {
    let site = Site::new();
    site.blueprint("posts", POSTS_BLUEPRINT)
        .template(
            "posts",
            "{{ title }} {{ created_at | date:\"%Y-%m-%d\" }} {{#each collections.posts}}[{{ slug }}]{{/each}}",
        )
        .item(
            "posts",
            "one.json",
            json!({"title": "One", "_meta": {"created": 1700000000}}),
        )
        .item("posts", "two.json", json!({"title": "Two"}));
    let generator = site.generator();

    assert!(generator.generate_all().success);
    let first = (site.read("posts/one.html"), site.read("posts/two.html"), site.read("index.html"));
    assert!(generator.generate_all().success);
    let second = (site.read("posts/one.html"), site.read("posts/two.html"), site.read("index.html"));

    assert_eq!(first, second);
    assert_eq!(first.0, "One 2023-11-14 [one][two]");
}

#[test]
fn test_written_bytes_match_render() {
    let site = Site::new();
    let source = "  <p>{{ title }}</p>\r\n\t<p>ünïcødé ✓ {{ note | raw }}</p>\n\n";
    site.page("about", json!({"title": "A & B", "note": "<em>kept</em>"}))
        .blueprint("about", "fields:\n  title: { type: text }\n")
        .template("about", source);

    assert!(site.generator().generate_one("about", ContentKind::Page, None));

    let written = fs::read(site.output("about.html")).expect("read");
    let expected = "  <p>A &amp; B</p>\r\n\t<p>ünïcødé ✓ <em>kept</em></p>\n\n";
    assert_eq!(written, expected.as_bytes());
}

#[test]
fn test_listing_excludes_drafts() {
    let site = Site::new();
    site.blueprint("posts", POSTS_BLUEPRINT)
        .template("posts", "{{ title }}")
        .template(
            "home",
            "{{#each collections.posts}}<a href=\"{{ url }}\">{{ title }}</a>{{/each}}",
        )
        .item("posts", "live.json", json!({"title": "Live"}))
        .item("posts", "draft.json", json!({"title": "Draft", "_status": "draft"}));

    let result = site.generator().generate_all();

    assert!(result.success, "{result:?}");
    assert_eq!(
        site.read("index.html"),
        "<a href=\"/posts/live.html\">Live</a>"
    );
    // Drafts are still rendered to their own page.
    assert!(site.output("posts/draft.html").exists());
}

struct Chatty {
    inner: TemplateRegistry,
    output: Output,
}

impl TemplateSource for Chatty {
    fn load(&self, name: &str) -> TemplateResult<Option<TemplateHandle>> {
        self.output.echo(&"x".repeat(300));
        self.inner.load(name)
    }

    fn describe(&self, name: &str) -> String {
        self.inner.describe(name)
    }
}

#[test]
fn test_leaked_output_fails_batch() {
    let site = Site::new();
    let output = Output::new();
    let mut inner = TemplateRegistry::new();
    inner.register_source("home", "<h1>{{ title }}</h1>").expect("register");
    let generator = Generator::with_templates(
        site.config.clone(),
        Box::new(Chatty {
            inner,
            output: output.clone(),
        }),
    )
    .with_output(output.clone());

    let result = generator.generate_all();

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors[0],
        format!("Unexpected output during generation: {}", "x".repeat(200))
    );
    assert_eq!(output.depth(), 0);
    // The page itself was unaffected.
    assert_eq!(site.read("index.html"), "<h1>Home</h1>");
}

#[test]
fn test_derived_slugs_are_clean() {
    let record = flatpress_core::Record::new();
    let names = [
        "Hello World.json",
        "--weird__name--.json",
        "UPPER-42.json",
        "a---b.json",
        "ÅÄÖ.json",
        "-7.json",
        "....json",
        "post-1-2-3.json",
    ];
    for name in names {
        let slug = derive_slug(&record, name);
        assert!(
            slug.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'),
            "{name} -> {slug}"
        );
        assert!(!slug.starts_with('-') && !slug.ends_with('-'), "{name} -> {slug}");
        assert!(!slug.contains("--"), "{name} -> {slug}");
        assert!(!slug.is_empty());
        let mut explicit = flatpress_core::Record::new();
        explicit.insert("_slug".to_string(), flatpress_core::Value::from(slug.as_str()));
        assert_eq!(derive_slug(&explicit, name), slug, "{name} not idempotent");
    }
    assert_eq!(derive_slug(&record, "post-1-2-3.json"), "post-1-2");
    assert_eq!(derive_slug(&record, "-7.json"), "item");
}

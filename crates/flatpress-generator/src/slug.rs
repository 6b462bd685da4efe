//! URL slugs and output locations.

use std::path::{Path, PathBuf};

use flatpress_core::{Record, content::SLUG_FIELD};

/// Slug used when nothing usable remains after sanitization.
pub const FALLBACK_SLUG: &str = "item";

/// Content type rendered to `404.html`.
pub const NOT_FOUND_TYPE: &str = "404";

/// Content type rendered to `index.html`.
pub const HOME_TYPE: &str = "home";

/// Where a generated page is written, relative to the output root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget<'a> {
    /// `index.html`.
    Home,
    /// `404.html`.
    NotFound,
    /// `<type>.html`.
    Page(&'a str),
    /// `<collection>/<slug>.html`.
    Item { collection: &'a str, slug: &'a str },
}

impl<'a> OutputTarget<'a> {
    /// Target for a page content type.
    #[must_use]
    pub fn for_page(content_type: &'a str) -> Self {
        match content_type {
            HOME_TYPE => Self::Home,
            NOT_FOUND_TYPE => Self::NotFound,
            other => Self::Page(other),
        }
    }

    /// Path of the generated file below `output_dir`.
    #[must_use]
    pub fn path(&self, output_dir: &Path) -> PathBuf {
        match self {
            Self::Home => output_dir.join("index.html"),
            Self::NotFound => output_dir.join("404.html"),
            Self::Page(content_type) => output_dir.join(format!("{content_type}.html")),
            Self::Item { collection, slug } => {
                output_dir.join(collection).join(format!("{slug}.html"))
            }
        }
    }

    /// Site-relative URL of the generated file.
    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Home => "/".to_string(),
            Self::NotFound => "/404.html".to_string(),
            Self::Page(content_type) => format!("/{content_type}.html"),
            Self::Item { collection, slug } => format!("/{collection}/{slug}.html"),
        }
    }
}

/// Lowercase, map everything outside `[a-z0-9]` to `-`, collapse runs of
/// hyphens and trim them from both ends. Never returns an empty slug.
#[must_use]
pub fn sanitize(input: &str) -> String {
    let slug = sanitize_raw(input);
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

fn sanitize_raw(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Derive the slug of a collection item.
///
/// A present, non-empty `_slug` wins and is only sanitized. Otherwise the
/// storage filename is used with its `.json` extension and one trailing
/// `-<digits>` uniqueness suffix removed, then sanitized. Sanitizing an
/// existing slug is a no-op, so feeding the result back as `_slug` yields it
/// unchanged.
#[must_use]
pub fn derive_slug(record: &Record, file_name: &str) -> String {
    if let Some(explicit) = record.get(SLUG_FIELD).map(|value| value.as_text()) {
        if !explicit.is_empty() {
            return sanitize(&explicit);
        }
    }

    let stem = file_name.strip_suffix(".json").unwrap_or(file_name);
    sanitize(strip_numeric_suffix(stem))
}

/// `name` without a trailing `-<digits>` run, if it has one.
fn strip_numeric_suffix(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((head, tail)) if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) => {
            head
        }
        _ => name,
    }
}

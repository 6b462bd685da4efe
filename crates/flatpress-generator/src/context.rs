//! Render context binding.
//!
//! A [`RenderContext`] is the only view a template gets of the world: the
//! content record being rendered, its blueprint, the site settings, the
//! published listings of every collection, and a sink for recoverable
//! notices. All accessors are total; absent values fall back to blueprint
//! defaults and then to the caller's default.

use std::{borrow::Cow, cell::RefCell, fmt::Write};

use flatpress_core::{Record, Schema, TypeMismatch, Value, value::lookup};

/// Prefix selecting the site settings source in template paths.
const SITE_PREFIX: &str = "site.";
/// Prefix selecting collection listings in template paths.
const COLLECTIONS_PREFIX: &str = "collections.";
/// Loop position inside an iteration block.
pub const INDEX_VAR: &str = "@index";

/// Which record an accessor reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Source {
    /// The content record being rendered.
    #[default]
    Content,
    /// The site settings record.
    Site,
}

/// How [`RenderContext::field`] turns a value into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format<'f> {
    /// Plain text rendering.
    #[default]
    Plain,
    /// Date formatting with a strftime pattern.
    Date(&'f str),
    /// List joining with a separator.
    Join(&'f str),
}

/// Arguments of a [`RenderContext::field`] lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldQuery<'q> {
    /// Returned when the value is absent or renders empty.
    pub default: &'q str,
    /// Record to read from.
    pub source: Source,
    /// Text conversion.
    pub format: Format<'q>,
}

impl<'q> FieldQuery<'q> {
    /// Plain lookup with a default.
    #[must_use]
    pub fn or(default: &'q str) -> Self {
        Self {
            default,
            ..Self::default()
        }
    }

    /// Read from the site settings instead of the content record.
    #[must_use]
    pub fn site(mut self) -> Self {
        self.source = Source::Site;
        self
    }

    /// Format as a date.
    #[must_use]
    pub fn date(mut self, pattern: &'q str) -> Self {
        self.format = Format::Date(pattern);
        self
    }

    /// Join list elements.
    #[must_use]
    pub fn join(mut self, separator: &'q str) -> Self {
        self.format = Format::Join(separator);
        self
    }
}

/// Whether a value counts as absent for default substitution.
#[must_use]
pub fn is_blank(value: &Value) -> bool {
    value.as_text().is_empty()
}

/// One level of an iteration block.
#[derive(Debug, Clone, Copy)]
pub struct Scope<'s> {
    /// Current sub-record.
    pub record: &'s Record,
    /// Zero-based position within the iterated list.
    pub index: usize,
    /// Enclosing iteration, if any.
    pub parent: Option<&'s Scope<'s>>,
}

/// Everything a template may read while rendering one page.
#[derive(Debug)]
pub struct RenderContext<'a> {
    record: Record,
    schema: &'a Schema,
    site: &'a Record,
    listings: Option<&'a Record>,
    page_id: String,
    notices: RefCell<Vec<String>>,
}

impl<'a> RenderContext<'a> {
    /// Bind a prepared content record to its schema and the site settings.
    #[must_use]
    pub fn bind(
        record: Record,
        schema: &'a Schema,
        site: &'a Record,
        page_id: impl Into<String>,
    ) -> Self {
        Self {
            record,
            schema,
            site,
            listings: None,
            page_id: page_id.into(),
            notices: RefCell::new(Vec::new()),
        }
    }

    /// Attach collection listings, keyed by collection name.
    #[must_use]
    pub fn with_listings(mut self, listings: &'a Record) -> Self {
        self.listings = Some(listings);
        self
    }

    /// Identifier of the page being rendered (`posts/hello-world`).
    #[must_use]
    pub fn page_id(&self) -> &str {
        &self.page_id
    }

    /// The content record.
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// The site settings.
    #[must_use]
    pub fn site(&self) -> &Record {
        self.site
    }

    /// The blueprint bound to the record.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.schema
    }

    /// Value of a field, falling back to the blueprint default for content
    /// fields.
    #[must_use]
    pub fn value(&self, name: &str, source: Source) -> Option<Cow<'_, Value>> {
        match source {
            Source::Site => lookup(self.site, name).map(Cow::Borrowed),
            Source::Content => lookup(&self.record, name).map(Cow::Borrowed).or_else(|| {
                self.schema
                    .field_path(name)
                    .and_then(|field| field.fallback())
                    .map(Cow::Owned)
            }),
        }
    }

    /// Text of a field. Absent or empty values yield `query.default`.
    #[must_use]
    pub fn field(&self, name: &str, query: FieldQuery<'_>) -> String {
        let value = self.lookup(name, query.source, None);
        let text = value
            .map(|value| self.format(&value, query.format, name))
            .unwrap_or_default();
        if text.is_empty() {
            query.default.to_string()
        } else {
            text
        }
    }

    /// Convert a value to text. Shared by [`Self::field`] and the template
    /// filters so both follow the same coercion rules.
    pub fn format(&self, value: &Value, format: Format<'_>, name: &str) -> String {
        match format {
            Format::Plain => value.as_text().into_owned(),
            Format::Date(pattern) => self.format_date(value, pattern, name),
            Format::Join(separator) => value.join(separator),
        }
    }

    /// Sub-records of a structure field, in stored order.
    pub fn items(&self, name: &str) -> Result<Vec<Cow<'_, Record>>, TypeMismatch> {
        self.items_in(name, None)
    }

    /// Sub-records at a template path, seen from inside `scope`.
    /// `collections.<name>` yields that collection's listing.
    pub fn items_in<'s>(
        &'s self,
        path: &str,
        scope: Option<&'s Scope<'s>>,
    ) -> Result<Vec<Cow<'s, Record>>, TypeMismatch> {
        if let Some(collection) = path
            .strip_prefix(COLLECTIONS_PREFIX)
            .filter(|rest| !rest.contains('.'))
        {
            return Ok(self
                .listing(collection)
                .into_iter()
                .map(Cow::Borrowed)
                .collect());
        }
        match self.resolve(path, scope) {
            None => Ok(Vec::new()),
            Some(Cow::Borrowed(value)) => {
                Ok(value.as_items()?.into_iter().map(Cow::Borrowed).collect())
            }
            Some(Cow::Owned(value)) => Ok(value
                .as_items()?
                .into_iter()
                .map(|item| Cow::Owned(item.clone()))
                .collect()),
        }
    }

    /// Whether a field holds a truthy value.
    #[must_use]
    pub fn is_truthy(&self, name: &str, source: Source) -> bool {
        self.lookup(name, source, None)
            .is_some_and(|value| value.is_truthy())
    }

    /// Whether a template path holds a truthy value, seen from inside `scope`.
    #[must_use]
    pub fn is_truthy_in(&self, path: &str, scope: Option<&Scope<'_>>) -> bool {
        self.lookup(path, Source::Content, scope)
            .is_some_and(|value| value.is_truthy())
    }

    /// Published items of a collection, as built by the summary pass.
    #[must_use]
    pub fn listing(&self, collection: &str) -> Vec<&Record> {
        self.listings
            .and_then(|listings| listings.get(collection))
            .and_then(|value| value.as_items().ok())
            .unwrap_or_default()
    }

    fn lookup<'s>(
        &'s self,
        path: &str,
        source: Source,
        scope: Option<&'s Scope<'s>>,
    ) -> Option<Cow<'s, Value>> {
        match source {
            Source::Site => self.value(path, Source::Site),
            Source::Content => self.resolve(path, scope),
        }
    }

    /// Resolve a template path.
    ///
    /// `site.` and `collections.` prefixes select those sources; `@index` is
    /// the innermost loop position. Other names are looked up in the
    /// iteration scopes innermost first, then in the content record.
    #[must_use]
    pub fn resolve<'s>(
        &'s self,
        path: &str,
        scope: Option<&'s Scope<'s>>,
    ) -> Option<Cow<'s, Value>> {
        if path == INDEX_VAR {
            return scope.map(|s| Cow::Owned(Value::from(s.index as i64)));
        }
        if let Some(rest) = path.strip_prefix(SITE_PREFIX) {
            return self.value(rest, Source::Site);
        }
        if let Some(rest) = path.strip_prefix(COLLECTIONS_PREFIX) {
            return self
                .listings
                .and_then(|listings| lookup(listings, rest))
                .map(Cow::Borrowed);
        }

        let mut frame = scope;
        while let Some(current) = frame {
            if let Some(value) = lookup(current.record, path) {
                return Some(Cow::Borrowed(value));
            }
            frame = current.parent;
        }
        self.value(path, Source::Content)
    }

    /// Format a value as a date. Values that are not dates are returned as
    /// text and reported as a notice.
    pub fn format_date(&self, value: &Value, pattern: &str, name: &str) -> String {
        let raw = value.as_text();
        let Some(date) = value.as_datetime() else {
            if !raw.is_empty() {
                self.notice(format!("`{name}` is not a date: {raw}"));
            }
            return raw.into_owned();
        };

        let mut formatted = String::new();
        if write!(formatted, "{}", date.format(pattern)).is_err() {
            self.notice(format!("invalid date format `{pattern}` for `{name}`"));
            return raw.into_owned();
        }
        formatted
    }

    /// Record a recoverable problem.
    pub fn notice(&self, message: impl Into<String>) {
        self.notices.borrow_mut().push(message.into());
    }

    /// Take the notices recorded so far.
    pub fn take_notices(&self) -> Vec<String> {
        self.notices.take()
    }
}

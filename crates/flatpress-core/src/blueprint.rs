//! Blueprints: the field schema of a content type.
//!
//! Blueprints are YAML files, one per content type:
//!
//! ```yaml
//! title: Posts
//! kind: collection
//! fields:
//!   title:
//!     type: text
//!     label: Title
//!     required: true
//!   category:
//!     type: select
//!     options: [news, notes]
//!   gallery:
//!     type: structure
//!     fields:
//!       image: { type: file }
//!       caption: { type: text }
//! ```
//!
//! Field order is preserved. Every field kind carries its own attribute set
//! and is validated once, when the blueprint is loaded.

use std::{fmt, path::Path};

use serde::{
    Deserialize, Deserializer,
    de::{MapAccess, Visitor},
};

use crate::{
    content::ContentKind,
    error::{CoreError, Result},
    value::Value,
};

/// Parsed and validated blueprint of a content type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Content type name (blueprint file stem).
    pub name: String,

    /// Human readable title.
    pub title: Option<String>,

    /// Declared kind, when the blueprint states one.
    pub kind: Option<ContentKind>,

    /// Fields in declaration order.
    pub fields: Vec<Field>,
}

/// A single field definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name (record key).
    pub name: String,

    /// Form label.
    pub label: Option<String>,

    /// Whether the admin form requires a value.
    pub required: bool,

    /// Value used when the record has none.
    pub default: Option<Value>,

    /// Help text shown under the form input.
    pub help: Option<String>,

    /// Layout hint for forms and structure tables (e.g. `1/2`).
    pub width: Option<String>,

    /// Kind-specific attributes.
    pub kind: FieldKind,
}

/// Field kinds with their own attributes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldKind {
    /// Single line of text.
    Text {
        #[serde(default)]
        placeholder: Option<String>,
        #[serde(default)]
        max_length: Option<usize>,
    },
    /// Multi-line plain text.
    Textarea {
        #[serde(default)]
        rows: Option<u32>,
    },
    /// Multi-line CommonMark text.
    Markdown,
    /// Numeric input.
    Number {
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
    /// Boolean switch.
    Toggle,
    /// Calendar date.
    Date,
    /// E-mail address.
    Email,
    /// Absolute or site-relative URL.
    Url,
    /// CSS color.
    Color,
    /// Not shown in forms.
    Hidden,
    /// One of a fixed set of options.
    Select { options: SelectOptions },
    /// Free list of strings.
    Tags,
    /// Media library reference(s).
    File {
        #[serde(default)]
        multiple: bool,
        #[serde(default)]
        accept: Vec<String>,
    },
    /// Bounded numeric range.
    Slider {
        min: f64,
        max: f64,
        #[serde(default)]
        step: Option<f64>,
    },
    /// Repeatable group of nested fields.
    Structure { fields: Fields },
}

impl FieldKind {
    /// Name as written in blueprint files.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Textarea { .. } => "textarea",
            Self::Markdown => "markdown",
            Self::Number { .. } => "number",
            Self::Toggle => "toggle",
            Self::Date => "date",
            Self::Email => "email",
            Self::Url => "url",
            Self::Color => "color",
            Self::Hidden => "hidden",
            Self::Select { .. } => "select",
            Self::Tags => "tags",
            Self::File { .. } => "file",
            Self::Slider { .. } => "slider",
            Self::Structure { .. } => "structure",
        }
    }
}

/// Options of a select field, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectOptions(pub Vec<SelectOption>);

/// One select option.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    /// Stored value.
    pub value: String,
    /// Display label.
    pub label: String,
}

/// Ordered list of fields, written in YAML as a mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fields(pub Vec<Field>);

#[derive(Deserialize)]
struct RawBlueprint {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    kind: Option<ContentKind>,
    #[serde(default)]
    fields: Fields,
}

#[derive(Deserialize)]
struct RawField {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    help: Option<String>,
    #[serde(default)]
    width: Option<String>,
    #[serde(flatten)]
    kind: FieldKind,
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of field names to field definitions")
            }

            fn visit_unit<E: serde::de::Error>(self) -> std::result::Result<Fields, E> {
                Ok(Fields::default())
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Fields, A::Error> {
                let mut fields = Vec::new();
                while let Some((name, raw)) = map.next_entry::<String, RawField>()? {
                    fields.push(Field {
                        name,
                        label: raw.label,
                        required: raw.required,
                        default: raw.default,
                        help: raw.help,
                        width: raw.width,
                        kind: raw.kind,
                    });
                }
                Ok(Fields(fields))
            }
        }

        deserializer.deserialize_any(FieldsVisitor)
    }
}

impl<'de> Deserialize<'de> for SelectOptions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawOptions {
            List(Vec<String>),
            Labeled(serde_yaml::Mapping),
        }

        let options = match RawOptions::deserialize(deserializer)? {
            RawOptions::List(values) => values
                .into_iter()
                .map(|value| SelectOption {
                    label: value.clone(),
                    value,
                })
                .collect(),
            RawOptions::Labeled(mapping) => mapping
                .into_iter()
                .map(|(value, label)| SelectOption {
                    value: yaml_scalar(&value),
                    label: yaml_scalar(&label),
                })
                .collect(),
        };
        Ok(SelectOptions(options))
    }
}

fn yaml_scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

impl Schema {
    /// An empty schema, used where a blueprint is optional.
    #[must_use]
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            kind: None,
            fields: Vec::new(),
        }
    }

    /// Load and validate a blueprint file.
    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .ok_or_else(|| CoreError::blueprint(path, "blueprint path has no file name"))?;
        let source = std::fs::read_to_string(path)?;
        Self::parse(&name, &source, path)
    }

    /// Parse and validate blueprint source. `path` is used for diagnostics.
    pub fn parse(name: &str, source: &str, path: &Path) -> Result<Self> {
        let raw: RawBlueprint = if source.trim().is_empty() {
            RawBlueprint {
                title: None,
                kind: None,
                fields: Fields::default(),
            }
        } else {
            serde_yaml::from_str(source).map_err(|e| CoreError::blueprint(path, e.to_string()))?
        };

        validate_fields(&raw.fields.0, path, "")?;

        Ok(Self {
            name: name.to_string(),
            title: raw.title,
            kind: raw.kind,
            fields: raw.fields.0,
        })
    }

    /// Find a top-level field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Find a field by dotted path, descending into structure fields.
    #[must_use]
    pub fn field_path(&self, path: &str) -> Option<&Field> {
        let mut segments = path.split('.');
        let mut field = self.field(segments.next()?)?;
        for segment in segments {
            match &field.kind {
                FieldKind::Structure { fields } => {
                    field = fields.0.iter().find(|f| f.name == segment)?;
                }
                _ => return None,
            }
        }
        Some(field)
    }

    /// Names of required fields with no truthy value in `record`.
    #[must_use]
    pub fn missing_required<'a>(&'a self, record: &crate::value::Record) -> Vec<&'a str> {
        self.fields
            .iter()
            .filter(|field| field.required)
            .filter(|field| !record.get(&field.name).is_some_and(Value::is_truthy))
            .map(|field| field.name.as_str())
            .collect()
    }
}

impl Field {
    /// Value used when a record has nothing stored for this field.
    ///
    /// The declared default wins. Otherwise toggles fall back to `false`, list
    /// shaped kinds to an empty list, and sliders to their minimum.
    #[must_use]
    pub fn fallback(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }
        match &self.kind {
            FieldKind::Toggle => Some(Value::Bool(false)),
            FieldKind::Tags | FieldKind::Structure { .. } => Some(Value::List(Vec::new())),
            FieldKind::File { multiple: true, .. } => Some(Value::List(Vec::new())),
            FieldKind::Slider { min, .. } => serde_json::Number::from_f64(*min).map(Value::Number),
            _ => None,
        }
    }
}

fn validate_fields(fields: &[Field], path: &Path, prefix: &str) -> Result<()> {
    for (index, field) in fields.iter().enumerate() {
        let qualified = format!("{prefix}{}", field.name);

        if field.name.is_empty() || field.name.contains('.') || field.name.starts_with('_') {
            return Err(CoreError::blueprint(
                path,
                format!("invalid field name `{qualified}`"),
            ));
        }
        if fields[..index].iter().any(|f| f.name == field.name) {
            return Err(CoreError::blueprint(
                path,
                format!("duplicate field `{qualified}`"),
            ));
        }

        match &field.kind {
            FieldKind::Select { options } if options.0.is_empty() => {
                return Err(CoreError::blueprint(
                    path,
                    format!("select field `{qualified}` has no options"),
                ));
            }
            FieldKind::Slider { min, max, step } => {
                if min >= max {
                    return Err(CoreError::blueprint(
                        path,
                        format!("slider field `{qualified}` needs min < max"),
                    ));
                }
                if step.is_some_and(|s| s <= 0.0) {
                    return Err(CoreError::blueprint(
                        path,
                        format!("slider field `{qualified}` needs a positive step"),
                    ));
                }
            }
            FieldKind::Number {
                min: Some(min),
                max: Some(max),
            } if min > max => {
                return Err(CoreError::blueprint(
                    path,
                    format!("number field `{qualified}` needs min <= max"),
                ));
            }
            FieldKind::Structure { fields: nested } => {
                if nested.0.is_empty() {
                    return Err(CoreError::blueprint(
                        path,
                        format!("structure field `{qualified}` has no fields"),
                    ));
                }
                validate_fields(&nested.0, path, &format!("{qualified}."))?;
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(source: &str) -> Result<Schema> {
        Schema::parse("posts", source, Path::new("blueprints/posts.yaml"))
    }

    #[test]
    fn test_parse_preserves_field_order() {
        let schema = parse(
            r#"
title: Posts
kind: collection
fields:
  title:
    type: text
    label: Title
    required: true
  body:
    type: markdown
  published_on:
    type: date
  tags:
    type: tags
"#,
        )
        .expect("parse");

        assert_eq!(schema.title.as_deref(), Some("Posts"));
        assert_eq!(schema.kind, Some(ContentKind::Collection));
        let names: Vec<_> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["title", "body", "published_on", "tags"]);
        assert!(schema.field("title").expect("title").required);
        assert_eq!(schema.field("body").expect("body").kind, FieldKind::Markdown);
    }

    #[test]
    fn test_select_options_forms() {
        let schema = parse(
            r#"
fields:
  category:
    type: select
    options: [news, notes]
  size:
    type: select
    options:
      s: Small
      l: Large
"#,
        )
        .expect("parse");

        let FieldKind::Select { options } = &schema.field("category").expect("field").kind else {
            panic!("expected select");
        };
        assert_eq!(options.0[1].value, "notes");
        assert_eq!(options.0[1].label, "notes");

        let FieldKind::Select { options } = &schema.field("size").expect("field").kind else {
            panic!("expected select");
        };
        assert_eq!(options.0[0].value, "s");
        assert_eq!(options.0[1].label, "Large");
    }

    #[test]
    fn test_structure_fields_nest() {
        let schema = parse(
            r#"
fields:
  gallery:
    type: structure
    fields:
      image: { type: file }
      caption: { type: text, default: "Untitled" }
"#,
        )
        .expect("parse");

        let caption = schema.field_path("gallery.caption").expect("nested");
        assert_eq!(caption.default, Some(Value::from("Untitled")));
        assert!(schema.field_path("gallery.missing").is_none());
    }

    #[test]
    fn test_validation_errors() {
        let err = parse("fields:\n  pick:\n    type: select\n    options: []\n").unwrap_err();
        assert!(err.to_string().contains("has no options"));

        let err = parse("fields:\n  level:\n    type: slider\n    min: 5\n    max: 1\n").unwrap_err();
        assert!(err.to_string().contains("min < max"));

        let err = parse("fields:\n  rows:\n    type: structure\n    fields: {}\n").unwrap_err();
        assert!(err.to_string().contains("has no fields"));

        let err = parse("fields:\n  a.b:\n    type: text\n").unwrap_err();
        assert!(err.to_string().contains("invalid field name"));

        let err = parse("fields:\n  x:\n    type: hologram\n").unwrap_err();
        assert!(err.to_string().contains("Blueprint error"));
    }

    #[test]
    fn test_empty_blueprint() {
        let schema = parse("").expect("parse");
        assert!(schema.fields.is_empty());

        let schema = parse("title: Home\n").expect("parse");
        assert!(schema.fields.is_empty());
    }

    #[test]
    fn test_field_fallbacks() {
        let schema = parse(
            r#"
fields:
  visible: { type: toggle }
  tags: { type: tags }
  photos: { type: file, multiple: true }
  cover: { type: file }
  volume: { type: slider, min: 2, max: 10 }
  subtitle: { type: text, default: "n/a" }
"#,
        )
        .expect("parse");

        let fallback = |name: &str| schema.field(name).and_then(Field::fallback);
        assert_eq!(fallback("visible"), Some(Value::Bool(false)));
        assert_eq!(fallback("tags"), Some(Value::List(Vec::new())));
        assert_eq!(fallback("photos"), Some(Value::List(Vec::new())));
        assert_eq!(fallback("cover"), None);
        assert_eq!(fallback("volume"), Some(Value::from(json!(2.0))));
        assert_eq!(fallback("subtitle"), Some(Value::from("n/a")));
    }

    #[test]
    fn test_missing_required() {
        let schema = parse(
            "fields:\n  title: { type: text, required: true }\n  lead: { type: text, required: true }\n",
        )
        .expect("parse");
        let record = serde_json::from_value(json!({"title": "Set", "lead": ""})).expect("record");
        assert_eq!(schema.missing_required(&record), ["lead"]);
    }
}

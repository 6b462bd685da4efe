//! HTML template system for page generation.
//!
//! Templates use `{{ }}` interpolation rather than a heavy template engine.
//! Source is compiled once into a node tree and rendered against a
//! [`RenderContext`] into any `fmt::Write` sink.
//!
//! | tag                                   | meaning                              |
//! |---------------------------------------|--------------------------------------|
//! | `{{ path }}`                          | escaped value                        |
//! | `{{ path \| date:"%Y" \| default:"-" }}` | value passed through filters      |
//! | `{{#each path}}..{{/each}}`           | iterate a structure field            |
//! | `{{#if path}}..{{else}}..{{/if}}`     | truthy branch                        |
//! | `{{! comment }}`                      | dropped                              |
//!
//! Filters: `date:"<strftime>"`, `join:"<sep>"`, `default:"<text>"`,
//! `markdown`, `raw`, `lower`, `upper`.

use std::{
    borrow::Cow,
    collections::HashMap,
    fmt, io,
    path::PathBuf,
    rc::Rc,
};

use chrono::format::{Item, StrftimeItems};
use flatpress_core::{TypeMismatch, Value};
use pulldown_cmark::{Options, Parser, html};
use thiserror::Error;

use crate::context::{Format, RenderContext, Scope, is_blank};

/// Template errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Invalid template syntax.
    #[error("invalid template syntax in `{template}`: {message}")]
    InvalidSyntax { template: String, message: String },

    /// Template file could not be read.
    #[error("failed to read template {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// An iteration block was given something other than a structure.
    #[error("cannot iterate `{path}`: {source}")]
    NotIterable {
        path: String,
        #[source]
        source: TypeMismatch,
    },

    /// The template reported a failure of its own.
    #[error("{0}")]
    Failed(String),

    /// The output sink rejected a write.
    #[error("failed to write template output")]
    Write(#[from] fmt::Error),
}

impl TemplateError {
    /// Create a failure reported by template code.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    fn syntax(template: &str, message: impl Into<String>) -> Self {
        Self::InvalidSyntax {
            template: template.to_string(),
            message: message.into(),
        }
    }
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Something that renders a page from a bound context.
pub trait Template {
    /// Template name, for diagnostics.
    fn name(&self) -> &str;

    /// Write the page for `context` into `out`.
    fn render(&self, context: &RenderContext<'_>, out: &mut dyn fmt::Write) -> Result<()>;
}

/// Shared handle to a resolved template.
pub type TemplateHandle = Rc<dyn Template>;

/// Template backed by a closure.
pub struct FnTemplate<F> {
    name: String,
    render: F,
}

impl<F> FnTemplate<F> {
    /// Wrap a render closure.
    pub fn new(name: impl Into<String>, render: F) -> Self
    where
        F: Fn(&RenderContext<'_>, &mut dyn fmt::Write) -> Result<()>,
    {
        Self {
            name: name.into(),
            render,
        }
    }
}

impl<F> fmt::Debug for FnTemplate<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTemplate").field("name", &self.name).finish()
    }
}

impl<F> Template for FnTemplate<F>
where
    F: Fn(&RenderContext<'_>, &mut dyn fmt::Write) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, context: &RenderContext<'_>, out: &mut dyn fmt::Write) -> Result<()> {
        (self.render)(context, out)
    }
}

/// A template compiled from `{{ }}` source.
#[derive(Debug, Clone)]
pub struct CompiledTemplate {
    name: String,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Expr(Expr),
    Each {
        path: String,
        body: Vec<Node>,
    },
    If {
        path: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Expr {
    path: String,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Date(String),
    Join(String),
    Default(String),
    Markdown,
    Raw,
    Lower,
    Upper,
}

#[derive(Debug)]
enum Block {
    Each(String),
    If(String),
}

#[derive(Debug)]
struct Frame {
    block: Block,
    nodes: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl Frame {
    fn new(block: Block) -> Self {
        Self {
            block,
            nodes: Vec::new(),
            otherwise: None,
        }
    }

    fn target(&mut self) -> &mut Vec<Node> {
        match &mut self.otherwise {
            Some(otherwise) => otherwise,
            None => &mut self.nodes,
        }
    }

    fn tag(&self) -> &'static str {
        match self.block {
            Block::Each(_) => "each",
            Block::If(_) => "if",
        }
    }

    fn close(self) -> Node {
        match self.block {
            Block::Each(path) => Node::Each {
                path,
                body: self.nodes,
            },
            Block::If(path) => Node::If {
                path,
                then: self.nodes,
                otherwise: self.otherwise.unwrap_or_default(),
            },
        }
    }
}

impl CompiledTemplate {
    /// Compile template source.
    pub fn compile(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        let nodes = Compiler::new(&name).run(source)?;
        Ok(Self { name, nodes })
    }
}

impl Template for CompiledTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, context: &RenderContext<'_>, out: &mut dyn fmt::Write) -> Result<()> {
        render_nodes(&self.nodes, context, None, out)
    }
}

struct Compiler<'n> {
    name: &'n str,
    root: Vec<Node>,
    open: Vec<Frame>,
}

impl<'n> Compiler<'n> {
    fn new(name: &'n str) -> Self {
        Self {
            name,
            root: Vec::new(),
            open: Vec::new(),
        }
    }

    fn target(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(frame) => frame.target(),
            None => &mut self.root,
        }
    }

    fn push_text(&mut self, text: &str) {
        if !text.is_empty() {
            self.target().push(Node::Text(text.to_string()));
        }
    }

    fn run(mut self, source: &str) -> Result<Vec<Node>> {
        let mut rest = source;
        while let Some(start) = rest.find("{{") {
            self.push_text(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError::syntax(self.name, "unclosed {{ delimiter"))?;
            self.tag(after[..end].trim())?;
            rest = &after[end + 2..];
        }
        self.push_text(rest);

        if let Some(frame) = self.open.last() {
            return Err(TemplateError::syntax(
                self.name,
                format!("unclosed {{{{#{}}}}} block", frame.tag()),
            ));
        }
        Ok(self.root)
    }

    fn tag(&mut self, tag: &str) -> Result<()> {
        if tag.starts_with('!') {
            return Ok(());
        }
        if let Some(path) = tag.strip_prefix("#each ") {
            let path = self.path(path.trim())?;
            self.open.push(Frame::new(Block::Each(path)));
            return Ok(());
        }
        if let Some(path) = tag.strip_prefix("#if ") {
            let path = self.path(path.trim())?;
            self.open.push(Frame::new(Block::If(path)));
            return Ok(());
        }
        if tag == "else" {
            return match self.open.last_mut() {
                Some(frame) if matches!(frame.block, Block::If(_)) && frame.otherwise.is_none() => {
                    frame.otherwise = Some(Vec::new());
                    Ok(())
                }
                _ => Err(TemplateError::syntax(self.name, "{{else}} outside {{#if}}")),
            };
        }
        if let Some(closing) = tag.strip_prefix('/') {
            let closing = closing.trim();
            let frame = self.open.pop().ok_or_else(|| {
                TemplateError::syntax(self.name, format!("unexpected {{{{/{closing}}}}}"))
            })?;
            if frame.tag() != closing {
                return Err(TemplateError::syntax(
                    self.name,
                    format!(
                        "{{{{/{closing}}}}} closes a {{{{#{}}}}} block",
                        frame.tag()
                    ),
                ));
            }
            let node = frame.close();
            self.target().push(node);
            return Ok(());
        }
        if tag.starts_with('#') {
            return Err(TemplateError::syntax(
                self.name,
                format!("unknown block `{tag}`"),
            ));
        }

        let expr = self.expr(tag)?;
        self.target().push(Node::Expr(expr));
        Ok(())
    }

    fn path(&self, path: &str) -> Result<String> {
        let valid = !path.is_empty()
            && !path.starts_with('.')
            && !path.ends_with('.')
            && !path.contains("..")
            && path
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@'));
        if valid {
            Ok(path.to_string())
        } else {
            Err(TemplateError::syntax(
                self.name,
                format!("invalid path `{path}`"),
            ))
        }
    }

    fn expr(&self, tag: &str) -> Result<Expr> {
        let path_end = tag
            .find(|c: char| c.is_whitespace() || c == '|')
            .unwrap_or(tag.len());
        let path = self.path(&tag[..path_end])?;

        let mut filters = Vec::new();
        let mut rest = &tag[path_end..];
        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }
            rest = rest
                .strip_prefix('|')
                .ok_or_else(|| {
                    TemplateError::syntax(self.name, format!("unexpected `{rest}` in `{tag}`"))
                })?
                .trim_start();

            let name_end = rest
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            let filter = &rest[..name_end];
            rest = rest[name_end..].trim_start();

            let arg = match rest.strip_prefix(':') {
                Some(after) => {
                    let (arg, remaining) = self.quoted(after.trim_start())?;
                    rest = remaining;
                    Some(arg)
                }
                None => None,
            };
            filters.push(self.filter(filter, arg)?);
        }

        Ok(Expr { path, filters })
    }

    fn quoted<'s>(&self, input: &'s str) -> Result<(String, &'s str)> {
        let mut chars = input.char_indices();
        let quote = match chars.next() {
            Some((_, q @ ('"' | '\''))) => q,
            _ => {
                return Err(TemplateError::syntax(
                    self.name,
                    "filter argument must be quoted",
                ));
            }
        };

        let mut value = String::new();
        let mut escaped = false;
        for (index, c) in chars {
            if escaped {
                value.push(c);
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                return Ok((value, &input[index + c.len_utf8()..]));
            } else {
                value.push(c);
            }
        }
        Err(TemplateError::syntax(
            self.name,
            "unterminated filter argument",
        ))
    }

    fn filter(&self, name: &str, arg: Option<String>) -> Result<Filter> {
        let needs_arg = |arg: Option<String>| {
            arg.ok_or_else(|| {
                TemplateError::syntax(self.name, format!("filter `{name}` needs an argument"))
            })
        };
        let no_arg = |filter: Filter, arg: &Option<String>| {
            if arg.is_some() {
                Err(TemplateError::syntax(
                    self.name,
                    format!("filter `{name}` takes no argument"),
                ))
            } else {
                Ok(filter)
            }
        };

        match name {
            "date" => {
                let pattern = needs_arg(arg)?;
                if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
                    return Err(TemplateError::syntax(
                        self.name,
                        format!("invalid date format `{pattern}`"),
                    ));
                }
                Ok(Filter::Date(pattern))
            }
            "join" => needs_arg(arg).map(Filter::Join),
            "default" => needs_arg(arg).map(Filter::Default),
            "markdown" => no_arg(Filter::Markdown, &arg),
            "raw" => no_arg(Filter::Raw, &arg),
            "lower" => no_arg(Filter::Lower, &arg),
            "upper" => no_arg(Filter::Upper, &arg),
            _ => Err(TemplateError::syntax(
                self.name,
                format!("unknown filter `{name}`"),
            )),
        }
    }
}

fn render_nodes(
    nodes: &[Node],
    context: &RenderContext<'_>,
    scope: Option<&Scope<'_>>,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.write_str(text)?,
            Node::Expr(expr) => render_expr(expr, context, scope, out)?,
            Node::Each { path, body } => {
                let items = context.items_in(path, scope).map_err(|source| {
                    TemplateError::NotIterable {
                        path: path.clone(),
                        source,
                    }
                })?;
                for (index, record) in items.iter().enumerate() {
                    let frame = Scope {
                        record,
                        index,
                        parent: scope,
                    };
                    render_nodes(body, context, Some(&frame), out)?;
                }
            }
            Node::If {
                path,
                then,
                otherwise,
            } => {
                let truthy = context.is_truthy_in(path, scope);
                render_nodes(if truthy { then } else { otherwise }, context, scope, out)?;
            }
        }
    }
    Ok(())
}

fn render_expr(
    expr: &Expr,
    context: &RenderContext<'_>,
    scope: Option<&Scope<'_>>,
    out: &mut dyn fmt::Write,
) -> Result<()> {
    let mut value = context.resolve(&expr.path, scope);
    let mut escape = true;

    for filter in &expr.filters {
        value = match filter {
            Filter::Date(pattern) => value.map(|v| {
                Cow::Owned(Value::Text(context.format(&v, Format::Date(pattern), &expr.path)))
            }),
            Filter::Join(separator) => value.map(|v| {
                Cow::Owned(Value::Text(context.format(&v, Format::Join(separator), &expr.path)))
            }),
            Filter::Default(text) => {
                if value.as_deref().is_none_or(is_blank) {
                    Some(Cow::Owned(Value::Text(text.clone())))
                } else {
                    value
                }
            }
            Filter::Lower => value.map(|v| Cow::Owned(Value::Text(v.as_text().to_lowercase()))),
            Filter::Upper => value.map(|v| Cow::Owned(Value::Text(v.as_text().to_uppercase()))),
            Filter::Markdown => {
                escape = false;
                value.map(|v| Cow::Owned(Value::Text(markdown_to_html(&v.as_text()))))
            }
            Filter::Raw => {
                escape = false;
                value
            }
        };
    }

    let Some(value) = value else {
        return Ok(());
    };
    let text = value.as_text();
    if escape {
        out.write_str(&escape_html(&text))?;
    } else {
        out.write_str(&text)?;
    }
    Ok(())
}

/// Render CommonMark to HTML.
#[must_use]
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(source, options);
    let mut rendered = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut rendered, parser);
    rendered
}

/// Escape text for HTML element and attribute content.
#[must_use]
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Registry of templates held in memory.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, TemplateHandle>,
}

impl fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.templates.keys().collect();
        names.sort();
        f.debug_struct("TemplateRegistry")
            .field("templates", &names)
            .finish()
    }
}

impl TemplateRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under its own name.
    pub fn register(&mut self, template: impl Template + 'static) {
        self.templates
            .insert(template.name().to_string(), Rc::new(template));
    }

    /// Register template source, compiling it.
    pub fn register_source(&mut self, name: &str, source: &str) -> Result<()> {
        self.register(CompiledTemplate::compile(name, source)?);
        Ok(())
    }

    /// Get a template by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<TemplateHandle> {
        self.templates.get(name).cloned()
    }
}

/// Built-in home page, used when no home or default template exists.
pub const DEFAULT_HOME_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{ title | default:"Home" }}{{#if site.site_name}} | {{ site.site_name }}{{/if}}</title>
</head>
<body>
    <main>
        <h1>{{ title | default:"Home" }}</h1>
        {{ content | markdown }}
    </main>
</body>
</html>
"#;

//! flatpress Generator Library
//!
//! HTML generation pipeline for flatpress content.
//!
//! # Modules
//!
//! - [`store`] - JSON record storage with atomic saves
//! - [`resolver`] - Blueprint and template lookup per content type
//! - [`context`] - Render context binding and field accessors
//! - [`template`] - HTML template system with `{{ }}` interpolation
//! - [`output`] - Output channel with nested capture
//! - [`sandbox`] - Isolated template execution
//! - [`slug`] - Slug derivation and output locations
//! - [`build`] - Generation orchestration

pub mod build;
pub mod context;
pub mod output;
pub mod resolver;
pub mod sandbox;
pub mod slug;
pub mod store;
pub mod template;

pub use build::{CollectionReport, GenerateError, GenerationResult, Generator};
pub use context::{FieldQuery, RenderContext, Source};
pub use output::{Capture, Output};
pub use resolver::{FileTemplates, Resolver, TemplateSource};
pub use sandbox::{RenderFailure, Rendered, Sandbox};
pub use slug::{OutputTarget, derive_slug};
pub use store::ContentStore;
pub use template::{CompiledTemplate, FnTemplate, Template, TemplateError, TemplateRegistry};

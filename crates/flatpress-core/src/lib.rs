//! flatpress Core Library
//!
//! Core types, blueprints, configuration, and error handling for the flatpress
//! flat-file CMS.

pub mod blueprint;
pub mod config;
pub mod content;
pub mod error;
pub mod value;

pub use blueprint::{Field, FieldKind, Schema};
pub use config::Config;
pub use content::{ContentKind, Meta, Status};
pub use error::{CoreError, Result};
pub use value::{Record, TypeMismatch, Value};

//! Isolated template execution.
//!
//! The sandbox runs one template at a time inside its own capture level.
//! Whatever happens inside (an error, a panic, stray captures left open) the
//! caller's output stack is back at the depth it had before the call, and a
//! failed render yields no bytes.

use std::{
    any::Any,
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::Once,
};

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    context::RenderContext,
    output::Output,
    template::{Template, TemplateError},
};

/// Why a render produced no page.
#[derive(Debug, Error)]
pub enum RenderFailure {
    /// A render was attempted while another one was active.
    #[error("cannot render `{0}` while another render is active")]
    Busy(String),

    /// The template returned an error.
    #[error("template `{template}` failed: {source}")]
    Template {
        template: String,
        #[source]
        source: TemplateError,
    },

    /// The template panicked.
    #[error("template `{template}` panicked: {message}")]
    Panicked { template: String, message: String },

    /// The template wrote nothing but whitespace.
    #[error("template `{template}` produced no output")]
    Empty { template: String },
}

/// A successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// Page bytes.
    pub html: String,
    /// Recoverable problems reported while rendering.
    pub notices: Vec<String>,
}

/// Runs templates against a shared [`Output`].
#[derive(Debug)]
pub struct Sandbox {
    output: Output,
    active: Cell<bool>,
}

struct ActiveGuard<'a>(&'a Cell<bool>);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

thread_local! {
    /// Set while a render runs on this thread; the panic hook stays silent.
    static QUIET_PANICS: Cell<bool> = const { Cell::new(false) };
}

static QUIET_HOOK: Once = Once::new();

/// Silences the panic hook on this thread until dropped. A template panic is
/// reported through the render failure, not on stderr.
struct QuietPanics(bool);

impl QuietPanics {
    fn enter() -> Self {
        QUIET_HOOK.call_once(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                if !QUIET_PANICS.with(Cell::get) {
                    previous(info);
                }
            }));
        });
        Self(QUIET_PANICS.replace(true))
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        QUIET_PANICS.set(self.0);
    }
}

fn panics_are_quiet() -> bool {
    QUIET_PANICS.with(Cell::get)
}

impl Sandbox {
    /// Create a sandbox writing through `output`.
    #[must_use]
    pub fn new(output: Output) -> Self {
        Self {
            output,
            active: Cell::new(false),
        }
    }

    /// Whether a render is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Render `template` against `context`.
    pub fn render(
        &self,
        template: &dyn Template,
        context: RenderContext<'_>,
    ) -> Result<Rendered, RenderFailure> {
        let name = template.name();
        if self.active.replace(true) {
            warn!(template = name, page = context.page_id(), "render rejected, sandbox busy");
            return Err(RenderFailure::Busy(name.to_string()));
        }
        let _active = ActiveGuard(&self.active);

        let mut capture = self.output.capture();
        debug!(
            template = name,
            page = context.page_id(),
            depth = capture.level(),
            "rendering"
        );

        let outcome = {
            let _quiet = QuietPanics::enter();
            panic::catch_unwind(AssertUnwindSafe(|| {
                template.render(&context, &mut capture)
            }))
        };

        let notices = context.take_notices();
        for notice in &notices {
            warn!(template = name, page = context.page_id(), %notice, "template notice");
        }

        match outcome {
            Ok(Ok(())) => {
                let html = capture.finish();
                if html.trim().is_empty() {
                    warn!(template = name, page = context.page_id(), "template produced no output");
                    return Err(RenderFailure::Empty {
                        template: name.to_string(),
                    });
                }
                Ok(Rendered { html, notices })
            }
            Ok(Err(source)) => {
                warn!(template = name, page = context.page_id(), error = %source, "template failed");
                Err(RenderFailure::Template {
                    template: name.to_string(),
                    source,
                })
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(template = name, page = context.page_id(), %message, "template panicked");
                Err(RenderFailure::Panicked {
                    template: name.to_string(),
                    message,
                })
            }
        }
        // `capture` drops here on the failure paths, discarding partial output.
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

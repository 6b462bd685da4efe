//! Process output with nested capture.
//!
//! [`Output`] is the channel page output travels through. Text echoed while
//! no capture is open passes straight to stdout; otherwise it lands in the
//! innermost open [`Capture`]. Each capture remembers the depth it was opened
//! at and, when finished or dropped, truncates the stack back to exactly that
//! depth. Levels opened above it and never closed are discarded with it, and
//! levels below it are never touched.

use std::{cell::RefCell, fmt, rc::Rc};

/// Shared handle to the capture stack.
#[derive(Debug, Clone, Default)]
pub struct Output {
    levels: Rc<RefCell<Vec<String>>>,
}

impl Output {
    /// Create an output with no capture open.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open captures.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.borrow().len()
    }

    /// Append text to the innermost capture, or to stdout when none is open.
    pub fn echo(&self, text: &str) {
        let mut levels = self.levels.borrow_mut();
        if let Some(top) = levels.last_mut() {
            top.push_str(text);
            return;
        }
        drop(levels);
        print!("{text}");
    }

    /// Open a new capture level.
    #[must_use = "dropping the capture immediately discards it"]
    pub fn capture(&self) -> Capture {
        let mut levels = self.levels.borrow_mut();
        let level = levels.len();
        levels.push(String::new());
        Capture {
            output: self.clone(),
            level,
        }
    }
}

/// One open capture level. Closing it restores the stack to the depth it was
/// opened at.
#[derive(Debug)]
pub struct Capture {
    output: Output,
    level: usize,
}

impl Capture {
    /// Depth of the stack below this capture.
    #[must_use]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Close the capture and return everything written to it.
    #[must_use]
    pub fn finish(self) -> String {
        let mut levels = self.output.levels.borrow_mut();
        let text = levels
            .get_mut(self.level)
            .map(std::mem::take)
            .unwrap_or_default();
        levels.truncate(self.level);
        text
        // `Drop` runs afterwards and finds nothing left to truncate.
    }
}

impl fmt::Write for Capture {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut levels = self.output.levels.borrow_mut();
        let buffer = levels.get_mut(self.level).ok_or(fmt::Error)?;
        buffer.push_str(s);
        Ok(())
    }
}

impl Drop for Capture {
    fn drop(&mut self) {
        if let Ok(mut levels) = self.output.levels.try_borrow_mut() {
            levels.truncate(self.level);
        }
    }
}

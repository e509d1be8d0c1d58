//! Per-resolution diagnostic trace.
//!
//! Each resolution owns its own `Trace`. Notes are indented by the current
//! nesting depth (sub-resolutions for `Uses` dependencies indent one level)
//! and mirrored as `tracing` events.

use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    lines: Vec<String>,
    depth: usize,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a trace with a single heading note.
    pub fn starting(heading: impl fmt::Display) -> Self {
        let mut trace = Trace::new();
        trace.note(heading);
        trace
    }

    pub fn note(&mut self, message: impl fmt::Display) {
        let line = format!("{:width$}{}", "", message, width = self.depth * 2);
        tracing::trace!(depth = self.depth, "{}", message);
        self.lines.push(line);
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", line)?;
        }
        Ok(())
    }
}

//! Append-only sequence of emitted lines.

use calcgen_types::LineSeparator;

#[derive(Debug, Clone, Default)]
pub struct TargetBuffer {
    lines: Vec<String>,
}

impl TargetBuffer {
    pub fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn push_line(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::trace!("emit {line}");
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Materialize the full program text.
    pub fn render(&self, separator: LineSeparator) -> String {
        self.lines.join(separator.as_str())
    }
}

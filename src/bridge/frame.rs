//! The single in-progress frame.

/// Identity of one frame: surface id plus sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameKey {
    pub surface_id: String,
    pub seq: u64,
}

/// Accumulates content lines for the one frame that may be open at a time.
///
/// Lines are kept verbatim in arrival order, blank lines included. The
/// rendered artifact is the lines joined with newlines plus a trailing
/// newline, so an empty buffer still renders as a single newline.
#[derive(Debug)]
pub struct FrameBuffer {
    key: FrameKey,
    lines: Vec<String>,
}

impl FrameBuffer {
    #[must_use]
    pub fn new(key: FrameKey) -> Self {
        Self {
            key,
            lines: Vec::new(),
        }
    }

    #[must_use]
    pub fn key(&self) -> &FrameKey {
        &self.key
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Render the accumulated content as artifact bytes.
    #[must_use]
    pub fn render(&self) -> String {
        let mut content = self.lines.join("\n");
        content.push('\n');
        content
    }
}

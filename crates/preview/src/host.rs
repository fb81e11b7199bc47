use playground_core::model::ProjectSource;
use tracing::debug;
use uuid::Uuid;

use crate::document::render_document;

/// Sandbox tokens for the preview frame. Scripts may run, but without
/// `allow-same-origin` the frame gets an opaque origin and cannot reach the
/// host page, its storage, or an earlier frame's globals.
pub const SANDBOX_POLICY: &str = "allow-scripts allow-modals";

/// One rendered preview. A frame is never updated in place; the next render
/// builds a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreviewFrame {
    id: Uuid,
    generation: u64,
    document: String,
}

impl PreviewFrame {
    fn new(generation: u64, document: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            generation,
            document,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 1 for the first render of a host, incremented per render.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    /// An `<iframe>` element that loads this frame's document in the sandbox.
    /// Only the attribute quoting is escaped; the document itself is passed
    /// through unchanged.
    pub fn to_iframe(&self) -> String {
        format!(
            "<iframe id=\"preview-{}\" sandbox=\"{}\" srcdoc=\"{}\"></iframe>",
            self.id.simple(),
            SANDBOX_POLICY,
            escape_attribute(&self.document)
        )
    }
}

/// Owns the single live preview frame and replaces it on every render.
#[derive(Debug, Default)]
pub struct PreviewHost {
    current: Option<PreviewFrame>,
    renders: u64,
}

impl PreviewHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard the current frame and load `source` into a fresh one.
    pub fn render(&mut self, source: &ProjectSource) -> &PreviewFrame {
        self.renders += 1;
        let frame = PreviewFrame::new(self.renders, render_document(source));
        if let Some(old) = self.current.take() {
            debug!(discarded = %old.id, generation = old.generation, "preview frame discarded");
        }
        debug!(frame = %frame.id, generation = frame.generation, "preview frame loaded");
        self.current.insert(frame)
    }

    pub fn current(&self) -> Option<&PreviewFrame> {
        self.current.as_ref()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

fn escape_attribute(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

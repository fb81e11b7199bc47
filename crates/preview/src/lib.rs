//! Live preview: building a standalone document from a project triple and
//! running it in a fresh, sandboxed frame each time.

pub mod document;
pub mod host;
pub mod scheduler;
pub mod state;

pub use crate::document::render_document;
pub use crate::host::{PreviewFrame, PreviewHost, SANDBOX_POLICY};
pub use crate::scheduler::{RenderScheduler, SchedulerError, DEFAULT_DEBOUNCE};
pub use crate::state::{EditorState, Pane};

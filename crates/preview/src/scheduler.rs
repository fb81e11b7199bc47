//! Debounced preview rendering.
//!
//! A single worker task owns the editor state and the preview host. Edits
//! rearm an idle timer; the preview is rebuilt only once the timer runs out,
//! or immediately on an explicit run or a project load. There is no
//! maximum wait: a steady stream of edits keeps postponing the render.

use std::{future, sync::Arc, time::Duration};

use playground_core::model::ProjectSource;
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    host::{PreviewFrame, PreviewHost},
    state::{EditorState, Pane},
};

/// Idle period after the last edit before the preview refreshes.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("preview worker has stopped")]
    Closed,
}

#[derive(Debug)]
enum Command {
    Edit { pane: Pane, text: String },
    SwitchTab(Pane),
    Load(ProjectSource),
    Reset,
    Run,
    Snapshot(oneshot::Sender<EditorState>),
}

/// Handle to the preview worker. Dropping it (or calling [`shutdown`]) stops
/// the worker; a pending debounced render is abandoned.
///
/// [`shutdown`]: RenderScheduler::shutdown
pub struct RenderScheduler {
    tx: mpsc::UnboundedSender<Command>,
    frames: watch::Receiver<Option<Arc<PreviewFrame>>>,
    cancel: CancellationToken,
}

impl RenderScheduler {
    /// Start the worker and render `state` once right away.
    pub fn spawn(state: EditorState, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (frame_tx, frames) = watch::channel(None);
        let cancel = CancellationToken::new();
        tokio::spawn(run_worker(state, debounce, rx, frame_tx, cancel.clone()));
        Self { tx, frames, cancel }
    }

    fn send(&self, cmd: Command) -> Result<(), SchedulerError> {
        self.tx.send(cmd).map_err(|_| SchedulerError::Closed)
    }

    /// Replace one buffer and (re)arm the debounce timer.
    pub fn edit(&self, pane: Pane, text: impl Into<String>) -> Result<(), SchedulerError> {
        self.send(Command::Edit {
            pane,
            text: text.into(),
        })
    }

    pub fn switch_tab(&self, pane: Pane) -> Result<(), SchedulerError> {
        self.send(Command::SwitchTab(pane))
    }

    /// Swap in a loaded project and render it immediately.
    pub fn load(&self, source: ProjectSource) -> Result<(), SchedulerError> {
        self.send(Command::Load(source))
    }

    /// Restore the starter project and render it immediately.
    pub fn reset(&self) -> Result<(), SchedulerError> {
        self.send(Command::Reset)
    }

    /// Render now, cancelling any pending debounced render.
    pub fn run(&self) -> Result<(), SchedulerError> {
        self.send(Command::Run)
    }

    /// Current editor state, after every command sent before this call.
    pub async fn snapshot(&self) -> Result<EditorState, SchedulerError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot(reply))?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    /// Receiver that observes every newly loaded frame.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PreviewFrame>>> {
        self.frames.clone()
    }

    pub fn latest(&self) -> Option<Arc<PreviewFrame>> {
        self.frames.borrow().clone()
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    mut state: EditorState,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
    frames: watch::Sender<Option<Arc<PreviewFrame>>>,
    cancel: CancellationToken,
) {
    let mut host = PreviewHost::new();
    let publish = |host: &mut PreviewHost, state: &EditorState| {
        let frame = Arc::new(host.render(state.source()).clone());
        frames.send_replace(Some(frame));
    };
    publish(&mut host, &state);

    let mut deadline: Option<Instant> = None;
    loop {
        let idle = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("preview worker received cancellation signal");
                break;
            }
            cmd = rx.recv() => match cmd {
                Some(Command::Edit { pane, text }) => {
                    state.set_buffer(pane, text);
                    if deadline.is_some() {
                        debug!(%pane, "pending preview render rescheduled");
                    }
                    deadline = Some(Instant::now() + debounce);
                }
                Some(Command::SwitchTab(pane)) => state.switch_tab(pane),
                Some(Command::Load(source)) => {
                    state.replace(source);
                    deadline = None;
                    publish(&mut host, &state);
                }
                Some(Command::Reset) => {
                    state.reset();
                    deadline = None;
                    publish(&mut host, &state);
                }
                Some(Command::Run) => {
                    deadline = None;
                    publish(&mut host, &state);
                }
                Some(Command::Snapshot(reply)) => {
                    let _ = reply.send(state.clone());
                }
                None => {
                    info!("preview command channel closed, worker exiting");
                    break;
                }
            },
            () = idle => {
                deadline = None;
                publish(&mut host, &state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn generation(scheduler: &RenderScheduler) -> u64 {
        scheduler.latest().map(|f| f.generation()).unwrap_or(0)
    }

    async fn settle() {
        // let the worker drain its queue without advancing the paused clock
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn renders_once_on_spawn() {
        let scheduler = RenderScheduler::spawn(EditorState::starter(), DEFAULT_DEBOUNCE);
        settle().await;
        let frame = scheduler.latest().expect("initial frame");
        assert_eq!(frame.generation(), 1);
        assert!(frame.document().contains("Welcome to Code Playground!"));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_coalesces_into_one_render() {
        let scheduler =
            RenderScheduler::spawn(EditorState::from_source(ProjectSource::default()), DEFAULT_DEBOUNCE);
        settle().await;
        assert_eq!(generation(&scheduler), 1);

        for n in 1..=5 {
            scheduler.edit(Pane::Html, format!("<p>edit {n}</p>")).unwrap();
            sleep(Duration::from_millis(300)).await;
        }
        // 1.5s of editing, but never 1s idle: still the initial frame
        assert_eq!(generation(&scheduler), 1);

        sleep(DEFAULT_DEBOUNCE).await;
        settle().await;
        let frame = scheduler.latest().unwrap();
        assert_eq!(frame.generation(), 2);
        assert!(frame.document().contains("<p>edit 5</p>"));

        sleep(DEFAULT_DEBOUNCE * 3).await;
        assert_eq!(generation(&scheduler), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_across_panes_share_one_timer() {
        let scheduler =
            RenderScheduler::spawn(EditorState::from_source(ProjectSource::default()), DEFAULT_DEBOUNCE);
        scheduler.edit(Pane::Html, "<p>m</p>").unwrap();
        sleep(Duration::from_millis(500)).await;
        scheduler.edit(Pane::Css, "p{}").unwrap();
        sleep(Duration::from_millis(500)).await;
        scheduler.edit(Pane::Js, "1;").unwrap();
        sleep(Duration::from_millis(1100)).await;
        settle().await;

        let frame = scheduler.latest().unwrap();
        assert_eq!(frame.generation(), 2);
        assert!(frame.document().contains("<style>p{}</style>"));
        assert!(frame.document().contains("<script>1;</script>"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_renders_immediately_and_cancels_pending() {
        let scheduler =
            RenderScheduler::spawn(EditorState::from_source(ProjectSource::default()), DEFAULT_DEBOUNCE);
        scheduler.edit(Pane::Js, "let x = 1;").unwrap();
        scheduler.run().unwrap();
        settle().await;
        assert_eq!(generation(&scheduler), 2);

        sleep(DEFAULT_DEBOUNCE * 2).await;
        settle().await;
        assert_eq!(generation(&scheduler), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn load_replaces_buffers_and_renders() {
        let scheduler = RenderScheduler::spawn(EditorState::starter(), DEFAULT_DEBOUNCE);
        scheduler.switch_tab(Pane::Css).unwrap();
        scheduler
            .load(ProjectSource::new("<i>loaded</i>", "", ""))
            .unwrap();
        let state = scheduler.snapshot().await.unwrap();
        assert_eq!(state.buffer(Pane::Html), "<i>loaded</i>");
        assert_eq!(state.active(), Pane::Css);
        assert!(scheduler.latest().unwrap().document().contains("<i>loaded</i>"));

        scheduler.reset().unwrap();
        let state = scheduler.snapshot().await.unwrap();
        assert_eq!(state.source(), EditorState::starter().source());
        assert_eq!(generation(&scheduler), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_each_new_frame() {
        let scheduler =
            RenderScheduler::spawn(EditorState::from_source(ProjectSource::default()), DEFAULT_DEBOUNCE);
        let mut frames = scheduler.subscribe();
        frames.changed().await.unwrap();
        let first = frames.borrow_and_update().clone().unwrap();

        scheduler.edit(Pane::Html, "<p>next</p>").unwrap();
        frames.changed().await.unwrap();
        let second = frames.borrow_and_update().clone().unwrap();
        assert_ne!(first.id(), second.id());
        assert!(second.document().contains("<p>next</p>"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_closes_the_worker() {
        let scheduler = RenderScheduler::spawn(EditorState::starter(), DEFAULT_DEBOUNCE);
        scheduler.shutdown();
        settle().await;
        assert!(matches!(scheduler.edit(Pane::Html, "x"), Err(SchedulerError::Closed)));
        assert!(matches!(scheduler.snapshot().await, Err(SchedulerError::Closed)));
    }
}

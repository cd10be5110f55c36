//! Change pipeline.
//!
//! Owns the path from watcher callbacks to the client registry: change
//! events arrive over a channel, are coalesced, and each closed window
//! becomes one reload broadcast.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use tokio::sync::mpsc;

use hotpage_watch::{ChangeCoalescer, ChangeEvent, ChangeKind, CoalescedSignal};

use super::registry::{ClientRegistry, ReloadMessage};

/// Change events buffered between watcher threads and the pipeline task.
const CHANGE_BUFFER: usize = 100;

/// Create the channel feeding the pipeline.
pub(crate) fn channel() -> (mpsc::Sender<ChangeEvent>, mpsc::Receiver<ChangeEvent>) {
    mpsc::channel(CHANGE_BUFFER)
}

/// Wrap a sender into a watcher sink.
///
/// Sinks run on notify backend threads, outside the runtime, so they may
/// block on a full channel.
pub(crate) fn sink(tx: mpsc::Sender<ChangeEvent>) -> impl Fn(ChangeEvent) + Clone + Send + 'static {
    move |change| {
        // Closed only when the pipeline stopped
        let _ = tx.blocking_send(change);
    }
}

/// Coalesces change events and broadcasts reloads.
pub(crate) struct ChangePipeline {
    coalescer: ChangeCoalescer,
    registry: ClientRegistry,
    quiet: bool,
    /// Last seen content digest per file, when content checking is on.
    digests: Option<HashMap<PathBuf, String>>,
}

impl ChangePipeline {
    pub(crate) fn new(
        coalescer: ChangeCoalescer,
        registry: ClientRegistry,
        quiet: bool,
        content_check: bool,
    ) -> Self {
        Self {
            coalescer,
            registry,
            quiet,
            digests: content_check.then(HashMap::new),
        }
    }

    /// Run until every sender is gone.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<ChangeEvent>) {
        loop {
            let deadline = self.coalescer.next_deadline();

            tokio::select! {
                change = rx.recv() => match change {
                    Some(change) => self.record(change).await,
                    None => break,
                },
                () = sleep_until(deadline) => {
                    if let Some(signal) = self.coalescer.drain_ready() {
                        self.emit(&signal);
                    }
                }
            }
        }

        tracing::debug!("Change pipeline stopped");
    }

    async fn record(&mut self, change: ChangeEvent) {
        if self.is_unchanged(&change).await {
            tracing::trace!(path = %change.full_path.display(), "Content unchanged, skipping");
            return;
        }
        tracing::debug!(
            path = %change.full_path.display(),
            kind = %change.kind,
            "Recorded change"
        );
        self.coalescer.record(change);
    }

    /// Returns true when content checking is on and the file bytes match
    /// the last recorded digest.
    async fn is_unchanged(&mut self, change: &ChangeEvent) -> bool {
        let Some(digests) = self.digests.as_mut() else {
            return false;
        };

        match change.kind {
            ChangeKind::Changed => {}
            ChangeKind::Removed => {
                digests.remove(&change.full_path);
                return false;
            }
            ChangeKind::Unknown => return false,
        }

        let Some(digest) = content_digest(&change.full_path).await else {
            digests.remove(&change.full_path);
            return false;
        };
        let previous = digests.insert(change.full_path.clone(), digest.clone());
        previous.is_some_and(|previous| previous == digest)
    }

    fn emit(&self, signal: &CoalescedSignal) {
        if !self.quiet {
            match signal.kind {
                ChangeKind::Removed => {
                    tracing::info!(path = %signal.label.display(), "File removed");
                }
                ChangeKind::Changed | ChangeKind::Unknown => {
                    tracing::info!(path = %signal.label.display(), "File changed");
                }
            }
        }

        let report = self.registry.broadcast(ReloadMessage::Reload);
        tracing::debug!(
            absorbed = signal.absorbed,
            delivered = report.delivered,
            dropped = report.dropped,
            "Reload broadcast"
        );
    }
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// MD5 of the file contents, or `None` if the file cannot be read.
async fn content_digest(path: &Path) -> Option<String> {
    let bytes = tokio::fs::read(path).await.ok()?;
    Some(hex::encode(Md5::digest(&bytes)))
}

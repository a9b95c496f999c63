use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::AbortHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Dht,
    Tracker,
}

/// Tears down one listener. Runs at most once, either through
/// [`Disposer::dispose`] or on drop.
#[derive(Debug)]
pub struct Disposer {
    handle: Option<AbortHandle>,
}

impl Disposer {
    fn new(handle: AbortHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Debug)]
struct Subscription {
    source: Source,
    event: &'static str,
    disposer: Disposer,
}

/// Every listener the coordinator attached to a backend, in attach order
#[derive(Debug, Default)]
pub struct Subscriptions {
    records: Vec<Subscription>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every event from `rx` to `handler` until disposed or the
    /// backend drops its sender.
    pub fn listen<E, F>(
        &mut self,
        source: Source,
        event: &'static str,
        mut rx: broadcast::Receiver<E>,
        mut handler: F,
    ) where
        E: Clone + Send + 'static,
        F: FnMut(E) + Send + 'static,
    {
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(e) => handler(e),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(?source, event, skipped, "listener lagged behind backend");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.records.push(Subscription {
            source,
            event,
            disposer: Disposer::new(task.abort_handle()),
        });
    }

    /// Dispose every listener attached to `source`
    pub fn dispose_source(&mut self, source: Source) -> usize {
        let (gone, kept): (Vec<_>, Vec<_>) = self
            .records
            .drain(..)
            .partition(|record| record.source == source);
        self.records = kept;
        Self::dispose(gone)
    }

    pub fn dispose_all(&mut self) -> usize {
        let gone: Vec<_> = self.records.drain(..).collect();
        Self::dispose(gone)
    }

    fn dispose(records: Vec<Subscription>) -> usize {
        let count = records.len();
        for record in records {
            tracing::trace!(source = ?record.source, event = record.event, "disposing listener");
            record.disposer.dispose();
        }
        count
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `(source, event)` pairs currently attached, in attach order
    pub fn attached(&self) -> Vec<(Source, &'static str)> {
        self.records.iter().map(|r| (r.source, r.event)).collect()
    }
}

use crate::StatusRecord;
use tokio::sync::mpsc;

/// Producer half of a bounded status feed.
///
/// A full buffer suspends (or blocks) the producer; records are never
/// dropped while the receiver is alive. Every record sent through a sender
/// created with [`for_path`](Self::for_path) is stamped with that path.
#[derive(Debug, Clone)]
pub struct StatusSender {
    tx: mpsc::Sender<StatusRecord>,
    path: Option<String>,
}

pub type StatusReceiver = mpsc::Receiver<StatusRecord>;

pub fn channel(bound: usize) -> (StatusSender, StatusReceiver) {
    let (tx, rx) = mpsc::channel(bound.max(1));
    (StatusSender { tx, path: None }, rx)
}

impl StatusSender {
    #[must_use]
    pub fn for_path(&self, path: impl Into<String>) -> Self {
        Self {
            tx: self.tx.clone(),
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    fn stamp(&self, mut record: StatusRecord) -> StatusRecord {
        if record.path.is_none() {
            record.path.clone_from(&self.path);
        }
        record
    }

    pub async fn send(&self, record: StatusRecord) {
        if self.tx.send(self.stamp(record)).await.is_err() {
            tracing::trace!(path = ?self.path, "status receiver gone");
        }
    }

    /// For synchronous producers. Must not be called from async context.
    pub fn blocking_send(&self, record: StatusRecord) {
        if self.tx.blocking_send(self.stamp(record)).is_err() {
            tracing::trace!(path = ?self.path, "status receiver gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_are_stamped_with_path() {
        let (tx, mut rx) = channel(4);
        let scoped = tx.for_path("a.bin");
        scoped.send(StatusRecord::done()).await;
        tx.send(StatusRecord::done().with_path("b.bin")).await;

        assert_eq!(rx.recv().await.unwrap().path.as_deref(), Some("a.bin"));
        assert_eq!(rx.recv().await.unwrap().path.as_deref(), Some("b.bin"));
    }

    #[tokio::test]
    async fn test_blocking_send_from_blocking_thread() {
        let (tx, mut rx) = channel(1);
        let handle = tokio::task::spawn_blocking(move || {
            tx.blocking_send(StatusRecord::progress(1, None));
            tx.blocking_send(StatusRecord::done());
        });

        assert_eq!(rx.recv().await.unwrap().done, Some(1));
        assert!(rx.recv().await.unwrap().is_terminal());
        handle.await.unwrap();
    }
}

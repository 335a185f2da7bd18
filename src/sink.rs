//! Fire-and-forget trace lines for whoever is watching (UI, log).

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

#[derive(Clone)]
pub struct EventSink {
    tx: SyncSender<String>,
}

impl EventSink {
    /// Bounded sink plus the receiving end for the observer.
    pub fn bounded(capacity: usize) -> (Self, Receiver<String>) {
        let (tx, rx) = sync_channel(capacity);
        (Self { tx }, rx)
    }

    /// Never blocks: a full queue or a gone observer drops the line.
    pub fn emit(&self, line: impl ToString) {
        self.tx.try_send(line.to_string()).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (sink, rx) = EventSink::bounded(1);
        sink.emit("first");
        sink.emit("second");
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["first".to_string()]);
    }

    #[test]
    fn gone_observer_is_ignored() {
        let (sink, rx) = EventSink::bounded(4);
        drop(rx);
        sink.emit("nobody listens");
    }
}

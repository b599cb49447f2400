use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

/// Unbounded multi-producer FIFO.
///
/// Any number of threads may `enqueue` at once, including while a drain is
/// pulling items out with `try_dequeue`. Items from one producer come out in
/// the order that producer pushed them.
pub struct EventQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    pub fn enqueue(&self, item: T) {
        // The receiver lives as long as `self`, so the channel cannot be disconnected.
        if self.tx.send(item).is_err() {
            tracing::error!("Event queue disconnected, dropping item");
        }
    }

    /// Removes and returns the head, or `None` if the queue is empty.
    pub fn try_dequeue(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Snapshot of the queue depth; may be stale as soon as it is read.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

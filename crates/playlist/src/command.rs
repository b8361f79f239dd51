use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// A request from the control channel to the manager.
///
/// `Status` never appears here; it is served synchronously by the control
/// adapter from a live snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Stop,
    Next,
    Load(Vec<PathBuf>),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue is at capacity; the caller should retry.
    #[error("command queue is full")]
    Full,
}

struct Shared {
    queue: Mutex<VecDeque<Command>>,
    capacity: usize,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Command>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Producer half, held by the control adapter. Cloneable; enqueueing never
/// blocks.
#[derive(Clone)]
pub struct CommandSender {
    shared: Arc<Shared>,
}

impl CommandSender {
    pub fn send(&self, command: Command) -> Result<(), EnqueueError> {
        let mut queue = self.shared.lock();
        if queue.len() >= self.shared.capacity {
            return Err(EnqueueError::Full);
        }
        queue.push_back(command);
        Ok(())
    }
}

/// Consumer half, owned by the manager. Inspection is non-blocking.
pub struct CommandReceiver {
    shared: Arc<Shared>,
}

impl CommandReceiver {
    pub fn try_next(&self) -> Option<Command> {
        self.shared.lock().pop_front()
    }

    /// True when the next pending command is `Stop`; used by the reconnect
    /// loop so `Next`/`Load` keep their queue position across a reconnect.
    pub fn stop_pending(&self) -> bool {
        matches!(self.shared.lock().front(), Some(Command::Stop))
    }
}

/// A bounded, thread-safe command queue. `capacity` must be at least 1.
pub fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::new()),
        capacity: capacity.max(1),
    });
    (
        CommandSender {
            shared: Arc::clone(&shared),
        },
        CommandReceiver { shared },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_observe_submission_order() {
        let (tx, rx) = command_queue(4);
        tx.send(Command::Next).unwrap();
        tx.send(Command::Load(vec![PathBuf::from("/a.png")])).unwrap();
        tx.send(Command::Stop).unwrap();
        assert_eq!(rx.try_next(), Some(Command::Next));
        assert!(matches!(rx.try_next(), Some(Command::Load(_))));
        assert_eq!(rx.try_next(), Some(Command::Stop));
        assert_eq!(rx.try_next(), None);
    }

    #[test]
    fn full_queue_rejects_with_retry() {
        let (tx, rx) = command_queue(1);
        tx.send(Command::Next).unwrap();
        assert_eq!(tx.send(Command::Stop), Err(EnqueueError::Full));
        assert_eq!(rx.try_next(), Some(Command::Next));
        tx.send(Command::Stop).unwrap();
    }

    #[test]
    fn stop_pending_only_peeks() {
        let (tx, rx) = command_queue(2);
        assert!(!rx.stop_pending());
        tx.send(Command::Next).unwrap();
        assert!(!rx.stop_pending());
        assert_eq!(rx.try_next(), Some(Command::Next));
        tx.send(Command::Stop).unwrap();
        assert!(rx.stop_pending());
        // Peeking did not consume it.
        assert_eq!(rx.try_next(), Some(Command::Stop));
    }
}

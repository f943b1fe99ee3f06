//! Retransmission timer
//!
//! A background thread holding one-shot deadlines. When a deadline passes,
//! its key is posted onto the owner's event channel; the timer never touches
//! session state itself, so the session worker stays the only writer.
//!
//! Deadlines cannot be cancelled. A timer that fires for a packet that has
//! since been acknowledged is expected to be ignored by the receiver of the
//! event.

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::trace;

enum Command<K> {
    Arm { key: K, deadline: Instant },
    Shutdown,
}

struct Entry<K> {
    deadline: Instant,
    /// Insertion order, breaks ties between equal deadlines
    order: u64,
    key: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.order == other.order
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    // Reversed: BinaryHeap is a max-heap, the earliest deadline must be on top
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Handle to a running timer thread
///
/// Dropping the handle stops the thread; pending deadlines are discarded.
pub struct RetransmitTimer<K> {
    commands: Sender<Command<K>>,
    thread: Option<JoinHandle<()>>,
}

impl<K: Send + 'static> RetransmitTimer<K> {
    /// Start a timer thread that posts expired keys to `events`
    pub fn spawn<E>(events: Sender<E>) -> io::Result<Self>
    where
        E: From<K> + Send + 'static,
    {
        let (commands, rx) = channel::unbounded::<Command<K>>();

        let thread = thread::Builder::new()
            .name("rft-timer".to_string())
            .spawn(move || {
                let mut heap: BinaryHeap<Entry<K>> = BinaryHeap::new();
                let mut order = 0u64;

                loop {
                    let command = match heap.peek() {
                        Some(next) => rx.recv_deadline(next.deadline),
                        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match command {
                        Ok(Command::Arm { key, deadline }) => {
                            heap.push(Entry {
                                deadline,
                                order,
                                key,
                            });
                            order += 1;
                        }
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }

                    let now = Instant::now();
                    while heap.peek().map_or(false, |next| next.deadline <= now) {
                        if let Some(expired) = heap.pop() {
                            trace!("Retransmission deadline expired");
                            if events.send(E::from(expired.key)).is_err() {
                                // Nobody is listening any more
                                return;
                            }
                        }
                    }
                }
            })?;

        Ok(RetransmitTimer {
            commands,
            thread: Some(thread),
        })
    }

    /// Schedule `key` to be posted at `deadline`
    ///
    /// Returns `false` if the timer thread has stopped.
    pub fn arm(&self, key: K, deadline: Instant) -> bool {
        self.commands.send(Command::Arm { key, deadline }).is_ok()
    }

    /// Schedule `key` to be posted after `timeout`
    pub fn arm_after(&self, key: K, timeout: Duration) -> bool {
        self.arm(key, Instant::now() + timeout)
    }
}

impl<K> Drop for RetransmitTimer<K> {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

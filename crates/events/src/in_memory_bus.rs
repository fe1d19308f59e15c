//! In-process bus: broadcast to live subscribers plus a bounded journal of the
//! most recent envelopes, so a late subscriber can catch up.

use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, Subscription};

/// Envelopes kept by [`InMemoryEventBus::new`].
pub const DEFAULT_JOURNAL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum InMemoryBusError {
    Poisoned,
}

#[derive(Debug)]
struct BusState<M> {
    subscribers: Vec<mpsc::Sender<M>>,
    journal: VecDeque<M>,
}

#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    state: Mutex<BusState<M>>,
    journal_capacity: usize,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::with_journal_capacity(DEFAULT_JOURNAL_CAPACITY)
    }

    /// A capacity of zero disables the journal.
    pub fn with_journal_capacity(journal_capacity: usize) -> Self {
        Self {
            state: Mutex::new(BusState {
                subscribers: Vec::new(),
                journal: VecDeque::with_capacity(journal_capacity.min(DEFAULT_JOURNAL_CAPACITY)),
            }),
            journal_capacity,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().map(|s| s.subscribers.len()).unwrap_or(0)
    }
}

impl<M: Clone> InMemoryEventBus<M> {
    /// Journaled envelopes, oldest first.
    pub fn journal(&self) -> Vec<M> {
        self.state
            .lock()
            .map(|s| s.journal.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Subscribe and receive the journal first. Replay and registration
    /// happen under one lock, so nothing is missed or seen twice.
    pub fn subscribe_with_replay(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut state) = self.state.lock() {
            let replayed = state.journal.iter().all(|m| tx.send(m.clone()).is_ok());
            if replayed {
                state.subscribers.push(tx);
            }
        }
        Subscription::new(rx)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut state = self.state.lock().map_err(|_| InMemoryBusError::Poisoned)?;

        state.subscribers.retain(|tx| tx.send(message.clone()).is_ok());

        if self.journal_capacity > 0 {
            if state.journal.len() == self.journal_capacity {
                state.journal.pop_front();
            }
            state.journal.push_back(message);
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();
        // Poisoned: the subscription simply never receives.
        if let Ok(mut state) = self.state.lock() {
            state.subscribers.push(tx);
        }
        Subscription::new(rx)
    }
}

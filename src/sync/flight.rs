use std::collections::HashMap;
use std::hash::Hash;

/// Observable per-key sync phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyPhase {
    /// Nothing scheduled or running.
    Idle,
    /// A debounce timer is armed.
    Pending,
    /// One request is outstanding.
    InFlight,
    /// A request is outstanding and another write will follow it.
    Queued,
}

#[derive(Clone, Copy, Debug)]
struct Flight {
    epoch: u64,
    queued: bool,
}

/// At most one outstanding request per key.
///
/// A second persist for a busy key only sets `queued`; the owner replays it
/// when the running request finishes. Each flight carries an epoch so a
/// completion for a key that was forgotten meanwhile is recognised as stale.
#[derive(Debug)]
pub(crate) struct SingleFlight<K> {
    next_epoch: u64,
    flights: HashMap<K, Flight>,
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new() -> Self {
        Self {
            next_epoch: 0,
            flights: HashMap::new(),
        }
    }

    /// Mark a busy key for replay. `false` if nothing is running for it.
    pub fn mark_queued(&mut self, key: &K) -> bool {
        match self.flights.get_mut(key) {
            Some(flight) => {
                flight.queued = true;
                true
            }
            None => false,
        }
    }

    /// Drop a pending replay but keep the running request tracked.
    pub fn clear_queued(&mut self, key: &K) {
        if let Some(flight) = self.flights.get_mut(key) {
            flight.queued = false;
        }
    }

    pub fn begin(&mut self, key: K) -> u64 {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.flights.insert(
            key,
            Flight {
                epoch,
                queued: false,
            },
        );
        epoch
    }

    /// End the flight started with `epoch`. Returns whether a replay was
    /// queued, or `None` if the flight was forgotten in the meantime.
    pub fn finish(&mut self, key: &K, epoch: u64) -> Option<bool> {
        match self.flights.get(key) {
            Some(flight) if flight.epoch == epoch => {
                let queued = flight.queued;
                self.flights.remove(key);
                Some(queued)
            }
            _ => None,
        }
    }

    pub fn forget(&mut self, key: &K) {
        self.flights.remove(key);
    }

    pub fn clear(&mut self) {
        self.flights.clear();
    }

    pub fn phase(&self, key: &K, timer_pending: bool) -> KeyPhase {
        match self.flights.get(key) {
            Some(flight) if flight.queued => KeyPhase::Queued,
            Some(_) => KeyPhase::InFlight,
            None if timer_pending => KeyPhase::Pending,
            None => KeyPhase::Idle,
        }
    }
}

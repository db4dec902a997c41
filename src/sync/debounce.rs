use super::runtime::Runtime;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;
use std::time::Duration;

struct TimerTable<K> {
    next_ticket: u64,
    armed: HashMap<K, u64>,
}

/// Debounce timers keyed by `K`.
///
/// Every `reset` hands out a fresh ticket; a sleeping timer only fires if its
/// ticket is still the armed one, so a superseded, cancelled or cleared timer
/// can never run its callback. The callback always re-reads state when it
/// fires; nothing is captured at arm time except the key.
pub(crate) struct DebounceTimers<K> {
    runtime: Rc<dyn Runtime>,
    table: Rc<RefCell<TimerTable<K>>>,
}

impl<K> Clone for DebounceTimers<K> {
    fn clone(&self) -> Self {
        Self {
            runtime: Rc::clone(&self.runtime),
            table: Rc::clone(&self.table),
        }
    }
}

impl<K: Eq + Hash + Clone + 'static> DebounceTimers<K> {
    pub fn new(runtime: Rc<dyn Runtime>) -> Self {
        Self {
            runtime,
            table: Rc::new(RefCell::new(TimerTable {
                next_ticket: 0,
                armed: HashMap::new(),
            })),
        }
    }

    /// (Re)start the timer for `key`; any earlier timer for it is superseded.
    pub fn reset(&self, key: K, delay: Duration, fire: impl FnOnce() + 'static) {
        let ticket = {
            let mut table = self.table.borrow_mut();
            table.next_ticket += 1;
            let ticket = table.next_ticket;
            table.armed.insert(key.clone(), ticket);
            ticket
        };

        let table = Rc::clone(&self.table);
        let sleep = self.runtime.sleep(delay);
        self.runtime.spawn(Box::pin(async move {
            sleep.await;
            let due = {
                let mut table = table.borrow_mut();
                if table.armed.get(&key) == Some(&ticket) {
                    table.armed.remove(&key);
                    true
                } else {
                    false
                }
            };
            if due {
                fire();
            }
        }));
    }

    pub fn cancel(&self, key: &K) -> bool {
        self.table.borrow_mut().armed.remove(key).is_some()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.table.borrow().armed.contains_key(key)
    }

    pub fn clear(&self) {
        self.table.borrow_mut().armed.clear();
    }
}

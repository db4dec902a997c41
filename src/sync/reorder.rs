use super::debounce::DebounceTimers;
use super::flight::{KeyPhase, SingleFlight};
use super::save_status::WriteToken;
use super::SyncContext;
use crate::api::ApiResult;
use crate::items;
use crate::models::Item;
use crate::state::NoticeLevel;
use leptos::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// The acknowledged order plus items created while it was in flight.
///
/// `baseline` is the synced order when the request went out; ids in `synced`
/// that it lacks joined through `track_created` and keep their slot.
fn merge_created(sent: Vec<String>, baseline: &[String], synced: &[String]) -> Vec<String> {
    let mut merged = sent;
    for (index, id) in synced.iter().enumerate() {
        if baseline.contains(id) || merged.contains(id) {
            continue;
        }
        merged.insert(index.min(merged.len()), id.clone());
    }
    merged
}

struct OrderState {
    synced: Vec<String>,
    flights: SingleFlight<()>,
}

/// Collection-wide order persistence.
///
/// Drag bursts collapse into one `reorder_items` call with the full id list.
/// Order is one resource: a rejected reorder resets the whole list to the
/// last-synced order.
#[derive(Clone)]
pub(crate) struct ReorderScheduler {
    ctx: SyncContext,
    timers: DebounceTimers<()>,
    state: Rc<RefCell<OrderState>>,
}

impl ReorderScheduler {
    pub fn new(ctx: SyncContext) -> Self {
        let timers = DebounceTimers::new(Rc::clone(&ctx.runtime));
        Self {
            ctx,
            timers,
            state: Rc::new(RefCell::new(OrderState {
                synced: Vec::new(),
                flights: SingleFlight::new(),
            })),
        }
    }

    pub fn seed(&self, items: &[Item]) {
        self.state.borrow_mut().synced = items::ids(items);
    }

    pub fn synced_order(&self) -> Vec<String> {
        self.state.borrow().synced.clone()
    }

    pub fn schedule(&self) {
        let this = self.clone();
        self.timers
            .reset((), self.ctx.config.reorder_debounce, move || this.persist());
    }

    pub fn persist(&self) {
        if !self.ctx.is_alive() {
            return;
        }
        if self.state.borrow_mut().flights.mark_queued(&()) {
            log::debug!("reorder queued behind the running request");
            return;
        }

        let order = self.ctx.page.items.with_untracked(|items| items::ids(items));
        if order == self.state.borrow().synced {
            log::debug!("order unchanged since last save");
            return;
        }

        let (epoch, baseline) = {
            let mut state = self.state.borrow_mut();
            (state.flights.begin(()), state.synced.clone())
        };
        let token = self.ctx.save_status.begin_write();
        let api = Rc::clone(&self.ctx.api);
        let this = self.clone();
        self.ctx.spawn(async move {
            let result = api.reorder_items(&order).await;
            this.complete(epoch, order, baseline, result, token);
        });
    }

    fn complete(
        &self,
        epoch: u64,
        sent: Vec<String>,
        baseline: Vec<String>,
        result: ApiResult<()>,
        token: WriteToken,
    ) {
        if !self.ctx.save_status.is_live(&token) {
            return;
        }
        let Some(queued) = self.state.borrow_mut().flights.finish(&(), epoch) else {
            self.ctx.save_status.end_write(token, result.is_ok());
            return;
        };

        let success = match result {
            Ok(()) => {
                let mut state = self.state.borrow_mut();
                let merged = merge_created(sent, &baseline, &state.synced);
                state.synced = merged;
                true
            }
            Err(e) => {
                log::warn!("reorder failed, restoring last saved order: {e}");
                let synced = self.synced_order();
                self.ctx
                    .page
                    .mutate_items(|items| items::align_to_order(items, &synced));
                self.ctx
                    .page
                    .notices
                    .push(NoticeLevel::Error, format!("Could not save the new order: {e}"));
                false
            }
        };

        if queued {
            self.persist();
        }
        self.ctx.save_status.end_write(token, success);
    }

    /// A server-created item joined the order at `index`.
    pub fn track_created(&self, id: &str, index: usize) {
        let mut state = self.state.borrow_mut();
        if state.synced.iter().any(|x| x == id) {
            return;
        }
        let index = index.min(state.synced.len());
        state.synced.insert(index, id.to_string());
    }

    /// The server confirmed a delete; the id leaves the baseline.
    pub fn forget_item(&self, id: &str) {
        self.state.borrow_mut().synced.retain(|x| x != id);
    }

    pub fn phase(&self) -> KeyPhase {
        let pending = self.timers.is_pending(&());
        self.state.borrow().flights.phase(&(), pending)
    }

    pub fn dispose(&self) {
        self.timers.clear();
        let mut state = self.state.borrow_mut();
        state.flights.clear();
        state.synced.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_ack_keeps_items_created_meanwhile() {
        let merged = merge_created(
            ids(&["c", "a", "b"]),
            &ids(&["a", "b", "c"]),
            &ids(&["a", "b", "c", "new"]),
        );
        assert_eq!(merged, ids(&["c", "a", "b", "new"]));

        let merged = merge_created(ids(&["b", "a"]), &ids(&["a", "b"]), &ids(&["new", "a", "b"]));
        assert_eq!(merged, ids(&["new", "b", "a"]));
    }

    #[test]
    fn test_ack_without_creates_is_the_sent_order() {
        let synced = ids(&["a", "b", "gone"]);
        let merged = merge_created(ids(&["b", "a"]), &synced, &synced);
        assert_eq!(merged, ids(&["b", "a"]));
    }
}

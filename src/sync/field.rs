use super::debounce::DebounceTimers;
use super::flight::{KeyPhase, SingleFlight};
use super::save_status::WriteToken;
use super::SyncContext;
use crate::api::{ApiResult, PatchOutcome};
use crate::config::SyncConfig;
use crate::items;
use crate::models::{Item, ItemSize, PatchPayload};
use crate::state::NoticeLevel;
use crate::util::is_blank;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::rc::Rc;
use std::time::Duration;

/// One independently autosaved field of an item.
pub(crate) trait ItemField: 'static {
    type Value: Clone + PartialEq + Debug + 'static;

    /// Used in log lines and notices.
    const LABEL: &'static str;

    /// `None` when the item has no such field (wrong type).
    fn read(item: &Item) -> Option<Self::Value>;

    fn write(items: &mut [Item], id: &str, value: &Self::Value) -> bool;

    fn payload(value: &Self::Value) -> PatchPayload;

    /// `None` persists on every change.
    fn debounce(config: &SyncConfig) -> Option<Duration>;

    fn is_persistable(_value: &Self::Value) -> bool {
        true
    }

    /// The value the server actually stored for `sent`.
    fn acknowledged(sent: &Self::Value, _server: &Item) -> Self::Value {
        sent.clone()
    }
}

pub(crate) struct MemoContent;

impl ItemField for MemoContent {
    type Value = String;
    const LABEL: &'static str = "content";

    fn read(item: &Item) -> Option<String> {
        item.memo_content().map(str::to_string)
    }

    fn write(items: &mut [Item], id: &str, value: &String) -> bool {
        items::update_memo_content(items, id, value)
    }

    fn payload(value: &String) -> PatchPayload {
        PatchPayload::Memo {
            content: value.clone(),
        }
    }

    fn debounce(config: &SyncConfig) -> Option<Duration> {
        Some(config.text_debounce)
    }

    // The server requires a non-empty body.
    fn is_persistable(value: &String) -> bool {
        !is_blank(value)
    }
}

pub(crate) struct LinkTitle;

impl ItemField for LinkTitle {
    type Value = String;
    const LABEL: &'static str = "title";

    fn read(item: &Item) -> Option<String> {
        item.link_title().map(str::to_string)
    }

    fn write(items: &mut [Item], id: &str, value: &String) -> bool {
        items::update_link_title(items, id, value)
    }

    fn payload(value: &String) -> PatchPayload {
        PatchPayload::Link {
            title: value.clone(),
        }
    }

    fn debounce(config: &SyncConfig) -> Option<Duration> {
        Some(config.text_debounce)
    }

    fn is_persistable(value: &String) -> bool {
        !is_blank(value)
    }
}

pub(crate) struct SizeField;

impl ItemField for SizeField {
    type Value = ItemSize;
    const LABEL: &'static str = "size";

    fn read(item: &Item) -> Option<ItemSize> {
        Some(item.size_code)
    }

    fn write(items: &mut [Item], id: &str, value: &ItemSize) -> bool {
        items::update_size(items, id, *value)
    }

    fn payload(value: &ItemSize) -> PatchPayload {
        PatchPayload::Size { size_code: *value }
    }

    // Resizing is a discrete action; nothing to coalesce.
    fn debounce(_config: &SyncConfig) -> Option<Duration> {
        None
    }

    fn acknowledged(_sent: &ItemSize, server: &Item) -> ItemSize {
        server.size_code
    }
}

struct FieldState<V> {
    synced: HashMap<String, V>,
    flights: SingleFlight<String>,
}

/// Debounced, single-flight autosave of one field across all items.
///
/// The payload is always read from the store when the request starts, never
/// captured when the edit is scheduled. A save requested while one is running
/// for the same item is replayed once when it finishes.
pub(crate) struct FieldScheduler<F: ItemField> {
    ctx: SyncContext,
    timers: DebounceTimers<String>,
    state: Rc<RefCell<FieldState<F::Value>>>,
    _field: PhantomData<fn() -> F>,
}

impl<F: ItemField> Clone for FieldScheduler<F> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            timers: self.timers.clone(),
            state: Rc::clone(&self.state),
            _field: PhantomData,
        }
    }
}

impl<F: ItemField> FieldScheduler<F> {
    pub fn new(ctx: SyncContext) -> Self {
        let timers = DebounceTimers::new(Rc::clone(&ctx.runtime));
        Self {
            ctx,
            timers,
            state: Rc::new(RefCell::new(FieldState {
                synced: HashMap::new(),
                flights: SingleFlight::new(),
            })),
            _field: PhantomData,
        }
    }

    /// Take the loaded items as the last-synced baseline.
    pub fn seed(&self, items: &[Item]) {
        let mut state = self.state.borrow_mut();
        state.synced = items
            .iter()
            .filter_map(|item| F::read(item).map(|v| (item.id.clone(), v)))
            .collect();
    }

    pub fn synced(&self, id: &str) -> Option<F::Value> {
        self.state.borrow().synced.get(id).cloned()
    }

    pub fn remember(&self, id: &str, value: F::Value) {
        self.state.borrow_mut().synced.insert(id.to_string(), value);
    }

    /// Persist after the field's debounce window, or right away if it has none.
    pub fn schedule(&self, id: &str) {
        match F::debounce(&self.ctx.config) {
            Some(delay) => {
                let this = self.clone();
                let key = id.to_string();
                self.timers
                    .reset(key.clone(), delay, move || this.persist(&key));
            }
            None => self.persist(id),
        }
    }

    /// Explicit commit: skip the rest of the debounce window.
    pub fn flush(&self, id: &str) {
        self.timers.cancel(&id.to_string());
        self.persist(id);
    }

    pub fn persist(&self, id: &str) {
        if !self.ctx.is_alive() {
            return;
        }

        let key = id.to_string();
        if self.state.borrow_mut().flights.mark_queued(&key) {
            log::debug!("{} save for {id} queued behind the running request", F::LABEL);
            return;
        }

        let Some(value) = self.ctx.page.with_item(id, F::read).flatten() else {
            return;
        };
        if !F::is_persistable(&value) {
            log::debug!("{} for {id} is empty, not saving", F::LABEL);
            return;
        }
        if self.synced(id).as_ref() == Some(&value) {
            log::debug!("{} for {id} unchanged since last save", F::LABEL);
            return;
        }

        let epoch = self.state.borrow_mut().flights.begin(key.clone());
        let token = self.ctx.save_status.begin_write();
        let payload = F::payload(&value);
        let api = Rc::clone(&self.ctx.api);
        let this = self.clone();
        self.ctx.spawn(async move {
            let result = api.patch_item(&key, &payload).await;
            this.complete(&key, epoch, value, result, token);
        });
    }

    fn complete(
        &self,
        id: &str,
        epoch: u64,
        sent: F::Value,
        result: ApiResult<PatchOutcome>,
        token: WriteToken,
    ) {
        if !self.ctx.save_status.is_live(&token) {
            return;
        }

        let finished = self.state.borrow_mut().flights.finish(&id.to_string(), epoch);
        let Some(queued) = finished else {
            // The item was deleted meanwhile; its delete owns the item.
            log::debug!("ignoring stale {} response for {id}", F::LABEL);
            self.ctx.save_status.end_write(token, result.is_ok());
            return;
        };

        let success = match result {
            Ok(outcome) => {
                let stored = F::acknowledged(&sent, &outcome.item);
                self.remember(id, stored.clone());
                self.ctx.page.mutate_items(|items| {
                    let mut changed = false;
                    let current = items::position(items, id).and_then(|idx| F::read(&items[idx]));
                    if stored != sent && current.as_ref() == Some(&sent) {
                        changed |= F::write(items, id, &stored);
                    }
                    changed |= items::touch_updated_at(items, id, &outcome.item.updated_at);
                    changed
                });
                if let Some(warning) = outcome.warning {
                    self.ctx.page.notices.push(
                        NoticeLevel::Partial,
                        format!("Saved {}, but {warning}", F::LABEL),
                    );
                }
                true
            }
            Err(e) => {
                let current = self.ctx.page.with_item(id, F::read).flatten();
                let newer_on_the_way = queued || self.timers.is_pending(&id.to_string());
                if newer_on_the_way && current.as_ref() != Some(&sent) {
                    log::warn!("saving {} for {id} failed, a newer edit follows: {e}", F::LABEL);
                } else if let Some(synced) = self.synced(id) {
                    log::warn!("saving {} for {id} failed, rolling back: {e}", F::LABEL);
                    self.ctx
                        .page
                        .mutate_items(|items| F::write(items, id, &synced));
                }
                self.ctx.page.notices.push(
                    NoticeLevel::Error,
                    format!("Could not save {}: {e}", F::LABEL),
                );
                false
            }
        };

        // Replay before ending this write so the indicator never flickers.
        if queued {
            self.persist(id);
        }
        self.ctx.save_status.end_write(token, success);
    }

    /// Stop the pending timer and any queued replay for `id`.
    pub fn cancel(&self, id: &str) {
        let key = id.to_string();
        self.timers.cancel(&key);
        self.state.borrow_mut().flights.clear_queued(&key);
    }

    /// Drop every trace of `id`, returning its last-synced value. A request
    /// still running for it will complete as stale.
    pub fn forget(&self, id: &str) -> Option<F::Value> {
        self.cancel(id);
        let key = id.to_string();
        let mut state = self.state.borrow_mut();
        state.flights.forget(&key);
        state.synced.remove(&key)
    }

    /// Schedule a save if the stored value drifted from the last-synced one.
    pub fn resync(&self, id: &str) {
        let current = self.ctx.page.with_item(id, F::read).flatten();
        if current.is_some() && current != self.synced(id) {
            self.schedule(id);
        }
    }

    pub fn phase(&self, id: &str) -> KeyPhase {
        let key = id.to_string();
        let pending = self.timers.is_pending(&key);
        self.state.borrow().flights.phase(&key, pending)
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
    use crate::items::fixtures::{link, memo};

    #[test]
    fn test_blank_text_is_never_persistable() {
        assert!(!MemoContent::is_persistable(&"   ".to_string()));
        assert!(!LinkTitle::is_persistable(&String::new()));
        assert!(MemoContent::is_persistable(&"x".to_string()));
    }

    #[test]
    fn test_fields_read_only_their_item_type() {
        let m = memo("m", 1, "hi");
        let l = link("l", 2, "Site");
        assert_eq!(MemoContent::read(&m).as_deref(), Some("hi"));
        assert_eq!(MemoContent::read(&l), None);
        assert_eq!(LinkTitle::read(&l).as_deref(), Some("Site"));
        assert_eq!(SizeField::read(&l), Some(ItemSize::WideShort));
    }

    #[test]
    fn test_size_ack_takes_the_server_value() {
        let mut server = memo("m", 1, "");
        server.size_code = ItemSize::WideFull;
        assert_eq!(
            SizeField::acknowledged(&ItemSize::WideTall, &server),
            ItemSize::WideFull
        );
        assert_eq!(
            MemoContent::acknowledged(&"mine".to_string(), &server),
            "mine"
        );
    }
}

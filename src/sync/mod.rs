//! Optimistic sync engine for the item page.
//!
//! Every edit lands in `PageState` synchronously; persistence happens in the
//! background through the schedulers below. All bookkeeping is single-threaded
//! (`Rc<RefCell<_>>`), each piece owned by exactly one scheduler.

mod debounce;
mod delete;
mod draft;
mod field;
mod flight;
mod reorder;
mod runtime;
mod save_status;

#[cfg(test)]
pub(crate) mod test_support;

pub use flight::KeyPhase;
pub use runtime::{BrowserRuntime, LocalTask, Runtime};

use crate::api::ItemApi;
use crate::config::SyncConfig;
use crate::drafts::DraftOpen;
use crate::items;
use crate::models::{DraftKind, Draft, Item, ItemSize, ItemType, MediaKind};
use crate::state::{NoticeLevel, Notices, PageState, SavePhase};
use delete::DeleteCoordinator;
use draft::DraftManager;
use field::{FieldScheduler, LinkTitle, MemoContent, SizeField};
use leptos::prelude::*;
use reorder::ReorderScheduler;
use save_status::SaveStatus;
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

/// Rejected before any optimistic change or request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    EmptyValue { field: &'static str },
    TooLong { field: &'static str, max: usize },
    UnsupportedMedia { mime: String },
    SizeNotAllowed { size: ItemSize, item_type: ItemType },
    NoDraft,
    NoMediaDraft,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue { field } => write!(f, "The {field} cannot be empty"),
            Self::TooLong { field, max } => {
                write!(f, "The {field} is too long (max {max} characters)")
            }
            Self::UnsupportedMedia { mime } => write!(f, "Unsupported media type: {mime}"),
            Self::SizeNotAllowed { size, item_type } => {
                write!(f, "Size {size} is not available for {item_type} items")
            }
            Self::NoDraft => write!(f, "No item is being composed"),
            Self::NoMediaDraft => write!(f, "The current draft does not take media"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// The independently autosaved fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncField {
    Content,
    Title,
    Size,
}

/// What every scheduler shares.
#[derive(Clone)]
pub(crate) struct SyncContext {
    pub api: Rc<dyn ItemApi>,
    pub runtime: Rc<dyn Runtime>,
    pub page: PageState,
    pub config: SyncConfig,
    pub save_status: SaveStatus,
    alive: Rc<Cell<bool>>,
}

impl SyncContext {
    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        self.runtime.spawn(Box::pin(task));
    }
}

/// Page-session sync controller.
///
/// Responsibilities:
/// - optimistic edits to the item store
/// - per-field debounce + single-flight autosave (content, title, size)
/// - debounced reorder with hard rollback
/// - optimistic delete with restore
/// - the draft slot and its promotion to an item
///
/// Views read the signals; every write goes through a method here.
#[derive(Clone)]
pub struct PageSyncController {
    ctx: SyncContext,
    content: FieldScheduler<MemoContent>,
    title: FieldScheduler<LinkTitle>,
    size: FieldScheduler<SizeField>,
    reorder: ReorderScheduler,
    deletes: DeleteCoordinator,
    drafts: DraftManager,
}

impl PageSyncController {
    pub fn new(api: Rc<dyn ItemApi>, runtime: Rc<dyn Runtime>, config: SyncConfig) -> Self {
        let page = PageState::new();
        let save_status = SaveStatus::new(
            page.save_phase,
            Rc::clone(&runtime),
            config.saved_hide_after,
        );
        let ctx = SyncContext {
            api,
            runtime,
            page,
            config,
            save_status,
            alive: Rc::new(Cell::new(true)),
        };

        let content = FieldScheduler::new(ctx.clone());
        let title = FieldScheduler::new(ctx.clone());
        let size = FieldScheduler::new(ctx.clone());
        let reorder = ReorderScheduler::new(ctx.clone());
        let deletes = DeleteCoordinator::new(
            ctx.clone(),
            content.clone(),
            title.clone(),
            size.clone(),
            reorder.clone(),
        );
        let drafts = DraftManager::new(
            ctx.clone(),
            content.clone(),
            title.clone(),
            size.clone(),
            reorder.clone(),
        );

        Self {
            ctx,
            content,
            title,
            size,
            reorder,
            deletes,
            drafts,
        }
    }

    /// Load the page's items as the synced baseline and restore a backed-up draft.
    ///
    /// Calling it after [`dispose`](Self::dispose) starts a new session;
    /// responses to requests from the old one are still ignored.
    pub fn init(&self, loaded: Vec<Item>) {
        if !self.ctx.alive.replace(true) {
            log::debug!("sync restarted after dispose");
            self.drafts.resume();
        }
        let mut loaded: Vec<Item> = loaded.into_iter().map(Item::normalized).collect();
        items::sort_by_order_key(&mut loaded);
        items::renumber(&mut loaded);

        self.content.seed(&loaded);
        self.title.seed(&loaded);
        self.size.seed(&loaded);
        self.reorder.seed(&loaded);
        log::debug!("sync init with {} items", loaded.len());
        self.ctx.page.items.set(loaded);

        self.drafts.restore_backup();
    }

    /// Stop all timers and forget all tracking. Responses still in flight are
    /// ignored when they land: their write tokens are no longer live.
    pub fn dispose(&self) {
        if !self.ctx.alive.replace(false) {
            return;
        }
        self.content.dispose();
        self.title.dispose();
        self.size.dispose();
        self.reorder.dispose();
        self.deletes.dispose();
        self.drafts.dispose();
        self.ctx.save_status.dispose();
        log::debug!("sync disposed");
    }

    pub fn items(&self) -> ReadSignal<Vec<Item>> {
        self.ctx.page.items.read_only()
    }

    pub fn draft(&self) -> ReadSignal<Option<Draft>> {
        self.ctx.page.draft.read_only()
    }

    pub fn save_phase(&self) -> ReadSignal<SavePhase> {
        self.ctx.page.save_phase.read_only()
    }

    pub fn notices(&self) -> Notices {
        self.ctx.page.notices
    }

    fn reject(&self, err: ValidationError) -> ValidationError {
        self.ctx
            .page
            .notices
            .push(NoticeLevel::Invalid, err.to_string());
        err
    }

    fn check_len(&self, field: &'static str, text: &str, max: usize) -> Result<(), ValidationError> {
        if text.chars().count() > max {
            return Err(self.reject(ValidationError::TooLong { field, max }));
        }
        Ok(())
    }

    // ---- Item edits ----

    pub fn edit_memo_content(&self, id: &str, content: &str) -> Result<(), ValidationError> {
        self.check_len("content", content, self.ctx.config.max_memo_chars)?;
        if self
            .ctx
            .page
            .mutate_items(|items| items::update_memo_content(items, id, content))
        {
            self.content.schedule(id);
        }
        Ok(())
    }

    pub fn edit_link_title(&self, id: &str, title: &str) -> Result<(), ValidationError> {
        self.check_len("title", title, self.ctx.config.max_title_chars)?;
        if self
            .ctx
            .page
            .mutate_items(|items| items::update_link_title(items, id, title))
        {
            self.title.schedule(id);
        }
        Ok(())
    }

    /// Blur / explicit save: persist now instead of waiting out the debounce.
    pub fn commit_memo_content(&self, id: &str) -> Result<(), ValidationError> {
        let current = self.ctx.page.with_item(id, |item| item.memo_content().map(str::to_string));
        match current.flatten() {
            Some(content) if crate::util::is_blank(&content) => {
                Err(self.reject(ValidationError::EmptyValue { field: "content" }))
            }
            Some(_) => {
                self.content.flush(id);
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn commit_link_title(&self, id: &str) -> Result<(), ValidationError> {
        let current = self.ctx.page.with_item(id, |item| item.link_title().map(str::to_string));
        match current.flatten() {
            Some(title) if crate::util::is_blank(&title) => {
                Err(self.reject(ValidationError::EmptyValue { field: "title" }))
            }
            Some(_) => {
                self.title.flush(id);
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub fn resize(&self, id: &str, size: ItemSize) -> Result<(), ValidationError> {
        let Some(item_type) = self.ctx.page.with_item(id, |item| item.type_code) else {
            return Ok(());
        };
        if !size.is_allowed_for(item_type) {
            return Err(self.reject(ValidationError::SizeNotAllowed { size, item_type }));
        }
        if self
            .ctx
            .page
            .mutate_items(|items| items::update_size(items, id, size))
        {
            self.size.schedule(id);
        }
        Ok(())
    }

    /// Drag-and-drop: `active_id` takes `over_id`'s slot.
    pub fn move_item(&self, active_id: &str, over_id: &str) -> bool {
        let moved = self
            .ctx
            .page
            .mutate_items(|items| items::move_by_ids(items, active_id, over_id));
        if moved {
            self.reorder.schedule();
        }
        moved
    }

    /// Replace the order wholesale. Ignored unless `ordered_ids` names exactly
    /// the current items.
    pub fn set_order(&self, ordered_ids: &[String]) -> bool {
        let changed = self.ctx.page.mutate_items(|items| {
            if items::ids(items) == ordered_ids {
                return false;
            }
            match items::apply_order(items, ordered_ids) {
                Some(reordered) => {
                    *items = reordered;
                    true
                }
                None => false,
            }
        });
        if changed {
            self.reorder.schedule();
        }
        changed
    }

    pub fn remove(&self, id: &str) -> bool {
        self.deletes.remove(id)
    }

    // ---- Draft ----

    pub fn open_memo_draft(&self) -> DraftOpen {
        self.drafts.open(DraftKind::Memo)
    }

    pub fn open_link_draft(&self) -> DraftOpen {
        self.drafts.open(DraftKind::Link)
    }

    pub fn open_media_draft(&self, mime: &str) -> Result<DraftOpen, ValidationError> {
        let Some(media) = MediaKind::from_mime(mime) else {
            return Err(self.reject(ValidationError::UnsupportedMedia {
                mime: mime.to_string(),
            }));
        };
        Ok(self.drafts.open(DraftKind::Media(media)))
    }

    pub fn input_draft(&self, text: &str) -> Result<(), ValidationError> {
        self.drafts.input(text).map_err(|e| self.reject(e))
    }

    pub fn attach_draft_media(&self, url: &str) -> Result<(), ValidationError> {
        self.drafts.attach_media(url).map_err(|e| self.reject(e))
    }

    pub fn commit_draft(&self) -> Result<(), ValidationError> {
        self.drafts.commit().map_err(|e| self.reject(e))
    }

    pub fn cancel_draft(&self) {
        self.drafts.cancel();
    }

    // ---- Observability ----

    pub fn field_phase(&self, field: SyncField, id: &str) -> KeyPhase {
        match field {
            SyncField::Content => self.content.phase(id),
            SyncField::Title => self.title.phase(id),
            SyncField::Size => self.size.phase(id),
        }
    }

    pub fn order_phase(&self) -> KeyPhase {
        self.reorder.phase()
    }

    /// Any request still running. Hosts use it to warn before the page unloads.
    pub fn has_unsaved_writes(&self) -> bool {
        self.ctx.save_status.pending() > 0
    }

    pub fn draft_pending(&self) -> bool {
        self.drafts.is_pending()
    }

    pub fn is_deleting(&self, id: &str) -> bool {
        self.deletes.is_deleting(id)
    }
}

use super::debounce::DebounceTimers;
use super::field::{FieldScheduler, LinkTitle, MemoContent, SizeField};
use super::reorder::ReorderScheduler;
use super::save_status::WriteToken;
use super::{SyncContext, ValidationError};
use crate::api::ApiResult;
use crate::drafts::{
    clear_draft_backup, create_request, load_draft_backup, open_draft, save_draft_backup, DraftOpen,
};
use crate::items;
use crate::models::{Draft, DraftKind, Item};
use crate::state::NoticeLevel;
use crate::util::{is_blank, new_draft_id};
use leptos::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Owns the single draft slot: composing, autosave and promotion to an item.
#[derive(Clone)]
pub(crate) struct DraftManager {
    ctx: SyncContext,
    /// Keyed by draft id so a replaced draft's timer can never save the new one.
    timers: DebounceTimers<String>,
    /// Draft id -> content of its running create.
    sending: Rc<RefCell<HashMap<String, String>>>,
    content: FieldScheduler<MemoContent>,
    title: FieldScheduler<LinkTitle>,
    size: FieldScheduler<SizeField>,
    reorder: ReorderScheduler,
}

impl DraftManager {
    pub fn new(
        ctx: SyncContext,
        content: FieldScheduler<MemoContent>,
        title: FieldScheduler<LinkTitle>,
        size: FieldScheduler<SizeField>,
        reorder: ReorderScheduler,
    ) -> Self {
        let timers = DebounceTimers::new(Rc::clone(&ctx.runtime));
        Self {
            ctx,
            timers,
            sending: Rc::new(RefCell::new(HashMap::new())),
            content,
            title,
            size,
            reorder,
        }
    }

    fn current(&self) -> Option<Draft> {
        self.ctx.page.draft.get_untracked()
    }

    fn current_id(&self) -> Option<String> {
        self.ctx
            .page
            .draft
            .with_untracked(|d| d.as_ref().map(|d| d.id.clone()))
    }

    /// Mirror the slot into the local backup, or drop the backup.
    fn sync_backup(&self) {
        match self.current() {
            Some(draft) if draft.has_user_input => save_draft_backup(&draft),
            _ => clear_draft_backup(),
        }
    }

    /// Bring back a draft left over from a previous session.
    pub fn restore_backup(&self) {
        if self.current().is_some() {
            return;
        }
        let Some(draft) = load_draft_backup() else {
            return;
        };
        log::debug!("restored draft {} from local backup", draft.id);
        let id = draft.id.clone();
        self.ctx.page.draft.set(Some(draft));
        self.arm_autosave(&id);
    }

    pub fn open(&self, kind: DraftKind) -> DraftOpen {
        let previous = self.current();
        let sent = previous
            .as_ref()
            .and_then(|d| self.sending.borrow().get(&d.id).cloned());
        let outcome = open_draft(previous.as_ref(), sent.as_deref(), kind, new_draft_id);
        if let DraftOpen::Opened(draft) = &outcome {
            if let Some(prev) = previous {
                // A draft being created keeps its request; only idle timers go.
                self.timers.cancel(&prev.id);
            }
            self.ctx.page.draft.set(Some(draft.clone()));
            self.sync_backup();
        }
        outcome
    }

    fn max_chars(&self, kind: DraftKind) -> usize {
        match kind {
            DraftKind::Memo => self.ctx.config.max_memo_chars,
            DraftKind::Link | DraftKind::Media(_) => self.ctx.config.max_url_chars,
        }
    }

    pub fn input(&self, text: &str) -> Result<(), ValidationError> {
        let Some(draft) = self.current() else {
            return Err(ValidationError::NoDraft);
        };
        let max = self.max_chars(draft.kind);
        if text.chars().count() > max {
            return Err(ValidationError::TooLong {
                field: "draft",
                max,
            });
        }

        self.ctx.page.mutate_draft(|slot| match slot {
            Some(d) if d.id == draft.id && (d.content != text || !d.has_user_input) => {
                d.content = text.to_string();
                d.has_user_input = true;
                true
            }
            _ => false,
        });
        self.sync_backup();

        if is_blank(text) {
            self.timers.cancel(&draft.id);
        } else {
            self.arm_autosave(&draft.id);
        }
        Ok(())
    }

    fn arm_autosave(&self, draft_id: &str) {
        let this = self.clone();
        let key = draft_id.to_string();
        self.timers
            .reset(key.clone(), self.ctx.config.text_debounce, move || {
                this.persist(&key)
            });
    }

    /// Media uploads finish with a URL; the item is created right away.
    pub fn attach_media(&self, url: &str) -> Result<(), ValidationError> {
        let Some(draft) = self.current() else {
            return Err(ValidationError::NoDraft);
        };
        let DraftKind::Media(media) = draft.kind else {
            return Err(ValidationError::NoMediaDraft);
        };
        if is_blank(url) {
            return Err(ValidationError::EmptyValue { field: "media url" });
        }
        if url.chars().count() > self.ctx.config.max_url_chars {
            return Err(ValidationError::TooLong {
                field: "media url",
                max: self.ctx.config.max_url_chars,
            });
        }
        log::debug!("attaching {media:?} to draft {}", draft.id);

        self.ctx.page.mutate_draft(|slot| match slot {
            Some(d) if d.id == draft.id => {
                d.content = url.trim().to_string();
                d.has_user_input = true;
                true
            }
            _ => false,
        });
        self.commit()
    }

    pub fn commit(&self) -> Result<(), ValidationError> {
        let Some(draft) = self.current() else {
            return Err(ValidationError::NoDraft);
        };
        if !draft.has_meaningful_content() {
            return Err(ValidationError::EmptyValue { field: "draft" });
        }
        self.timers.cancel(&draft.id);
        self.persist(&draft.id);
        Ok(())
    }

    /// Empty the slot. A create already running still lands as an item.
    pub fn cancel(&self) {
        if let Some(draft) = self.current() {
            self.timers.cancel(&draft.id);
            self.ctx.page.draft.set(None);
        }
        clear_draft_backup();
    }

    pub fn persist(&self, draft_id: &str) {
        if !self.ctx.is_alive() {
            return;
        }
        let Some(draft) = self.current().filter(|d| d.id == draft_id) else {
            log::debug!("draft {draft_id} superseded, not saving");
            return;
        };
        if draft.is_saving {
            log::debug!("draft {draft_id} is already being created");
            return;
        }
        if !draft.has_meaningful_content() {
            return;
        }

        self.ctx.page.mutate_draft(|slot| match slot {
            Some(d) if d.id == draft.id => {
                d.is_saving = true;
                true
            }
            _ => false,
        });

        self.sending
            .borrow_mut()
            .insert(draft.id.clone(), draft.content.clone());
        let (item_type, data) = create_request(&draft);
        let token = self.ctx.save_status.begin_write();
        let api = Rc::clone(&self.ctx.api);
        let this = self.clone();
        self.ctx.spawn(async move {
            let result = api.create_item(item_type, data).await;
            this.complete(draft, result, token);
        });
    }

    fn complete(&self, sent: Draft, result: ApiResult<Item>, token: WriteToken) {
        if !self.ctx.save_status.is_live(&token) {
            log::debug!("create for draft {} outlived its session", sent.id);
            return;
        }
        self.sending.borrow_mut().remove(&sent.id);

        let success = match result {
            Ok(item) => {
                self.promote(&sent, item);
                true
            }
            Err(e) => {
                log::warn!("creating draft {} failed: {e}", sent.id);
                self.revert(sent);
                self.ctx
                    .page
                    .notices
                    .push(NoticeLevel::Error, format!("Could not create the item: {e}"));
                false
            }
        };
        self.ctx.save_status.end_write(token, success);
    }

    fn promote(&self, sent: &Draft, mut item: Item) {
        let still_here = self.current().filter(|d| d.id == sent.id);
        if still_here.is_some() {
            self.ctx.page.draft.set(None);
        }

        let synced_content = item.memo_content().map(str::to_string);
        // Text typed while the create was running stays local and is patched.
        let newer_text = still_here
            .filter(|d| d.kind == DraftKind::Memo && d.content != sent.content && d.has_meaningful_content())
            .map(|d| d.content);
        if let Some(text) = &newer_text {
            item.set_data_str("content", text);
        }

        let id = item.id.clone();
        if let Some(content) = synced_content {
            self.content.remember(&id, content);
        }
        if let Some(title) = item.link_title() {
            self.title.remember(&id, title.to_string());
        }
        self.size.remember(&id, item.size_code);

        let mut index = None;
        self.ctx.page.mutate_items(|items| {
            let known = items::contains(items, &id);
            index = Some(items::insert_sorted(items, item));
            !known
        });
        if let Some(index) = index {
            self.reorder.track_created(&id, index);
        }
        if newer_text.is_some() {
            self.content.schedule(&id);
        }
        log::debug!("draft {} created as item {id}", sent.id);
        self.sync_backup();
    }

    fn revert(&self, sent: Draft) {
        let sent_id = sent.id.clone();
        let sent_content = sent.content.clone();
        self.ctx.page.mutate_draft(|slot| {
            let reclaim = match slot.as_mut() {
                Some(d) if d.id == sent.id => {
                    d.is_saving = false;
                    return true;
                }
                // Replaced by an empty draft: the unsaved content wins the slot back.
                Some(d) => !d.has_meaningful_content(),
                None => false,
            };
            if reclaim {
                *slot = Some(Draft {
                    is_saving: false,
                    ..sent
                });
            }
            reclaim
        });

        let changed_meanwhile = self.ctx.page.draft.with_untracked(|d| {
            d.as_ref()
                .is_some_and(|d| d.id == sent_id && d.content != sent_content && d.has_meaningful_content())
        });
        if changed_meanwhile {
            self.arm_autosave(&sent_id);
        }
        self.sync_backup();
    }

    /// A create cut off by `dispose` never reports back; its draft composes again.
    pub fn resume(&self) {
        let mut resumed = None;
        self.ctx.page.mutate_draft(|slot| match slot {
            Some(d) if d.is_saving => {
                d.is_saving = false;
                resumed = Some(d.id.clone());
                true
            }
            _ => false,
        });
        if let Some(id) = resumed {
            self.arm_autosave(&id);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.current_id()
            .is_some_and(|id| self.timers.is_pending(&id))
    }

    pub fn dispose(&self) {
        self.timers.clear();
        self.sending.borrow_mut().clear();
    }
}

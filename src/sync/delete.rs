use super::field::{FieldScheduler, LinkTitle, MemoContent, SizeField};
use super::reorder::ReorderScheduler;
use super::save_status::WriteToken;
use super::SyncContext;
use crate::api::{ApiResult, DeleteOutcome};
use crate::items;
use crate::models::{Item, ItemSize};
use crate::state::NoticeLevel;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// Last-synced field values held aside while a delete is in flight.
#[derive(Default)]
struct SyncedFields {
    content: Option<String>,
    title: Option<String>,
    size: Option<ItemSize>,
}

#[derive(Clone)]
pub(crate) struct DeleteCoordinator {
    ctx: SyncContext,
    deleting: Rc<RefCell<HashSet<String>>>,
    content: FieldScheduler<MemoContent>,
    title: FieldScheduler<LinkTitle>,
    size: FieldScheduler<SizeField>,
    reorder: ReorderScheduler,
}

impl DeleteCoordinator {
    pub fn new(
        ctx: SyncContext,
        content: FieldScheduler<MemoContent>,
        title: FieldScheduler<LinkTitle>,
        size: FieldScheduler<SizeField>,
        reorder: ReorderScheduler,
    ) -> Self {
        Self {
            ctx,
            deleting: Rc::new(RefCell::new(HashSet::new())),
            content,
            title,
            size,
            reorder,
        }
    }

    pub fn is_deleting(&self, id: &str) -> bool {
        self.deleting.borrow().contains(id)
    }

    /// Remove `id` now and delete it on the server in the background.
    ///
    /// Returns `false` when the id is unknown or already being deleted.
    pub fn remove(&self, id: &str) -> bool {
        if !self.ctx.is_alive() {
            return false;
        }
        if self.is_deleting(id) {
            log::debug!("delete for {id} already running");
            return false;
        }
        if !self.ctx.page.has_item(id) {
            log::debug!("delete for unknown item {id} ignored");
            return false;
        }

        // Pending and running field saves for the item are abandoned; the
        // delete wins.
        let synced = SyncedFields {
            content: self.content.forget(id),
            title: self.title.forget(id),
            size: self.size.forget(id),
        };

        let mut removed = None;
        self.ctx.page.mutate_items(|items| {
            removed = items::remove_by_id(items, id);
            if removed.is_some() {
                items::renumber(items);
            }
            removed.is_some()
        });
        let Some(removed) = removed else {
            return false;
        };

        self.deleting.borrow_mut().insert(id.to_string());
        let token = self.ctx.save_status.begin_write();
        let api = Rc::clone(&self.ctx.api);
        let this = self.clone();
        let id = id.to_string();
        self.ctx.spawn(async move {
            let result = api.delete_item(&id).await;
            this.complete(&id, removed, synced, result, token);
        });
        true
    }

    fn complete(
        &self,
        id: &str,
        removed: Item,
        synced: SyncedFields,
        result: ApiResult<DeleteOutcome>,
        token: WriteToken,
    ) {
        if !self.ctx.save_status.is_live(&token) {
            return;
        }
        self.deleting.borrow_mut().remove(id);

        let success = match result {
            Ok(outcome) => {
                self.reorder.forget_item(id);
                if let Some(warning) = outcome.warning {
                    self.ctx
                        .page
                        .notices
                        .push(NoticeLevel::Partial, format!("Item deleted, but {warning}"));
                }
                true
            }
            Err(e) => {
                log::warn!("delete of {id} failed, restoring it: {e}");
                self.ctx
                    .page
                    .mutate_items(|items| items::restore_removed(items, removed));

                if let Some(v) = synced.content {
                    self.content.remember(id, v);
                }
                if let Some(v) = synced.title {
                    self.title.remember(id, v);
                }
                if let Some(v) = synced.size {
                    self.size.remember(id, v);
                }
                // Edits whose timer the delete cancelled are still unsaved.
                self.content.resync(id);
                self.title.resync(id);
                self.size.resync(id);

                self.ctx
                    .page
                    .notices
                    .push(NoticeLevel::Error, format!("Could not delete the item: {e}"));
                false
            }
        };
        self.ctx.save_status.end_write(token, success);
    }

    pub fn dispose(&self) {
        self.deleting.borrow_mut().clear();
    }
}

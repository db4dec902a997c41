mod notices;

pub use notices::{Notice, NoticeLevel, Notices};

use crate::models::{Draft, Item};
use leptos::prelude::*;

/// What the save indicator shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum SavePhase {
    #[default]
    Hidden,
    Saving,
    Saved,
    Error,
}

/// Reactive page state read by the views.
///
/// Views only read these; every write goes through the sync controller.
#[derive(Clone, Copy)]
pub struct PageState {
    /// Persisted items in display order.
    pub items: RwSignal<Vec<Item>>,

    /// The single item being composed, if any.
    pub draft: RwSignal<Option<Draft>>,

    pub save_phase: RwSignal<SavePhase>,

    pub notices: Notices,
}

impl PageState {
    pub fn new() -> Self {
        Self {
            items: RwSignal::new(Vec::new()),
            draft: RwSignal::new(None),
            save_phase: RwSignal::new(SavePhase::Hidden),
            notices: Notices::new(),
        }
    }

    /// Run `f` on the items; subscribers are only notified when it reports a change.
    pub(crate) fn mutate_items(&self, f: impl FnOnce(&mut Vec<Item>) -> bool) -> bool {
        self.items
            .try_maybe_update(|items| {
                let changed = f(items);
                (changed, changed)
            })
            .unwrap_or(false)
    }

    pub(crate) fn mutate_draft(&self, f: impl FnOnce(&mut Option<Draft>) -> bool) -> bool {
        self.draft
            .try_maybe_update(|draft| {
                let changed = f(draft);
                (changed, changed)
            })
            .unwrap_or(false)
    }

    pub(crate) fn with_item<T>(&self, id: &str, f: impl FnOnce(&Item) -> T) -> Option<T> {
        self.items
            .with_untracked(|items| items.iter().find(|item| item.id == id).map(f))
    }

    pub(crate) fn has_item(&self, id: &str) -> bool {
        self.with_item(id, |_| ()).is_some()
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new()
    }
}

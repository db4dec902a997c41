use crate::util::now_ms;
use leptos::prelude::*;

/// Keep the toast stack short; the oldest notice goes first.
const MAX_NOTICES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum NoticeLevel {
    /// A write failed and was rolled back.
    Error,
    /// The record was saved but a secondary step failed. Nothing rolled back.
    Partial,
    /// Rejected before any request or optimistic change.
    Invalid,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
    pub created_ms: i64,
}

/// Advisory, toast-style messages. None of them stop the engine.
#[derive(Clone, Copy)]
pub struct Notices {
    list: RwSignal<Vec<Notice>>,
    next_id: StoredValue<u64>,
}

impl Notices {
    pub(crate) fn new() -> Self {
        Self {
            list: RwSignal::new(Vec::new()),
            next_id: StoredValue::new(1),
        }
    }

    pub fn list(&self) -> ReadSignal<Vec<Notice>> {
        self.list.read_only()
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.list.get_untracked()
    }

    pub(crate) fn push(&self, level: NoticeLevel, message: impl Into<String>) -> u64 {
        let id = self.next_id.get_value();
        self.next_id.set_value(id + 1);

        let notice = Notice {
            id,
            level,
            message: message.into(),
            created_ms: now_ms(),
        };
        self.list.update(|list| {
            list.push(notice);
            if list.len() > MAX_NOTICES {
                let overflow = list.len() - MAX_NOTICES;
                list.drain(..overflow);
            }
        });
        id
    }

    pub fn dismiss(&self, id: u64) {
        self.list.update(|list| list.retain(|n| n.id != id));
    }

    pub fn clear(&self) {
        self.list.set(Vec::new());
    }
}

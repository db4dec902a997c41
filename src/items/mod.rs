//! Item Store operations.
//!
//! The collection itself lives in `PageState::items`; everything here is a
//! plain function over `Vec<Item>` so it can be used inside a signal update.
//! Mutating helpers report whether anything changed; callers skip the
//! notification and the reschedule when nothing did.

use crate::models::{Item, ItemSize};
use std::collections::HashSet;

pub fn sort_by_order_key(items: &mut [Item]) {
    // Stable: equal keys keep their current relative order.
    items.sort_by_key(|item| item.order_key);
}

/// Re-derive every `order_key` from array position (`index + 1`).
pub fn renumber(items: &mut [Item]) -> bool {
    let mut changed = false;
    for (idx, item) in items.iter_mut().enumerate() {
        let key = idx as i64 + 1;
        if item.order_key != key {
            item.order_key = key;
            changed = true;
        }
    }
    changed
}

pub fn is_dense(items: &[Item]) -> bool {
    items
        .iter()
        .enumerate()
        .all(|(idx, item)| item.order_key == idx as i64 + 1)
}

pub fn ids(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| item.id.clone()).collect()
}

pub fn position(items: &[Item], id: &str) -> Option<usize> {
    items.iter().position(|item| item.id == id)
}

pub fn contains(items: &[Item], id: &str) -> bool {
    position(items, id).is_some()
}

/// Reorder to exactly `ordered_ids`. `None` when the id sets differ.
pub fn apply_order(items: &[Item], ordered_ids: &[String]) -> Option<Vec<Item>> {
    if ordered_ids.len() != items.len() {
        return None;
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(ordered_ids.len());
    let mut out: Vec<Item> = Vec::with_capacity(items.len());
    for id in ordered_ids {
        if !seen.insert(id.as_str()) {
            return None;
        }
        let item = items.iter().find(|item| &item.id == id)?;
        out.push(item.clone());
    }

    renumber(&mut out);
    Some(out)
}

/// Lenient form of [`apply_order`]: ids present in `ordered_ids` come first
/// in that order, anything else keeps its current relative order after them.
pub fn align_to_order(items: &mut Vec<Item>, ordered_ids: &[String]) -> bool {
    let before = ids(items);

    let rank = |id: &str| {
        ordered_ids
            .iter()
            .position(|x| x == id)
            .unwrap_or(ordered_ids.len())
    };
    items.sort_by_key(|item| rank(&item.id));

    let moved = ids(items) != before;
    let renumbered = renumber(items);
    moved || renumbered
}

/// Drag-and-drop move: `active` takes `over`'s slot, the rest shift.
pub fn move_by_ids(items: &mut Vec<Item>, active_id: &str, over_id: &str) -> bool {
    if active_id == over_id {
        return false;
    }
    let (Some(from), Some(to)) = (position(items, active_id), position(items, over_id)) else {
        return false;
    };

    let moved = items.remove(from);
    items.insert(to, moved);
    renumber(items);
    true
}

pub fn update_memo_content(items: &mut [Item], id: &str, content: &str) -> bool {
    let Some(item) = items.iter_mut().find(|item| item.id == id) else {
        return false;
    };
    match item.memo_content() {
        Some(current) if current != content => {
            item.set_data_str("content", content);
            true
        }
        _ => false,
    }
}

pub fn update_link_title(items: &mut [Item], id: &str, title: &str) -> bool {
    let Some(item) = items.iter_mut().find(|item| item.id == id) else {
        return false;
    };
    match item.link_title() {
        Some(current) if current != title => {
            item.set_data_str("title", title);
            true
        }
        _ => false,
    }
}

pub fn update_size(items: &mut [Item], id: &str, size: ItemSize) -> bool {
    match items.iter_mut().find(|item| item.id == id) {
        Some(item) if item.size_code != size => {
            item.size_code = size;
            true
        }
        _ => false,
    }
}

pub(crate) fn touch_updated_at(items: &mut [Item], id: &str, updated_at: &str) -> bool {
    match items.iter_mut().find(|item| item.id == id) {
        Some(item) if !updated_at.is_empty() && item.updated_at != updated_at => {
            item.updated_at = updated_at.to_string();
            true
        }
        _ => false,
    }
}

/// Removes the item and hands it back so a failed delete can restore it.
/// Does not renumber; the caller decides when the order settles.
pub fn remove_by_id(items: &mut Vec<Item>, id: &str) -> Option<Item> {
    let idx = position(items, id)?;
    Some(items.remove(idx))
}

/// Put a removed item back at its `order_key` slot. No-op if it is already
/// present.
pub fn restore_removed(items: &mut Vec<Item>, removed: Item) -> bool {
    if contains(items, &removed.id) {
        return false;
    }

    let restored_id = removed.id.clone();
    items.push(removed);
    // On a key tie the restored item wins the slot it used to own.
    items.sort_by(|a, b| {
        a.order_key
            .cmp(&b.order_key)
            .then_with(|| (b.id == restored_id).cmp(&(a.id == restored_id)))
    });
    renumber(items);
    true
}

/// Insert a server-created item at its `order_key` slot and return its index.
pub fn insert_sorted(items: &mut Vec<Item>, item: Item) -> usize {
    if let Some(idx) = position(items, &item.id) {
        return idx;
    }
    let idx = items
        .iter()
        .position(|existing| existing.order_key > item.order_key)
        .unwrap_or(items.len());
    items.insert(idx, item);
    renumber(items);
    idx
}

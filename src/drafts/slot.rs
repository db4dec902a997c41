use crate::models::{Draft, DraftKind, ItemType};
use crate::util::normalize_link_url;

/// Result of asking for a new draft.
#[derive(Clone, Debug, PartialEq)]
pub enum DraftOpen {
    /// A fresh draft now occupies the slot.
    Opened(Draft),
    /// The slot already holds a draft of this kind; keep composing it.
    Kept,
    /// The slot holds unsaved content of another kind; it is never discarded.
    Blocked,
}

/// Decide what opening a draft of `kind` does to the current slot.
///
/// `sent` is the content of the create request running for `current`, if any.
///
/// - A draft already being persisted is tracked by id, so it may be replaced
///   unless text was typed into it after the request went out.
/// - Meaningful content is never discarded: same class keeps it, another
///   class is blocked.
/// - An empty draft of the exact same kind is kept; any other empty draft is
///   preempted.
pub(crate) fn open_draft(
    current: Option<&Draft>,
    sent: Option<&str>,
    kind: DraftKind,
    new_id: impl FnOnce() -> String,
) -> DraftOpen {
    let Some(cur) = current else {
        return DraftOpen::Opened(Draft::new(new_id(), kind));
    };

    let typed_since_sent = cur.has_meaningful_content() && sent != Some(cur.content.as_str());
    if cur.is_saving && !typed_since_sent {
        return DraftOpen::Opened(Draft::new(new_id(), kind));
    }

    if cur.has_meaningful_content() {
        return if cur.kind.same_class(kind) {
            DraftOpen::Kept
        } else {
            DraftOpen::Blocked
        };
    }

    if cur.kind == kind {
        DraftOpen::Kept
    } else {
        DraftOpen::Opened(Draft::new(new_id(), kind))
    }
}

/// `createItem(type, data)` arguments for a draft.
pub(crate) fn create_request(draft: &Draft) -> (ItemType, serde_json::Value) {
    match draft.kind {
        DraftKind::Memo => (
            ItemType::Memo,
            serde_json::json!({ "content": draft.content }),
        ),
        DraftKind::Link => (
            ItemType::Link,
            serde_json::json!({ "url": normalize_link_url(&draft.content) }),
        ),
        DraftKind::Media(media) => (
            media.item_type(),
            serde_json::json!({ "url": draft.content.trim() }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;

    fn draft(kind: DraftKind, content: &str) -> Draft {
        let mut d = Draft::new("d1".to_string(), kind);
        d.content = content.to_string();
        d.has_user_input = !content.is_empty();
        d
    }

    fn id() -> String {
        "d2".to_string()
    }

    #[test]
    fn test_open_on_empty_slot() {
        match open_draft(None, None, DraftKind::Memo, id) {
            DraftOpen::Opened(d) => {
                assert_eq!(d.id, "d2");
                assert_eq!(d.kind, DraftKind::Memo);
                assert!(!d.has_user_input);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_memo_open_keeps_existing_memo() {
        let cur = draft(DraftKind::Memo, "hello");
        assert_eq!(open_draft(Some(&cur), None, DraftKind::Memo, id), DraftOpen::Kept);
        let empty = draft(DraftKind::Memo, "   ");
        assert_eq!(open_draft(Some(&empty), None, DraftKind::Memo, id), DraftOpen::Kept);
    }

    #[test]
    fn test_link_or_media_preempts_only_empty_memo() {
        let empty = draft(DraftKind::Memo, "  ");
        assert!(matches!(
            open_draft(Some(&empty), None, DraftKind::Link, id),
            DraftOpen::Opened(_)
        ));
        assert!(matches!(
            open_draft(Some(&empty), None, DraftKind::Media(MediaKind::Image), id),
            DraftOpen::Opened(_)
        ));

        let typed = draft(DraftKind::Memo, "notes");
        assert_eq!(open_draft(Some(&typed), None, DraftKind::Link, id), DraftOpen::Blocked);
        assert_eq!(
            open_draft(Some(&typed), None, DraftKind::Media(MediaKind::Video), id),
            DraftOpen::Blocked
        );
    }

    #[test]
    fn test_saving_draft_can_be_replaced() {
        let mut saving = draft(DraftKind::Memo, "sent");
        saving.is_saving = true;
        assert!(matches!(
            open_draft(Some(&saving), Some("sent"), DraftKind::Memo, id),
            DraftOpen::Opened(d) if d.id == "d2"
        ));
    }

    #[test]
    fn test_saving_draft_with_newer_text_is_not_replaced() {
        let mut saving = draft(DraftKind::Memo, "sent and more");
        saving.is_saving = true;
        assert_eq!(
            open_draft(Some(&saving), Some("sent"), DraftKind::Memo, id),
            DraftOpen::Kept
        );
        assert_eq!(
            open_draft(Some(&saving), Some("sent"), DraftKind::Link, id),
            DraftOpen::Blocked
        );

        saving.content = "  ".to_string();
        assert!(matches!(
            open_draft(Some(&saving), Some("sent"), DraftKind::Link, id),
            DraftOpen::Opened(_)
        ));
    }

    #[test]
    fn test_create_request_shapes() {
        let (t, data) = create_request(&draft(DraftKind::Memo, "hello world"));
        assert_eq!(t, ItemType::Memo);
        assert_eq!(data, serde_json::json!({"content": "hello world"}));

        let (t, data) = create_request(&draft(DraftKind::Link, "example.com"));
        assert_eq!(t, ItemType::Link);
        assert_eq!(data["url"], "https://example.com");

        let (t, data) = create_request(&draft(
            DraftKind::Media(MediaKind::Video),
            " https://cdn/x.mp4 ",
        ));
        assert_eq!(t, ItemType::Video);
        assert_eq!(data["url"], "https://cdn/x.mp4");
    }
}

use std::sync::atomic::{AtomicU64, Ordering};

/// "Meaningful content": anything left after trimming.
pub(crate) fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

static DRAFT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Client-side id for a draft. Never sent to the server; the server assigns
/// the item id on create.
pub(crate) fn new_draft_id() -> String {
    let mut buf = [0u8; 8];
    let rand = match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        // Still unique within this session.
        Err(_) => now_ms() as u64,
    };
    let seq = DRAFT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("draft-{rand:016x}-{seq}")
}

/// Links typed without a scheme are stored as https.
pub(crate) fn normalize_link_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_blank_treats_whitespace_as_empty() {
        assert!(is_blank(""));
        assert!(is_blank("  \n\t "));
        assert!(!is_blank(" a "));
    }

    #[test]
    fn test_new_draft_id_is_unique() {
        let a = new_draft_id();
        let b = new_draft_id();
        assert!(a.starts_with("draft-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_normalize_link_url_adds_https_only_when_missing() {
        assert_eq!(normalize_link_url(" example.com/a "), "https://example.com/a");
        assert_eq!(normalize_link_url("http://x.io"), "http://x.io");
        assert_eq!(normalize_link_url("HTTPS://x.io"), "HTTPS://x.io");
    }
}

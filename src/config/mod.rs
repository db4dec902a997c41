use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://localhost:6689";

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EnvConfig {
    pub api_url: String,
}

impl EnvConfig {
    pub fn new() -> Self {
        if let Some(api_url) = Self::from_window() {
            return Self { api_url };
        }

        Self {
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    // We support BOTH `window.ENV.API_URL` (documented) and
    // `window.ENV.api_url` (legacy) for compatibility.
    #[cfg(target_arch = "wasm32")]
    fn from_window() -> Option<String> {
        let window = web_sys::window()?;
        let env = window.get("ENV")?;
        if env.is_undefined() || !env.is_object() {
            return None;
        }

        ["API_URL", "api_url"].into_iter().find_map(|key| {
            js_sys::Reflect::get(&env, &wasm_bindgen::JsValue::from_str(key))
                .ok()
                .and_then(|v| v.as_string())
        })
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn from_window() -> Option<String> {
        None
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Timings and limits for the sync engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Memo content and link title autosave.
    pub text_debounce: Duration,
    /// Drag bursts; short because the gesture is already settled when it fires.
    pub reorder_debounce: Duration,
    /// How long "saved" stays visible before the indicator hides.
    pub saved_hide_after: Duration,
    pub max_memo_chars: usize,
    pub max_title_chars: usize,
    /// Link and media URLs typed or pasted into a draft.
    pub max_url_chars: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            text_debounce: Duration::from_millis(800),
            reorder_debounce: Duration::from_millis(120),
            saved_hide_after: Duration::from_millis(2000),
            max_memo_chars: 10_000,
            max_title_chars: 200,
            max_url_chars: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_falls_back_to_localhost() {
        assert_eq!(EnvConfig::new().api_url, "http://localhost:6689");
    }

    #[test]
    fn test_sync_config_defaults() {
        let c = SyncConfig::default();
        assert_eq!(c.text_debounce, Duration::from_millis(800));
        assert_eq!(c.reorder_debounce, Duration::from_millis(120));
        assert_eq!(c.saved_hide_after, Duration::from_millis(2000));
    }
}

use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemType {
    Memo,
    Link,
    Map,
    Image,
    Video,
    /// Block types this client does not know yet; kept so they still render and reorder.
    #[serde(other)]
    Unknown,
}

impl ItemType {
    pub fn is_media(self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }
}

#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ItemSize {
    #[default]
    WideShort,
    WideTall,
    WideFull,
}

impl ItemSize {
    /// Missing or unrecognized values fall back to the default.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        raw.and_then(|s| Self::from_str(s.trim()).ok())
            .unwrap_or_default()
    }

    /// Images and videos never use the short layout.
    pub fn is_allowed_for(self, item_type: ItemType) -> bool {
        !(item_type.is_media() && self == Self::WideShort)
    }

    pub fn normalize_for(self, item_type: ItemType) -> Self {
        if self.is_allowed_for(item_type) {
            self
        } else {
            Self::WideTall
        }
    }
}

fn lenient_size<'de, D: Deserializer<'de>>(d: D) -> Result<ItemSize, D::Error> {
    let raw = serde_json::Value::deserialize(d)?;
    Ok(ItemSize::parse_lenient(raw.as_str()))
}

/// A persisted content block on the page.
///
/// `data` is opaque to the engine except for the few keys the autosaved
/// fields live under (`content` for memos, `title`/`url` for links).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub type_code: ItemType,
    #[serde(default, deserialize_with = "lenient_size")]
    pub size_code: ItemSize,
    #[serde(default)]
    pub order_key: i64,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Item {
    /// Apply the client-side size rules to a server record.
    pub fn normalized(mut self) -> Self {
        self.size_code = self.size_code.normalize_for(self.type_code);
        self
    }

    pub(crate) fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub(crate) fn set_data_str(&mut self, key: &str, value: &str) {
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(serde_json::Map::new());
        }
        if let Some(obj) = self.data.as_object_mut() {
            obj.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    /// Memo body. `None` for every other item type.
    pub fn memo_content(&self) -> Option<&str> {
        (self.type_code == ItemType::Memo).then(|| self.data_str("content").unwrap_or(""))
    }

    /// Link title. `None` for every other item type.
    pub fn link_title(&self) -> Option<&str> {
        (self.type_code == ItemType::Link).then(|| self.data_str("title").unwrap_or(""))
    }

    pub fn link_url(&self) -> Option<&str> {
        (self.type_code == ItemType::Link).then(|| self.data_str("url").unwrap_or(""))
    }
}

/// Body of `PATCH /api/items/{id}`: `{ "type": ..., "data": {...} }`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum PatchPayload {
    Memo {
        content: String,
    },
    Link {
        title: String,
    },
    Size {
        #[serde(rename = "sizeCode")]
        size_code: ItemSize,
    },
}

impl PatchPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memo { .. } => "memo",
            Self::Link { .. } => "link",
            Self::Size { .. } => "size",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    pub fn item_type(self) -> ItemType {
        match self {
            Self::Image => ItemType::Image,
            Self::Video => ItemType::Video,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(tag = "kind", content = "media", rename_all = "lowercase")]
pub enum DraftKind {
    Memo,
    Link,
    Media(MediaKind),
}

impl DraftKind {
    /// Memo, link and media are the three draft classes; image vs video is
    /// the same class.
    pub fn same_class(self, other: DraftKind) -> bool {
        matches!(
            (self, other),
            (Self::Memo, Self::Memo) | (Self::Link, Self::Link) | (Self::Media(_), Self::Media(_))
        )
    }
}

/// The single item being composed. Not an `Item` until the server creates it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Draft {
    pub id: String,
    pub kind: DraftKind,
    pub content: String,
    pub has_user_input: bool,
    #[serde(skip)]
    pub is_saving: bool,
}

impl Draft {
    pub(crate) fn new(id: String, kind: DraftKind) -> Self {
        Self {
            id,
            kind,
            content: String::new(),
            has_user_input: false,
            is_saving: false,
        }
    }

    pub fn has_meaningful_content(&self) -> bool {
        !crate::util::is_blank(&self.content)
    }
}

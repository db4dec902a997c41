//! Block page client: an ordered collection of memos, links, maps, images and
//! videos, edited optimistically and synced to the items API in the background.
//!
//! The embedding app renders `PageSyncController`'s signals and routes every
//! user action through its methods. It also installs the `log` backend.

pub mod api;
pub mod config;
pub mod drafts;
pub mod items;
pub mod models;
pub mod state;
pub mod sync;

mod storage;
mod util;

pub use api::{ApiClient, ApiError, ApiErrorKind, ApiResult, DeleteOutcome, ItemApi, PatchOutcome};
pub use config::{EnvConfig, SyncConfig};
pub use drafts::DraftOpen;
pub use models::{Draft, DraftKind, Item, ItemSize, ItemType, MediaKind, PatchPayload};
pub use state::{Notice, NoticeLevel, Notices, PageState, SavePhase};
pub use sync::{
    BrowserRuntime, KeyPhase, LocalTask, PageSyncController, Runtime, SyncField, ValidationError,
};

use std::rc::Rc;

/// A controller for the signed-in user: API URL from `window.ENV`, token
/// from `localStorage`, browser timers.
pub fn browser_controller() -> PageSyncController {
    PageSyncController::new(
        Rc::new(ApiClient::load_from_storage()),
        Rc::new(BrowserRuntime),
        SyncConfig::default(),
    )
}

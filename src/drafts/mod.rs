mod backup;
mod slot;

pub(crate) use backup::{clear_draft_backup, load_draft_backup, save_draft_backup};
pub use slot::DraftOpen;
pub(crate) use slot::{create_request, open_draft};

use crate::models::Draft;
use crate::storage::{load_json_from_storage, remove_from_storage, save_json_to_storage, DRAFT_BACKUP_KEY};

/// Mirror the composing draft so a reload does not lose typed text.
pub(crate) fn save_draft_backup(draft: &Draft) {
    if !draft.has_user_input {
        return;
    }
    save_json_to_storage(DRAFT_BACKUP_KEY, draft);
}

pub(crate) fn load_draft_backup() -> Option<Draft> {
    load_json_from_storage::<Draft>(DRAFT_BACKUP_KEY).filter(|d| d.has_meaningful_content())
}

pub(crate) fn clear_draft_backup() {
    remove_from_storage(DRAFT_BACKUP_KEY);
}

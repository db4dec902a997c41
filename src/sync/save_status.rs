use super::debounce::DebounceTimers;
use super::runtime::Runtime;
use crate::state::SavePhase;
use leptos::prelude::*;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

/// Handle for one write; hand it back to [`SaveStatus::end_write`].
#[derive(Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct WriteToken(u64);

#[derive(Default)]
struct WriteTracker {
    next_token: u64,
    live: HashSet<u64>,
}

/// Aggregated "saving / saved / error" indicator.
///
/// While any write is live the phase is `Saving`. The write that ends last
/// decides the final phase. `Saved` hides itself after `hide_after` unless a
/// new write starts first.
#[derive(Clone)]
pub(crate) struct SaveStatus {
    phase: RwSignal<SavePhase>,
    tracker: Rc<RefCell<WriteTracker>>,
    hide: DebounceTimers<()>,
    hide_after: Duration,
}

impl SaveStatus {
    pub fn new(phase: RwSignal<SavePhase>, runtime: Rc<dyn Runtime>, hide_after: Duration) -> Self {
        Self {
            phase,
            tracker: Rc::new(RefCell::new(WriteTracker::default())),
            hide: DebounceTimers::new(runtime),
            hide_after,
        }
    }

    pub fn begin_write(&self) -> WriteToken {
        self.hide.cancel(&());
        let token = {
            let mut tracker = self.tracker.borrow_mut();
            tracker.next_token += 1;
            let token = tracker.next_token;
            tracker.live.insert(token);
            token
        };
        self.phase.try_set(SavePhase::Saving);
        WriteToken(token)
    }

    pub fn end_write(&self, token: WriteToken, success: bool) {
        let remaining = {
            let mut tracker = self.tracker.borrow_mut();
            if !tracker.live.remove(&token.0) {
                return;
            }
            tracker.live.len()
        };

        if remaining > 0 {
            self.phase.try_set(SavePhase::Saving);
            return;
        }

        if success {
            self.phase.try_set(SavePhase::Saved);
            let phase = self.phase;
            self.hide.reset((), self.hide_after, move || {
                if phase.try_get_untracked() == Some(SavePhase::Saved) {
                    phase.try_set(SavePhase::Hidden);
                }
            });
        } else {
            self.phase.try_set(SavePhase::Error);
        }
    }

    /// `false` once the write has ended or the status was disposed.
    pub fn is_live(&self, token: &WriteToken) -> bool {
        self.tracker.borrow().live.contains(&token.0)
    }

    pub fn pending(&self) -> usize {
        self.tracker.borrow().live.len()
    }

    /// Forget live writes and the hide timer. Late `end_write` calls become no-ops.
    pub fn dispose(&self) {
        self.hide.clear();
        self.tracker.borrow_mut().live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::test_support::{run_local, wait, TokioRuntime};

    fn status() -> (SaveStatus, RwSignal<SavePhase>) {
        let phase = RwSignal::new(SavePhase::Hidden);
        let status = SaveStatus::new(phase, Rc::new(TokioRuntime), Duration::from_millis(2000));
        (status, phase)
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_write_to_finish_decides_the_phase() {
        run_local(async {
            let (status, phase) = status();

            let a = status.begin_write();
            let b = status.begin_write();
            status.end_write(a, true);
            assert_eq!(phase.get_untracked(), SavePhase::Saving);
            status.end_write(b, false);
            assert_eq!(phase.get_untracked(), SavePhase::Error);

            let c = status.begin_write();
            let d = status.begin_write();
            status.end_write(c, false);
            assert_eq!(phase.get_untracked(), SavePhase::Saving);
            status.end_write(d, true);
            assert_eq!(phase.get_untracked(), SavePhase::Saved);
            assert_eq!(status.pending(), 0);
        })
        .await;
    }

    #[test]
    fn test_unknown_token_is_ignored() {
        let (status, phase) = status();
        let a = status.begin_write();
        status.dispose();
        assert!(!status.is_live(&a));
        status.end_write(a, false);
        assert_eq!(phase.get_untracked(), SavePhase::Saving);
        assert_eq!(status.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_auto_hides_unless_a_new_write_starts() {
        run_local(async {
            let (status, phase) = status();

            let a = status.begin_write();
            status.end_write(a, true);
            wait(1999).await;
            assert_eq!(phase.get_untracked(), SavePhase::Saved);
            wait(2).await;
            assert_eq!(phase.get_untracked(), SavePhase::Hidden);

            let b = status.begin_write();
            status.end_write(b, true);
            wait(1500).await;
            let c = status.begin_write();
            wait(1000).await;
            assert_eq!(phase.get_untracked(), SavePhase::Saving);
            status.end_write(c, true);
            assert_eq!(phase.get_untracked(), SavePhase::Saved);
        })
        .await;
    }
}

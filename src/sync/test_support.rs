//! Scripted persistence API and tokio runtime for engine tests.

use super::runtime::{LocalTask, Runtime};
use super::PageSyncController;
use crate::api::{ApiError, ApiErrorKind, ApiResult, DeleteOutcome, ItemApi, PatchOutcome};
use crate::config::SyncConfig;
use crate::models::{Item, ItemSize, ItemType, PatchPayload};
use async_trait::async_trait;
use leptos::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

pub(crate) struct TokioRuntime;

impl Runtime for TokioRuntime {
    fn spawn(&self, task: LocalTask) {
        tokio::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalTask {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Run `f` inside a `LocalSet` so `spawn_local` works.
pub(crate) async fn run_local<F: Future>(f: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(f).await
}

/// Let (paused) time move forward; spawned tasks run as timers come due.
pub(crate) async fn wait(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Op {
    Create,
    Memo,
    Link,
    Size,
    Delete,
    Reorder,
}

impl Op {
    fn of_patch(payload: &PatchPayload) -> Self {
        match payload {
            PatchPayload::Memo { .. } => Self::Memo,
            PatchPayload::Link { .. } => Self::Link,
            PatchPayload::Size { .. } => Self::Size,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    Create {
        item_type: ItemType,
        data: serde_json::Value,
    },
    Patch {
        id: String,
        payload: PatchPayload,
    },
    Delete {
        id: String,
    },
    Reorder {
        ids: Vec<String>,
    },
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    latency: Duration,
    failures: HashMap<Op, (usize, ApiErrorKind)>,
    warnings: HashMap<Op, String>,
    size_override: Option<ItemSize>,
    server: HashMap<String, Item>,
    next_id: u64,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
}

/// In-memory server that records every call.
pub(crate) struct FakeApi {
    state: RefCell<FakeState>,
}

impl FakeApi {
    pub fn new(latency_ms: u64) -> Self {
        Self {
            state: RefCell::new(FakeState {
                latency: Duration::from_millis(latency_ms),
                ..FakeState::default()
            }),
        }
    }

    pub fn seed(&self, items: &[Item]) {
        let mut state = self.state.borrow_mut();
        for item in items {
            state.server.insert(item.id.clone(), item.clone());
        }
    }

    /// Applies to requests started from now on.
    pub fn set_latency(&self, latency_ms: u64) {
        self.state.borrow_mut().latency = Duration::from_millis(latency_ms);
    }

    /// The next `times` calls of `op` fail with `kind`.
    pub fn fail_next(&self, op: Op, times: usize, kind: ApiErrorKind) {
        self.state.borrow_mut().failures.insert(op, (times, kind));
    }

    pub fn warn_on(&self, op: Op, warning: &str) {
        self.state.borrow_mut().warnings.insert(op, warning.to_string());
    }

    /// The server stores this size whatever the client asks for.
    pub fn override_size(&self, size: ItemSize) {
        self.state.borrow_mut().size_override = Some(size);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn patches(&self) -> Vec<(String, PatchPayload)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Patch { id, payload } => Some((id, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn reorders(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Reorder { ids } => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn creates(&self) -> Vec<serde_json::Value> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create { data, .. } => Some(data),
                _ => None,
            })
            .collect()
    }

    /// Highest number of overlapping requests seen for `key` ("memo:m1", "order", ...).
    pub fn max_in_flight(&self, key: &str) -> usize {
        self.state
            .borrow()
            .max_in_flight
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    pub fn server_item(&self, id: &str) -> Option<Item> {
        self.state.borrow().server.get(id).cloned()
    }

    fn start(&self, key: &str, call: Call, op: Op) -> (Duration, Option<ApiErrorKind>) {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        let now = {
            let n = state.in_flight.entry(key.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        let max = state.max_in_flight.entry(key.to_string()).or_insert(0);
        *max = (*max).max(now);

        let failure = match state.failures.get_mut(&op) {
            Some((left, kind)) if *left > 0 => {
                *left -= 1;
                Some(kind.clone())
            }
            _ => None,
        };
        (state.latency, failure)
    }

    async fn round_trip(&self, key: &str, call: Call, op: Op) -> ApiResult<()> {
        let (latency, failure) = self.start(key, call, op);
        tokio::time::sleep(latency).await;
        if let Some(n) = self.state.borrow_mut().in_flight.get_mut(key) {
            *n -= 1;
        }
        match failure {
            Some(kind) => Err(ApiError::new(kind, format!("{op:?} failed"))),
            None => Ok(()),
        }
    }

    fn warning(&self, op: Op) -> Option<String> {
        self.state.borrow().warnings.get(&op).cloned()
    }
}

#[async_trait(?Send)]
impl ItemApi for FakeApi {
    async fn create_item(&self, item_type: ItemType, data: serde_json::Value) -> ApiResult<Item> {
        let call = Call::Create {
            item_type,
            data: data.clone(),
        };
        self.round_trip("create", call, Op::Create).await?;

        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let item = Item {
            id: format!("srv{}", state.next_id),
            type_code: item_type,
            size_code: ItemSize::default().normalize_for(item_type),
            order_key: state.server.len() as i64 + 1,
            data,
            created_at: format!("c{}", state.next_id),
            updated_at: format!("c{}", state.next_id),
        };
        state.server.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    async fn patch_item(&self, item_id: &str, payload: &PatchPayload) -> ApiResult<PatchOutcome> {
        let op = Op::of_patch(payload);
        let key = format!("{}:{item_id}", payload.kind());
        let call = Call::Patch {
            id: item_id.to_string(),
            payload: payload.clone(),
        };
        self.round_trip(&key, call, op).await?;

        let warning = self.warning(op);
        let mut state = self.state.borrow_mut();
        let size_override = state.size_override;
        let Some(item) = state.server.get_mut(item_id) else {
            return Err(ApiError::new(ApiErrorKind::Http, "item not found"));
        };
        match payload {
            PatchPayload::Memo { content } => item.set_data_str("content", content),
            PatchPayload::Link { title } => item.set_data_str("title", title),
            PatchPayload::Size { size_code } => {
                item.size_code = size_override
                    .unwrap_or(*size_code)
                    .normalize_for(item.type_code)
            }
        }
        item.updated_at = format!("u-{item_id}-{}", payload.kind());
        Ok(PatchOutcome {
            item: item.clone(),
            warning,
        })
    }

    async fn delete_item(&self, item_id: &str) -> ApiResult<DeleteOutcome> {
        let call = Call::Delete {
            id: item_id.to_string(),
        };
        self.round_trip(&format!("delete:{item_id}"), call, Op::Delete)
            .await?;
        self.state.borrow_mut().server.remove(item_id);
        Ok(DeleteOutcome {
            warning: self.warning(Op::Delete),
        })
    }

    async fn reorder_items(&self, item_ids: &[String]) -> ApiResult<()> {
        let call = Call::Reorder {
            ids: item_ids.to_vec(),
        };
        self.round_trip("order", call, Op::Reorder).await?;
        let mut state = self.state.borrow_mut();
        for (idx, id) in item_ids.iter().enumerate() {
            if let Some(item) = state.server.get_mut(id) {
                item.order_key = idx as i64 + 1;
            }
        }
        Ok(())
    }
}

/// A controller wired to a [`FakeApi`] with a seeded server.
pub(crate) struct Harness {
    pub api: Rc<FakeApi>,
    pub ctl: PageSyncController,
}

impl Harness {
    pub fn new(items: Vec<Item>) -> Self {
        Self::with_latency(items, 50)
    }

    pub fn with_latency(items: Vec<Item>, latency_ms: u64) -> Self {
        let api = Rc::new(FakeApi::new(latency_ms));
        api.seed(&items);
        let ctl = PageSyncController::new(
            api.clone(),
            Rc::new(TokioRuntime),
            SyncConfig::default(),
        );
        ctl.init(items);
        Self { api, ctl }
    }

    pub fn order(&self) -> Vec<String> {
        self.ctl
            .items()
            .with_untracked(|items| items.iter().map(|i| i.id.clone()).collect())
    }

    pub fn item(&self, id: &str) -> Option<Item> {
        self.ctl
            .items()
            .with_untracked(|items| items.iter().find(|i| i.id == id).cloned())
    }
}

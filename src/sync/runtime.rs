use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type LocalTask = Pin<Box<dyn Future<Output = ()> + 'static>>;

/// Where background work runs.
///
/// The engine never blocks: it spawns request futures and timer futures onto
/// a single-threaded executor and resumes on the same thread.
pub trait Runtime {
    fn spawn(&self, task: LocalTask);

    fn sleep(&self, duration: Duration) -> LocalTask;
}

/// The page's executor: Leptos `spawn_local` plus browser timeouts.
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserRuntime;

impl Runtime for BrowserRuntime {
    fn spawn(&self, task: LocalTask) {
        leptos::task::spawn_local(task);
    }

    fn sleep(&self, duration: Duration) -> LocalTask {
        Box::pin(gloo_timers::future::sleep(duration))
    }
}

//! Debounced request coordination.
//! `Debouncer` is the bare state: pending deadline + latest arguments, driven by
//! whatever clock the caller passes in. `Debounced` drives it on tokio time:
//! every call advances a generation and cancels the previous timer's token, so
//! a superseded timer can never fire. An invocation that already started is
//! never interrupted, and `drain` waits for it.

use std::future::Future;
use std::ops::Add;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

struct Pending<A, T> {
    args: A,
    deadline: T,
}

/// Timer-agnostic debounce state. `T` is any monotonic timestamp.
pub struct Debouncer<A, T = Instant> {
    window: Duration,
    pending: Option<Pending<A, T>>,
}

impl<A, T> Debouncer<A, T>
where
    T: Copy + Ord + Add<Duration, Output = T>,
{
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `args` to fire at `now + window`.
    /// Returns the arguments of the invocation this one replaced, if any.
    pub fn schedule(&mut self, args: A, now: T) -> Option<A> {
        let deadline = now + self.window;
        self.pending
            .replace(Pending { args, deadline })
            .map(|p| p.args)
    }

    /// Drop the pending invocation without firing it.
    pub fn cancel_pending(&mut self) -> Option<A> {
        self.pending.take().map(|p| p.args)
    }

    pub fn deadline(&self) -> Option<T> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arguments whose quiescence window has elapsed by `now`, if any.
    pub fn poll(&mut self, now: T) -> Option<A> {
        match &self.pending {
            Some(p) if now >= p.deadline => self.pending.take().map(|p| p.args),
            _ => None,
        }
    }

    /// Take the pending arguments regardless of deadline.
    pub fn take(&mut self) -> Option<A> {
        self.pending.take().map(|p| p.args)
    }
}

type Action<A> = Arc<dyn Fn(A) -> BoxFuture<'static, ()> + Send + Sync>;

struct DriverState<A> {
    debouncer: Debouncer<A, Instant>,
    generation: u64,
    token: CancellationToken,
}

impl<A> DriverState<A> {
    /// Cancel the current timer and hand out a fresh token for the next one.
    fn cancel_and_advance(&mut self) -> (CancellationToken, u64) {
        self.token.cancel();
        self.token = CancellationToken::new();
        self.generation += 1;
        (self.token.clone(), self.generation)
    }
}

struct Shared<A> {
    state: Mutex<DriverState<A>>,
    action: Action<A>,
    /// Timer tasks and the invocations they start.
    tasks: TaskTracker,
}

/// Fire-and-forget debounced wrapper around an async action.
pub struct Debounced<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for Debounced<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: Send + 'static> Debounced<A> {
    pub fn new<F, Fut>(window: Duration, action: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: Action<A> =
            Arc::new(move |args: A| -> BoxFuture<'static, ()> { Box::pin(action(args)) });
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(DriverState {
                    debouncer: Debouncer::new(window),
                    generation: 0,
                    token: CancellationToken::new(),
                }),
                action,
                tasks: TaskTracker::new(),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.shared.state.lock().debouncer.window()
    }

    /// Schedule the action with `args`, replacing any invocation not yet fired.
    /// A pending invocation whose window has already elapsed fires instead of
    /// being replaced. Must be called from within a tokio runtime.
    pub fn call(&self, args: A) {
        let (due, token, generation, deadline) = {
            let mut state = self.shared.state.lock();
            let now = Instant::now();
            let due = state.debouncer.poll(now);
            if state.debouncer.schedule(args, now).is_some() {
                trace!("debounce: superseded pending invocation");
            }
            let (token, generation) = state.cancel_and_advance();
            let deadline = state.debouncer.deadline().unwrap_or(now);
            (due, token, generation, deadline)
        };

        if let Some(due) = due {
            debug!(generation, "debounce: firing elapsed invocation");
            self.spawn_action(due);
        }

        let shared = Arc::clone(&self.shared);
        self.shared.tasks.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {}
                _ = token.cancelled() => return,
            }

            let args = {
                let mut state = shared.state.lock();
                if state.generation != generation {
                    return;
                }
                state.debouncer.take()
            };

            if let Some(args) = args {
                debug!(generation, "debounce: firing");
                (shared.action)(args).await;
            }
        });
    }

    /// Drop the pending invocation, if any. Running invocations are unaffected.
    pub fn cancel_pending(&self) -> bool {
        let mut state = self.shared.state.lock();
        let had_pending = state.debouncer.cancel_pending().is_some();
        state.cancel_and_advance();
        had_pending
    }

    /// Fire the pending invocation immediately instead of waiting out the window.
    pub fn flush(&self) -> Option<JoinHandle<()>> {
        let args = {
            let mut state = self.shared.state.lock();
            let args = state.debouncer.take()?;
            state.cancel_and_advance();
            args
        };
        Some(self.spawn_action(args))
    }

    /// Flush the pending invocation and wait until every started one has finished.
    pub async fn drain(&self) {
        self.flush();
        let tasks = &self.shared.tasks;
        tasks.close();
        tasks.wait().await;
        tasks.reopen();
    }

    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().debouncer.is_pending()
    }

    /// Number of timer tasks and invocations still alive.
    pub fn in_flight(&self) -> usize {
        self.shared.tasks.len()
    }

    fn spawn_action(&self, args: A) -> JoinHandle<()> {
        let action = Arc::clone(&self.shared.action);
        self.shared.tasks.spawn(async move { action(args).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: Duration = Duration::from_millis(300);

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    // --- Debouncer on a virtual clock (Duration as timestamp) ---

    #[test]
    fn burst_collapses_to_last_args() {
        let mut d: Debouncer<&str, Duration> = Debouncer::new(W);
        assert!(d.schedule("a", ms(0)).is_none());
        assert_eq!(d.schedule("b", ms(100)), Some("a"));
        assert_eq!(d.schedule("c", ms(250)), Some("b"));

        assert_eq!(d.poll(ms(549)), None);
        assert_eq!(d.poll(ms(550)), Some("c"));
        assert_eq!(d.poll(ms(10_000)), None);
    }

    #[test]
    fn spaced_calls_fire_separately() {
        let mut d: Debouncer<u32, Duration> = Debouncer::new(W);
        let mut fired = Vec::new();

        d.schedule(1, ms(0));
        fired.extend(d.poll(ms(300)));
        d.schedule(2, ms(300));
        fired.extend(d.poll(ms(600)));

        assert_eq!(fired, vec![1, 2]);
    }

    #[test]
    fn cancel_discards_args() {
        let mut d: Debouncer<u32, Duration> = Debouncer::new(W);
        d.schedule(7, ms(0));
        assert_eq!(d.deadline(), Some(ms(300)));
        assert_eq!(d.cancel_pending(), Some(7));
        assert!(!d.is_pending());
        assert_eq!(d.poll(ms(1_000)), None);
    }

    // --- Debounced on tokio's paused clock ---

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Debounced<String>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let debounced = Debounced::new(W, move |s: String| {
            let sink = Arc::clone(&sink);
            async move { sink.lock().push(s) }
        });
        (calls, debounced)
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_calls_fire_once_with_last_args() {
        let (calls, d) = recorder();
        for (i, word) in ["h", "he", "hel", "hello"].iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(ms(100)).await;
            }
            d.call(word.to_string());
        }
        tokio::time::sleep(ms(299)).await;
        assert!(calls.lock().is_empty());

        tokio::time::sleep(ms(50)).await;
        assert_eq!(*calls.lock(), vec!["hello".to_string()]);
        assert!(!d.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn calls_a_window_apart_fire_twice() {
        let (calls, d) = recorder();
        d.call("first".into());
        tokio::time::sleep(ms(350)).await;
        d.call("second".into());
        tokio::time::sleep(ms(350)).await;
        assert_eq!(*calls.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn calls_exactly_one_window_apart_fire_twice() {
        let (calls, d) = recorder();
        d.call("first".into());
        tokio::time::sleep(W).await;
        d.call("second".into());
        tokio::time::sleep(ms(1_000)).await;
        assert_eq!(*calls.lock(), vec!["first".to_string(), "second".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn running_invocation_is_not_aborted() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let d = Debounced::new(W, move |s: String| {
            let sink = Arc::clone(&sink);
            async move {
                tokio::time::sleep(ms(1_000)).await;
                sink.lock().push(s);
            }
        });

        d.call("slow".into());
        tokio::time::sleep(ms(400)).await;
        // "slow" is mid-flight now.
        d.call("next".into());
        tokio::time::sleep(ms(3_000)).await;
        assert_eq!(*calls.lock(), vec!["slow".to_string(), "next".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_pending_suppresses_invocation() {
        let (calls, d) = recorder();
        d.call("never".into());
        assert!(d.cancel_pending());
        tokio::time::sleep(ms(1_000)).await;
        assert!(calls.lock().is_empty());
        assert!(!d.cancel_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn flush_fires_immediately_and_once() {
        let (calls, d) = recorder();
        d.call("now".into());
        let handle = d.flush().expect("pending invocation");
        handle.await.unwrap();
        assert_eq!(*calls.lock(), vec!["now".to_string()]);

        tokio::time::sleep(ms(1_000)).await;
        assert_eq!(calls.lock().len(), 1);
        assert!(d.flush().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_waits_for_running_invocation() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let d = Debounced::new(W, move |s: String| {
            let sink = Arc::clone(&sink);
            async move {
                tokio::time::sleep(ms(1_000)).await;
                sink.lock().push(s);
            }
        });

        d.call("Hello".into());
        tokio::time::sleep(ms(400)).await;
        assert!(!d.is_pending());
        assert!(d.flush().is_none());

        d.drain().await;
        assert_eq!(*calls.lock(), vec!["Hello".to_string()]);
        assert_eq!(d.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_fires_pending_invocation() {
        let (calls, d) = recorder();
        d.call("queued".into());
        d.drain().await;
        assert_eq!(*calls.lock(), vec!["queued".to_string()]);

        // Tracker is usable again after draining.
        d.call("later".into());
        tokio::time::sleep(ms(400)).await;
        assert_eq!(calls.lock().len(), 2);
    }
}

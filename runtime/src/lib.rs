//! # Turnstile Runtime
//!
//! The session store runtime for the Turnstile check-in flow.
//!
//! This crate provides the [`Store`] that owns a state value, serializes
//! reducer execution, and executes effect descriptions in spawned tasks.
//!
//! ## Core Components
//!
//! - **Store**: owns state, runs the reducer, executes effects
//! - **Effect executor**: runs effect descriptions and feeds produced
//!   actions back into the reducer (the feedback loop that sequences
//!   validate-then-commit without the reducer awaiting anything)
//! - **State observation**: a watch-backed stream of state snapshots, one
//!   per processed action - the observable session value stream the UI
//!   layer consumes
//!
//! ## Example
//!
//! ```ignore
//! use turnstile_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action
//! store.send(Action::DoSomething).await?;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//!
//! // Observe state snapshots
//! let mut states = store.watch_states();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, broadcast, watch};
use turnstile_core::effect::Effect;
use turnstile_core::reducer::Reducer;

/// Error types for the store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching action or a settled state
        #[error("timeout waiting for action")]
        Timeout,

        /// The observation channel closed, typically because the store is
        /// shutting down
        #[error("observation channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;

/// Tracks outstanding effects spawned for a single `send` call.
///
/// Cloned into every spawned task; the counter reaching zero notifies the
/// matching [`EffectHandle`].
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notify: Arc<watch::Sender<()>>,
}

impl Clone for EffectTracking {
    fn clone(&self) -> Self {
        Self {
            counter: Arc::clone(&self.counter),
            notify: Arc::clone(&self.notify),
        }
    }
}

impl EffectTracking {
    fn new() -> (Self, watch::Receiver<()>) {
        let (notify, done) = watch::channel(());
        (
            Self {
                counter: Arc::new(AtomicUsize::new(0)),
                notify: Arc::new(notify),
            },
            done,
        )
    }

    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.notify.send(());
        }
    }
}

/// RAII guard that decrements the effect counter on drop.
///
/// Ensures the counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle to the effects spawned by a single `send` call.
///
/// `send()` returns after *starting* effect execution, not after effect
/// completion; the handle lets callers wait for the spawned work when a
/// test or teardown path needs it settled.
pub struct EffectHandle {
    counter: Arc<AtomicUsize>,
    done: watch::Receiver<()>,
}

impl EffectHandle {
    /// A handle whose effects have already completed (no effects spawned).
    #[must_use]
    pub fn completed() -> Self {
        let (_notify, done) = watch::channel(());
        Self {
            counter: Arc::new(AtomicUsize::new(0)),
            done,
        }
    }

    /// Whether all tracked effects have completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == 0
    }

    /// Wait until all tracked effects have completed.
    ///
    /// Only waits for the effects spawned by the originating `send`;
    /// actions those effects feed back spawn their own tracked sets.
    pub async fn wait(&mut self) {
        while self.counter.load(Ordering::SeqCst) > 0 {
            if self.done.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for effect completion with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires first.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

/// The Store - runtime coordinator for a reducer
///
/// The Store manages:
/// 1. State (behind an async `RwLock`; reducer runs hold the write lock,
///    so concurrent `send` calls serialize at the reducer)
/// 2. Reducer (business logic)
/// 3. Environment (injected dependencies)
/// 4. Effect execution (spawned tasks with an action feedback loop)
/// 5. State observation (one snapshot published per processed action)
///
/// # Type Parameters
///
/// - `S`: State type (cloned into the observation channel, so `Clone`)
/// - `A`: Action type
/// - `E`: Environment type
/// - `R`: Reducer implementation
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    /// Actions produced by effects are broadcast to observers, enabling
    /// request-response waiting without coupling to any transport.
    action_broadcast: broadcast::Sender<A>,
    /// State snapshot published after every reduce.
    state_broadcast: Arc<watch::Sender<S>>,
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    S: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    ///
    /// The action broadcast buffers 16 actions; slow observers that lag
    /// past that skip ahead rather than block the store.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        let (action_broadcast, _) = broadcast::channel(16);
        let (state_broadcast, _) = watch::channel(initial_state.clone());

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            action_broadcast,
            state_broadcast: Arc::new(state_broadcast),
        }
    }

    /// Send an action to the store.
    ///
    /// 1. Acquires the write lock on state
    /// 2. Calls the reducer with (state, action, environment)
    /// 3. Publishes the resulting state snapshot to observers
    /// 4. Executes returned effects in spawned tasks
    /// 5. Effects may produce more actions (feedback loop)
    ///
    /// Returns an [`EffectHandle`] for waiting on the spawned effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down.
    #[tracing::instrument(skip(self, action), name = "store_send")]
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(StoreError::ShutdownInProgress);
        }

        metrics::counter!("store.actions.processed").increment(1);

        let effects = {
            let mut state = self.state.write().await;
            let effects = self.reducer.reduce(&mut state, action, &self.environment);
            self.state_broadcast.send_replace(state.clone());
            effects
        };

        let (tracking, done) = EffectTracking::new();
        let counter = Arc::clone(&tracking.counter);

        for effect in effects {
            self.execute_effect(effect, tracking.clone());
        }

        Ok(EffectHandle { counter, done })
    }

    /// Read a projection of the current state.
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Observe state snapshots.
    ///
    /// The receiver starts at the latest snapshot and sees one update per
    /// processed action. This is the observable session value stream the
    /// UI layer renders from.
    #[must_use]
    pub fn watch_states(&self) -> watch::Receiver<S> {
        self.state_broadcast.subscribe()
    }

    /// Observe actions produced by effects.
    ///
    /// Only effect-produced actions are broadcast, not the actions handed
    /// to [`send`](Self::send) directly.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Send an action and wait for a matching effect-produced action.
    ///
    /// Subscribes to the action broadcast *before* sending (avoiding the
    /// race where the result lands first), then returns the first
    /// broadcast action matching the predicate.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`]: the timeout expired first
    /// - [`StoreError::ChannelClosed`]: the broadcast closed
    /// - [`StoreError::ShutdownInProgress`]: the store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        mut predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: FnMut(&A) -> bool,
    {
        let mut actions = self.subscribe_actions();
        let _handle = self.send(action).await?;

        let wait = async move {
            loop {
                match actions.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {},
                    // Lagged observers skip dropped actions; the timeout
                    // catches the case where the match was among them.
                    Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    },
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    /// Initiate graceful shutdown.
    ///
    /// Sets the shutdown flag (rejecting new actions), then waits for
    /// pending effects to complete.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires with
    /// effects still running.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("initiating graceful shutdown");
        metrics::counter!("store.shutdown.initiated").increment(1);

        self.shutdown.store(true, Ordering::Release);

        let start = std::time::Instant::now();
        let poll_interval = Duration::from_millis(100);

        loop {
            let pending = self.pending_effects.load(Ordering::Acquire);

            if pending == 0 {
                tracing::info!("all effects completed, shutdown successful");
                metrics::counter!("store.shutdown.completed").increment(1);
                return Ok(());
            }

            if start.elapsed() >= timeout {
                tracing::error!(pending_effects = pending, "shutdown timed out");
                metrics::counter!("store.shutdown.timeout").increment(1);
                return Err(StoreError::ShutdownTimeout(pending));
            }

            tracing::debug!(
                pending_effects = pending,
                elapsed_ms = start.elapsed().as_millis(),
                "waiting for effects to complete"
            );

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Execute an effect with completion tracking.
    ///
    /// Effects are fire-and-forget from the store's perspective: a failing
    /// or panicking effect task is logged and its counter released by the
    /// [`DecrementGuard`], but other effects continue.
    fn execute_effect(&self, effect: Effect<A>, tracking: EffectTracking) {
        match effect {
            Effect::None => {
                tracing::trace!("executing Effect::None (no-op)");
                metrics::counter!("store.effects.executed", "type" => "none").increment(1);
            },
            Effect::Future(fut) => {
                tracing::trace!("executing Effect::Future");
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                tracking.increment();

                self.pending_effects.fetch_add(1, Ordering::SeqCst);
                let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                let store = self.clone();

                tokio::spawn(async move {
                    let _guard = DecrementGuard(tracking);
                    let _pending_guard = pending_guard;

                    if let Some(action) = fut.await {
                        tracing::trace!("Effect::Future produced an action, feeding back");

                        // Broadcast to observers first, then feed back.
                        let _ = store.action_broadcast.send(action.clone());
                        let _ = store.send(action).await;
                    } else {
                        tracing::trace!("Effect::Future completed with no action");
                    }
                });
            },
            Effect::Parallel(effects) => {
                tracing::trace!(count = effects.len(), "executing Effect::Parallel");
                metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);

                for effect in effects {
                    self.execute_effect(effect, tracking.clone());
                }
            },
            Effect::Sequential(effects) => {
                tracing::trace!(count = effects.len(), "executing Effect::Sequential");
                metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                tracking.increment();

                self.pending_effects.fetch_add(1, Ordering::SeqCst);
                let pending_guard = AtomicCounterGuard(Arc::clone(&self.pending_effects));

                let store = self.clone();

                tokio::spawn(async move {
                    let _guard = DecrementGuard(tracking);
                    let _pending_guard = pending_guard;

                    for effect in effects {
                        let (sub_tracking, mut sub_done) = EffectTracking::new();
                        let sub_counter = Arc::clone(&sub_tracking.counter);

                        store.execute_effect(effect, sub_tracking);

                        while sub_counter.load(Ordering::SeqCst) > 0 {
                            if sub_done.changed().await.is_err() {
                                break;
                            }
                        }
                    }
                    tracing::trace!("Effect::Sequential completed");
                });
            },
        }
    }
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            action_broadcast: self.action_broadcast.clone(),
            state_broadcast: Arc::clone(&self.state_broadcast),
        }
    }
}

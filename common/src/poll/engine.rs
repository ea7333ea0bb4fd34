// Poll scheduler: one shared timer for every registered poller

use crate::errors::PollError;
use crate::poll::interval::tick_interval;
use crate::poll::payload::{Batch, Payload};
use crate::poll::poller::{Generator, PollerId};
use crate::telemetry;
use crate::transport::Transport;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Registry record for one poller
pub(crate) struct PollerEntry {
    namespace: Arc<str>,
    generator: Generator,
    interval_ms: u64,
    enabled: bool,
    last_fired: Option<Instant>,
}

impl PollerEntry {
    pub(crate) fn new(namespace: Arc<str>, interval_ms: u64, generator: Generator) -> Self {
        Self {
            namespace,
            generator,
            interval_ms,
            enabled: false,
            last_fired: None,
        }
    }

    /// A poller that has never fired is due on the first tick it is enabled for
    fn is_due(&self, now: Instant) -> bool {
        self.enabled
            && self.last_fired.map_or(true, |last| {
                now.saturating_duration_since(last) >= Duration::from_millis(self.interval_ms)
            })
    }

    fn mark_fired(&mut self, now: Instant) {
        self.last_fired = Some(self.last_fired.map_or(now, |last| last.max(now)));
    }
}

struct SchedulerState {
    registry: BTreeMap<PollerId, PollerEntry>,
    next_id: u64,
    tick_interval_ms: Option<u64>,
    timer: Option<JoinHandle<()>>,
    timer_starts: u64,
}

impl SchedulerState {
    /// Recompute the GCD of enabled intervals; true when it differs from the cached value
    fn compute_tick_interval(&mut self) -> bool {
        let enabled = self.registry.values().filter(|e| e.enabled);
        let computed = tick_interval(enabled.map(|e| e.interval_ms));
        let changed = computed != self.tick_interval_ms;
        self.tick_interval_ms = computed;
        changed
    }

    fn enabled_count(&self) -> usize {
        self.registry.values().filter(|e| e.enabled).count()
    }
}

impl Drop for SchedulerState {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Shared {
    transport: Arc<dyn Transport>,
    runtime: Handle,
    state: Mutex<SchedulerState>,
    self_ref: Weak<Shared>,
}

/// What a single tick did
#[derive(Debug)]
pub struct TickReport {
    /// Pollers selected as due, in selection order
    pub due: Vec<PollerId>,
    /// Id of the dispatched batch, if any payloads were produced
    pub batch_id: Option<Uuid>,
    pub payload_count: usize,
    /// Resolves to whether the transport acknowledged the batch
    pub delivery: Option<JoinHandle<bool>>,
}

/// Process-wide coordinator for pollers
///
/// Cheap to clone; every clone refers to the same registry and timer. Create
/// one per process (or per test) and hand it to each `Poller`.
#[derive(Clone)]
pub struct PollScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PollScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("PollScheduler")
            .field("pollers", &state.registry.len())
            .field("tick_interval_ms", &state.tick_interval_ms)
            .field("timer_running", &state.timer.is_some())
            .finish()
    }
}

impl PollScheduler {
    /// Create a scheduler bound to the current tokio runtime
    pub fn new(transport: Arc<dyn Transport>) -> Result<Self, PollError> {
        let runtime = Handle::try_current().map_err(|_| PollError::NoRuntime)?;

        let shared = Arc::new_cyclic(|self_ref| Shared {
            transport,
            runtime,
            state: Mutex::new(SchedulerState {
                registry: BTreeMap::new(),
                next_id: 0,
                tick_interval_ms: None,
                timer: None,
                timer_starts: 0,
            }),
            self_ref: self_ref.clone(),
        });

        Ok(Self { shared })
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.shared.transport
    }

    pub(crate) fn next_poller_id(&self) -> PollerId {
        let mut state = self.shared.state.lock();
        let id = PollerId::new(state.next_id);
        state.next_id += 1;
        id
    }

    /// Register a poller. Registering an id twice keeps the first entry.
    pub(crate) fn add(&self, id: PollerId, entry: PollerEntry) {
        let mut state = self.shared.state.lock();
        if state.registry.contains_key(&id) {
            debug!(poller_id = %id, "Poller already registered");
            return;
        }
        debug!(poller_id = %id, namespace = %entry.namespace, "Poller registered");
        state.registry.insert(id, entry);
    }

    /// Stop and unregister a poller, then recompute the shared cadence
    #[instrument(skip(self))]
    pub(crate) fn remove(&self, id: PollerId) {
        let removed = {
            let mut state = self.shared.state.lock();
            let removed = state.registry.remove(&id);
            match &removed {
                Some(entry) => {
                    info!(namespace = %entry.namespace, was_enabled = entry.enabled, "Poller removed");
                    self.shared.restart_locked(&mut state, false);
                }
                None => debug!("Poller not registered"),
            }
            removed
        };
        // The generator may own other pollers; drop it with the lock released
        drop(removed);
    }

    /// Enable a poller and make sure the timer runs. False if already enabled.
    pub(crate) fn enable(&self, id: PollerId) -> bool {
        let mut state = self.shared.state.lock();
        match state.registry.get_mut(&id) {
            Some(entry) if !entry.enabled => {
                entry.enabled = true;
                self.shared.start_locked(&mut state);
                true
            }
            _ => false,
        }
    }

    /// Disable a poller and recompute the cadence. False if already disabled.
    pub(crate) fn disable(&self, id: PollerId) -> bool {
        let mut state = self.shared.state.lock();
        match state.registry.get_mut(&id) {
            Some(entry) if entry.enabled => {
                entry.enabled = false;
                self.shared.restart_locked(&mut state, false);
                true
            }
            _ => false,
        }
    }

    /// Change a poller's interval. False if the value is unchanged.
    ///
    /// The caller has already rejected zero.
    pub(crate) fn update_interval(&self, id: PollerId, interval_ms: u64) -> bool {
        let mut state = self.shared.state.lock();
        let Some(entry) = state.registry.get_mut(&id) else {
            return false;
        };
        if entry.interval_ms == interval_ms {
            return false;
        }
        entry.interval_ms = interval_ms;
        if entry.enabled {
            self.shared.restart_locked(&mut state, false);
        }
        true
    }

    /// Recompute the tick interval and restart the timer if needed
    pub fn restart(&self, force_start: bool) {
        let mut state = self.shared.state.lock();
        self.shared.restart_locked(&mut state, force_start);
    }

    /// Run one tick immediately, outside the timer's cadence
    pub fn tick_now(&self) -> TickReport {
        self.shared.on_tick(Instant::now())
    }

    pub(crate) fn tick_at(&self, now: Instant) -> TickReport {
        self.shared.on_tick(now)
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        self.shared
            .state
            .lock()
            .tick_interval_ms
            .map(Duration::from_millis)
    }

    pub fn is_timer_running(&self) -> bool {
        self.shared.state.lock().timer.is_some()
    }

    /// Number of timers spawned over the scheduler's lifetime
    pub fn timer_starts(&self) -> u64 {
        self.shared.state.lock().timer_starts
    }

    pub fn poller_count(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    pub fn enabled_count(&self) -> usize {
        self.shared.state.lock().enabled_count()
    }

    pub fn is_registered(&self, id: PollerId) -> bool {
        self.shared.state.lock().registry.contains_key(&id)
    }

    pub(crate) fn is_enabled(&self, id: PollerId) -> bool {
        self.shared
            .state
            .lock()
            .registry
            .get(&id)
            .is_some_and(|e| e.enabled)
    }

    pub(crate) fn interval_of(&self, id: PollerId) -> Option<u64> {
        self.shared
            .state
            .lock()
            .registry
            .get(&id)
            .map(|e| e.interval_ms)
    }
}

impl Shared {
    /// Recompute the tick interval and replace the running timer
    ///
    /// An idle timer stays idle unless `force_start` is set. Otherwise any
    /// existing timer is torn down and a fresh one started at the new interval,
    /// or none at all when no poller is enabled.
    fn restart_locked(&self, state: &mut SchedulerState, force_start: bool) {
        if state.timer.is_none() && !force_start {
            debug!("Timer idle and start not forced, skipping restart");
            return;
        }

        state.compute_tick_interval();
        self.record_state(state);

        if let Some(timer) = state.timer.take() {
            timer.abort();
            debug!("Shared timer stopped");
        }

        match state.tick_interval_ms {
            Some(period_ms) => match self.spawn_timer(period_ms) {
                Some(timer) => {
                    state.timer = Some(timer);
                    state.timer_starts += 1;
                    info!(
                        tick_interval_ms = period_ms,
                        enabled_pollers = state.enabled_count(),
                        "Shared timer started"
                    );
                }
                None => error!(
                    tick_interval_ms = period_ms,
                    "Tick interval out of range, shared timer not started"
                ),
            },
            None => info!("No enabled pollers, shared timer stopped"),
        }
    }

    /// Start the timer for a newly enabled poller
    ///
    /// A running timer whose cadence is unchanged keeps its phase.
    fn start_locked(&self, state: &mut SchedulerState) {
        if state.timer.is_some() && !state.compute_tick_interval() {
            self.record_state(state);
            debug!(
                tick_interval_ms = ?state.tick_interval_ms,
                "Tick interval unchanged, keeping timer"
            );
            return;
        }
        self.restart_locked(state, true);
    }

    fn record_state(&self, state: &SchedulerState) {
        telemetry::record_tick_interval(state.tick_interval_ms);
        telemetry::record_enabled_pollers(state.enabled_count());
    }

    fn spawn_timer(&self, period_ms: u64) -> Option<JoinHandle<()>> {
        let shared = self.self_ref.clone();
        let period = Duration::from_millis(period_ms);
        let start = first_tick(Instant::now(), period)?;

        Some(self.runtime.spawn(async move {
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                let scheduled = ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                shared.on_tick(scheduled);
            }
        }))
    }

    fn on_tick(&self, now: Instant) -> TickReport {
        telemetry::record_tick();

        let due: Vec<(PollerId, Arc<str>, Generator)> = {
            let mut state = self.state.lock();
            state
                .registry
                .iter_mut()
                .filter(|(_, entry)| entry.is_due(now))
                .map(|(id, entry)| {
                    // Advanced regardless of delivery outcome
                    entry.mark_fired(now);
                    (*id, entry.namespace.clone(), entry.generator.clone())
                })
                .collect()
        };

        let mut payloads: Vec<Payload> = Vec::new();
        for (id, namespace, generator) in &due {
            match panic::catch_unwind(AssertUnwindSafe(|| generator())) {
                Ok(output) => {
                    let produced = output.into_payloads();
                    telemetry::record_payloads(namespace, produced.len());
                    payloads.extend(produced.into_iter().map(|p| p.namespaced(namespace)));
                }
                Err(_) => {
                    error!(poller_id = %id, namespace = %namespace, "Poll generator panicked, skipping its output");
                    telemetry::record_generator_panic(namespace);
                }
            }
        }

        let due: Vec<PollerId> = due.into_iter().map(|(id, _, _)| id).collect();

        if payloads.is_empty() {
            if !due.is_empty() {
                debug!(due = due.len(), "Due pollers produced nothing to send");
            }
            return TickReport {
                due,
                batch_id: None,
                payload_count: 0,
                delivery: None,
            };
        }

        let batch = Batch::new(payloads);
        let batch_id = batch.id;
        let payload_count = batch.len();
        debug!(batch_id = %batch_id, due = due.len(), payloads = payload_count, "Dispatching batch");

        let delivery = self.runtime.spawn(deliver(self.transport.clone(), batch));

        TickReport {
            due,
            batch_id: Some(batch_id),
            payload_count,
            delivery: Some(delivery),
        }
    }
}

/// Deadline of the first tick, one period from `now`
fn first_tick(now: Instant, period: Duration) -> Option<Instant> {
    now.checked_add(period)
}

#[instrument(skip_all, fields(batch_id = %batch.id, payloads = batch.len()))]
async fn deliver(transport: Arc<dyn Transport>, batch: Batch) -> bool {
    match transport.send(&batch).await {
        Ok(()) => {
            telemetry::record_batch_sent(batch.len());
            debug!("Batch acknowledged");
            true
        }
        Err(e) => {
            telemetry::record_delivery_failure(&e);
            warn!(error = %e, "Batch delivery failed, due pollers wait for their next interval");
            false
        }
    }
}

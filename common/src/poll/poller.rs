// Poller: a unit of periodic work registered with a PollScheduler

use crate::errors::PollError;
use crate::poll::engine::{PollScheduler, PollerEntry};
use crate::poll::payload::PollOutput;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message-producing function invoked whenever the poller is due
pub type Generator = Arc<dyn Fn() -> PollOutput + Send + Sync>;

/// Registry key, assigned in registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollerId(u64);

impl PollerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for PollerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poller-{}", self.0)
    }
}

fn validate_interval(interval_ms: u64) -> Result<(), PollError> {
    if interval_ms == 0 {
        return Err(PollError::InvalidInterval { interval_ms });
    }
    Ok(())
}

/// Handle to a registered poller
///
/// Never owns a timer: starting and stopping only flips the registry entry and
/// asks the scheduler to recompute its shared cadence. Dropping the handle
/// destroys the poller.
pub struct Poller {
    id: PollerId,
    namespace: Arc<str>,
    scheduler: PollScheduler,
}

impl fmt::Debug for Poller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Poller")
            .field("id", &self.id)
            .field("namespace", &self.namespace)
            .field("interval_ms", &self.interval_ms())
            .field("running", &self.is_running())
            .finish()
    }
}

impl Poller {
    /// Create and register a stopped poller
    pub fn new<F, O>(
        scheduler: &PollScheduler,
        namespace: impl Into<String>,
        interval_ms: u64,
        generator: F,
    ) -> Result<Self, PollError>
    where
        F: Fn() -> O + Send + Sync + 'static,
        O: Into<PollOutput>,
    {
        validate_interval(interval_ms)?;

        let namespace: Arc<str> = Arc::from(namespace.into());
        let boxed: Generator = Arc::new(move || -> PollOutput { generator().into() });

        let id = scheduler.next_poller_id();
        scheduler.add(id, PollerEntry::new(namespace.clone(), interval_ms, boxed));

        Ok(Self {
            id,
            namespace,
            scheduler: scheduler.clone(),
        })
    }

    /// Create, register and immediately start a poller
    pub async fn new_started<F, O>(
        scheduler: &PollScheduler,
        namespace: impl Into<String>,
        interval_ms: u64,
        generator: F,
    ) -> Result<Self, PollError>
    where
        F: Fn() -> O + Send + Sync + 'static,
        O: Into<PollOutput>,
    {
        let poller = Self::new(scheduler, namespace, interval_ms, generator)?;
        poller.start().await;
        Ok(poller)
    }

    pub fn id(&self) -> PollerId {
        self.id
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn interval_ms(&self) -> u64 {
        self.scheduler.interval_of(self.id).unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_enabled(self.id)
    }

    /// Change the desired interval
    ///
    /// Zero is rejected without touching any state. A running poller makes
    /// the scheduler recompute its cadence; a stopped one never starts the timer.
    pub fn set_interval(&self, interval_ms: u64) -> Result<(), PollError> {
        validate_interval(interval_ms)?;

        if self.scheduler.update_interval(self.id, interval_ms) {
            debug!(poller_id = %self.id, interval_ms, "Poller interval updated");
        } else {
            warn!(
                poller_id = %self.id,
                namespace = %self.namespace,
                interval_ms,
                "Poller interval unchanged, ignoring"
            );
        }
        Ok(())
    }

    /// Start polling if the transport currently permits it
    pub async fn start(&self) {
        if !self.scheduler.transport().is_polling_permitted().await {
            info!(
                poller_id = %self.id,
                namespace = %self.namespace,
                "Polling not permitted, poller stays stopped"
            );
            return;
        }

        if self.scheduler.enable(self.id) {
            info!(poller_id = %self.id, namespace = %self.namespace, "Poller started");
        } else {
            warn!(poller_id = %self.id, namespace = %self.namespace, "Poller already running");
        }
    }

    pub fn stop(&self) {
        if self.scheduler.disable(self.id) {
            info!(poller_id = %self.id, namespace = %self.namespace, "Poller stopped");
        } else {
            warn!(poller_id = %self.id, namespace = %self.namespace, "Poller already stopped");
        }
    }

    /// Stop and unregister the poller
    pub fn destroy(self) {
        drop(self);
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.scheduler.remove(self.id);
    }
}

// Feature managers: per-capability pollers configured by data, not subclassing

use crate::config::FeatureConfig;
use crate::errors::PollError;
use crate::poll::{Payload, PollScheduler, Poller};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Host capabilities exposed through the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Motion,
    Bluetooth,
    ArSession,
    AudioSession,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Motion,
        FeatureKind::Bluetooth,
        FeatureKind::ArSession,
        FeatureKind::AudioSession,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Motion => "motion",
            FeatureKind::Bluetooth => "bluetooth",
            FeatureKind::ArSession => "ar_session",
            FeatureKind::AudioSession => "audio_session",
        }
    }

    /// Discriminator of the data-fetch request this feature polls with
    pub fn poll_message(&self) -> &'static str {
        match self {
            FeatureKind::Motion => "sample",
            FeatureKind::Bluetooth => "scan_results",
            FeatureKind::ArSession => "frame",
            FeatureKind::AudioSession => "levels",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the data-fetch poller of one capability
///
/// The generator only emits while the feature is active, so a poll that races
/// a deactivation produces nothing. Dropping the manager destroys its poller.
#[derive(Debug)]
pub struct FeatureManager {
    kind: FeatureKind,
    needs_data: Arc<AtomicBool>,
    poller: Poller,
}

impl FeatureManager {
    /// Build a stopped manager
    pub fn new(
        scheduler: &PollScheduler,
        kind: FeatureKind,
        config: &FeatureConfig,
    ) -> Result<Self, PollError> {
        let needs_data = Arc::new(AtomicBool::new(false));
        let seq = AtomicU64::new(0);

        let flag = needs_data.clone();
        let generator = move || -> Option<Payload> {
            if !flag.load(Ordering::SeqCst) {
                return None;
            }
            let n = seq.fetch_add(1, Ordering::Relaxed);
            Some(
                Payload::new(kind.poll_message())
                    .with_field("feature", kind.as_str())
                    .with_field("seq", n),
            )
        };

        let poller = Poller::new(scheduler, config.namespace.clone(), config.interval_ms, generator)?;
        debug!(feature = %kind, namespace = %config.namespace, "Feature manager created");

        Ok(Self {
            kind,
            needs_data,
            poller,
        })
    }

    /// Build a manager and activate it when the config asks for auto start
    pub async fn from_config(
        scheduler: &PollScheduler,
        kind: FeatureKind,
        config: &FeatureConfig,
    ) -> Result<Self, PollError> {
        let manager = Self::new(scheduler, kind, config)?;
        if config.auto_start {
            manager.activate().await;
        }
        Ok(manager)
    }

    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    pub fn poller(&self) -> &Poller {
        &self.poller
    }

    pub fn is_active(&self) -> bool {
        self.poller.is_running()
    }

    /// The feature became active: start fetching data
    pub async fn activate(&self) {
        self.needs_data.store(true, Ordering::SeqCst);
        self.poller.start().await;
        if !self.poller.is_running() {
            // Polling was not permitted; do not leave a stale flag behind
            self.needs_data.store(false, Ordering::SeqCst);
        }
        info!(feature = %self.kind, active = self.is_active(), "Feature activation requested");
    }

    /// The feature went inactive: stop fetching data
    pub fn deactivate(&self) {
        self.needs_data.store(false, Ordering::SeqCst);
        self.poller.stop();
        info!(feature = %self.kind, "Feature deactivated");
    }

    pub fn set_interval(&self, interval_ms: u64) -> Result<(), PollError> {
        self.poller.set_interval(interval_ms)
    }
}

//! Viewport Engine Adapter: owns the single live engine session.
//!
//! Bringing a session up is split in three so the navigator never holds its
//! lock across the load wait:
//!
//! 1. [`ViewportAdapter::begin`] (locked) tears down any prior session and
//!    claims a new epoch.
//! 2. [`bring_up`] (unlocked) constructs the engine, attaches controls and
//!    environment, and waits for resources.
//! 3. [`ViewportAdapter::install`] (locked) accepts the engine only if its
//!    epoch is still current; otherwise the engine is torn down on the spot.

use std::time::Duration;

use tracing::{debug, info};

use crate::engine::{Control, EngineError, EngineFactory, EnvironmentSettings, ViewportEngine};
use crate::markers::MarkerHandle;

/// Identity of one engine session. Never reused within a process.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Live binding between an authorized token and one engine instance.
pub struct ViewportSession {
    id: SessionId,
    token: String,
    engine: Box<dyn ViewportEngine>,
    ready: bool,
    pub(crate) markers: Vec<MarkerHandle>,
    pub(crate) populated: bool,
}

impl ViewportSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn markers(&self) -> &[MarkerHandle] {
        &self.markers
    }

    pub(crate) fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn engine_mut(&mut self) -> &mut dyn ViewportEngine {
        self.engine.as_mut()
    }

    fn teardown(&mut self) {
        self.ready = false;
        self.markers.clear();
        self.engine.teardown();
    }
}

impl std::fmt::Debug for ViewportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewportSession")
            .field("id", &self.id)
            .field("ready", &self.ready)
            .field("markers", &self.markers.len())
            .finish()
    }
}

/// A claimed initialization slot; see the module docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingInit {
    pub epoch: u64,
    pub token: String,
}

#[derive(Debug, Default)]
pub struct ViewportAdapter {
    session: Option<ViewportSession>,
    pending: Option<PendingInit>,
    epoch: u64,
    next_session: u64,
}

impl ViewportAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<&ViewportSession> {
        self.session.as_ref()
    }

    pub fn ready_session_mut(&mut self) -> Option<&mut ViewportSession> {
        self.session.as_mut().filter(|s| s.ready)
    }

    /// Live session already bound to `token`, if any.
    pub fn live_for(&self, token: &str) -> Option<SessionId> {
        self.session
            .as_ref()
            .filter(|s| s.token() == token)
            .map(|s| s.id)
    }

    /// Tears down the current session (if any) and claims a new epoch for
    /// `token`. Any initialization still in flight becomes stale.
    pub fn begin(&mut self, token: &str) -> PendingInit {
        self.teardown();
        self.epoch += 1;
        let pending = PendingInit {
            epoch: self.epoch,
            token: token.to_string(),
        };
        self.pending = Some(pending.clone());
        pending
    }

    /// Whether `epoch` is still the initialization the adapter is waiting on.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.pending.as_ref().is_some_and(|p| p.epoch == epoch)
    }

    /// Accepts a loaded engine for `pending`. Returns `None` (after tearing the
    /// engine down) if the epoch was superseded in the meantime.
    pub fn install(
        &mut self,
        pending: &PendingInit,
        mut engine: Box<dyn ViewportEngine>,
    ) -> Option<&mut ViewportSession> {
        if !self.is_current(pending.epoch) {
            debug!(epoch = pending.epoch, "discarding engine from superseded initialization");
            engine.teardown();
            return None;
        }
        self.pending = None;
        self.next_session += 1;
        let id = SessionId(self.next_session);
        info!(%id, "viewport session ready");
        Some(self.session.insert(ViewportSession {
            id,
            token: pending.token.clone(),
            engine,
            ready: true,
            markers: Vec::new(),
            populated: false,
        }))
    }

    /// Marks `pending` as finished without a session (initialization failed).
    pub fn abandon(&mut self, pending: &PendingInit) {
        if self.is_current(pending.epoch) {
            self.pending = None;
        }
    }

    /// Releases the engine and every marker handle. No-op without a session.
    /// Also invalidates any initialization in flight.
    pub fn teardown(&mut self) {
        if self.pending.take().is_some() {
            self.epoch += 1;
        }
        if let Some(mut session) = self.session.take() {
            info!(id = %session.id, "tearing down viewport session");
            session.teardown();
        }
    }
}

impl Drop for ViewportAdapter {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Constructs and loads an engine for `token`. Runs without any lock held.
pub async fn bring_up(
    factory: &dyn EngineFactory,
    token: &str,
    surface: &str,
    controls: &[Control],
    environment: &EnvironmentSettings,
    load_timeout: Duration,
) -> Result<Box<dyn ViewportEngine>, EngineError> {
    let mut engine = factory.create(token, surface).await?;
    let loaded = async {
        for control in controls {
            engine.add_control(*control)?;
        }
        engine.set_environment(environment)?;
        match tokio::time::timeout(load_timeout, engine.wait_until_loaded()).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::unreachable(format!(
                "resources not loaded within {load_timeout:?}"
            ))),
        }
    }
    .await;
    match loaded {
        Ok(()) => Ok(engine),
        Err(e) => {
            engine.teardown();
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ViewportAdapter, bring_up};
    use crate::engine::{Control, EngineErrorKind, EnvironmentSettings, ViewportEngine};
    use crate::headless::{EngineCommand, HeadlessEngineFactory};

    async fn loaded(factory: &HeadlessEngineFactory) -> Box<dyn ViewportEngine> {
        bring_up(
            factory,
            "pk.a",
            "globe",
            &[Control::Navigation],
            &EnvironmentSettings::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn bring_up_attaches_controls_and_environment_before_load() {
        let factory = HeadlessEngineFactory::accept_any();
        let _engine = loaded(&factory).await;
        let kinds: Vec<_> = factory
            .log()
            .commands()
            .into_iter()
            .map(|c| match c {
                EngineCommand::Created { .. } => "created",
                EngineCommand::AddControl { .. } => "control",
                EngineCommand::SetEnvironment { .. } => "environment",
                EngineCommand::Loaded { .. } => "loaded",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["created", "control", "environment", "loaded"]);
    }

    #[tokio::test(start_paused = true)]
    async fn bring_up_times_out_as_unreachable() {
        let factory = HeadlessEngineFactory::accept_any().with_load_delay(Duration::from_secs(60));
        let err = bring_up(
            &factory,
            "pk.a",
            "globe",
            &[],
            &EnvironmentSettings::default(),
            Duration::from_secs(1),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.kind, EngineErrorKind::Unreachable);
        assert_eq!(factory.log().live_engines(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_install_tears_engine_down() {
        let factory = HeadlessEngineFactory::accept_any();
        let mut adapter = ViewportAdapter::new();
        let first = adapter.begin("pk.a");
        let second = adapter.begin("pk.b");

        let engine = loaded(&factory).await;
        assert!(adapter.install(&first, engine).is_none());
        assert_eq!(factory.log().live_engines(), 0);

        let engine = loaded(&factory).await;
        let session = adapter.install(&second, engine).unwrap();
        assert!(session.is_ready());
        assert_eq!(adapter.live_for("pk.b"), adapter.session().map(|s| s.id()));
        assert_eq!(adapter.live_for("pk.a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_invalidates_pending_and_is_safe_without_session() {
        let factory = HeadlessEngineFactory::accept_any();
        let mut adapter = ViewportAdapter::new();
        adapter.teardown();

        let pending = adapter.begin("pk.a");
        adapter.teardown();
        assert!(!adapter.is_current(pending.epoch));
        let engine = loaded(&factory).await;
        assert!(adapter.install(&pending, engine).is_none());
        assert!(adapter.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn begin_tears_down_the_live_session() {
        let factory = HeadlessEngineFactory::accept_any();
        let mut adapter = ViewportAdapter::new();
        let p = adapter.begin("pk.a");
        let engine = loaded(&factory).await;
        adapter.install(&p, engine).unwrap();
        assert_eq!(factory.log().live_engines(), 1);

        adapter.begin("pk.b");
        assert!(adapter.session().is_none());
        assert_eq!(factory.log().live_engines(), 0);
    }
}

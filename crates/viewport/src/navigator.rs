//! The navigator: one handle over the gate, the engine session, the markers
//! and the transition controller.
//!
//! All state lives behind a single lock. Nothing awaits while holding it: the
//! engine load runs between [`ViewportAdapter::begin`] and
//! [`ViewportAdapter::install`], and transition timers re-acquire the lock
//! through a weak reference when they fire.

use std::sync::{Arc, Weak};

use credentials::{CredentialGate, GateState, KeyValueStore, ScopedStore};
use locations::LocationRegistry;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::adapter::{PendingInit, SessionId, ViewportAdapter, bring_up};
use crate::config::NavigatorConfig;
use crate::engine::{CameraCommand, EngineError, EngineFactory, MarkerId, ViewportEngine};
use crate::error::{NavigationError, NavigatorError};
use crate::markers::{self, MarkerHandle};
use crate::navigation::{NavigationController, TransitionRequest};
use crate::notify::{Notification, Notifier};

/// Cheap to clone; every clone drives the same viewport.
#[derive(Clone)]
pub struct Navigator {
    core: Arc<Mutex<Core>>,
    factory: Arc<dyn EngineFactory>,
    config: Arc<NavigatorConfig>,
}

struct Core {
    gate: CredentialGate,
    registry: LocationRegistry,
    adapter: ViewportAdapter,
    nav: NavigationController,
    notifier: Notifier,
    config: Arc<NavigatorConfig>,
}

impl Navigator {
    pub fn new(
        config: NavigatorConfig,
        registry: LocationRegistry,
        store: Arc<dyn KeyValueStore>,
        factory: Arc<dyn EngineFactory>,
    ) -> (Self, UnboundedReceiver<Notification>) {
        let config = Arc::new(config);
        let (notifier, rx) = Notifier::channel();
        let gate = CredentialGate::new(ScopedStore::new(store, config.credential_key.clone()));
        let core = Core {
            gate,
            registry,
            adapter: ViewportAdapter::new(),
            nav: NavigationController::new(),
            notifier,
            config: config.clone(),
        };
        let navigator = Self {
            core: Arc::new(Mutex::new(core)),
            factory,
            config,
        };
        (navigator, rx)
    }

    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    pub fn registry(&self) -> LocationRegistry {
        self.core.lock().registry.clone()
    }

    pub fn gate_state(&self) -> GateState {
        self.core.lock().gate.state()
    }

    /// The live, ready session, if any.
    pub fn session_id(&self) -> Option<SessionId> {
        let core = self.core.lock();
        core.adapter
            .session()
            .filter(|s| s.is_ready())
            .map(|s| s.id())
    }

    pub fn markers(&self) -> Vec<MarkerHandle> {
        let core = self.core.lock();
        core.adapter
            .session()
            .map(|s| s.markers().to_vec())
            .unwrap_or_default()
    }

    pub fn open_popups(&self) -> Vec<usize> {
        let core = self.core.lock();
        core.adapter
            .session()
            .map(markers::open_popups)
            .unwrap_or_default()
    }

    /// Restores a persisted credential and, if there was one, initializes
    /// the viewport with it. `Ok(None)` means the gate is waiting for input.
    pub async fn start(&self) -> Result<Option<SessionId>, NavigatorError> {
        let claim = {
            let mut core = self.core.lock();
            if core.gate.load()? != GateState::Validating {
                return Ok(None);
            }
            let Some(token) = core.gate.token().map(str::to_string) else {
                return Ok(None);
            };
            core.claim(&token)
        };
        self.initialize(claim).await.map(Some)
    }

    /// Validates `token` by bringing up a viewport with it. Blank input is
    /// refused before any engine is touched.
    pub async fn submit_credential(&self, token: &str) -> Result<SessionId, NavigatorError> {
        let claim = {
            let mut core = self.core.lock();
            let token = core.gate.submit(token)?.token().to_string();
            core.claim(&token)
        };
        self.initialize(claim).await
    }

    /// Re-runs initialization with the credential the gate still holds, after
    /// an engine outage or an [`unmount`](Self::unmount).
    pub async fn retry(&self) -> Result<SessionId, NavigatorError> {
        let claim = {
            let mut core = self.core.lock();
            let token = core
                .gate
                .token()
                .map(str::to_string)
                .ok_or(NavigatorError::NothingToRetry)?;
            core.claim(&token)
        };
        self.initialize(claim).await
    }

    /// Forgets the credential everywhere and releases the viewport.
    pub fn clear_credential(&self) {
        let mut core = self.core.lock();
        core.nav.cancel();
        core.adapter.teardown();
        core.gate.clear();
        core.notifier.emit(Notification::Cleared);
    }

    /// Releases the viewport but keeps the credential.
    pub fn unmount(&self) {
        let mut core = self.core.lock();
        core.nav.cancel();
        core.adapter.teardown();
    }

    /// Flies to the location at `index`. On completion its popup opens and a
    /// [`Notification::Navigated`] is emitted, unless another fly-to or a
    /// teardown got there first. Errors are for the caller's logs only.
    pub fn fly_to(&self, index: i64) -> Result<u64, NavigationError> {
        let runtime = Handle::try_current().map_err(|_| NavigationError::NoRuntime)?;
        let mut core = self.core.lock();
        let target = core.registry.resolve(index)?;
        core.fly_to(target, &runtime, Arc::downgrade(&self.core))
    }

    /// A click on a marker navigates to its location.
    pub fn marker_clicked(&self, marker: MarkerId) -> Result<u64, NavigationError> {
        let runtime = Handle::try_current().map_err(|_| NavigationError::NoRuntime)?;
        let mut core = self.core.lock();
        let target = core
            .adapter
            .session()
            .filter(|s| s.is_ready())
            .ok_or(NavigationError::NotReady)?;
        let Some(target) = markers::index_for_marker(target, marker) else {
            return Err(NavigationError::UnknownMarker(marker));
        };
        core.fly_to(target, &runtime, Arc::downgrade(&self.core))
    }

    /// Flips the popup at `index`. Out-of-range indices are ignored.
    pub fn toggle_popup(&self, index: i64) {
        let mut core = self.core.lock();
        let Ok(index) = core.registry.resolve(index) else {
            return;
        };
        if let Some(session) = core.adapter.ready_session_mut() {
            markers::toggle_popup(session, index);
        }
    }

    async fn initialize(&self, claim: Claim) -> Result<SessionId, NavigatorError> {
        let pending = match claim {
            Claim::Live(id) => return Ok(id),
            Claim::Pending(pending) => pending,
        };
        info!(epoch = pending.epoch, surface = %self.config.surface, "initializing viewport");

        let loaded = bring_up(
            self.factory.as_ref(),
            &pending.token,
            &self.config.surface,
            &self.config.controls,
            &self.config.environment,
            self.config.load_timeout(),
        )
        .await;

        self.core.lock().finish_initialize(&pending, loaded)
    }
}

/// Outcome of claiming the adapter for a token, taken in the same critical
/// section as the gate transition that produced the token.
enum Claim {
    Live(SessionId),
    Pending(PendingInit),
}

impl Core {
    fn claim(&mut self, token: &str) -> Claim {
        if let Some(id) = self.adapter.live_for(token) {
            debug!(%id, "token already bound to the live session");
            self.authorize();
            return Claim::Live(id);
        }
        self.nav.cancel();
        Claim::Pending(self.adapter.begin(token))
    }

    fn authorize(&mut self) {
        if let Err(e) = self.gate.authorize() {
            warn!("credential not marked authorized: {e}");
        }
    }

    fn finish_initialize(
        &mut self,
        pending: &PendingInit,
        loaded: Result<Box<dyn ViewportEngine>, EngineError>,
    ) -> Result<SessionId, NavigatorError> {
        // The gate moved on to another token while this one was loading.
        if self.gate.token() != Some(pending.token.as_str()) {
            debug!(epoch = pending.epoch, "credential changed during initialization");
            self.adapter.abandon(pending);
            if let Ok(mut engine) = loaded {
                engine.teardown();
            }
            return Err(NavigatorError::Superseded);
        }
        let engine = match loaded {
            Ok(engine) => engine,
            Err(e) => return Err(self.fail_initialize(pending, e)),
        };
        let Some(session) = self.adapter.install(pending, engine) else {
            return Err(NavigatorError::Superseded);
        };
        let id = session.id();

        let count = match markers::populate(session, self.registry.all(), &self.config.marker_color)
        {
            Ok(count) => count,
            Err(e) => {
                warn!(%id, "marker population incomplete: {e}");
                session.markers().len()
            }
        };
        if let Some(view) = self.registry.initial_view() {
            let command = CameraCommand {
                center: view.coordinates,
                camera: view.camera,
                duration: view.duration,
            };
            if let Err(e) = self.nav.issue(session, &command) {
                warn!(%id, "initial view not applied: {e}");
            }
        }

        self.authorize();
        self.notifier.emit(Notification::Ready { markers: count });
        Ok(id)
    }

    fn fail_initialize(&mut self, pending: &PendingInit, error: EngineError) -> NavigatorError {
        if !self.adapter.is_current(pending.epoch) {
            debug!(epoch = pending.epoch, "superseded initialization failed: {error}");
            return NavigatorError::Superseded;
        }
        self.adapter.abandon(pending);
        if error.is_unauthorized() {
            warn!("access token refused: {}", error.message);
            if let Err(e) = self.gate.reject() {
                warn!("credential not marked rejected: {e}");
            }
            self.notifier.emit(Notification::AuthorizationError {
                message: error.message.clone(),
            });
        } else {
            warn!("viewport engine unavailable: {}", error.message);
            self.notifier.emit(Notification::EngineError {
                message: error.message.clone(),
            });
        }
        NavigatorError::Engine(error)
    }

    fn fly_to(
        &mut self,
        target: usize,
        runtime: &Handle,
        core: Weak<Mutex<Core>>,
    ) -> Result<u64, NavigationError> {
        let location = self.registry.get(target)?;
        let duration = self.config.transition_duration();
        let command = CameraCommand {
            center: location.coordinates,
            camera: location.camera,
            duration,
        };
        let session = self
            .adapter
            .ready_session_mut()
            .ok_or(NavigationError::NotReady)?;

        let request = self.nav.begin(target, session.id());
        if let Err(e) = self.nav.issue(session, &command) {
            self.nav.abandon(&request);
            return Err(NavigationError::Engine(e));
        }
        debug!(
            generation = request.generation,
            target,
            name = %location.name,
            "fly-to issued"
        );

        let timer = runtime.spawn(async move {
            tokio::time::sleep_until(request.issued_at + duration).await;
            if let Some(core) = core.upgrade() {
                core.lock().complete_transition(&request);
            }
        });
        self.nav.arm(&request, timer);
        Ok(request.generation)
    }

    fn complete_transition(&mut self, request: &TransitionRequest) {
        let live = self
            .adapter
            .session()
            .filter(|s| s.is_ready())
            .map(|s| s.id());
        if !self.nav.complete(request, live) {
            return;
        }
        let Ok(location) = self.registry.get(request.target_index) else {
            return;
        };
        if let Some(session) = self.adapter.ready_session_mut() {
            markers::reveal_popup(session, request.target_index);
        }
        info!(name = %location.name, generation = request.generation, "arrived");
        self.notifier.emit(Notification::Navigated {
            name: location.name.clone(),
            description: location.description.clone(),
        });
    }
}

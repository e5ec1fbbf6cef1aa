//! In-process engine without a render surface.
//!
//! Used by the CLI host and by tests. Every command is appended to a shared
//! [`EngineLog`] so callers can assert exactly what reached the engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::engine::{
    CameraCommand, Control, EngineError, EngineFactory, EnvironmentSettings, MarkerId, MarkerSpec,
    ViewportEngine,
};

/// Which tokens the headless backend treats as valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenPolicy {
    AcceptAny,
    AcceptPrefix(String),
    AcceptExact(Vec<String>),
}

impl TokenPolicy {
    pub fn accepts(&self, token: &str) -> bool {
        match self {
            TokenPolicy::AcceptAny => true,
            TokenPolicy::AcceptPrefix(prefix) => token.starts_with(prefix.as_str()),
            TokenPolicy::AcceptExact(tokens) => tokens.iter().any(|t| t == token),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Created { engine: u64, surface: String },
    AddControl { engine: u64, control: Control },
    SetEnvironment { engine: u64, environment: EnvironmentSettings },
    Loaded { engine: u64 },
    AddMarker { engine: u64, marker: MarkerId, title: String },
    SetPopup { engine: u64, marker: MarkerId, open: bool },
    FlyTo { engine: u64, command: CameraCommand },
    Teardown { engine: u64 },
}

/// Append-only record of engine commands, shared by all instances of a factory.
#[derive(Debug, Default, Clone)]
pub struct EngineLog {
    commands: Arc<Mutex<Vec<EngineCommand>>>,
}

impl EngineLog {
    fn push(&self, command: EngineCommand) {
        self.commands.lock().push(command);
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().clone()
    }

    pub fn created(&self) -> usize {
        self.count(|c| matches!(c, EngineCommand::Created { .. }))
    }

    pub fn torn_down(&self) -> usize {
        self.count(|c| matches!(c, EngineCommand::Teardown { .. }))
    }

    /// Engines created and not yet torn down.
    pub fn live_engines(&self) -> usize {
        self.created().saturating_sub(self.torn_down())
    }

    pub fn fly_tos(&self) -> Vec<CameraCommand> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCommand::FlyTo { command, .. } => Some(*command),
                _ => None,
            })
            .collect()
    }

    /// Popup state changes, in order: `(marker, open)`.
    pub fn popup_changes(&self) -> Vec<(MarkerId, bool)> {
        self.commands
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCommand::SetPopup { marker, open, .. } => Some((*marker, *open)),
                _ => None,
            })
            .collect()
    }

    pub fn markers_added(&self) -> usize {
        self.count(|c| matches!(c, EngineCommand::AddMarker { .. }))
    }

    fn count(&self, pred: impl Fn(&EngineCommand) -> bool) -> usize {
        self.commands.lock().iter().filter(|c| pred(c)).count()
    }
}

/// Factory for [`HeadlessEngine`]s.
#[derive(Debug, Clone)]
pub struct HeadlessEngineFactory {
    policy: TokenPolicy,
    load_delay: Duration,
    outage: Arc<AtomicBool>,
    next_engine: Arc<AtomicU64>,
    log: EngineLog,
}

impl HeadlessEngineFactory {
    pub fn new(policy: TokenPolicy) -> Self {
        Self {
            policy,
            load_delay: Duration::from_millis(250),
            outage: Arc::new(AtomicBool::new(false)),
            next_engine: Arc::new(AtomicU64::new(1)),
            log: EngineLog::default(),
        }
    }

    pub fn accept_any() -> Self {
        Self::new(TokenPolicy::AcceptAny)
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// While set, construction and loading fail with `Unreachable`.
    pub fn set_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    pub fn log(&self) -> &EngineLog {
        &self.log
    }
}

#[async_trait]
impl EngineFactory for HeadlessEngineFactory {
    async fn create(
        &self,
        token: &str,
        surface: &str,
    ) -> Result<Box<dyn ViewportEngine>, EngineError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(EngineError::unreachable("imagery service did not respond"));
        }
        if !self.policy.accepts(token) {
            return Err(EngineError::unauthorized("access token was refused"));
        }
        let id = self.next_engine.fetch_add(1, Ordering::SeqCst);
        debug!(engine = id, surface, "headless engine created");
        self.log.push(EngineCommand::Created {
            engine: id,
            surface: surface.to_string(),
        });
        Ok(Box::new(HeadlessEngine {
            id,
            load_delay: self.load_delay,
            outage: self.outage.clone(),
            log: self.log.clone(),
            next_marker: 0,
            loaded: false,
            torn_down: false,
        }))
    }
}

#[derive(Debug)]
pub struct HeadlessEngine {
    id: u64,
    load_delay: Duration,
    outage: Arc<AtomicBool>,
    log: EngineLog,
    next_marker: u64,
    loaded: bool,
    torn_down: bool,
}

impl HeadlessEngine {
    fn ensure_live(&self) -> Result<(), EngineError> {
        if self.torn_down {
            return Err(EngineError::unreachable("engine was torn down"));
        }
        Ok(())
    }
}

#[async_trait]
impl ViewportEngine for HeadlessEngine {
    fn add_control(&mut self, control: Control) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.log.push(EngineCommand::AddControl {
            engine: self.id,
            control,
        });
        Ok(())
    }

    fn set_environment(&mut self, environment: &EnvironmentSettings) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.log.push(EngineCommand::SetEnvironment {
            engine: self.id,
            environment: environment.clone(),
        });
        Ok(())
    }

    async fn wait_until_loaded(&mut self) -> Result<(), EngineError> {
        self.ensure_live()?;
        if !self.loaded {
            tokio::time::sleep(self.load_delay).await;
            if self.outage.load(Ordering::SeqCst) {
                return Err(EngineError::unreachable("imagery tiles failed to load"));
            }
            self.loaded = true;
            self.log.push(EngineCommand::Loaded { engine: self.id });
        }
        Ok(())
    }

    fn add_marker(&mut self, marker: &MarkerSpec) -> Result<MarkerId, EngineError> {
        self.ensure_live()?;
        let id = MarkerId(self.next_marker);
        self.next_marker += 1;
        self.log.push(EngineCommand::AddMarker {
            engine: self.id,
            marker: id,
            title: marker.popup.title.clone(),
        });
        Ok(id)
    }

    fn set_popup(&mut self, marker: MarkerId, open: bool) -> Result<(), EngineError> {
        self.ensure_live()?;
        if marker.0 >= self.next_marker {
            return Err(EngineError::unreachable(format!("unknown {marker}")));
        }
        self.log.push(EngineCommand::SetPopup {
            engine: self.id,
            marker,
            open,
        });
        Ok(())
    }

    fn fly_to(&mut self, command: &CameraCommand) -> Result<(), EngineError> {
        self.ensure_live()?;
        self.log.push(EngineCommand::FlyTo {
            engine: self.id,
            command: *command,
        });
        Ok(())
    }

    fn teardown(&mut self) {
        if !self.torn_down {
            self.torn_down = true;
            self.log.push(EngineCommand::Teardown { engine: self.id });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineErrorKind;

    #[test]
    fn token_policies() {
        assert!(TokenPolicy::AcceptAny.accepts("x"));
        let prefix = TokenPolicy::AcceptPrefix("pk.".into());
        assert!(prefix.accepts("pk.abc"));
        assert!(!prefix.accepts("sk.abc"));
        let exact = TokenPolicy::AcceptExact(vec!["a".into(), "b".into()]);
        assert!(exact.accepts("b"));
        assert!(!exact.accepts("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn refuses_tokens_outside_policy() {
        let factory = HeadlessEngineFactory::new(TokenPolicy::AcceptPrefix("pk.".into()));
        let err = factory.create("sk.nope", "globe").await.err().unwrap();
        assert_eq!(err.kind, EngineErrorKind::Unauthorized);
        assert_eq!(factory.log().created(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn outage_reports_unreachable() {
        let factory = HeadlessEngineFactory::accept_any();
        factory.set_outage(true);
        let err = factory.create("pk.a", "globe").await.err().unwrap();
        assert_eq!(err.kind, EngineErrorKind::Unreachable);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_is_idempotent_and_blocks_commands() {
        let factory = HeadlessEngineFactory::accept_any();
        let mut engine = factory.create("pk.a", "globe").await.unwrap();
        engine.wait_until_loaded().await.unwrap();
        engine.teardown();
        engine.teardown();
        assert_eq!(factory.log().torn_down(), 1);
        assert_eq!(factory.log().live_engines(), 0);
        assert!(engine.add_control(Control::Navigation).is_err());
    }
}

//! Credential Gate: holds, validates and persists the viewport access token.
//!
//! ```text
//!            submit            authorize
//!   Unset ──────────► Validating ─────────► Authorized
//!     ▲  ▲               │   ▲                  │
//!     │  │        reject │   │ submit           │ reject
//!     │  │               ▼   │                  ▼
//!     │  └─ clear ─── Rejected ◄────────────────┘
//!     └──────────── clear (from any state)
//! ```
//!
//! The in-memory credential is authoritative. Persisting to the backing store
//! is best effort: a storage failure is logged and never changes the outcome
//! of a transition.

use tracing::{info, warn};

use crate::store::ScopedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unset,
    Validating,
    Authorized,
    Rejected,
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GateState::Unset => "unset",
            GateState::Validating => "validating",
            GateState::Authorized => "authorized",
            GateState::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    #[error("access token must not be empty")]
    InvalidInput,
    #[error("cannot {op} while {from}")]
    InvalidTransition { from: GateState, op: &'static str },
}

/// The access token plus whether it currently lives in the backing store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    persisted: bool,
}

impl Credential {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn persisted(&self) -> bool {
        self.persisted
    }

    /// Short digest that identifies the token in logs without revealing it.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.token)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("fingerprint", &self.fingerprint())
            .field("persisted", &self.persisted)
            .finish()
    }
}

pub fn fingerprint(token: &str) -> String {
    let hex = blake3::hash(token.as_bytes()).to_hex();
    hex.as_str()[..12].to_string()
}

#[derive(Debug)]
pub struct CredentialGate {
    state: GateState,
    credential: Option<Credential>,
    store: ScopedStore,
}

impl CredentialGate {
    pub fn new(store: ScopedStore) -> Self {
        Self {
            state: GateState::Unset,
            credential: None,
            store,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.credential.as_ref().map(Credential::token)
    }

    /// Reads a previously persisted token. A present token moves the gate
    /// straight to `Validating`; the caller is expected to initialize with it.
    pub fn load(&mut self) -> Result<GateState, GateError> {
        if self.state != GateState::Unset {
            return Err(GateError::InvalidTransition {
                from: self.state,
                op: "load",
            });
        }
        let stored = match self.store.get() {
            Ok(v) => v,
            Err(e) => {
                warn!(key = self.store.key(), "failed to read persisted credential: {e}");
                None
            }
        };
        match stored.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(token) => {
                info!(fingerprint = %fingerprint(&token), "restored persisted credential");
                self.credential = Some(Credential {
                    token,
                    persisted: true,
                });
                self.state = GateState::Validating;
            }
            None => {
                self.state = GateState::Unset;
            }
        }
        Ok(self.state)
    }

    /// Accepts a new token for validation. Empty or whitespace-only input is
    /// rejected without touching the current state.
    ///
    /// A token submitted while `Validating` or `Authorized` replaces the
    /// current one; the caller must tear down the old session first.
    pub fn submit(&mut self, token: &str) -> Result<&Credential, GateError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(GateError::InvalidInput);
        }
        let persisted = self
            .credential
            .as_ref()
            .is_some_and(|c| c.persisted && c.token == token);
        info!(from = %self.state, fingerprint = %fingerprint(token), "credential submitted");
        self.state = GateState::Validating;
        Ok(&*self.credential.insert(Credential {
            token: token.to_string(),
            persisted,
        }))
    }

    /// Marks the current credential as accepted by the engine and persists it.
    pub fn authorize(&mut self) -> Result<(), GateError> {
        match self.state {
            GateState::Authorized => return Ok(()),
            GateState::Validating => {}
            from => {
                return Err(GateError::InvalidTransition {
                    from,
                    op: "authorize",
                });
            }
        }
        let Some(credential) = self.credential.as_mut() else {
            return Err(GateError::InvalidTransition {
                from: self.state,
                op: "authorize",
            });
        };
        if !credential.persisted {
            match self.store.set(&credential.token) {
                Ok(()) => credential.persisted = true,
                Err(e) => warn!(key = self.store.key(), "failed to persist credential: {e}"),
            }
        }
        info!(fingerprint = %credential.fingerprint(), "credential authorized");
        self.state = GateState::Authorized;
        Ok(())
    }

    /// The engine refused the credential: forget it, including the stored copy.
    pub fn reject(&mut self) -> Result<(), GateError> {
        if !matches!(self.state, GateState::Validating | GateState::Authorized) {
            return Err(GateError::InvalidTransition {
                from: self.state,
                op: "reject",
            });
        }
        if let Some(c) = self.credential.take() {
            info!(fingerprint = %c.fingerprint(), "credential rejected");
        }
        self.forget_persisted();
        self.state = GateState::Rejected;
        Ok(())
    }

    /// Returns to `Unset` from any state and removes the stored token.
    pub fn clear(&mut self) {
        self.credential = None;
        self.forget_persisted();
        if self.state != GateState::Unset {
            info!(from = %self.state, "credential cleared");
        }
        self.state = GateState::Unset;
    }

    fn forget_persisted(&self) {
        if let Err(e) = self.store.remove() {
            warn!(key = self.store.key(), "failed to remove persisted credential: {e}");
        }
    }
}

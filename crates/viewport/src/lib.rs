//! Point-of-interest navigator over an external 3D viewport engine.
//!
//! Control flow: the credential gate authorizes a token, the adapter brings up
//! one engine session for it, markers are populated once the engine reports
//! its resources loaded, and only then does `fly_to` drive the camera.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod headless;
pub mod markers;
pub mod navigation;
pub mod navigator;
pub mod notify;

pub use adapter::{SessionId, ViewportSession};
pub use config::*;
pub use engine::*;
pub use error::*;
pub use headless::*;
pub use markers::MarkerHandle;
pub use navigation::TransitionRequest;
pub use navigator::*;
pub use notify::*;

//! Marker Registry: one marker and popup per location, bound to the live session.
//!
//! Handles are keyed by `(session, location index)` and die with their
//! session; locations are referenced by index only.

use foundation::math::marker_anchor;
use locations::Location;
use tracing::{debug, warn};

use crate::adapter::{SessionId, ViewportSession};
use crate::engine::{EngineError, MarkerId, MarkerSpec, PopupContent};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MarkerHandle {
    pub session: SessionId,
    pub index: usize,
    pub marker: MarkerId,
    pub popup_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkerError {
    #[error("markers already populated for {0}")]
    AlreadyPopulated(SessionId),
    #[error("{0} is not ready")]
    NotReady(SessionId),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Creates one marker per location, in registry order. Runs exactly once per
/// session; a failed engine call leaves the markers placed so far in place.
pub fn populate(
    session: &mut ViewportSession,
    locations: &[Location],
    color: &str,
) -> Result<usize, MarkerError> {
    if !session.is_ready() {
        return Err(MarkerError::NotReady(session.id()));
    }
    if session.populated {
        return Err(MarkerError::AlreadyPopulated(session.id()));
    }
    session.populated = true;

    let id = session.id();
    for (index, location) in locations.iter().enumerate() {
        let spec = MarkerSpec {
            position: location.coordinates,
            anchor: marker_anchor(location.coordinates, location.anchor_altitude),
            color: color.to_string(),
            popup: PopupContent {
                title: location.name.clone(),
                body: location.description.clone(),
            },
        };
        let marker = session.engine_mut().add_marker(&spec)?;
        session.markers.push(MarkerHandle {
            session: id,
            index,
            marker,
            popup_open: false,
        });
    }
    debug!(%id, count = session.markers.len(), "markers populated");
    Ok(session.markers.len())
}

/// Flips the popup of the marker at `index`. Silently ignored when the index
/// is unknown or the session is not ready.
pub fn toggle_popup(session: &mut ViewportSession, index: usize) {
    if !session.is_ready() {
        return;
    }
    let Some(open) = session.markers.get(index).map(|h| h.popup_open) else {
        return;
    };
    set_popup(session, index, !open);
}

/// Opens the popup at `index` and closes every other open popup.
pub fn reveal_popup(session: &mut ViewportSession, index: usize) -> bool {
    if !session.is_ready() || index >= session.markers.len() {
        return false;
    }
    let others: Vec<usize> = session
        .markers
        .iter()
        .filter(|h| h.popup_open && h.index != index)
        .map(|h| h.index)
        .collect();
    for other in others {
        set_popup(session, other, false);
    }
    if !session.markers[index].popup_open {
        set_popup(session, index, true);
    }
    session.markers[index].popup_open
}

/// Location indices whose popups are currently open.
pub fn open_popups(session: &ViewportSession) -> Vec<usize> {
    session
        .markers()
        .iter()
        .filter(|h| h.popup_open)
        .map(|h| h.index)
        .collect()
}

/// Location index behind an engine marker id.
pub fn index_for_marker(session: &ViewportSession, marker: MarkerId) -> Option<usize> {
    session
        .markers()
        .iter()
        .find(|h| h.marker == marker)
        .map(|h| h.index)
}

fn set_popup(session: &mut ViewportSession, index: usize, open: bool) {
    let marker = session.markers[index].marker;
    match session.engine_mut().set_popup(marker, open) {
        Ok(()) => session.markers[index].popup_open = open,
        Err(e) => warn!(%marker, open, "popup change failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use locations::LocationRegistry;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::adapter::{ViewportAdapter, bring_up};
    use crate::engine::EnvironmentSettings;
    use crate::headless::HeadlessEngineFactory;

    async fn ready_adapter(factory: &HeadlessEngineFactory) -> ViewportAdapter {
        let mut adapter = ViewportAdapter::new();
        let pending = adapter.begin("pk.a");
        let engine = bring_up(
            factory,
            "pk.a",
            "globe",
            &[],
            &EnvironmentSettings::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        adapter.install(&pending, engine).unwrap();
        adapter
    }

    #[tokio::test(start_paused = true)]
    async fn populate_follows_registry_order_once() {
        let factory = HeadlessEngineFactory::accept_any();
        let registry = LocationRegistry::builtin().unwrap();
        let mut adapter = ready_adapter(&factory).await;
        let session = adapter.ready_session_mut().unwrap();

        assert_eq!(populate(session, registry.all(), "#0f0"), Ok(4));
        let indices: Vec<_> = session.markers().iter().map(|h| h.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert!(session.markers().iter().all(|h| h.session == session.id()));

        assert_eq!(
            populate(session, registry.all(), "#0f0"),
            Err(MarkerError::AlreadyPopulated(session.id()))
        );
        assert_eq!(factory.log().markers_added(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_alternates_and_ignores_bad_index() {
        let factory = HeadlessEngineFactory::accept_any();
        let registry = LocationRegistry::builtin().unwrap();
        let mut adapter = ready_adapter(&factory).await;
        let session = adapter.ready_session_mut().unwrap();
        populate(session, registry.all(), "#0f0").unwrap();

        toggle_popup(session, 1);
        assert_eq!(open_popups(session), vec![1]);
        toggle_popup(session, 1);
        assert!(open_popups(session).is_empty());
        toggle_popup(session, 1);
        assert_eq!(open_popups(session), vec![1]);

        toggle_popup(session, 99);
        assert_eq!(factory.log().popup_changes().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_keeps_a_single_popup_open() {
        let factory = HeadlessEngineFactory::accept_any();
        let registry = LocationRegistry::builtin().unwrap();
        let mut adapter = ready_adapter(&factory).await;
        let session = adapter.ready_session_mut().unwrap();
        populate(session, registry.all(), "#0f0").unwrap();

        toggle_popup(session, 0);
        toggle_popup(session, 2);
        assert!(reveal_popup(session, 3));
        assert_eq!(open_popups(session), vec![3]);
        assert!(!reveal_popup(session, 4));

        let marker = session.markers()[2].marker;
        assert_eq!(index_for_marker(session, marker), Some(2));
    }
}

//! Navigation Controller: serializes fly-to transitions.
//!
//! Every fly-to bumps a monotonic generation. When a transition's timer
//! fires, it may reveal its popup only if its generation is still the latest
//! and its session is still live. Superseded timers are aborted as well, but
//! the generation check is what makes a late-firing timer harmless.

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::adapter::{SessionId, ViewportSession};
use crate::engine::{CameraCommand, EngineError};

/// One fly-to, from issue to completion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub generation: u64,
    pub target_index: usize,
    pub session: SessionId,
    pub issued_at: Instant,
}

#[derive(Debug)]
struct InFlight {
    request: TransitionRequest,
    timer: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
pub struct NavigationController {
    generation: u64,
    in_flight: Option<InFlight>,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> Option<TransitionRequest> {
        self.in_flight.as_ref().map(|f| f.request)
    }

    /// Issues the next request, cancelling whatever was in flight.
    pub fn begin(&mut self, target_index: usize, session: SessionId) -> TransitionRequest {
        self.cancel_timer();
        self.generation += 1;
        let request = TransitionRequest {
            generation: self.generation,
            target_index,
            session,
            issued_at: Instant::now(),
        };
        self.in_flight = Some(InFlight {
            request,
            timer: None,
        });
        request
    }

    /// Attaches the completion timer for `request`. A timer for a request that
    /// is no longer in flight is aborted immediately.
    pub fn arm(&mut self, request: &TransitionRequest, timer: JoinHandle<()>) {
        match self.in_flight.as_mut() {
            Some(f) if f.request.generation == request.generation => f.timer = Some(timer),
            _ => timer.abort(),
        }
    }

    /// Drops the in-flight request without issuing a new one, e.g. when the
    /// engine refused the camera command.
    pub fn abandon(&mut self, request: &TransitionRequest) {
        if self.in_flight().is_some_and(|r| r.generation == request.generation) {
            self.cancel_timer();
            self.in_flight = None;
        }
    }

    /// Cancels the in-flight transition and invalidates its generation, so a
    /// timer that fires anyway is discarded.
    pub fn cancel(&mut self) {
        if self.in_flight.is_some() {
            self.cancel_timer();
            self.in_flight = None;
            self.generation += 1;
        }
    }

    /// Called by the timer: `true` if `request` is still the one to honor.
    /// Consumes the in-flight slot on success.
    pub fn complete(&mut self, request: &TransitionRequest, live: Option<SessionId>) -> bool {
        if request.generation != self.generation {
            debug!(
                stale = request.generation,
                latest = self.generation,
                "discarding superseded transition"
            );
            return false;
        }
        if live != Some(request.session) {
            debug!(session = %request.session, "discarding transition for a dead session");
            return false;
        }
        // Our own timer is finishing; dropping its handle detaches it.
        self.in_flight = None;
        true
    }

    /// Moves the camera of `session`. Camera commands go through the
    /// controller only; nothing else in the crate calls the engine's `fly_to`.
    pub fn issue(
        &self,
        session: &mut ViewportSession,
        command: &CameraCommand,
    ) -> Result<(), EngineError> {
        session.engine_mut().fly_to(command)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.in_flight.as_mut().and_then(|f| f.timer.take()) {
            timer.abort();
        }
    }
}

impl Drop for NavigationController {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::NavigationController;
    use crate::adapter::SessionId;

    const S1: SessionId = SessionId(1);

    async fn settle() {
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn latest_generation_wins() {
        let mut nav = NavigationController::new();
        let first = nav.begin(0, S1);
        let second = nav.begin(1, S1);
        assert!(second.generation > first.generation);
        assert!(!nav.complete(&first, Some(S1)));
        assert!(nav.complete(&second, Some(S1)));
        assert!(nav.in_flight().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn begin_aborts_the_previous_timer() {
        let mut nav = NavigationController::new();
        let first = nav.begin(0, S1);
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(10)));
        let probe = timer.abort_handle();
        nav.arm(&first, timer);

        nav.begin(1, S1);
        settle().await;
        assert!(probe.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_invalidates_even_if_timer_fires() {
        let mut nav = NavigationController::new();
        let req = nav.begin(2, S1);
        nav.cancel();
        assert!(!nav.complete(&req, Some(S1)));
    }

    #[tokio::test(start_paused = true)]
    async fn completion_requires_the_same_live_session() {
        let mut nav = NavigationController::new();
        let req = nav.begin(2, S1);
        assert!(!nav.complete(&req, None));
        assert!(!nav.complete(&req, Some(SessionId(2))));
        assert!(nav.complete(&req, Some(S1)));
    }

    #[tokio::test(start_paused = true)]
    async fn arming_a_stale_request_aborts_its_timer() {
        let mut nav = NavigationController::new();
        let stale = nav.begin(0, S1);
        nav.begin(1, S1);
        let timer = tokio::spawn(tokio::time::sleep(Duration::from_secs(10)));
        let probe = timer.abort_handle();
        nav.arm(&stale, timer);
        settle().await;
        assert!(probe.is_finished());
    }
}

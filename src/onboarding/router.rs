//! Session-gated routing between the auth flow, onboarding and the main app.
//!
//! State changes are applied synchronously in [`SessionRouter::handle_event`];
//! only the onboarding flag lookup is asynchronous. Every lookup carries the
//! epoch it was started in, and its result is dropped if the session changed
//! in the meantime.

use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, watch, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::flags::FlagStore;
use crate::session::{AuthSource, Session, SessionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// No session lookup has resolved yet. Renders nothing but a loader.
    Initializing,
    Unauthenticated,
    CheckingOnboarding,
    NeedsOnboarding,
    Authenticated,
}

/// Top-level screen group a presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenGroup {
    Loading,
    Auth,
    Onboarding,
    Main,
}

impl RouteState {
    pub fn screen(self) -> ScreenGroup {
        match self {
            RouteState::Initializing | RouteState::CheckingOnboarding => ScreenGroup::Loading,
            RouteState::Unauthenticated => ScreenGroup::Auth,
            RouteState::NeedsOnboarding => ScreenGroup::Onboarding,
            RouteState::Authenticated => ScreenGroup::Main,
        }
    }
}

/// An onboarding flag lookup that has been scheduled but not resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCheck {
    pub user_id: Uuid,
    epoch: u64,
}

struct Inner {
    user_id: Option<Uuid>,
    epoch: u64,
}

pub struct SessionRouter {
    flags: Arc<dyn FlagStore>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<RouteState>,
}

impl SessionRouter {
    pub fn new(flags: Arc<dyn FlagStore>) -> Self {
        let (state_tx, _) = watch::channel(RouteState::Initializing);
        Self {
            flags,
            inner: Mutex::new(Inner {
                user_id: None,
                epoch: 0,
            }),
            state_tx,
        }
    }

    pub fn state(&self) -> RouteState {
        *self.state_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RouteState> {
        self.state_tx.subscribe()
    }

    /// Applies the result of the first session lookup. Ignored once any
    /// session event has already moved the router out of `Initializing`.
    pub async fn initialize(&self, session: Option<Session>) -> Option<PendingCheck> {
        let mut inner = self.inner.lock().await;
        if self.state() != RouteState::Initializing {
            debug!("initial session arrived after a session event; ignoring");
            return None;
        }
        match session {
            Some(s) => Some(self.begin_check(&mut inner, s.user_id)),
            None => {
                self.set_state(RouteState::Unauthenticated);
                None
            }
        }
    }

    /// Applies a session lifecycle event. Returns the flag lookup to run, if
    /// the event requires one.
    pub async fn handle_event(&self, event: SessionEvent) -> Option<PendingCheck> {
        let mut inner = self.inner.lock().await;
        match &event {
            SessionEvent::Ended => {
                inner.epoch += 1;
                inner.user_id = None;
                self.set_state(RouteState::Unauthenticated);
                None
            }
            SessionEvent::Established(s) | SessionEvent::Refreshed(s) => {
                let is_refresh = matches!(event, SessionEvent::Refreshed(_));
                let signed_in = matches!(
                    self.state(),
                    RouteState::CheckingOnboarding
                        | RouteState::NeedsOnboarding
                        | RouteState::Authenticated
                );
                if signed_in && inner.user_id == Some(s.user_id) {
                    debug!(user_id = %s.user_id, state = ?self.state(), "duplicate session event ignored");
                    return None;
                }
                if !signed_in && is_refresh {
                    debug!(user_id = %s.user_id, "refresh for an ended session ignored");
                    return None;
                }
                Some(self.begin_check(&mut inner, s.user_id))
            }
        }
    }

    /// Runs a scheduled lookup and applies its result unless it went stale.
    /// Returns the state it moved to.
    #[instrument(skip(self), fields(user_id = %check.user_id))]
    pub async fn resolve_check(&self, check: PendingCheck) -> Option<RouteState> {
        let result = self.flags.read_flag(check.user_id).await;

        let inner = self.inner.lock().await;
        if inner.epoch != check.epoch
            || inner.user_id != Some(check.user_id)
            || self.state() != RouteState::CheckingOnboarding
        {
            debug!("session changed during onboarding check; discarding result");
            return None;
        }

        let next = match result {
            Ok(true) => RouteState::Authenticated,
            Ok(false) => RouteState::NeedsOnboarding,
            Err(e) => {
                warn!(error = %e, "onboarding flag lookup failed; assuming onboarding is needed");
                RouteState::NeedsOnboarding
            }
        };
        self.set_state(next);
        Some(next)
    }

    /// Moves `NeedsOnboarding → Authenticated` once the wizard finished for
    /// the user that still owns the session.
    pub async fn complete_onboarding(&self, user_id: Uuid) -> bool {
        let inner = self.inner.lock().await;
        if inner.user_id != Some(user_id) || self.state() != RouteState::NeedsOnboarding {
            debug!(%user_id, state = ?self.state(), "onboarding completion ignored");
            return false;
        }
        self.set_state(RouteState::Authenticated);
        true
    }

    /// Drives the router from an auth source until its event stream closes.
    pub async fn run(self: Arc<Self>, auth: Arc<dyn AuthSource>) {
        let mut events = auth.subscribe();

        let initial = match auth.get_session().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "initial session lookup failed");
                None
            }
        };
        if let Some(check) = self.initialize(initial).await {
            self.spawn_check(check);
        }

        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(user_id = ?event.user_id(), "session event");
                    if let Some(check) = self.handle_event(event).await {
                        self.spawn_check(check);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session events lagged; resynchronising");
                    let event = match auth.get_session().await {
                        Ok(Some(s)) => SessionEvent::Established(s),
                        Ok(None) => SessionEvent::Ended,
                        Err(e) => {
                            warn!(error = %e, "session lookup failed while resynchronising");
                            SessionEvent::Ended
                        }
                    };
                    if let Some(check) = self.handle_event(event).await {
                        self.spawn_check(check);
                    }
                }
                Err(RecvError::Closed) => {
                    debug!("session event stream closed");
                    break;
                }
            }
        }
    }

    fn spawn_check(self: &Arc<Self>, check: PendingCheck) {
        let router = Arc::clone(self);
        tokio::spawn(async move {
            router.resolve_check(check).await;
        });
    }

    fn begin_check(&self, inner: &mut Inner, user_id: Uuid) -> PendingCheck {
        inner.epoch += 1;
        inner.user_id = Some(user_id);
        self.set_state(RouteState::CheckingOnboarding);
        PendingCheck {
            user_id,
            epoch: inner.epoch,
        }
    }

    fn set_state(&self, next: RouteState) {
        let prev = self.state_tx.send_replace(next);
        if prev != next {
            info!(from = ?prev, to = ?next, "route state changed");
        }
    }
}

//! Single-flight renewal of the access token.
//!
//! At most one renewal request is in flight per session. Callers arriving
//! while one is running await the same shared outcome. The renewal runs as
//! its own task, so a caller that gives up does not cancel it; whatever it
//! decides still lands in the shared session state. The task forgets its
//! flight when it ends, so the next check after it starts a new renewal.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::codec::{self, DecodeError};
use super::session::SessionInner;
use super::StoreKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPhase {
    #[default]
    Idle,
    Refreshing,
    Succeeded,
    Failed,
}

/// Why a renewal ended the session. Every variant leads to full teardown.
#[derive(Error, Debug)]
pub enum RenewalError {
    #[error("no renewal token stored")]
    MissingCredential,

    /// Rejected, revoked or unreachable: deliberately not distinguished
    #[error("renewal request failed: {0:#}")]
    Rejected(anyhow::Error),

    #[error("renewed access token is unreadable: {0}")]
    Unreadable(#[from] DecodeError),
}

type InFlight = Shared<BoxFuture<'static, bool>>;

#[derive(Default)]
pub(crate) struct RefreshCoordinator {
    in_flight: Mutex<Option<InFlight>>,
    phase: Mutex<RefreshPhase>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RefreshPhase {
        *self.phase.lock()
    }

    fn set_phase(&self, phase: RefreshPhase) {
        *self.phase.lock() = phase;
    }

    /// Renew the session, joining an attempt that is already running.
    pub(crate) async fn renew(&self, session: &Arc<SessionInner>) -> bool {
        let flight = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(flight) => {
                    debug!("Joining in-flight renewal");
                    flight.clone()
                }
                None => {
                    self.set_phase(RefreshPhase::Refreshing);
                    let flight = Self::spawn(Arc::clone(session));
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    fn spawn(session: Arc<SessionInner>) -> InFlight {
        let handle = tokio::spawn(async move {
            // Forget the flight from inside the task, even if every waiter left
            let _forget = ForgetFlight(Arc::clone(&session));
            run(session).await
        });
        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Renewal task did not complete");
                    false
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Empties the memo slot when the renewal task ends, panics included.
/// `renew` holds the slot lock across `spawn`, so this never clears a
/// slot before its own flight was stored in it.
struct ForgetFlight(Arc<SessionInner>);

impl Drop for ForgetFlight {
    fn drop(&mut self) {
        self.0.refresh.in_flight.lock().take();
    }
}

async fn run(session: Arc<SessionInner>) -> bool {
    match attempt(&session).await {
        Ok(()) => {
            session.refresh.set_phase(RefreshPhase::Succeeded);
            true
        }
        Err(e) => {
            warn!(error = %e, "Session renewal failed, tearing down session");
            session.teardown();
            session.refresh.set_phase(RefreshPhase::Failed);
            false
        }
    }
}

async fn attempt(session: &SessionInner) -> Result<(), RenewalError> {
    // Another process sharing the store may already have renewed
    if session.load_from_store(true) {
        info!("Adopted fresh access token from session store");
        return Ok(());
    }

    let renewal_token = session
        .store
        .get(StoreKey::RefreshToken)
        .ok_or(RenewalError::MissingCredential)?;

    debug!("Requesting access token renewal");
    let tokens = session
        .backend
        .renew(&renewal_token)
        .await
        .map_err(RenewalError::Rejected)?;

    let claims = codec::decode(&tokens.access_token)?;
    info!(subject = %claims.subject, "Access token renewed");
    session.establish(&tokens, claims).await;
    Ok(())
}

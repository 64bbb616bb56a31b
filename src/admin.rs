//! Admin actions
//!
//! Every action is gated by a single shared password. The pause switch is a
//! flag the scan loop reads at the start of each tick; annotations are sent
//! to the loop and applied between ticks.

use chrono_tz::Tz;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AdminError;
use crate::history::HistoryEntry;
use crate::messages;
use crate::notifier::Notifier;
use crate::scanner::Command;

/// Compare a supplied password with the configured one
pub fn authorize(given: &str, expected: &str) -> Result<(), AdminError> {
    if given == expected {
        Ok(())
    } else {
        warn!("Rejected admin action: wrong password");
        Err(AdminError::Unauthorized)
    }
}

#[derive(Clone)]
pub struct AdminHandle {
    password: String,
    active: Arc<AtomicBool>,
    commands: mpsc::Sender<Command>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    tz: Tz,
}

impl AdminHandle {
    pub fn new(
        password: String,
        active: Arc<AtomicBool>,
        commands: mpsc::Sender<Command>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        tz: Tz,
    ) -> Self {
        AdminHandle {
            password,
            active,
            commands,
            notifier,
            clock,
            tz,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Turn scanning on or off, effective from the next tick
    pub fn set_active(&self, password: &str, active: bool) -> Result<bool, AdminError> {
        authorize(password, &self.password)?;
        self.active.store(active, Ordering::SeqCst);
        info!(
            "System switched {} by admin",
            if active { "ON" } else { "OFF" }
        );
        Ok(active)
    }

    /// Attach an observation to a fired alert and edit its delivered copies
    pub async fn annotate(
        &self,
        password: &str,
        signal_id: u64,
        observation: &str,
    ) -> Result<HistoryEntry, AdminError> {
        authorize(password, &self.password)?;

        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Annotate {
                signal_id,
                observation: observation.to_string(),
                reply,
            })
            .await
            .map_err(|_| AdminError::LoopUnavailable)?;

        response.await.map_err(|_| AdminError::LoopUnavailable)?
    }

    /// Send free text to every recipient, returning the delivered count
    pub async fn broadcast(&self, password: &str, message: &str) -> Result<usize, AdminError> {
        authorize(password, &self.password)?;

        let text = messages::stamp(&messages::admin_broadcast(message), self.clock.now(), self.tz);
        let handles = self.notifier.broadcast(&text, None).await;
        info!("Admin broadcast delivered to {} recipients", handles.len());
        Ok(handles.len())
    }
}

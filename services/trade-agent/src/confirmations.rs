//! Confirmation Workflow - fetch pending mobile confirmations and accept them

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::TradeAgent;
use crate::error::{AgentError, Result};
use crate::events::AgentEvent;
use crate::platform::Confirmation;

/// Tag for fetching the confirmation list
pub const TAG_FETCH: &str = "conf";

/// Tag for accepting a confirmation
pub const TAG_ALLOW: &str = "allow";

/// Error code emitted when the confirmation list cannot be fetched
pub const FETCH_FAILED_CODE: u16 = 503;

/// Result of one bulk-accept pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Accept requests dispatched for this many confirmations
    Dispatched(usize),
    /// Fetch failed; one retry has been scheduled
    RetryScheduled,
}

impl TradeAgent {
    /// Confirmation key for `tag` at `time`; requires an identity secret
    pub fn generate_confirmation_code(&self, time: u64, tag: &str) -> Result<String> {
        self.inner().codes.confirmation_key(time, tag)
    }

    /// Fetch pending confirmations
    pub async fn get_confirmations(
        &self,
        time: u64,
        key: &str,
    ) -> Result<Vec<Arc<dyn Confirmation>>> {
        let _guard = self.busy().acquire("get_confirmations");
        self.platform()
            .community
            .get_confirmations(time, key)
            .await
            .map_err(AgentError::Confirmation)
    }

    /// Accept every pending confirmation
    ///
    /// Accept requests are fire-and-forget: a failed accept is logged and does
    /// not affect the others. A failed fetch emits an `Error` event and
    /// schedules a single deferred retry.
    pub async fn confirm_all_unaccepted_trades(&self) -> Result<ConfirmOutcome> {
        let _guard = self.busy().acquire("confirm_all_unaccepted_trades");
        let time = self.inner().codes.current_time();
        let key = self.generate_confirmation_code(time, TAG_FETCH)?;

        let confirmations = match self.get_confirmations(time, &key).await {
            Ok(confirmations) => confirmations,
            Err(e) => {
                warn!("Failed to fetch confirmations: {}", e);
                self.events().emit(AgentEvent::Error {
                    code: FETCH_FAILED_CODE,
                    msg: "Failed to fetch confirmations".to_string(),
                });
                self.schedule_confirmation_retry();
                return Ok(ConfirmOutcome::RetryScheduled);
            }
        };

        let count = confirmations.len();
        for confirmation in confirmations {
            let allow = self.generate_confirmation_code(time, TAG_ALLOW)?;
            tokio::spawn(async move {
                match confirmation.respond(time, &allow, true).await {
                    Ok(()) => debug!("Accepted confirmation {}", confirmation.id()),
                    Err(e) => warn!("Confirmation error for {}: {}", confirmation.id(), e),
                }
            });
        }

        if count > 0 {
            info!("Dispatched {} confirmation accepts", count);
        }
        Ok(ConfirmOutcome::Dispatched(count))
    }

    /// Re-run the bulk accept after the configured delay
    ///
    /// The retry only holds a weak reference; it is dropped if the agent is.
    fn schedule_confirmation_retry(&self) {
        let delay = self.inner().trade_offers.confirmation_retry_delay();
        let agent = self.downgrade();
        info!("Retrying confirmations in {:?}", delay);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(agent) = agent.upgrade() else {
                debug!("Agent dropped, confirmation retry abandoned");
                return;
            };
            if let Err(e) = agent.confirm_all_unaccepted_trades().await {
                warn!("Confirmation retry failed: {}", e);
            }
        });
    }
}

//! Offer Pipeline - item normalization, submission, inventory and cancel

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::agent::TradeAgent;
use crate::error::{AgentError, Result};
use crate::events::AgentEvent;
use crate::platform::{EconItem, OfferHandle, PlatformResult, SteamId};

/// Context id used when an item does not name one
pub const DEFAULT_CONTEXT_ID: &str = "2";

/// Amount used when an item does not name one
pub const DEFAULT_AMOUNT: u64 = 1;

/// Item as supplied by a caller
///
/// Ids may arrive as JSON numbers or strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TradeItem {
    #[serde(default)]
    pub appid: Option<u32>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub contextid: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub assetid: Option<String>,
    #[serde(default, deserialize_with = "amount_string_or_number")]
    pub amount: Option<u64>,
}

impl TradeItem {
    pub fn new(appid: u32, assetid: impl ToString) -> Self {
        Self {
            appid: Some(appid),
            assetid: Some(assetid.to_string()),
            ..Default::default()
        }
    }

    pub fn with_contextid(mut self, contextid: impl ToString) -> Self {
        self.contextid = Some(contextid.to_string());
        self
    }

    pub fn with_amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Fill defaults; `None` when appid or assetid is missing
    pub fn normalize(&self) -> Option<NormalizedItem> {
        let appid = self.appid?;
        let assetid = self.assetid.as_ref()?.trim();
        if assetid.is_empty() {
            return None;
        }

        Some(NormalizedItem {
            appid,
            contextid: self
                .contextid
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTEXT_ID.to_string()),
            assetid: assetid.to_string(),
            amount: self.amount.unwrap_or(DEFAULT_AMOUNT),
        })
    }
}

/// Item in the shape the trade offer manager accepts
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct NormalizedItem {
    pub appid: u32,
    pub contextid: String,
    pub assetid: String,
    pub amount: u64,
}

/// Normalize a caller's item list, dropping items without appid or assetid
pub fn normalize_items(items: &[TradeItem]) -> Vec<NormalizedItem> {
    items
        .iter()
        .filter_map(|item| {
            let normalized = item.normalize();
            if normalized.is_none() {
                debug!("Dropping item without appid/assetid: {:?}", item);
            }
            normalized
        })
        .collect()
}

/// Normalized offer contents, built per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOffer {
    pub items_to_send: Vec<NormalizedItem>,
    pub items_to_receive: Vec<NormalizedItem>,
    pub message: String,
}

impl PendingOffer {
    pub fn new(items_to_receive: &[TradeItem], items_to_send: &[TradeItem], message: &str) -> Self {
        Self {
            items_to_send: normalize_items(items_to_send),
            items_to_receive: normalize_items(items_to_receive),
            message: message.to_string(),
        }
    }

    /// Attach contents to a draft offer
    pub fn apply_to(self, offer: &dyn OfferHandle) {
        offer.add_my_items(self.items_to_send);
        offer.add_their_items(self.items_to_receive);
        offer.set_message(&self.message);
    }
}

/// An offer whose submission is in progress
///
/// The handle is available immediately so the caller can cancel the offer
/// before the send completes. Dropping the submission does not abort the send.
pub struct OfferSubmission {
    offer: Arc<dyn OfferHandle>,
    outcome: oneshot::Receiver<PlatformResult<String>>,
}

impl OfferSubmission {
    pub fn offer(&self) -> &Arc<dyn OfferHandle> {
        &self.offer
    }

    /// Wait for the platform status string
    pub async fn outcome(self) -> Result<String> {
        match self.outcome.await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(AgentError::Offer(e)),
            Err(_) => Err(AgentError::Dropped("trade offer submission".to_string())),
        }
    }

    /// Split into the handle and the pending outcome
    pub fn into_parts(self) -> (Arc<dyn OfferHandle>, oneshot::Receiver<PlatformResult<String>>) {
        (self.offer, self.outcome)
    }
}

impl TradeAgent {
    /// Create, fill and submit a trade offer
    ///
    /// Emits `TradeofferSent` or `TradeofferSendError` when the send
    /// completes. With `auto_confirm`, a successful send starts
    /// `confirm_all_unaccepted_trades` without waiting for it. Must be called
    /// from within a tokio runtime.
    pub fn send_trade_offer(
        &self,
        recipient: SteamId,
        token: Option<&str>,
        items_to_receive: &[TradeItem],
        items_to_send: &[TradeItem],
        message: &str,
        auto_confirm: bool,
    ) -> OfferSubmission {
        let guard = self.busy().acquire("send_trade_offer");

        let offer = self.platform().trades.create_offer(recipient, token);
        let pending = PendingOffer::new(items_to_receive, items_to_send, message);
        debug!(
            "Offer to {}: {} to send, {} to receive",
            recipient,
            pending.items_to_send.len(),
            pending.items_to_receive.len()
        );
        pending.apply_to(offer.as_ref());

        let (tx, rx) = oneshot::channel();
        let agent = self.clone();
        let sending = offer.clone();
        tokio::spawn(async move {
            let result = sending.send().await;
            match &result {
                Ok(status) => {
                    info!("Sent trade offer with status: {}", status);
                    agent.events().emit(AgentEvent::TradeofferSent(status.clone()));

                    if auto_confirm {
                        let confirmer = agent.clone();
                        tokio::spawn(async move {
                            if let Err(e) = confirmer.confirm_all_unaccepted_trades().await {
                                warn!("Auto-confirm failed: {}", e);
                            }
                        });
                    }
                }
                Err(e) => {
                    warn!("Sending trade offer error: {}", e);
                    agent.events().emit(AgentEvent::TradeofferSendError(e.clone()));
                }
            }

            drop(guard);
            // receiver may have been dropped; the events above still fired
            let _ = tx.send(result);
        });

        OfferSubmission { offer, outcome: rx }
    }

    /// Load the agent's own inventory
    pub async fn get_inventory(
        &self,
        appid: u32,
        contextid: &str,
        tradable_only: bool,
    ) -> Result<Vec<EconItem>> {
        let _guard = self.busy().acquire("get_inventory");
        self.platform()
            .trades
            .load_inventory(appid, contextid, tradable_only)
            .await
            .map_err(AgentError::Offer)
    }

    /// Load another account's inventory
    pub async fn get_inventory_by_steam_id(
        &self,
        steam_id: SteamId,
        appid: u32,
        contextid: &str,
        tradable_only: bool,
    ) -> Result<Vec<EconItem>> {
        let _guard = self.busy().acquire("get_inventory_by_steam_id");
        self.platform()
            .trades
            .load_user_inventory(steam_id, appid, contextid, tradable_only)
            .await
            .map_err(AgentError::Offer)
    }

    /// Fetch a single offer by id
    pub async fn get_trade_offer(&self, id: &str) -> Result<Arc<dyn OfferHandle>> {
        let _guard = self.busy().acquire("get_trade_offer");
        self.platform()
            .trades
            .get_offer(id)
            .await
            .map_err(AgentError::Offer)
    }

    /// Cancel a sent offer (or decline a received one)
    pub async fn cancel_trade_offer(&self, offer: &dyn OfferHandle) -> Result<()> {
        let _guard = self.busy().acquire("cancel_trade_offer");
        let result = offer.cancel().await.map_err(AgentError::Offer);
        match &result {
            Ok(()) => info!("Cancelled trade offer {:?}", offer.id()),
            Err(e) => warn!("Failed to cancel trade offer {:?}: {}", offer.id(), e),
        }
        result
    }

    /// Alias of `cancel_trade_offer` for received offers
    pub async fn decline_trade_offer(&self, offer: &dyn OfferHandle) -> Result<()> {
        self.cancel_trade_offer(offer).await
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(|v| match v {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    }))
}

fn amount_string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        Some(StringOrNumber::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_defaults() {
        let items = normalize_items(&[TradeItem::new(730, "123")]);
        assert_eq!(
            items,
            vec![NormalizedItem {
                appid: 730,
                contextid: "2".to_string(),
                assetid: "123".to_string(),
                amount: 1,
            }]
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_values() {
        let items = normalize_items(&[TradeItem::new(753, 99).with_contextid(6).with_amount(5)]);
        assert_eq!(items[0].contextid, "6");
        assert_eq!(items[0].amount, 5);
        assert_eq!(items[0].assetid, "99");
    }

    #[test]
    fn test_normalize_drops_incomplete_items() {
        let items = [
            TradeItem {
                appid: Some(730),
                ..Default::default()
            },
            TradeItem {
                assetid: Some("1".to_string()),
                ..Default::default()
            },
            TradeItem::new(730, "  "),
            TradeItem::new(440, "7"),
        ];
        let normalized = normalize_items(&items);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].appid, 440);
    }

    #[test]
    fn test_trade_item_from_json() {
        let items: Vec<TradeItem> = serde_json::from_str(
            r#"[
                {"appid": 730, "assetid": 123},
                {"appid": 730, "contextid": "2", "assetid": "456", "amount": "3"},
                {"assetid": "789"}
            ]"#,
        )
        .unwrap();

        assert_eq!(items[0].assetid.as_deref(), Some("123"));
        assert_eq!(items[1].amount, Some(3));

        let normalized = normalize_items(&items);
        assert_eq!(normalized.len(), 2);
        assert!(normalized.iter().all(|i| i.contextid == "2"));
    }

    #[test]
    fn test_pending_offer_sides() {
        let pending = PendingOffer::new(&[], &[TradeItem::new(730, "123")], "hello");
        assert_eq!(pending.items_to_send.len(), 1);
        assert!(pending.items_to_receive.is_empty());
        assert_eq!(pending.message, "hello");
    }
}

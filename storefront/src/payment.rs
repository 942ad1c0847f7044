//! Payment widget integration.
//!
//! The widget is an external SDK: it is opened with a [`WidgetRequest`] and
//! reports outcomes later, on its own schedule, as [`WidgetEvent`]s. Callers
//! subscribe once per screen and must accept any number of events, including
//! none and duplicates.

use crate::checkout_form::Contact;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Shown when a gateway failure carries no usable message
pub const GATEWAY_FALLBACK_MESSAGE: &str =
    "Une erreur est survenue lors du paiement. Veuillez réessayer.";

/// Stream of widget outcomes
pub type WidgetEvents = Pin<Box<dyn Stream<Item = WidgetEvent> + Send>>;

/// Data the widget is opened with
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WidgetRequest {
    /// Whole amount to charge
    pub amount: u64,
    /// Public widget key
    pub api_key: String,
    /// Gateway sandbox
    pub sandbox: bool,
    /// Buyer email
    pub email: String,
    /// Buyer phone
    pub phone: String,
    /// Human-readable reason
    pub reason: String,
    /// JSON-encoded reference and line items
    pub data: String,
}

impl WidgetRequest {
    /// Build the request for a total
    ///
    /// The amount is rounded once here. `reference_millis` makes the
    /// `PAY-<millis>` reference and normally comes from the clock.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // totals are non-negative
    pub fn new(
        total: f64,
        contact: &Contact,
        api_key: &str,
        sandbox: bool,
        currency: &str,
        reference_millis: i64,
    ) -> Self {
        let amount = total.max(0.0).round() as u64;
        let data = serde_json::json!({
            "reference": format!("PAY-{reference_millis}"),
            "items": [{
                "name": "Billet",
                "quantity": 1,
                "unit_price": amount,
                "total_price": amount,
            }],
        });

        Self {
            amount,
            api_key: api_key.to_string(),
            sandbox,
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            reason: format!("Paiement de {amount} {currency}"),
            data: data.to_string(),
        }
    }
}

/// Success payload from the widget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Gateway transaction id, unvalidated
    pub transaction_id: String,
    /// Full payload as delivered
    pub raw: Value,
}

impl PaymentResult {
    /// Read a widget success payload
    ///
    /// A missing or non-string `transactionId` becomes an empty id; it is
    /// rejected later, during validation.
    #[must_use]
    pub fn from_payload(raw: Value) -> Self {
        let transaction_id = raw
            .get("transactionId")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self { transaction_id, raw }
    }
}

/// Failure payload from the widget
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GatewayFailure {
    /// Payload as delivered (object, string or anything else)
    pub raw: Value,
}

impl GatewayFailure {
    /// Wrap a failure payload
    #[must_use]
    pub const fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Message for the buyer
    ///
    /// `message`, then the payload itself if it is a string, then
    /// `response.data.message`, then a generic text.
    #[must_use]
    pub fn message(&self) -> String {
        let non_empty = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        non_empty(self.raw.get("message"))
            .or_else(|| non_empty(Some(&self.raw)))
            .or_else(|| non_empty(self.raw.pointer("/response/data/message")))
            .unwrap_or_else(|| GATEWAY_FALLBACK_MESSAGE.to_string())
    }
}

/// Outcome reported by the widget
#[derive(Clone, Debug, PartialEq)]
pub enum WidgetEvent {
    /// Payment accepted
    Succeeded(PaymentResult),
    /// Payment refused or aborted
    Failed(GatewayFailure),
}

/// External payment widget
pub trait PaymentWidget: Send + Sync {
    /// Open the widget; fire-and-forget
    fn open(&self, request: WidgetRequest);

    /// Subscribe to outcomes
    ///
    /// Every subscription sees events sent after it was made.
    fn events(&self) -> WidgetEvents;
}

/// Widget relaying events through a broadcast channel
///
/// The host (or a test) pushes outcomes with [`BroadcastWidget::emit`];
/// open requests are recorded.
#[derive(Clone)]
pub struct BroadcastWidget {
    events: broadcast::Sender<WidgetEvent>,
    opened: Arc<std::sync::Mutex<Vec<WidgetRequest>>>,
}

impl Default for BroadcastWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastWidget {
    /// Create a widget with no subscribers
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            opened: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    /// Deliver an outcome to current subscribers
    pub fn emit(&self, event: WidgetEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Widget event dropped: no subscriber");
        }
    }

    /// Requests the widget was opened with, oldest first
    #[must_use]
    pub fn opened(&self) -> Vec<WidgetRequest> {
        self.opened.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl PaymentWidget for BroadcastWidget {
    fn open(&self, request: WidgetRequest) {
        tracing::info!(amount = request.amount, sandbox = request.sandbox, "Payment widget opened");
        if let Ok(mut opened) = self.opened.lock() {
            opened.push(request);
        }
    }

    fn events(&self) -> WidgetEvents {
        let mut receiver = self.events.subscribe();
        Box::pin(async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Widget subscriber lagged");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// How the sandbox widget answers
#[derive(Clone, Debug)]
pub enum SandboxOutcome {
    /// Approve with a generated transaction id
    Approve,
    /// Decline with this message
    Decline(String),
}

/// Development widget that settles every payment by itself
///
/// Stands in for the gateway SDK in the demo binary.
#[derive(Clone)]
pub struct SandboxWidget {
    inner: BroadcastWidget,
    outcome: SandboxOutcome,
    latency: Duration,
}

impl SandboxWidget {
    /// Approving sandbox with a short simulated latency
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: BroadcastWidget::new(),
            outcome: SandboxOutcome::Approve,
            latency: Duration::from_millis(100),
        }
    }

    /// Decline every payment
    #[must_use]
    pub fn declining(message: impl Into<String>) -> Self {
        Self {
            outcome: SandboxOutcome::Decline(message.into()),
            ..Self::new()
        }
    }

    /// Change the simulated latency
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl Default for SandboxWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentWidget for SandboxWidget {
    fn open(&self, request: WidgetRequest) {
        let amount = request.amount;
        self.inner.open(request);

        let widget = self.inner.clone();
        let outcome = self.outcome.clone();
        let latency = self.latency;

        tokio::spawn(async move {
            tokio::time::sleep(latency).await;

            let event = match outcome {
                SandboxOutcome::Approve => {
                    let transaction_id = format!("sandbox_txn_{}", uuid::Uuid::new_v4().simple());
                    tracing::info!(%transaction_id, amount, "Sandbox payment approved");
                    WidgetEvent::Succeeded(PaymentResult::from_payload(serde_json::json!({
                        "transactionId": transaction_id,
                        "amount": amount,
                    })))
                },
                SandboxOutcome::Decline(message) => {
                    tracing::info!(amount, "Sandbox payment declined");
                    WidgetEvent::Failed(GatewayFailure::new(serde_json::json!({ "message": message })))
                },
            };

            widget.emit(event);
        });
    }

    fn events(&self) -> WidgetEvents {
        self.inner.events()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn test_widget_request_shape() {
        let request = WidgetRequest::new(60000.4, &Contact::default(), "pk", true, "FCFA", 1_700_000_000_000);

        assert_eq!(request.amount, 60000);
        assert_eq!(request.reason, "Paiement de 60000 FCFA");
        assert_eq!(request.phone, "00000000");

        let data: Value = serde_json::from_str(&request.data).unwrap();
        assert_eq!(data["reference"], "PAY-1700000000000");
        assert_eq!(data["items"][0]["name"], "Billet");
        assert_eq!(data["items"][0]["quantity"], 1);
        assert_eq!(data["items"][0]["total_price"], 60000);
    }

    #[test]
    fn test_payment_result_without_transaction_id() {
        let result = PaymentResult::from_payload(json!({ "status": "SUCCESS" }));
        assert_eq!(result.transaction_id, "");
    }

    #[test]
    fn test_gateway_failure_message_priority() {
        let message = |raw| GatewayFailure::new(raw).message();

        assert_eq!(message(json!({ "message": "Solde insuffisant" })), "Solde insuffisant");
        assert_eq!(message(json!("Annulé")), "Annulé");
        assert_eq!(
            message(json!({ "response": { "data": { "message": "Carte refusée" } } })),
            "Carte refusée"
        );
        assert_eq!(
            message(json!({ "message": "Direct", "response": { "data": { "message": "Nested" } } })),
            "Direct"
        );
        assert_eq!(message(json!({ "code": 42 })), GATEWAY_FALLBACK_MESSAGE);
        assert_eq!(message(Value::Null), GATEWAY_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn test_sandbox_widget_approves() {
        let widget = SandboxWidget::new().with_latency(Duration::from_millis(1));
        let mut events = widget.events();

        widget.open(WidgetRequest::new(1000.0, &Contact::default(), "", true, "FCFA", 0));

        let event = tokio::time::timeout(Duration::from_secs(1), events.next())
            .await
            .unwrap()
            .unwrap();
        match event {
            WidgetEvent::Succeeded(result) => assert!(result.transaction_id.starts_with("sandbox_txn_")),
            WidgetEvent::Failed(_) => panic!("sandbox should approve"),
        }
    }

    #[tokio::test]
    async fn test_sandbox_widget_declines() {
        let widget = SandboxWidget::declining("Refusé").with_latency(Duration::from_millis(1));
        let mut events = widget.events();

        widget.open(WidgetRequest::new(1000.0, &Contact::default(), "", true, "FCFA", 0));

        let event = tokio::time::timeout(Duration::from_secs(1), events.next())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, WidgetEvent::Failed(failure) if failure.message() == "Refusé"));
    }
}

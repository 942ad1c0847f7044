//! Order reconciliation: tell the backend that a gateway payment succeeded.
//!
//! One [`OrderRequest`] is built per successful payment and posted to the
//! finalize endpoint. Error bodies are turned into a single buyer-facing
//! message prefixed with the HTTP status.

use crate::api::{ApiClient, BearerToken};
use crate::checkout_form::Contact;
use crate::error::{ApiError, CheckoutError};
use crate::payment::PaymentResult;
use crate::selection::to_minor_units;
use crate::types::PassTypeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;

/// Finalize endpoint, relative to the checkout API root
pub const FINALIZE_PATH: &str = "/v1/checkout/request/init";

/// Message used when an error body has neither `errors` nor `message`
pub const SERVER_FALLBACK_MESSAGE: &str = "Erreur lors du traitement du paiement";

/// Message for a transport failure that carries no text
pub const UNKNOWN_ERROR_MESSAGE: &str = "Une erreur inconnue est survenue";

/// Minimum length of a gateway reference
pub const MIN_REFERENCE_LEN: usize = 3;

/// Boxed future returned by [`OrderApi::finalize`]
pub type OrderFuture = Pin<Box<dyn Future<Output = Result<OrderConfirmation, CheckoutError>> + Send>>;

/// Body of the finalize request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Gateway transaction id
    pub reference: String,
    /// Buyer phone
    pub phone_number: String,
    /// Buyer name
    pub name: String,
    /// Buyer email
    pub email: String,
    /// Payment provider label
    pub payment_method: String,
    /// Total in minor units (×100, rounded once)
    pub amount: i64,
    /// Purchased pass type
    pub pass_type_id: PassTypeId,
    /// Number of tickets
    pub qte: u32,
}

impl OrderRequest {
    /// Build the request for one payment
    #[must_use]
    pub fn new(
        reference: String,
        contact: Contact,
        payment_method: &str,
        total: f64,
        pass_type_id: PassTypeId,
        quantity: u32,
    ) -> Self {
        Self {
            reference,
            phone_number: contact.phone,
            name: contact.name,
            email: contact.email,
            payment_method: payment_method.to_string(),
            amount: to_minor_units(total),
            pass_type_id,
            qte: quantity,
        }
    }
}

/// Backend answer to a successful finalize request
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// Order fields as returned
    pub body: Value,
}

/// Check the gateway reference of a payment
///
/// # Errors
///
/// Returns [`CheckoutError::Validation`] when the trimmed transaction id is
/// empty or shorter than [`MIN_REFERENCE_LEN`] characters.
pub fn validate_reference(result: &PaymentResult) -> Result<String, CheckoutError> {
    let reference = result.transaction_id.trim();

    if reference.is_empty() {
        return Err(CheckoutError::Validation(
            "Réponse de paiement invalide: transactionId manquant".to_string(),
        ));
    }

    if reference.chars().count() < MIN_REFERENCE_LEN {
        return Err(CheckoutError::Validation(format!(
            "Format de référence invalide: {reference}"
        )));
    }

    Ok(reference.to_string())
}

/// Buyer-facing message for an error body, without the status prefix
///
/// An `errors` array is newline-joined; an `errors` object becomes one
/// `field: m1, m2` line per field. Otherwise `message`, otherwise a generic
/// text.
#[must_use]
pub fn error_body_message(body: &Value) -> String {
    match body.get("errors") {
        Some(Value::Array(errors)) => errors.iter().map(value_text).collect::<Vec<_>>().join("\n"),
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(field, messages)| match messages {
                Value::Array(messages) => format!(
                    "{field}: {}",
                    messages.iter().map(value_text).collect::<Vec<_>>().join(", ")
                ),
                other => format!("{field}: {}", value_text(other)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(SERVER_FALLBACK_MESSAGE)
            .to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Interpret a raw finalize response
///
/// # Errors
///
/// - [`CheckoutError::MalformedResponse`]: the body is not JSON
/// - [`CheckoutError::Server`]: non-2xx status
pub fn interpret_response(status: u16, body: &str) -> Result<OrderConfirmation, CheckoutError> {
    let parsed: Value = serde_json::from_str(body).map_err(|error| {
        tracing::warn!(status, %error, "Finalize response is not JSON");
        CheckoutError::MalformedResponse { status }
    })?;

    if !(200..300).contains(&status) {
        if let Some(errors) = parsed.get("errors") {
            tracing::warn!(status, %errors, "Backend rejected the order");
        }
        return Err(CheckoutError::Server {
            status,
            message: error_body_message(&parsed),
        });
    }

    Ok(OrderConfirmation { body: parsed })
}

/// Backend order finalization
pub trait OrderApi: Send + Sync {
    /// Post the order with bearer auth
    fn finalize(&self, order: OrderRequest, token: BearerToken) -> OrderFuture;
}

/// Order finalization over HTTP
#[derive(Clone, Debug)]
pub struct HttpOrderApi {
    api: ApiClient,
}

impl HttpOrderApi {
    /// Create over a client bound to the checkout API root
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

impl OrderApi for HttpOrderApi {
    fn finalize(&self, order: OrderRequest, token: BearerToken) -> OrderFuture {
        let api = self.api.clone();
        Box::pin(async move {
            tracing::info!(
                reference = %order.reference,
                pass_type_id = %order.pass_type_id,
                qte = order.qte,
                amount = order.amount,
                "Finalizing order"
            );

            let response = api
                .post_raw(FINALIZE_PATH, &order, Some(&token))
                .await
                .map_err(|error| match error {
                    ApiError::RequestFailed(message) if !message.trim().is_empty() => {
                        CheckoutError::Network(message)
                    },
                    other => {
                        tracing::warn!(error = %other, "Finalize request failed without detail");
                        CheckoutError::Network(UNKNOWN_ERROR_MESSAGE.to_string())
                    },
                })?;

            interpret_response(response.status.as_u16(), &response.body)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reference_is_trimmed() {
        let result = PaymentResult::from_payload(json!({ "transactionId": "  abc123 " }));
        assert_eq!(validate_reference(&result).unwrap(), "abc123");
    }

    #[test]
    fn test_reference_rejections() {
        let check = |id: &str| validate_reference(&PaymentResult::from_payload(json!({ "transactionId": id })));

        assert_eq!(
            check("   ").unwrap_err().user_message(),
            "Réponse de paiement invalide: transactionId manquant"
        );
        assert_eq!(check("ab").unwrap_err().user_message(), "Format de référence invalide: ab");
        assert!(check("abc").is_ok());
    }

    #[test]
    fn test_error_object_lines() {
        let body = json!({ "errors": { "phone_number": ["required"], "qte": ["min", "integer"], "email": "invalid" } });
        let message = error_body_message(&body);

        let mut lines: Vec<&str> = message.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines, vec!["email: invalid", "phone_number: required", "qte: min, integer"]);
    }

    #[test]
    fn test_error_array_and_message() {
        assert_eq!(error_body_message(&json!({ "errors": ["a", "b"] })), "a\nb");
        assert_eq!(error_body_message(&json!({ "message": "Stock épuisé" })), "Stock épuisé");
        assert_eq!(error_body_message(&json!({})), SERVER_FALLBACK_MESSAGE);
    }

    #[test]
    fn test_interpret_response() {
        let error = interpret_response(422, r#"{"errors":{"phone_number":["required"]}}"#).unwrap_err();
        assert_eq!(error.user_message(), "[422] phone_number: required");

        let error = interpret_response(500, "<html>").unwrap_err();
        assert_eq!(error, CheckoutError::MalformedResponse { status: 500 });

        let confirmation = interpret_response(201, r#"{"id":9}"#).unwrap();
        assert_eq!(confirmation.body["id"], 9);
    }

    #[test]
    fn test_order_request_amount_in_minor_units() {
        let order = OrderRequest::new(
            "abc123".to_string(),
            Contact::default(),
            "kkiapay",
            10000.0,
            PassTypeId::new(5),
            1,
        );

        assert_eq!(order.amount, 1_000_000);
        let body = serde_json::to_value(&order).unwrap();
        assert_eq!(body["pass_type_id"], 5);
        assert_eq!(body["qte"], 1);
        assert_eq!(body["phone_number"], "00000000");
    }
}

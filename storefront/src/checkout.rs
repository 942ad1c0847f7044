//! Checkout screen as a reducer.
//!
//! One reducer drives the whole purchase: loading the event, choosing a pass
//! type and quantity, filling the payment form, opening the payment widget,
//! and reconciling a successful payment with the backend.
//!
//! Each payment attempt gets an [`AttemptId`]. Results carrying another
//! attempt's id are stale and ignored, and [`Phase::is_in_flight`] guards
//! against starting a second attempt while one is running.

use crate::api::BearerToken;
use crate::catalog::{load_event, CatalogApi};
use crate::checkout_form::{CardField, CheckoutForm, MomoField, PaymentMode};
use crate::config::Config;
use crate::display;
use crate::error::CheckoutError;
use crate::payment::{GatewayFailure, PaymentResult, PaymentWidget, WidgetEvent, WidgetRequest};
use crate::reconciliation::{validate_reference, OrderApi, OrderConfirmation, OrderRequest};
use crate::selection::Selection;
use crate::session::Session;
use crate::types::{Event, EventId, PassType, PassTypeId};
use futures::StreamExt;
use passline_core::{
    async_effect, delay, effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Shown when the buyer has no stored session
pub const NOT_SIGNED_IN: &str = "Utilisateur non connecté";

/// Shown when a payment succeeds without a selected pass type
pub const NOTHING_SELECTED: &str = "Aucun billet sélectionné";

// ============================================================================
// Attempts and alerts
// ============================================================================

/// Identity of one payment attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttemptId(Uuid);

impl AttemptId {
    /// Fresh random id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What dismissing an alert does
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertDismissal {
    /// Stay on the screen
    Stay,
    /// Leave the screen
    NavigateBack,
}

/// Blocking message shown to the buyer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alert {
    /// Title line
    pub title: String,
    /// Body text
    pub message: String,
    /// Effect of the dismiss button
    pub on_dismiss: AlertDismissal,
}

impl Alert {
    fn new(title: &str, message: impl Into<String>, on_dismiss: AlertDismissal) -> Self {
        Self {
            title: title.to_string(),
            message: message.into(),
            on_dismiss,
        }
    }

    /// Order recorded by the backend
    #[must_use]
    pub fn payment_succeeded() -> Self {
        Self::new(
            "Paiement réussi",
            "Votre billet a été acheté avec succès. Vous recevrez un email de confirmation.",
            AlertDismissal::NavigateBack,
        )
    }

    /// Event could not be loaded
    #[must_use]
    pub fn event_unavailable() -> Self {
        Self::new(
            "Événement introuvable",
            "L'événement que vous recherchez n'existe pas ou n'est plus disponible.",
            AlertDismissal::NavigateBack,
        )
    }

    /// Attempt failed; the text is the error's user message
    #[must_use]
    pub fn checkout_failed(error: &CheckoutError) -> Self {
        let title = match error {
            CheckoutError::Gateway(_) => "Paiement échoué",
            _ => "Erreur",
        };
        Self::new(title, error.user_message(), AlertDismissal::Stay)
    }
}

// ============================================================================
// State
// ============================================================================

/// Where the current attempt stands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Phase {
    /// No attempt running
    #[default]
    Idle,
    /// Widget opened, waiting for its outcome
    AwaitingPayment,
    /// Checking the session token and the gateway reference
    Validating,
    /// Finalize request sent
    Submitting,
    /// Order recorded
    Succeeded,
    /// Attempt failed; dismissing the alert returns to `Idle`
    Failed(CheckoutError),
}

impl Phase {
    /// Whether an attempt is running
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::AwaitingPayment | Self::Validating | Self::Submitting)
    }
}

/// Payment button as rendered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentButton {
    /// Button text
    pub label: String,
    /// Whether pressing it starts an attempt
    pub enabled: bool,
    /// Whether to show a spinner
    pub busy: bool,
}

/// Checkout screen state
#[derive(Clone, Debug, Default)]
pub struct CheckoutState {
    /// Event being shown
    pub event_id: Option<EventId>,
    /// Loaded event
    pub event: Option<Event>,
    /// Pass types on offer
    pub pass_types: Vec<PassType>,
    /// Event fetch in progress
    pub loading: bool,
    /// Chosen pass type and quantity
    pub selection: Selection,
    /// Payment form
    pub form: CheckoutForm,
    /// Current attempt phase
    pub phase: Phase,
    /// Current attempt
    pub attempt: Option<AttemptId>,
    /// Alert awaiting dismissal
    pub alert: Option<Alert>,
    /// The screen asked to be closed
    pub navigated_back: bool,
    /// Backend answer of the last successful order
    pub last_order: Option<OrderConfirmation>,
}

impl CheckoutState {
    /// Empty state, before mount
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Payment button for the current selection and phase
    #[must_use]
    pub fn payment_button(&self, currency: &str) -> PaymentButton {
        let label = if self.selection.pass_type().is_some() {
            display::button_label(self.selection.total(), currency)
        } else {
            display::SELECT_PROMPT.to_string()
        };

        PaymentButton {
            label,
            enabled: self.accepts_payment(),
            busy: self.phase.is_in_flight(),
        }
    }

    fn accepts_payment(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Failed(_)) && self.selection.is_payable()
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        self.attempt == Some(attempt)
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Inputs of the checkout reducer: user intents and effect results
#[derive(Clone, Debug)]
pub enum CheckoutAction {
    /// Screen shown for an event
    Mounted {
        /// Event to load
        event_id: EventId,
    },
    /// Event and pass types fetched
    EventLoaded {
        /// The event
        event: Box<Event>,
        /// Its pass types
        pass_types: Vec<PassType>,
    },
    /// Event could not be fetched
    EventUnavailable {
        /// Why, for logs
        reason: String,
    },
    /// Pass type tapped
    SelectPassType {
        /// Tapped pass type
        pass_type_id: PassTypeId,
    },
    /// Quantity stepper `+`
    IncrementQuantity,
    /// Quantity stepper `-`
    DecrementQuantity,
    /// Payment mode tab switched
    SetPaymentMode {
        /// New mode
        mode: PaymentMode,
    },
    /// Card field edited
    SetCardField {
        /// Edited field
        field: CardField,
        /// New value
        value: String,
    },
    /// Mobile money field edited
    SetMomoField {
        /// Edited field
        field: MomoField,
        /// New value
        value: String,
    },
    /// Payment button pressed
    Pay,
    /// Widget reported a successful payment
    WidgetSucceeded {
        /// Gateway payload
        result: PaymentResult,
    },
    /// Widget reported a failed payment
    WidgetFailed {
        /// Gateway payload
        failure: GatewayFailure,
    },
    /// Widget closed without an outcome
    WidgetDismissed,
    /// Session and reference checks passed
    Validated {
        /// Attempt checked
        attempt: AttemptId,
        /// Order to send
        order: OrderRequest,
        /// Token to send it with
        token: BearerToken,
    },
    /// Backend recorded the order
    OrderFinalized {
        /// Attempt finalized
        attempt: AttemptId,
        /// Backend answer
        confirmation: OrderConfirmation,
    },
    /// Validation or finalization failed
    AttemptFailed {
        /// Attempt that failed
        attempt: AttemptId,
        /// Why
        error: CheckoutError,
    },
    /// Alert button pressed
    DismissAlert,
    /// Leave the screen
    NavigateBack,
}

// ============================================================================
// Environment
// ============================================================================

/// Checkout constants taken from configuration
#[derive(Clone)]
pub struct CheckoutSettings {
    /// Public widget key
    pub api_key: String,
    /// Gateway sandbox
    pub sandbox: bool,
    /// Currency label
    pub currency: String,
    /// `payment_method` sent with orders
    pub payment_method: String,
    /// Delay before leaving a screen whose event is missing
    pub not_found_back_delay: Duration,
}

impl CheckoutSettings {
    /// Settings from a loaded configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: config.widget.api_key.clone(),
            sandbox: config.widget.sandbox,
            currency: config.checkout.currency.clone(),
            payment_method: config.checkout.payment_method.clone(),
            not_found_back_delay: Duration::from_millis(config.checkout.not_found_back_delay_ms),
        }
    }
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Dependencies of the checkout reducer
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Event catalog
    pub catalog: Arc<dyn CatalogApi>,
    /// Order finalization
    pub orders: Arc<dyn OrderApi>,
    /// Payment widget
    pub widget: Arc<dyn PaymentWidget>,
    /// Local session, read for the bearer token
    pub session: Session,
    /// Clock for widget references
    pub clock: Arc<dyn Clock>,
    /// Constants
    pub settings: CheckoutSettings,
}

impl CheckoutEnvironment {
    /// Bundle the dependencies
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogApi>,
        orders: Arc<dyn OrderApi>,
        widget: Arc<dyn PaymentWidget>,
        session: Session,
        clock: Arc<dyn Clock>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            catalog,
            orders,
            widget,
            session,
            clock,
            settings,
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the checkout screen
#[derive(Clone, Debug, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn fail(state: &mut CheckoutState, error: CheckoutError) {
        tracing::warn!(
            attempt = ?state.attempt,
            kind = error.kind(),
            message = %error,
            "Checkout attempt failed"
        );
        metrics::counter!("checkout.attempts.failed", "kind" => error.kind()).increment(1);

        state.alert = Some(Alert::checkout_failed(&error));
        state.phase = Phase::Failed(error);
    }

    fn start_attempt(state: &mut CheckoutState) -> AttemptId {
        let attempt = AttemptId::new();
        metrics::counter!("checkout.attempts.started").increment(1);
        tracing::info!(%attempt, total = state.selection.total(), "Payment attempt started");

        state.attempt = Some(attempt);
        state.alert = None;
        attempt
    }

    fn subscribe(widget: &dyn PaymentWidget) -> Effect<CheckoutAction> {
        let events = widget.events().map(|event| match event {
            WidgetEvent::Succeeded(result) => CheckoutAction::WidgetSucceeded { result },
            WidgetEvent::Failed(failure) => CheckoutAction::WidgetFailed { failure },
        });
        Effect::Stream(Box::pin(events))
    }

    #[allow(clippy::too_many_lines)] // one arm per attempt transition
    fn reduce_payment(
        state: &mut CheckoutState,
        action: CheckoutAction,
        env: &CheckoutEnvironment,
    ) -> SmallVec<[Effect<CheckoutAction>; 4]> {
        match action {
            CheckoutAction::Pay => {
                if !state.accepts_payment() {
                    tracing::debug!(phase = ?state.phase, "Payment trigger ignored");
                    return SmallVec::new();
                }

                Self::start_attempt(state);
                state.phase = Phase::AwaitingPayment;

                let settings = &env.settings;
                let request = WidgetRequest::new(
                    state.selection.total(),
                    &state.form.contact(),
                    &settings.api_key,
                    settings.sandbox,
                    &settings.currency,
                    env.clock.now().timestamp_millis(),
                );
                let widget = Arc::clone(&env.widget);

                smallvec![async_effect! {
                    widget.open(request);
                    None::<CheckoutAction>
                }]
            },

            CheckoutAction::WidgetSucceeded { result } => {
                let open = match (&state.phase, state.attempt) {
                    (Phase::AwaitingPayment, Some(attempt)) => Some(attempt),
                    (Phase::Idle, _) => None,
                    (phase, _) => {
                        tracing::warn!(?phase, "Widget success outside an open payment, ignored");
                        return SmallVec::new();
                    },
                };
                let attempt = open.unwrap_or_else(|| Self::start_attempt(state));
                state.phase = Phase::Validating;

                let Some(pass_type) = state.selection.pass_type() else {
                    Self::fail(state, CheckoutError::Validation(NOTHING_SELECTED.to_string()));
                    return SmallVec::new();
                };

                let pass_type_id = pass_type.id;
                let quantity = state.selection.quantity();
                let total = state.selection.total();
                let contact = state.form.contact();
                let payment_method = env.settings.payment_method.clone();
                let session = env.session.clone();

                smallvec![async_effect! {
                    Some(match authorize(&session, &result).await {
                        Ok((token, reference)) => CheckoutAction::Validated {
                            attempt,
                            order: OrderRequest::new(
                                reference,
                                contact,
                                &payment_method,
                                total,
                                pass_type_id,
                                quantity,
                            ),
                            token,
                        },
                        Err(error) => CheckoutAction::AttemptFailed { attempt, error },
                    })
                }]
            },

            CheckoutAction::WidgetFailed { failure } => {
                if !matches!(state.phase, Phase::Idle | Phase::AwaitingPayment) {
                    tracing::warn!(phase = ?state.phase, "Widget failure outside an open payment, ignored");
                    return SmallVec::new();
                }
                // A failure with no payment open belongs to an attempt of its own
                if state.phase == Phase::Idle || state.attempt.is_none() {
                    Self::start_attempt(state);
                }

                Self::fail(state, CheckoutError::Gateway(failure.message()));
                SmallVec::new()
            },

            CheckoutAction::WidgetDismissed => {
                if state.phase == Phase::AwaitingPayment {
                    tracing::info!(attempt = ?state.attempt, "Widget closed without payment");
                    state.phase = Phase::Idle;
                    state.attempt = None;
                }
                SmallVec::new()
            },

            CheckoutAction::Validated {
                attempt,
                order,
                token,
            } => {
                if !state.is_current(attempt) || state.phase != Phase::Validating {
                    tracing::debug!(%attempt, "Stale validation result ignored");
                    return SmallVec::new();
                }
                state.phase = Phase::Submitting;

                let orders = Arc::clone(&env.orders);
                smallvec![async_effect! {
                    Some(match orders.finalize(order, token).await {
                        Ok(confirmation) => CheckoutAction::OrderFinalized { attempt, confirmation },
                        Err(error) => CheckoutAction::AttemptFailed { attempt, error },
                    })
                }]
            },

            CheckoutAction::OrderFinalized {
                attempt,
                confirmation,
            } => {
                if !state.is_current(attempt) || state.phase != Phase::Submitting {
                    tracing::debug!(%attempt, "Stale order confirmation ignored");
                    return SmallVec::new();
                }

                tracing::info!(%attempt, "Order finalized");
                metrics::counter!("checkout.attempts.succeeded").increment(1);
                state.phase = Phase::Succeeded;
                state.last_order = Some(confirmation);
                state.alert = Some(Alert::payment_succeeded());
                SmallVec::new()
            },

            CheckoutAction::AttemptFailed { attempt, error } => {
                if state.is_current(attempt)
                    && matches!(state.phase, Phase::Validating | Phase::Submitting)
                {
                    Self::fail(state, error);
                } else {
                    tracing::debug!(%attempt, "Stale failure ignored");
                }
                SmallVec::new()
            },

            other => {
                tracing::error!(action = ?other, "Not a payment action");
                SmallVec::new()
            },
        }
    }
}

/// Read the bearer token, then check the gateway reference
async fn authorize(
    session: &Session,
    result: &PaymentResult,
) -> Result<(BearerToken, String), CheckoutError> {
    let token = match session.token().await {
        Ok(Some(token)) => token,
        Ok(None) => return Err(CheckoutError::Validation(NOT_SIGNED_IN.to_string())),
        Err(error) => {
            tracing::warn!(%error, "Session token unreadable");
            return Err(CheckoutError::Validation(NOT_SIGNED_IN.to_string()));
        },
    };

    let reference = validate_reference(result)?;
    Ok((token, reference))
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Loading ==========
            CheckoutAction::Mounted { event_id } => {
                tracing::info!(%event_id, "Checkout mounted");
                state.event_id = Some(event_id);
                state.loading = true;
                state.navigated_back = false;

                let catalog = Arc::clone(&env.catalog);
                smallvec![
                    Self::subscribe(env.widget.as_ref()),
                    async_effect! {
                        Some(match load_event(catalog.as_ref(), event_id).await {
                            Ok((event, pass_types)) => CheckoutAction::EventLoaded {
                                event: Box::new(event),
                                pass_types,
                            },
                            Err(error) => CheckoutAction::EventUnavailable {
                                reason: error.to_string(),
                            },
                        })
                    },
                ]
            },

            CheckoutAction::EventLoaded { event, pass_types } => {
                if state.event_id != Some(event.id) {
                    tracing::debug!(event_id = %event.id, "Event for another screen ignored");
                    return SmallVec::new();
                }
                tracing::debug!(event_id = %event.id, pass_types = pass_types.len(), "Event loaded");
                state.loading = false;
                state.pass_types = pass_types;
                state.event = Some(*event);
                SmallVec::new()
            },

            CheckoutAction::EventUnavailable { reason } => {
                tracing::warn!(event_id = ?state.event_id, %reason, "Event unavailable");
                state.loading = false;
                state.alert = Some(Alert::event_unavailable());

                smallvec![delay! {
                    duration: env.settings.not_found_back_delay,
                    action: CheckoutAction::NavigateBack
                }]
            },

            // ========== Selection and form ==========
            CheckoutAction::SelectPassType { .. }
            | CheckoutAction::IncrementQuantity
            | CheckoutAction::DecrementQuantity
            | CheckoutAction::SetPaymentMode { .. }
            | CheckoutAction::SetCardField { .. }
            | CheckoutAction::SetMomoField { .. }
                if state.phase.is_in_flight() =>
            {
                tracing::debug!(?action, "Edit ignored while a payment is in flight");
                SmallVec::new()
            },

            CheckoutAction::SelectPassType { pass_type_id } => {
                match state.pass_types.iter().find(|p| p.id == pass_type_id) {
                    Some(pass_type) => state.selection.select(pass_type.clone()),
                    None => tracing::warn!(%pass_type_id, "Unknown pass type selected"),
                }
                SmallVec::new()
            },

            CheckoutAction::IncrementQuantity => {
                state.selection.increment();
                SmallVec::new()
            },

            CheckoutAction::DecrementQuantity => {
                state.selection.decrement();
                SmallVec::new()
            },

            CheckoutAction::SetPaymentMode { mode } => {
                state.form.set_mode(mode);
                SmallVec::new()
            },

            CheckoutAction::SetCardField { field, value } => {
                state.form.set_card_field(field, value);
                SmallVec::new()
            },

            CheckoutAction::SetMomoField { field, value } => {
                state.form.set_momo_field(field, value);
                SmallVec::new()
            },

            // ========== Alerts and navigation ==========
            CheckoutAction::DismissAlert => {
                let Some(alert) = state.alert.take() else {
                    return SmallVec::new();
                };
                if matches!(state.phase, Phase::Failed(_)) {
                    state.phase = Phase::Idle;
                    state.attempt = None;
                }
                if alert.on_dismiss == AlertDismissal::NavigateBack {
                    state.navigated_back = true;
                }
                SmallVec::new()
            },

            CheckoutAction::NavigateBack => {
                state.navigated_back = true;
                SmallVec::new()
            },

            // ========== Payment ==========
            payment => Self::reduce_payment(state, payment, env),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::mocks::{sample_event, MockCatalog, MockOrderApi};
    use crate::payment::BroadcastWidget;
    use passline_testing::{assertions, resolve_future, test_clock, ReducerTest};
    use serde_json::json;

    fn environment(orders: MockOrderApi) -> CheckoutEnvironment {
        CheckoutEnvironment::new(
            Arc::new(MockCatalog::new(vec![sample_event(1, &[10000.0, 20000.0])])),
            Arc::new(orders),
            Arc::new(BroadcastWidget::new()),
            Session::in_memory(),
            Arc::new(test_clock()),
            CheckoutSettings::default(),
        )
    }

    fn loaded_state() -> CheckoutState {
        let event = sample_event(1, &[10000.0, 20000.0]);
        CheckoutState {
            event_id: Some(event.id),
            pass_types: event.pass_types.clone(),
            event: Some(event),
            ..CheckoutState::new()
        }
    }

    fn selected_state(pass_index: usize, quantity: u32) -> CheckoutState {
        let mut state = loaded_state();
        state.selection.select(state.pass_types[pass_index].clone());
        for _ in 1..quantity {
            state.selection.increment();
        }
        state
    }

    fn awaiting_state() -> (CheckoutState, AttemptId) {
        let mut state = selected_state(0, 1);
        let attempt = AttemptId::new();
        state.attempt = Some(attempt);
        state.phase = Phase::AwaitingPayment;
        (state, attempt)
    }

    fn success(transaction_id: &str) -> CheckoutAction {
        CheckoutAction::WidgetSucceeded {
            result: PaymentResult::from_payload(json!({ "transactionId": transaction_id })),
        }
    }

    #[test]
    fn test_mount_subscribes_and_loads() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(CheckoutState::new())
            .when_action(CheckoutAction::Mounted {
                event_id: EventId::new(1),
            })
            .then_state(|state| {
                assert!(state.loading);
                assert_eq!(state.event_id, Some(EventId::new(1)));
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 2);
                assertions::assert_has_stream_effect(effects);
                assertions::assert_has_future_effect(effects);
            })
            .run();
    }

    #[test]
    fn test_unavailable_event_alerts_and_schedules_back() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(CheckoutState {
                loading: true,
                ..CheckoutState::new()
            })
            .when_action(CheckoutAction::EventUnavailable {
                reason: "Événement 99 introuvable".to_string(),
            })
            .then_state(|state| {
                assert!(!state.loading);
                assert_eq!(state.alert, Some(Alert::event_unavailable()));
                assert!(!state.navigated_back);
            })
            .then_effects(|effects| {
                assertions::assert_has_delay_effect(effects);
                let Effect::Delay { duration, .. } = &effects[0] else {
                    panic!("expected a delay");
                };
                assert_eq!(*duration, Duration::from_millis(2000));
            })
            .run();
    }

    #[test]
    fn test_two_pass_types_total_and_button() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(loaded_state())
            .when_action(CheckoutAction::SelectPassType {
                pass_type_id: PassTypeId::new(12),
            })
            .when_action(CheckoutAction::IncrementQuantity)
            .when_action(CheckoutAction::IncrementQuantity)
            .then_state(|state| {
                assert_eq!(state.selection.total(), 60000.0);
                let button = state.payment_button("FCFA");
                assert_eq!(button.label, "Payer 60 000 FCFA");
                assert!(button.enabled);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_button_disabled_without_selection() {
        let button = loaded_state().payment_button("FCFA");
        assert_eq!(button.label, "Sélectionner un billet");
        assert!(!button.enabled);
        assert!(!button.busy);
    }

    #[test]
    fn test_pay_opens_widget_once() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(selected_state(0, 1))
            .when_action(CheckoutAction::Pay)
            .then_state(|state| {
                assert_eq!(state.phase, Phase::AwaitingPayment);
                assert!(state.attempt.is_some());
                assert!(state.payment_button("FCFA").busy);
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn test_pay_is_noop_while_in_flight() {
        let (state, attempt) = awaiting_state();

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::Pay)
            .then_state(move |state| {
                assert_eq!(state.attempt, Some(attempt));
                assert_eq!(state.phase, Phase::AwaitingPayment);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_pay_is_noop_without_selection() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(loaded_state())
            .when_action(CheckoutAction::Pay)
            .then_state(|state| assert_eq!(state.phase, Phase::Idle))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_edits_ignored_while_in_flight() {
        let (state, _) = awaiting_state();

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::IncrementQuantity)
            .when_action(CheckoutAction::SelectPassType {
                pass_type_id: PassTypeId::new(12),
            })
            .then_state(|state| {
                assert_eq!(state.selection.quantity(), 1);
                assert_eq!(state.selection.pass_type().map(|p| p.id), Some(PassTypeId::new(11)));
            })
            .run();
    }

    #[test]
    fn test_mode_switch_keeps_fields() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(loaded_state())
            .when_action(CheckoutAction::SetCardField {
                field: CardField::HolderName,
                value: "Awa Dossou".to_string(),
            })
            .when_action(CheckoutAction::SetPaymentMode { mode: PaymentMode::Momo })
            .when_action(CheckoutAction::SetMomoField {
                field: MomoField::Operator,
                value: "MTN".to_string(),
            })
            .when_action(CheckoutAction::SetPaymentMode { mode: PaymentMode::Card })
            .then_state(|state| {
                assert_eq!(state.form.card().holder_name, "Awa Dossou");
                assert_eq!(state.form.momo().operator, "MTN");
                assert_eq!(state.form.mode(), PaymentMode::Card);
            })
            .run();
    }

    #[tokio::test]
    async fn test_success_without_token_fails_locally() {
        let orders = MockOrderApi::accepting();
        let env = environment(orders.clone());
        let (mut state, attempt) = awaiting_state();

        let effects = CheckoutReducer::new().reduce(&mut state, success("abc123"), &env);
        assert_eq!(state.phase, Phase::Validating);

        let action = resolve_future(effects.into_vec()).await.unwrap();
        assert!(matches!(
            &action,
            CheckoutAction::AttemptFailed { attempt: a, error: CheckoutError::Validation(m) }
                if *a == attempt && m == NOT_SIGNED_IN
        ));

        let effects = CheckoutReducer::new().reduce(&mut state, action, &env);
        assertions::assert_no_effects(&effects);
        assert!(matches!(state.phase, Phase::Failed(_)));
        assert_eq!(state.alert.as_ref().unwrap().title, "Erreur");
        assert_eq!(orders.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_transaction_id_fails_before_network() {
        let orders = MockOrderApi::accepting();
        let env = environment(orders.clone());
        env.session.set_token(&BearerToken::new("secret")).await.unwrap();
        let (mut state, _) = awaiting_state();

        let effects = CheckoutReducer::new().reduce(&mut state, success(""), &env);
        let action = resolve_future(effects.into_vec()).await.unwrap();
        CheckoutReducer::new().reduce(&mut state, action, &env);

        assert_eq!(
            state.alert.unwrap().message,
            "Réponse de paiement invalide: transactionId manquant"
        );
        assert_eq!(orders.calls(), 0);
    }

    #[tokio::test]
    async fn test_validated_order_carries_minor_units() {
        let orders = MockOrderApi::accepting();
        let env = environment(orders.clone());
        env.session.set_token(&BearerToken::new("secret")).await.unwrap();
        let (mut state, attempt) = awaiting_state();

        let effects = CheckoutReducer::new().reduce(&mut state, success(" txn_42 "), &env);
        let action = resolve_future(effects.into_vec()).await.unwrap();

        let CheckoutAction::Validated { attempt: a, order, token } = &action else {
            panic!("expected validation to pass, got {action:?}");
        };
        assert_eq!(*a, attempt);
        assert_eq!(order.reference, "txn_42");
        assert_eq!(order.amount, 1_000_000);
        assert_eq!(order.qte, 1);
        assert_eq!(order.pass_type_id, PassTypeId::new(11));
        assert_eq!(order.payment_method, "kkiapay");
        assert_eq!(token.expose(), "secret");

        let effects = CheckoutReducer::new().reduce(&mut state, action, &env);
        assert_eq!(state.phase, Phase::Submitting);
        let finalized = resolve_future(effects.into_vec()).await.unwrap();
        CheckoutReducer::new().reduce(&mut state, finalized, &env);

        assert_eq!(state.phase, Phase::Succeeded);
        assert_eq!(state.alert, Some(Alert::payment_succeeded()));
        assert_eq!(orders.calls(), 1);
    }

    #[test]
    fn test_duplicate_success_is_ignored() {
        let (mut state, attempt) = awaiting_state();
        state.phase = Phase::Submitting;

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(success("abc123"))
            .then_state(move |state| {
                assert_eq!(state.phase, Phase::Submitting);
                assert_eq!(state.attempt, Some(attempt));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_stale_result_is_ignored() {
        let (mut state, _) = awaiting_state();
        state.phase = Phase::Submitting;

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::AttemptFailed {
                attempt: AttemptId::new(),
                error: CheckoutError::Network("offline".to_string()),
            })
            .then_state(|state| {
                assert_eq!(state.phase, Phase::Submitting);
                assert!(state.alert.is_none());
            })
            .run();
    }

    #[test]
    fn test_server_rejection_then_dismiss_keeps_selection() {
        let (mut state, attempt) = awaiting_state();
        state.phase = Phase::Submitting;

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::AttemptFailed {
                attempt,
                error: CheckoutError::Server {
                    status: 422,
                    message: "phone_number: required".to_string(),
                },
            })
            .then_state(|state| {
                let alert = state.alert.as_ref().unwrap();
                assert_eq!(alert.title, "Erreur");
                assert_eq!(alert.message, "[422] phone_number: required");
                assert!(state.payment_button("FCFA").enabled);
            })
            .run();

        let (mut state, _) = awaiting_state();
        state.phase = Phase::Failed(CheckoutError::Network("offline".to_string()));
        state.alert = Some(Alert::checkout_failed(&CheckoutError::Network("offline".to_string())));

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::DismissAlert)
            .then_state(|state| {
                assert_eq!(state.phase, Phase::Idle);
                assert!(state.attempt.is_none());
                assert!(state.selection.pass_type().is_some());
                assert!(!state.navigated_back);
            })
            .run();
    }

    #[test]
    fn test_gateway_failure_alert() {
        let (state, _) = awaiting_state();

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::WidgetFailed {
                failure: GatewayFailure::new(json!({ "response": { "data": { "message": "Solde insuffisant" } } })),
            })
            .then_state(|state| {
                let alert = state.alert.as_ref().unwrap();
                assert_eq!(alert.title, "Paiement échoué");
                assert_eq!(alert.message, "Solde insuffisant");
            })
            .run();
    }

    #[test]
    fn test_gateway_failure_after_dismissed_error_is_a_new_attempt() {
        let (mut state, previous) = awaiting_state();
        state.phase = Phase::Failed(CheckoutError::Network("offline".to_string()));
        state.alert = Some(Alert::checkout_failed(&CheckoutError::Network("offline".to_string())));

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::DismissAlert)
            .when_action(CheckoutAction::WidgetFailed {
                failure: GatewayFailure::new(json!({ "message": "Carte refusée" })),
            })
            .then_state(move |state| {
                let attempt = state.attempt.unwrap();
                assert_ne!(attempt, previous);
                assert!(matches!(&state.phase, Phase::Failed(CheckoutError::Gateway(m)) if m == "Carte refusée"));
            })
            .run();
    }

    #[test]
    fn test_widget_dismissed_returns_to_idle() {
        let (state, _) = awaiting_state();

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::WidgetDismissed)
            .then_state(|state| {
                assert_eq!(state.phase, Phase::Idle);
                assert!(state.attempt.is_none());
                assert!(state.payment_button("FCFA").enabled);
            })
            .run();
    }

    #[test]
    fn test_success_alert_dismissal_navigates_back() {
        let (mut state, _) = awaiting_state();
        state.phase = Phase::Succeeded;
        state.alert = Some(Alert::payment_succeeded());

        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(state)
            .when_action(CheckoutAction::DismissAlert)
            .then_state(|state| {
                assert!(state.navigated_back);
                assert!(state.alert.is_none());
                assert!(!state.payment_button("FCFA").enabled);
            })
            .run();
    }

    #[test]
    fn test_success_without_selection_fails_validation() {
        ReducerTest::new(CheckoutReducer::new())
            .with_env(environment(MockOrderApi::accepting()))
            .given_state(loaded_state())
            .when_action(success("abc123"))
            .then_state(|state| {
                assert!(matches!(
                    &state.phase,
                    Phase::Failed(CheckoutError::Validation(m)) if m == NOTHING_SELECTED
                ));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}

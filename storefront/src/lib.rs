//! Passline storefront - client core of a mobile ticket shop
//!
//! Buyers browse events, pick a pass type and a quantity, pay through an
//! external payment widget (card or mobile money), and the storefront tells
//! the backend about the successful payment so the order is recorded.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌──────────────┐   ┌─────────┐   ┌────────────────┐
//! │ Catalog  │ → │ Selection │ → │ CheckoutForm │ → │ Payment │ → │ Reconciliation │
//! │  (HTTP)  │   │ (pass, n) │   │ (card/momo)  │   │ widget  │   │ (finalize POST)│
//! └──────────┘   └───────────┘   └──────────────┘   └─────────┘   └────────────────┘
//!        └───────────────── CheckoutReducer + Store ─────────────────────┘
//! ```
//!
//! The [`checkout`] reducer holds every rule; I/O runs as effects executed by
//! a `passline_runtime::Store`. Dependencies (catalog, order API, widget,
//! session, clock) arrive through [`CheckoutEnvironment`].
//!
//! # Attempt lifecycle
//!
//! ```text
//! Idle → AwaitingPayment → Validating → Submitting → Succeeded
//!                  │             │            │
//!                  └─────────────┴────────────┴──→ Failed → (dismiss) → Idle
//! ```
//!
//! Validation failures never reach the network. A late result from an
//! older attempt is ignored.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod checkout_form;
pub mod config;
pub mod display;
pub mod error;
pub mod mocks;
pub mod payment;
pub mod reconciliation;
pub mod selection;
pub mod session;
pub mod types;

pub use api::{ApiClient, BearerToken};
pub use auth::AuthClient;
pub use catalog::{filter_by_tag, find_event, load_event, CatalogApi, HttpCatalog};
pub use checkout::{
    Alert, CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutSettings, CheckoutState,
    Phase,
};
pub use checkout_form::{CheckoutForm, Contact, PaymentMode};
pub use config::Config;
pub use error::{ApiError, CatalogError, CheckoutError};
pub use payment::{BroadcastWidget, PaymentWidget, SandboxWidget};
pub use reconciliation::{HttpOrderApi, OrderApi, OrderRequest};
pub use selection::Selection;
pub use session::Session;
pub use types::*;

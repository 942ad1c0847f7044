//! # Passline Testing
//!
//! Testing utilities for Passline reducers and stores.
//!
//! This crate provides:
//! - `ReducerTest`, a Given-When-Then builder for reducers
//! - Effect assertions and a helper to resolve `Effect::Future` values
//! - A fixed clock for deterministic time
//! - proptest strategies for prices, quantities and identifiers
//!
//! ## Example
//!
//! ```ignore
//! use passline_testing::{ReducerTest, assertions};
//!
//! ReducerTest::new(CheckoutReducer::new())
//!     .with_env(test_environment())
//!     .given_state(CheckoutState::default())
//!     .when_action(CheckoutAction::DecrementQuantity)
//!     .then_state(|s| assert_eq!(s.selection.quantity(), 1))
//!     .then_effects(assertions::assert_no_effects)
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use passline_core::environment::Clock;


pub use reducer_test::{assertions, resolve_future, ReducerTest};

/// Mock implementations of core environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use passline_testing::mocks::FixedClock;
    /// use passline_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// proptest strategies shared by the storefront property tests
pub mod properties {
    use proptest::prelude::*;

    /// Non-negative unit prices, including fractional ones
    pub fn price() -> impl Strategy<Value = f64> {
        prop_oneof![
            (0u32..1_000_000).prop_map(f64::from),
            (0u32..100_000_000).prop_map(|cents| f64::from(cents) / 100.0),
        ]
    }

    /// Quantities a buyer can reach with the stepper
    pub fn quantity() -> impl Strategy<Value = u32> {
        1u32..500
    }

    /// Transaction identifiers as returned by a payment gateway, trimmed or not
    pub fn transaction_id() -> impl Strategy<Value = String> {
        "[ ]{0,2}[A-Za-z0-9_-]{0,12}[ ]{0,2}"
    }
}

pub use mocks::{test_clock, FixedClock};

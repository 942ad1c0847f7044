//! Ticket selection: one pass type and a quantity of at least one.

use crate::types::PassType;
use serde::{Deserialize, Serialize};

/// Selected pass type and quantity
///
/// The total is derived on every read, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pass_type: Option<PassType>,
    quantity: u32,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            pass_type: None,
            quantity: 1,
        }
    }
}

impl Selection {
    /// Nothing selected, quantity 1
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle a pass type
    ///
    /// Selecting the current pass type clears the selection; any other pass
    /// type replaces it. The quantity is kept either way.
    pub fn select(&mut self, pass_type: PassType) {
        if self.pass_type.as_ref().is_some_and(|current| current.id == pass_type.id) {
            self.pass_type = None;
        } else {
            self.pass_type = Some(pass_type);
        }
    }

    /// Add one ticket
    pub const fn increment(&mut self) {
        self.quantity = self.quantity.saturating_add(1);
    }

    /// Remove one ticket; no-op at one
    pub const fn decrement(&mut self) {
        if self.quantity > 1 {
            self.quantity -= 1;
        }
    }

    /// Selected pass type
    #[must_use]
    pub const fn pass_type(&self) -> Option<&PassType> {
        self.pass_type.as_ref()
    }

    /// Number of tickets
    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Unit price times quantity, unrounded; zero with no pass type
    #[must_use]
    pub fn total(&self) -> f64 {
        self.pass_type
            .as_ref()
            .map_or(0.0, |pass| pass.price * f64::from(self.quantity))
    }

    /// Whether a payment can be started for this selection
    #[must_use]
    pub fn is_payable(&self) -> bool {
        self.pass_type.is_some() && self.total() > 0.0
    }
}

/// Round an amount to minor units (×100)
#[must_use]
#[allow(clippy::cast_possible_truncation)] // ticket totals are far below i64::MAX / 100
pub fn to_minor_units(total: f64) -> i64 {
    (total * 100.0).round() as i64
}

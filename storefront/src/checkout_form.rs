//! Checkout form with two payment modes: card and mobile money.
//!
//! Both sub-forms keep their values while the other one is active; only the
//! active one is ever read. Fields are free text: the payment widget does
//! all validation.

use serde::{Deserialize, Serialize};

/// Phone prefix of the mobile money form
pub const DEFAULT_COUNTRY_CODE: &str = "+229";

/// Active payment mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMode {
    /// Bank card
    #[default]
    Card,
    /// Mobile money
    Momo,
}

/// Card sub-form
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardFields {
    /// Card number
    pub number: String,
    /// Expiry (`MM / AA`)
    pub expiry: String,
    /// Security code
    pub cvc: String,
    /// Name on the card
    pub holder_name: String,
    /// Billing country
    pub country: String,
    /// Billing address
    pub address: String,
    /// Billing state or region
    pub state: String,
    /// Billing city
    pub city: String,
    /// Billing postal code
    pub postal_code: String,
}

/// Mobile money sub-form
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MomoFields {
    /// Operator (MTN, Moov...)
    pub operator: String,
    /// Local phone number
    pub phone_number: String,
    /// International prefix
    pub country_code: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Email address
    pub email: String,
}

impl Default for MomoFields {
    fn default() -> Self {
        Self {
            operator: String::new(),
            phone_number: String::new(),
            country_code: DEFAULT_COUNTRY_CODE.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
        }
    }
}

/// Editable card field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CardField {
    /// Card number
    Number,
    /// Expiry
    Expiry,
    /// Security code
    Cvc,
    /// Name on the card
    HolderName,
    /// Billing country
    Country,
    /// Billing address
    Address,
    /// Billing state
    State,
    /// Billing city
    City,
    /// Billing postal code
    PostalCode,
}

/// Editable mobile money field
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomoField {
    /// Operator
    Operator,
    /// Local phone number
    PhoneNumber,
    /// International prefix
    CountryCode,
    /// First name
    FirstName,
    /// Last name
    LastName,
    /// Email address
    Email,
}

/// The sub-form currently in use
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveForm<'a> {
    /// Card mode
    Card(&'a CardFields),
    /// Mobile money mode
    Momo(&'a MomoFields),
}

/// Buyer contact sent to the widget and with the order
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Phone number
    pub phone: String,
    /// Full name
    pub name: String,
    /// Email address
    pub email: String,
}

impl Default for Contact {
    /// Placeholder contact used when the form leaves a value empty
    fn default() -> Self {
        Self {
            phone: "00000000".to_string(),
            name: "Client".to_string(),
            email: "client@example.com".to_string(),
        }
    }
}

/// Both sub-forms plus the active mode
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutForm {
    mode: PaymentMode,
    card: CardFields,
    momo: MomoFields,
}

impl CheckoutForm {
    /// Empty form in card mode
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active mode
    #[must_use]
    pub const fn mode(&self) -> PaymentMode {
        self.mode
    }

    /// Switch mode; values of both sub-forms are kept
    pub const fn set_mode(&mut self, mode: PaymentMode) {
        self.mode = mode;
    }

    /// Card sub-form, whether active or not
    #[must_use]
    pub const fn card(&self) -> &CardFields {
        &self.card
    }

    /// Mobile money sub-form, whether active or not
    #[must_use]
    pub const fn momo(&self) -> &MomoFields {
        &self.momo
    }

    /// Set one card field
    pub fn set_card_field(&mut self, field: CardField, value: String) {
        let card = &mut self.card;
        let slot = match field {
            CardField::Number => &mut card.number,
            CardField::Expiry => &mut card.expiry,
            CardField::Cvc => &mut card.cvc,
            CardField::HolderName => &mut card.holder_name,
            CardField::Country => &mut card.country,
            CardField::Address => &mut card.address,
            CardField::State => &mut card.state,
            CardField::City => &mut card.city,
            CardField::PostalCode => &mut card.postal_code,
        };
        *slot = value;
    }

    /// Set one mobile money field
    pub fn set_momo_field(&mut self, field: MomoField, value: String) {
        let momo = &mut self.momo;
        let slot = match field {
            MomoField::Operator => &mut momo.operator,
            MomoField::PhoneNumber => &mut momo.phone_number,
            MomoField::CountryCode => &mut momo.country_code,
            MomoField::FirstName => &mut momo.first_name,
            MomoField::LastName => &mut momo.last_name,
            MomoField::Email => &mut momo.email,
        };
        *slot = value;
    }

    /// The sub-form downstream code may read
    #[must_use]
    pub const fn active(&self) -> ActiveForm<'_> {
        match self.mode {
            PaymentMode::Card => ActiveForm::Card(&self.card),
            PaymentMode::Momo => ActiveForm::Momo(&self.momo),
        }
    }

    /// Contact taken from the active sub-form, placeholders for blanks
    #[must_use]
    pub fn contact(&self) -> Contact {
        let fallback = Contact::default();
        let or_default = |value: String, default: String| {
            if value.trim().is_empty() { default } else { value.trim().to_string() }
        };

        match self.active() {
            ActiveForm::Card(card) => Contact {
                name: or_default(card.holder_name.clone(), fallback.name),
                ..fallback
            },
            ActiveForm::Momo(momo) => {
                let phone = if momo.phone_number.trim().is_empty() {
                    String::new()
                } else {
                    format!("{}{}", momo.country_code.trim(), momo.phone_number.replace(' ', ""))
                };
                let name = format!("{} {}", momo.first_name.trim(), momo.last_name.trim());

                Contact {
                    phone: or_default(phone, fallback.phone),
                    name: or_default(name, fallback.name),
                    email: or_default(momo.email.clone(), fallback.email),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_switch_preserves_both_forms() {
        let mut form = CheckoutForm::new();
        form.set_card_field(CardField::Number, "4242 4242 4242 4242".to_string());
        form.set_mode(PaymentMode::Momo);
        form.set_momo_field(MomoField::PhoneNumber, "97 00 00 00".to_string());
        form.set_mode(PaymentMode::Card);

        assert_eq!(form.card().number, "4242 4242 4242 4242");
        assert_eq!(form.momo().phone_number, "97 00 00 00");
        assert!(matches!(form.active(), ActiveForm::Card(_)));
    }

    #[test]
    fn test_momo_defaults_to_benin_prefix() {
        assert_eq!(CheckoutForm::new().momo().country_code, "+229");
    }

    #[test]
    fn test_contact_reads_only_active_mode() {
        let mut form = CheckoutForm::new();
        form.set_momo_field(MomoField::Email, "awa@example.com".to_string());

        assert_eq!(form.contact(), Contact::default());

        form.set_mode(PaymentMode::Momo);
        form.set_momo_field(MomoField::PhoneNumber, "97 12 34 56".to_string());
        form.set_momo_field(MomoField::FirstName, "Awa".to_string());

        let contact = form.contact();
        assert_eq!(contact.email, "awa@example.com");
        assert_eq!(contact.phone, "+22997123456");
        assert_eq!(contact.name, "Awa");
    }

    #[test]
    fn test_country_code_prefixes_the_phone() {
        let mut form = CheckoutForm::new();
        form.set_mode(PaymentMode::Momo);
        form.set_momo_field(MomoField::CountryCode, "+225".to_string());
        form.set_momo_field(MomoField::PhoneNumber, "07 08 09 10".to_string());

        assert_eq!(form.momo().country_code, "+225");
        assert_eq!(form.contact().phone, "+22507080910");
    }
}

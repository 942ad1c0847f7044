//! Storefront demo
//!
//! Lists the catalog, then buys one ticket for an event through the checkout
//! Store, with a sandbox payment widget standing in for the gateway SDK.
//!
//! # Usage
//!
//! ```bash
//! # First event of the catalog
//! cargo run --bin passline-demo
//!
//! # A given event
//! cargo run --bin passline-demo -- 42
//! ```
//!
//! Finalizing an order needs a signed-in session: point
//! `PASSLINE_SESSION_FILE` at a session file holding an `auth_token`,
//! otherwise the attempt stops at validation with "Utilisateur non connecté".

use anyhow::{bail, Context};
use passline_core::environment::SystemClock;
use passline_runtime::Store;
use passline_storefront::{
    display, filter_by_tag, ApiClient, CatalogApi, CheckoutAction, CheckoutEnvironment, CheckoutReducer,
    CheckoutSettings, CheckoutState, Config, EventId, HttpCatalog, HttpOrderApi, SandboxWidget,
    Session,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const STEP_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("invalid configuration")?;

    let timeout = config.api.request_timeout();
    let catalog = Arc::new(HttpCatalog::new(ApiClient::new(&config.api.base_url, timeout)?));
    let orders = Arc::new(HttpOrderApi::new(ApiClient::new(
        &config.api.checkout_base_url,
        timeout,
    )?));
    let currency = config.checkout.currency.clone();
    let offset = config.display.utc_offset();

    // ========== Catalog ==========

    println!("\n🎫 Passline storefront demo\n");

    let events = catalog.list_events().await.context("could not list events")?;
    let tags = catalog.list_tags().await.unwrap_or_default();

    println!("{} events, {} tags", events.len(), tags.len());
    for tag in &tags {
        let count = filter_by_tag(&events, &tags, Some(tag.id)).len();
        println!("  [{}] {count}", tag.name);
    }
    for event in &events {
        println!(
            "  #{:<5} {:<40} {:<24} {}",
            event.id,
            event.name,
            display::event_date_label(event.start_date, event.end_date, offset),
            display::price_range_label(&event.price_range, &currency),
        );
    }

    let event_id = match std::env::args().nth(1) {
        Some(raw) => EventId::new(raw.parse().context("event id must be a number")?),
        None => match events.first() {
            Some(event) => event.id,
            None => bail!("the catalog is empty"),
        },
    };

    // ========== Checkout ==========

    let environment = CheckoutEnvironment::new(
        catalog,
        orders,
        Arc::new(SandboxWidget::new()),
        Session::from_path(config.session.file.clone()),
        Arc::new(SystemClock),
        CheckoutSettings::from_config(&config),
    );
    let store = Store::new(CheckoutState::new(), CheckoutReducer::new(), environment);

    println!("\n→ Opening event #{event_id}");
    let loaded = store
        .send_and_wait_for(
            CheckoutAction::Mounted { event_id },
            |a| {
                matches!(
                    a,
                    CheckoutAction::EventLoaded { .. } | CheckoutAction::EventUnavailable { .. }
                )
            },
            STEP_TIMEOUT,
        )
        .await?;

    if let CheckoutAction::EventLoaded { pass_types, .. } = loaded {
        for pass_type in &pass_types {
            println!(
                "  [{}] {:<20} {}",
                pass_type.id,
                pass_type.name,
                display::format_price(pass_type.price, &currency)
            );
        }

        match pass_types.iter().find(|p| p.price > 0.0) {
            Some(pass_type) => {
                store
                    .send(CheckoutAction::SelectPassType {
                        pass_type_id: pass_type.id,
                    })
                    .await?;
                let button = store.state(|s| s.payment_button(&currency)).await;
                println!("\n→ {}", button.label);

                store
                    .send_and_wait_for(
                        CheckoutAction::Pay,
                        |a| {
                            matches!(
                                a,
                                CheckoutAction::OrderFinalized { .. }
                                    | CheckoutAction::AttemptFailed { .. }
                                    | CheckoutAction::WidgetFailed { .. }
                            )
                        },
                        STEP_TIMEOUT,
                    )
                    .await?;
            },
            None => println!("  Aucun billet disponible pour le moment"),
        }
    }

    if let Some(alert) = store.state(|s| s.alert.clone()).await {
        println!("\n[{}] {}", alert.title, alert.message);
    }

    store.unmount();
    store.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

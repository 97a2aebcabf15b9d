//! # Seed
//!
//! Runs one order-to-cash flow against the configured store and logs the
//! resulting documents as JSON.
//!
//! ```text
//! cargo run -p sales-service --bin seed [-- path/to/sales.toml]
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;

use sales_core::projection::{DeliveryNoteView, InvoiceView, OfferView, OrderView};
use sales_core::{Address, Money, NewLineItem, NewOffer, Percent, SalesDocument};
use sales_service::dto::{
    ConfirmReceipt, ConvertDeliveryToInvoice, ConvertOfferToOrder, ConvertOrderToDelivery,
    RecordPayment, ShipDelivery, StatusAction,
};
use sales_service::telemetry::init_tracing;
use sales_service::{SalesConfig, SalesRepositories, SalesServices};

const ACTOR: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = SalesConfig::load_or_default(std::env::args().nth(1).map(PathBuf::from));
    info!(backend = %config.storage.backend, "Configuration loaded");

    let repos = SalesRepositories::from_config(&config).await?;
    let services = SalesServices::new(repos, Arc::new(config));
    let today = Utc::now().date_naive();

    let address = Address {
        name: "Acme GmbH".to_string(),
        street: "Hauptstr. 1".to_string(),
        postal_code: "10115".to_string(),
        city: "Berlin".to_string(),
        country: "DE".to_string(),
    };

    // Offer
    let offer = services
        .offers
        .create(
            NewOffer {
                customer_id: "cust-acme".to_string(),
                subject: "Office refit".to_string(),
                description: Some("Chairs and desks for the second floor".to_string()),
                offer_date: None,
                valid_until: None,
                billing_address: Some(address.clone()),
                delivery_address: Some(address),
                items: vec![
                    NewLineItem::new("Office chair", Decimal::from(100), Money::from_major(10))
                        .with_tax_rate(Percent::from_whole(19)),
                    NewLineItem::new("Desk", Decimal::from(10), Money::from_major(250))
                        .with_tax_rate(Percent::from_whole(19))
                        .with_discount(Percent::from_whole(5)),
                ],
            },
            ACTOR,
        )
        .await?;
    services.offers.send(offer.id(), StatusAction::by(ACTOR)).await?;
    let offer = services
        .offers
        .accept(offer.id(), StatusAction::by(ACTOR))
        .await?;
    info!(view = %serde_json::to_string(&OfferView::at(&offer, today))?, "Offer");

    // Order
    let order = services
        .conversion
        .offer_to_order(ConvertOfferToOrder {
            offer_id: offer.id().to_string(),
            actor: ACTOR.to_string(),
            ..Default::default()
        })
        .await?;
    services.orders.confirm(order.id(), StatusAction::by(ACTOR)).await?;

    // Half of the chairs first
    let chairs = order.items.items()[0].id.clone();
    let note = services
        .conversion
        .order_to_delivery(ConvertOrderToDelivery {
            order_id: order.id().to_string(),
            actor: ACTOR.to_string(),
            partial_quantities: Some(HashMap::from([(chairs, Decimal::from(50))])),
            ..Default::default()
        })
        .await?;

    services.deliveries.mark_ready(note.id(), StatusAction::by(ACTOR)).await?;
    services
        .deliveries
        .ship(
            note.id(),
            ShipDelivery {
                actor: ACTOR.to_string(),
                expected_version: None,
                carrier: Some("DHL".to_string()),
                tracking_number: Some("JD0001".to_string()),
            },
        )
        .await?;
    services
        .deliveries
        .mark_delivered(note.id(), StatusAction::by(ACTOR))
        .await?;
    let note = services
        .deliveries
        .confirm(
            note.id(),
            ConfirmReceipt {
                actor: ACTOR.to_string(),
                expected_version: None,
                received_by: Some("Reception".to_string()),
            },
        )
        .await?;

    // Invoice and pay it
    let invoice = services
        .conversion
        .delivery_to_invoice(ConvertDeliveryToInvoice {
            delivery_note_id: note.id().to_string(),
            actor: ACTOR.to_string(),
            ..Default::default()
        })
        .await?;
    services.invoices.issue(invoice.id(), StatusAction::by(ACTOR)).await?;
    services.invoices.send(invoice.id(), StatusAction::by(ACTOR)).await?;
    let invoice = services
        .invoices
        .record_payment(
            invoice.id(),
            RecordPayment {
                actor: ACTOR.to_string(),
                expected_version: None,
                amount: invoice.totals.total_amount,
                reference: Some("SEPA-0001".to_string()),
            },
        )
        .await?;

    let note = services.deliveries.get(note.id()).await?;
    let order = services.orders.get(order.id()).await?;

    info!(view = %serde_json::to_string(&DeliveryNoteView::from(&note))?, "Delivery note");
    info!(view = %serde_json::to_string(&InvoiceView::at(&invoice, today))?, "Invoice");
    info!(view = %serde_json::to_string(&OrderView::from(&order))?, "Order");

    info!(
        offer = %offer.number(),
        order = %order.number(),
        order_status = %order.status_str(),
        delivery_note = %note.number(),
        invoice = %invoice.number(),
        invoice_status = %invoice.status_str(),
        "Seed flow finished"
    );
    Ok(())
}

//! # sales-service: Order-to-Cash Services
//!
//! Wires the pure documents of `sales-core` to the repositories of
//! `sales-db` and exposes one service per business concern.
//!
//! ## Service Graph
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           SalesServices                                 │
//! │                                                                         │
//! │   OfferService   OrderService ◄──── OrderProgressSource ───┐            │
//! │        │              │                                    │            │
//! │        │              │          DeliveryService ──────────┘            │
//! │        │              │               ▲                                 │
//! │        │              │               └── DeliveryLookup ◄── Workflow   │
//! │        ▼              ▼                                                 │
//! │   ConversionService ─── builds targets through Order/Delivery/Invoice   │
//! │                         services, commits target + progress together    │
//! │                                                                         │
//! │   InvoiceService                                                        │
//! │                                                                         │
//! │   All services share one SalesRepositories (memory or SQLite).          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - TOML + environment configuration
//! - [`services`] - Per-document services
//! - [`conversion`] - Offer → Order → Delivery → Invoice
//! - [`workflow`] - Guarded cancellation, overdue sweep
//! - [`dto`] - Operation inputs
//! - [`error`] - Service errors and error codes
//! - [`telemetry`] - Tracing setup

pub mod config;
pub mod conversion;
pub mod dto;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workflow;

use std::sync::Arc;

use tracing::info;

use sales_core::{DeliveryNote, SalesInvoice, SalesOffer, SalesOrder};
use sales_db::{Database, DbConfig, DbError, InMemoryRepository, UnitOfWork};

pub use config::{ConfigError, SalesConfig, StorageBackend};
pub use conversion::ConversionService;
pub use error::{ErrorBody, ErrorCode, ServiceError, ServiceResult};
pub use services::{
    DeliveryLookup, DeliveryService, InvoiceService, OfferService, OrderProgressSource,
    OrderService, Repo,
};
pub use workflow::WorkflowService;

// =============================================================================
// Repositories
// =============================================================================

/// One repository per document type, shared by every service.
///
/// `unit_of_work` is set when the store can commit several writes
/// atomically. Conversions use it when present and fall back to
/// compensating writes otherwise.
#[derive(Clone)]
pub struct SalesRepositories {
    pub offers: Repo<SalesOffer>,
    pub orders: Repo<SalesOrder>,
    pub deliveries: Repo<DeliveryNote>,
    pub invoices: Repo<SalesInvoice>,
    pub unit_of_work: Option<Arc<dyn UnitOfWork>>,
}

impl SalesRepositories {
    pub fn in_memory() -> Self {
        SalesRepositories {
            offers: Arc::new(InMemoryRepository::<SalesOffer>::new()),
            orders: Arc::new(InMemoryRepository::<SalesOrder>::new()),
            deliveries: Arc::new(InMemoryRepository::<DeliveryNote>::new()),
            invoices: Arc::new(InMemoryRepository::<SalesInvoice>::new()),
            unit_of_work: None,
        }
    }

    pub fn sqlite(db: &Database) -> Self {
        SalesRepositories {
            offers: Arc::new(db.offers()),
            orders: Arc::new(db.orders()),
            deliveries: Arc::new(db.deliveries()),
            invoices: Arc::new(db.invoices()),
            unit_of_work: Some(Arc::new(db.unit_of_work())),
        }
    }

    /// Opens the store selected by `[storage]`.
    pub async fn from_config(config: &SalesConfig) -> ServiceResult<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory document store");
                Ok(Self::in_memory())
            }
            StorageBackend::Sqlite => {
                let path = config.database_path();
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DbError::ConnectionFailed(format!(
                            "Cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
                let db = Database::new(DbConfig::new(path)).await?;
                Ok(Self::sqlite(&db))
            }
        }
    }
}

// =============================================================================
// Services
// =============================================================================

/// Every service, wired once at startup.
pub struct SalesServices {
    pub offers: OfferService,
    pub orders: Arc<OrderService>,
    pub deliveries: Arc<DeliveryService>,
    pub invoices: InvoiceService,
    pub conversion: ConversionService,
    pub workflow: WorkflowService,
}

impl SalesServices {
    pub fn new(repos: SalesRepositories, config: Arc<SalesConfig>) -> Self {
        let offers = OfferService::new(repos.offers.clone(), config.clone());
        let orders = Arc::new(OrderService::new(repos.orders.clone(), config.clone()));
        let deliveries = Arc::new(DeliveryService::new(
            repos.deliveries.clone(),
            orders.clone(),
            config.clone(),
        ));
        let invoices = InvoiceService::new(repos.invoices.clone(), config);

        let conversion = ConversionService::new(
            &repos,
            (*orders).clone(),
            (*deliveries).clone(),
            invoices.clone(),
        );
        let workflow = WorkflowService::new(&repos, deliveries.clone());

        SalesServices {
            offers,
            orders,
            deliveries,
            invoices,
            conversion,
            workflow,
        }
    }
}

//! Client-side review of AI-extracted invoices. A session uploads one
//! scanned document to the extraction service, then lets the caller edit or
//! delete the resulting line items while the header and customer aggregates
//! are kept in step with the product list.

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod render;
pub mod session;
pub mod store;

pub use config::Config;
pub use error::{InvoiceError, Result};
pub use extract::{ExtractionClient, Extractor};
pub use model::{
    CustomerRecord, ExtractionResult, InvoiceHeader, LineItem, Product, Snapshot, Totals,
};
pub use session::{Session, UploadEvent};
pub use store::InvoiceStore;

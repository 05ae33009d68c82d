// src/model.rs

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Invoice header fields as the extraction service reports them.
///
/// `quantity`, `total_tax` and `total_amount` are derived: whenever the line
/// items change they are rewritten from the product sums.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceHeader {
    pub serial_number: String,
    pub customer_name: String,
    pub quantity: f64,
    pub total_tax: f64,
    pub total_amount: f64,
    pub date: String,
}

/// A single product row on the invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub tax: f64,
    pub price_with_tax: f64,
    pub discount: f64,
}

/// Customer details attached to the invoice. `total_purchase_amount` tracks
/// the header's `total_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerRecord {
    pub customer_name: String,
    pub phone_number: String,
    pub total_purchase_amount: f64,
}

/// The document shape the extraction service returns. All three top-level
/// fields are required; unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExtractionResult {
    pub invoice: InvoiceHeader,
    pub products: Vec<Product>,
    pub customer: CustomerRecord,
}

/// A product plus the identity it receives when a document is installed.
///
/// `id` never changes for the life of the item. `order` is the display
/// position; deleting an item renumbers the survivors gap-free without
/// reordering them.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub id: Uuid,
    pub order: usize,
    pub product: Product,
}

/// Everything the views read: header, ordered line items, customer record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub invoice: Option<InvoiceHeader>,
    pub items: Vec<LineItem>,
    pub customer: Option<CustomerRecord>,
}

impl Snapshot {
    /// Line item carrying `id`, if it is still present.
    pub fn item(&self, id: Uuid) -> Option<&LineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Line item at display position `order`.
    pub fn item_at(&self, order: usize) -> Option<&LineItem> {
        self.items.iter().find(|item| item.order == order)
    }

    /// True before any extraction result has been installed.
    pub fn is_empty(&self) -> bool {
        self.invoice.is_none() && self.items.is_empty() && self.customer.is_none()
    }
}

/// Sums over the whole product sequence. Always recomputed from the full
/// sequence, never adjusted in place.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Totals {
    pub quantity: f64,
    pub tax: f64,
    pub amount: f64,
}

impl Totals {
    pub fn of(items: &[LineItem]) -> Self {
        items.iter().fold(Self::default(), |acc, item| Self {
            quantity: acc.quantity + item.product.quantity,
            tax: acc.tax + item.product.tax,
            amount: acc.amount + item.product.price_with_tax,
        })
    }
}

use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::error::{InvoiceError, Result};
use crate::model::{ExtractionResult, LineItem, Product, Snapshot, Totals};

/// State container for one review session.
///
/// Every successful change publishes a fresh snapshot to subscribers, so
/// views hold a watch receiver instead of reaching into shared globals.
pub struct InvoiceStore {
    snapshot: Snapshot,
    publisher: watch::Sender<Snapshot>,
}

impl InvoiceStore {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(Snapshot::default());
        Self {
            snapshot: Snapshot::default(),
            publisher,
        }
    }

    /// Current state, cloned for the caller.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.clone()
    }

    /// Subscribe to state changes. The receiver always holds the latest value.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.publisher.subscribe()
    }

    /// Install a freshly extracted document, replacing the whole snapshot.
    ///
    /// Line items receive their identity here: a fresh id plus their position
    /// in the document as display order. The header and customer aggregates
    /// are then re-derived from the product list, so a header that arrived
    /// out of step with its own products is corrected on the way in.
    pub fn install(&mut self, result: ExtractionResult) -> Snapshot {
        let items = result
            .products
            .into_iter()
            .enumerate()
            .map(|(order, product)| LineItem {
                id: Uuid::new_v4(),
                order,
                product,
            })
            .collect();
        self.snapshot = Snapshot {
            invoice: Some(result.invoice),
            items,
            customer: Some(result.customer),
        };
        self.sync_aggregates();
        info!(
            items = self.snapshot.items.len(),
            "Extraction result installed"
        );
        self.publish()
    }

    /// Replace one line item's product and re-derive the aggregates. The
    /// item keeps its id and display order.
    pub fn update_item(&mut self, id: Uuid, product: Product) -> Result<Snapshot> {
        let item = self
            .snapshot
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or(InvoiceError::UnknownItem(id))?;
        item.product = product;
        self.sync_aggregates();
        info!(id = %id, "Line item updated");
        Ok(self.publish())
    }

    /// Remove one line item, close the gap in display order and re-derive
    /// the aggregates. Deleting the last item leaves them all at zero.
    pub fn delete_item(&mut self, id: Uuid) -> Result<Snapshot> {
        let pos = self
            .snapshot
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or(InvoiceError::UnknownItem(id))?;
        self.snapshot.items.remove(pos);
        for (order, item) in self.snapshot.items.iter_mut().enumerate() {
            item.order = order;
        }
        self.sync_aggregates();
        info!(id = %id, remaining = self.snapshot.items.len(), "Line item deleted");
        Ok(self.publish())
    }

    /// Re-sum the whole product sequence and write the results into the
    /// header and the customer record. Never an incremental adjustment.
    fn sync_aggregates(&mut self) {
        let totals = Totals::of(&self.snapshot.items);
        if let Some(invoice) = self.snapshot.invoice.as_mut() {
            invoice.quantity = totals.quantity;
            invoice.total_tax = totals.tax;
            invoice.total_amount = totals.amount;
        }
        if let Some(customer) = self.snapshot.customer.as_mut() {
            customer.total_purchase_amount = totals.amount;
        }
    }

    fn publish(&self) -> Snapshot {
        let snapshot = self.snapshot.clone();
        self.publisher.send_replace(snapshot.clone());
        snapshot
    }
}

impl Default for InvoiceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CustomerRecord, InvoiceHeader};

    fn pen() -> Product {
        Product {
            name: "Pen".to_string(),
            quantity: 2.0,
            unit_price: 1.5,
            tax: 0.3,
            price_with_tax: 3.3,
            discount: 0.0,
        }
    }

    fn book() -> Product {
        Product {
            name: "Book".to_string(),
            quantity: 1.0,
            unit_price: 10.0,
            tax: 1.0,
            price_with_tax: 11.0,
            discount: 0.0,
        }
    }

    fn lamp() -> Product {
        Product {
            name: "Lamp".to_string(),
            quantity: 4.0,
            unit_price: 25.0,
            tax: 2.5,
            price_with_tax: 102.5,
            discount: 5.0,
        }
    }

    fn sample_result() -> ExtractionResult {
        ExtractionResult {
            invoice: InvoiceHeader {
                serial_number: "1".to_string(),
                customer_name: "Alice".to_string(),
                quantity: 0.0,
                total_tax: 0.0,
                total_amount: 0.0,
                date: "2024-01-01".to_string(),
            },
            products: vec![pen(), book()],
            customer: CustomerRecord {
                customer_name: "Alice".to_string(),
                phone_number: "555".to_string(),
                total_purchase_amount: 14.3,
            },
        }
    }

    fn other_result() -> ExtractionResult {
        ExtractionResult {
            invoice: InvoiceHeader {
                serial_number: "2".to_string(),
                customer_name: "Bob".to_string(),
                quantity: 4.0,
                total_tax: 2.5,
                total_amount: 102.5,
                date: "2024-02-02".to_string(),
            },
            products: vec![lamp()],
            customer: CustomerRecord {
                customer_name: "Bob".to_string(),
                phone_number: "777".to_string(),
                total_purchase_amount: 102.5,
            },
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_aggregates(snapshot: &Snapshot, quantity: f64, tax: f64, amount: f64) {
        let invoice = snapshot.invoice.as_ref().unwrap();
        let customer = snapshot.customer.as_ref().unwrap();
        assert_close(invoice.quantity, quantity);
        assert_close(invoice.total_tax, tax);
        assert_close(invoice.total_amount, amount);
        assert_close(customer.total_purchase_amount, amount);
    }

    fn assert_consistent(snapshot: &Snapshot) {
        let totals = Totals::of(&snapshot.items);
        assert_aggregates(snapshot, totals.quantity, totals.tax, totals.amount);
        for (i, item) in snapshot.items.iter().enumerate() {
            assert_eq!(item.order, i); // display order stays gap-free
        }
    }

    #[test]
    fn test_install_derives_header_from_products() {
        let mut store = InvoiceStore::new();
        // The sample header carries zeroed aggregates; install corrects them.
        let snapshot = store.install(sample_result());
        assert_aggregates(&snapshot, 3.0, 1.3, 14.3);
        let invoice = snapshot.invoice.as_ref().unwrap();
        assert_eq!(invoice.serial_number, "1");
        assert_eq!(invoice.customer_name, "Alice");
        assert_eq!(invoice.date, "2024-01-01");
        let customer = snapshot.customer.as_ref().unwrap();
        assert_eq!(customer.phone_number, "555");
    }

    #[test]
    fn test_install_assigns_identity_in_document_order() {
        let mut store = InvoiceStore::new();
        let snapshot = store.install(sample_result());
        assert_eq!(snapshot.items.len(), 2);
        assert_eq!(snapshot.items[0].order, 0);
        assert_eq!(snapshot.items[1].order, 1);
        assert_eq!(snapshot.items[0].product.name, "Pen");
        assert_eq!(snapshot.items[1].product.name, "Book");
        assert_ne!(snapshot.items[0].id, snapshot.items[1].id);
    }

    #[test]
    fn test_install_replaces_previous_document() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let snapshot = store.install(other_result());
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].product.name, "Lamp");
        assert_eq!(snapshot.invoice.as_ref().unwrap().serial_number, "2");
        assert_eq!(snapshot.customer.as_ref().unwrap().customer_name, "Bob");
        assert_aggregates(&snapshot, 4.0, 2.5, 102.5);
    }

    #[test]
    fn test_update_rederives_aggregates() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let id = store.snapshot().item_at(0).unwrap().id;
        let snapshot = store
            .update_item(
                id,
                Product {
                    name: "Pen".to_string(),
                    quantity: 5.0,
                    unit_price: 1.5,
                    tax: 0.75,
                    price_with_tax: 8.25,
                    discount: 0.0,
                },
            )
            .unwrap();
        assert_aggregates(&snapshot, 6.0, 1.75, 19.25);
    }

    #[test]
    fn test_update_keeps_identity_and_neighbors() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let before = store.snapshot();
        let pen_id = before.items[0].id;
        let snapshot = store.update_item(pen_id, lamp()).unwrap();
        assert_eq!(snapshot.items[0].id, pen_id);
        assert_eq!(snapshot.items[0].order, 0);
        assert_eq!(snapshot.items[1], before.items[1]); // neighbor untouched
    }

    #[test]
    fn test_update_with_current_values_is_idempotent() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let id = store.snapshot().item_at(0).unwrap().id;
        let snapshot = store.update_item(id, pen()).unwrap();
        assert_aggregates(&snapshot, 3.0, 1.3, 14.3);
    }

    #[test]
    fn test_delete_rederives_aggregates() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let pen_id = store.snapshot().item_at(0).unwrap().id;
        store
            .update_item(
                pen_id,
                Product {
                    name: "Pen".to_string(),
                    quantity: 5.0,
                    unit_price: 1.5,
                    tax: 0.75,
                    price_with_tax: 8.25,
                    discount: 0.0,
                },
            )
            .unwrap();
        let book_id = store.snapshot().item_at(1).unwrap().id;
        let snapshot = store.delete_item(book_id).unwrap();
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].product.name, "Pen");
        assert_eq!(snapshot.items[0].order, 0);
        assert_aggregates(&snapshot, 5.0, 0.75, 8.25);
    }

    #[test]
    fn test_delete_shifts_later_items_down() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let pen_id = store.snapshot().item_at(0).unwrap().id;
        let book_id = store.snapshot().item_at(1).unwrap().id;
        let snapshot = store.delete_item(pen_id).unwrap();
        assert_eq!(snapshot.items[0].id, book_id); // identity survives the shift
        assert_eq!(snapshot.items[0].order, 0);
        assert_eq!(snapshot.items[0].product.name, "Book");
    }

    #[test]
    fn test_delete_last_item_zeroes_aggregates() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let ids: Vec<Uuid> = store.snapshot().items.iter().map(|item| item.id).collect();
        for id in ids {
            store.delete_item(id).unwrap();
        }
        let snapshot = store.snapshot();
        assert!(snapshot.items.is_empty());
        assert_aggregates(&snapshot, 0.0, 0.0, 0.0);
        // Header identity fields survive as the valid terminal state.
        assert_eq!(snapshot.invoice.as_ref().unwrap().serial_number, "1");
    }

    #[test]
    fn test_unknown_id_rejected_without_changes() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let before = store.snapshot();
        let ghost = Uuid::new_v4();

        let err = store.update_item(ghost, lamp()).unwrap_err();
        assert!(matches!(err, InvoiceError::UnknownItem(id) if id == ghost));
        let err = store.delete_item(ghost).unwrap_err();
        assert!(matches!(err, InvoiceError::UnknownItem(id) if id == ghost));

        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_stale_id_rejected_after_delete() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let pen_id = store.snapshot().item_at(0).unwrap().id;
        store.delete_item(pen_id).unwrap();
        let err = store.update_item(pen_id, pen()).unwrap_err();
        assert!(matches!(err, InvoiceError::UnknownItem(_)));
    }

    #[test]
    fn test_aggregates_hold_across_command_sequence() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        assert_consistent(&store.snapshot());

        let id0 = store.snapshot().item_at(0).unwrap().id;
        assert_consistent(&store.update_item(id0, lamp()).unwrap());

        let id1 = store.snapshot().item_at(1).unwrap().id;
        assert_consistent(&store.delete_item(id1).unwrap());

        assert_consistent(&store.update_item(id0, book()).unwrap());

        assert_consistent(&store.delete_item(id0).unwrap());
    }

    #[test]
    fn test_watch_sees_every_published_change() {
        let mut store = InvoiceStore::new();
        let mut rx = store.watch();
        assert!(rx.borrow().is_empty());

        store.install(sample_result());
        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.items.len(), 2);

        store.delete_item(seen.items[0].id).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().items.len(), 1);
    }

    #[test]
    fn test_rejected_command_publishes_nothing() {
        let mut store = InvoiceStore::new();
        store.install(sample_result());
        let rx = store.watch();
        let _ = store.update_item(Uuid::new_v4(), pen());
        assert!(!rx.has_changed().unwrap());
    }
}

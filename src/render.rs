use crate::model::Snapshot;

/// Money fields are shown with two decimals; quantities stay as extracted.
pub fn money(value: f64) -> String {
    format!("{value:.2}")
}

/// Render rows as a fixed-width text table. The first row is the header.
fn table(rows: &[Vec<String>]) -> String {
    let columns = rows.first().map(|row| row.len()).unwrap_or(0);
    let mut widths = vec![0usize; columns];
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut out = String::new();
    for (r, row) in rows.iter().enumerate() {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
            .collect();
        out.push_str(cells.join("  ").trim_end());
        out.push('\n');
        if r == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }
    out
}

/// The invoice header view.
pub fn invoice_view(snapshot: &Snapshot) -> String {
    let mut out = String::from("Invoice Details\n\n");
    let Some(invoice) = snapshot.invoice.as_ref() else {
        out.push_str("No invoices uploaded yet! Submit a file to get started.\n");
        return out;
    };
    let rows = vec![
        [
            "Serial Number",
            "Customer Name",
            "Quantity",
            "Total Tax",
            "Total Amount",
            "Date",
        ]
        .map(String::from)
        .to_vec(),
        vec![
            invoice.serial_number.clone(),
            invoice.customer_name.clone(),
            invoice.quantity.to_string(),
            money(invoice.total_tax),
            money(invoice.total_amount),
            invoice.date.clone(),
        ],
    ];
    out.push_str(&table(&rows));
    out
}

/// The products view. Rows are numbered by display order, starting at 1.
pub fn products_view(snapshot: &Snapshot) -> String {
    let mut rows = vec![
        [
            "#",
            "Name",
            "Quantity",
            "Unit Price",
            "Tax",
            "Price With Tax",
            "Discount",
        ]
        .map(String::from)
        .to_vec(),
    ];
    for item in &snapshot.items {
        let product = &item.product;
        rows.push(vec![
            (item.order + 1).to_string(),
            product.name.clone(),
            product.quantity.to_string(),
            money(product.unit_price),
            money(product.tax),
            money(product.price_with_tax),
            money(product.discount),
        ]);
    }
    format!("Products\n\n{}", table(&rows))
}

/// The customer view.
pub fn customer_view(snapshot: &Snapshot) -> String {
    let mut out = String::from("Customer Details\n\n");
    let Some(customer) = snapshot.customer.as_ref() else {
        out.push_str(
            "No customer data available. Please upload an invoice file to see the details.\n",
        );
        return out;
    };
    let rows = vec![
        ["Customer Name", "Phone Number", "Total Purchase Amount"]
            .map(String::from)
            .to_vec(),
        vec![
            customer.customer_name.clone(),
            customer.phone_number.clone(),
            money(customer.total_purchase_amount),
        ],
    ];
    out.push_str(&table(&rows));
    out
}

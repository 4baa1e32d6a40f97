use rowkit::TableEntity;

#[derive(TableEntity)]
pub struct Invoice {
    key: String,
    #[entity(rename = "total")]
    amount: f64,
    total: f64,
}

fn main() {
    let invoice = Invoice {
        key: "invoices/1".into(),
        amount: 1.0,
        total: 1.0,
    };
    let _ = (invoice.key, invoice.amount, invoice.total);
}

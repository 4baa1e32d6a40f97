use rowkit::TableEntity;

#[derive(TableEntity)]
pub struct Order {
    key: String,
    #[entity(rename = "RowKey")]
    row: String,
}

fn main() {
    let order = Order {
        key: "orders/1".into(),
        row: "1".into(),
    };
    let _ = (order.key, order.row);
}

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rowkit::TableEntity;

#[derive(Debug, Default, TableEntity)]
pub struct Order {
    #[entity(key)]
    id: String,
    #[entity(rename = "Total")]
    total: f64,
    lines: Vec<String>,
    #[entity(json)]
    reference: String,
    metadata: Option<HashMap<String, i64>>,
    #[entity(skip)]
    scratch: Vec<u32>,
    #[entity(etag)]
    version: Option<String>,
    #[entity(timestamp)]
    updated: Option<DateTime<Utc>>,
}

fn main() {
    let names = Order::descriptor().columns();
    assert_eq!(names, vec!["Total", "lines", "reference", "metadata"]);
}

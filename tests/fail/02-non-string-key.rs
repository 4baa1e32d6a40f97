use rowkit::TableEntity;

#[derive(TableEntity)]
pub struct Counter {
    key: u64,
    hits: i64,
}

fn main() {
    let counter = Counter { key: 1, hits: 0 };
    let _ = (counter.key, counter.hits);
}

use rowkit::TableEntity;

#[derive(TableEntity)]
pub struct Reading {
    id: String,
    value: f64,
}

fn main() {
    let reading = Reading {
        id: "sensors/1".into(),
        value: 0.5,
    };
    let _ = (reading.id, reading.value);
}

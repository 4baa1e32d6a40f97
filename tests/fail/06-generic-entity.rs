use rowkit::TableEntity;

#[derive(TableEntity)]
pub struct Wrapper<T> {
    key: String,
    inner: T,
}

fn main() {
    let wrapper = Wrapper {
        key: "wrappers/1".into(),
        inner: 1u8,
    };
    let _ = (wrapper.key, wrapper.inner);
}

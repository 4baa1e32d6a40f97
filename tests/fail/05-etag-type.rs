use rowkit::TableEntity;

#[derive(TableEntity)]
pub struct Profile {
    key: String,
    etag: String,
}

fn main() {
    let profile = Profile {
        key: "profiles/1".into(),
        etag: String::new(),
    };
    let _ = (profile.key, profile.etag);
}

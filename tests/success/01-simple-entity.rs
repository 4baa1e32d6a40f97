use rowkit::TableEntity;

#[derive(Debug, Default, TableEntity)]
pub struct User {
    key: String,
    email: Option<String>,
    age: i32,
}

fn main() {
    let user = User {
        key: "users/cat".into(),
        ..Default::default()
    };
    let row = rowkit::to_row(&user).unwrap();
    assert_eq!(row.row_key, "cat");
    let _ = (user.email, user.age);
}

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use rowkit::TableEntity;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, PartialEq, TableEntity)]
pub struct Sensor {
    key: String,
    name: String,
    reading: f64,
    samples: i64,
    channel: i32,
    enabled: bool,
    serial: Uuid,
    installed: DateTime<Utc>,
    calibrated: Option<DateTime<FixedOffset>>,
    firmware: Vec<u8>,
    note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    site: String,
    floor: u8,
}

#[derive(Debug, Default, PartialEq, TableEntity)]
pub struct Asset {
    #[entity(key)]
    id: String,
    #[entity(rename = "Name")]
    name: String,
    tags: Vec<String>,
    labels: BTreeMap<String, String>,
    location: Option<Location>,
    #[entity(json)]
    owner: String,
    #[entity(skip)]
    cached: u32,
    etag: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone, Utc};
    use rowkit::{from_row, to_row, CompositeKey, EntityError, Row, TableEntity, Value, ValueKind};
    use uuid::Uuid;

    use crate::{Asset, Location, Sensor};

    fn sensor() -> Sensor {
        Sensor {
            key: "plant-1/boiler".into(),
            name: "boiler".into(),
            reading: 71.25,
            samples: 1 << 40,
            channel: 3,
            enabled: true,
            serial: Uuid::from_u128(0x1234_5678),
            installed: Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap(),
            calibrated: Some(
                FixedOffset::east_opt(2 * 3600)
                    .unwrap()
                    .with_ymd_and_hms(2024, 6, 1, 9, 0, 0)
                    .unwrap(),
            ),
            firmware: vec![1, 2, 3],
            note: None,
        }
    }

    #[test]
    fn scalar_fields_round_trip() {
        let original = sensor();
        let row = to_row(&original).unwrap();

        assert_eq!(row.partition_key, "plant-1");
        assert_eq!(row.row_key, "boiler");
        assert!(row.get("key").is_none());
        assert!(row.get("note").is_none(), "absent optionals are omitted");
        assert_eq!(row.get("samples"), Some(&Value::Int64(1 << 40)));
        assert_eq!(row.get("enabled"), Some(&Value::Bool(true)));

        assert_eq!(from_row::<Sensor>(row).unwrap(), original);
    }

    #[test]
    fn descriptor_lists_native_kinds() {
        let descriptor = Sensor::descriptor();
        assert_eq!(descriptor.type_name(), "Sensor");
        let kinds = descriptor
            .fields()
            .iter()
            .map(|field| (field.name(), field.kind()))
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ("name", ValueKind::String),
                ("reading", ValueKind::Double),
                ("samples", ValueKind::Int64),
                ("channel", ValueKind::Int32),
                ("enabled", ValueKind::Bool),
                ("serial", ValueKind::Guid),
                ("installed", ValueKind::DateTime),
                ("calibrated", ValueKind::DateTimeOffset),
                ("firmware", ValueKind::Binary),
                ("note", ValueKind::String),
            ]
        );
        assert!(std::ptr::eq(descriptor, Sensor::descriptor()));
    }

    #[test]
    fn complex_fields_fall_back_to_json() {
        let asset = Asset {
            id: "site-a/pump-2".into(),
            name: "pump".into(),
            tags: vec!["hot".into(), "critical".into()],
            labels: [("team".to_string(), "ops".to_string())].into(),
            location: Some(Location {
                site: "a".into(),
                floor: 2,
            }),
            owner: "ops".into(),
            cached: 99,
            etag: Some("etag-1".into()),
            timestamp: None,
        };
        let row = to_row(&asset).unwrap();

        assert_eq!(
            row.get("tags"),
            Some(&Value::String(r#"["hot","critical"]"#.into()))
        );
        assert_eq!(row.get("owner"), Some(&Value::String(r#""ops""#.into())));
        assert_eq!(row.get("Name"), Some(&Value::String("pump".into())));
        assert!(row.get("cached").is_none());
        assert_eq!(row.etag.as_deref(), Some("etag-1"));

        let decoded = from_row::<Asset>(row).unwrap();
        assert_eq!(decoded.cached, 0);
        assert_eq!(
            decoded,
            Asset {
                cached: 0,
                ..asset
            }
        );
    }

    #[test]
    fn unknown_properties_are_ignored() {
        let mut row = Row::new(CompositeKey::parse("site-a/pump-2").unwrap());
        row.insert("Name", "pump");
        row.insert("retired_column", 7);
        let asset = from_row::<Asset>(row).unwrap();
        assert_eq!(asset.id, "site-a/pump-2");
        assert_eq!(asset.name, "pump");
        assert!(asset.tags.is_empty());
    }

    #[test]
    fn metadata_is_populated_from_the_row() {
        let stamp = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut row = Row::new(CompositeKey::parse("site-a/pump-2").unwrap());
        row.etag = Some("W/\"1\"".into());
        row.timestamp = Some(stamp);
        let asset = from_row::<Asset>(row).unwrap();
        assert_eq!(asset.etag(), Some("W/\"1\""));
        assert_eq!(asset.timestamp, Some(stamp));
    }

    #[test]
    fn int32_widens_into_i64_fields() {
        let mut row = to_row(&sensor()).unwrap();
        row.insert("samples", 12);
        assert_eq!(from_row::<Sensor>(row).unwrap().samples, 12);
    }

    #[test]
    fn kind_mismatch_is_reported() {
        let mut row = to_row(&sensor()).unwrap();
        row.insert("enabled", "yes");
        let err = from_row::<Sensor>(row).unwrap_err();
        assert!(matches!(
            err,
            EntityError::TypeMismatch {
                field: "enabled",
                expected: ValueKind::Bool,
                actual: ValueKind::String,
            }
        ));
    }

    #[test]
    fn malformed_keys_fail_conversion() {
        for key in ["", "no-separator", "a/b/c", "/row", "partition/"] {
            let entity = Sensor {
                key: key.into(),
                ..Default::default()
            };
            assert!(
                matches!(to_row(&entity), Err(EntityError::Key { entity: "Sensor", .. })),
                "{key:?} should be rejected"
            );
        }
    }
}

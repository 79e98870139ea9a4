//! Column schemas of the plugin row format and the codecs between rows and
//! typed entities.
//!
//! Absent or `null` columns decode to `None`/defaults. Only the columns a
//! row cannot be displayed without are required; a row missing one of them
//! is rejected on its own.

use serde_json::Value;

use super::{PluginType, Row};
use crate::error::ContractError;
use crate::searchable::{Contact, File, Location, PluginEntity};

pub mod file {
    pub const ID: &str = "id";
    pub const DISPLAY_NAME: &str = "display_name";
    pub const MIME_TYPE: &str = "mime_type";
    pub const SIZE: &str = "size";
    pub const PATH: &str = "path";
    pub const CONTENT_URI: &str = "content_uri";
    pub const THUMBNAIL_URI: &str = "thumbnail_uri";
    pub const IS_DIRECTORY: &str = "is_directory";
}

pub mod contact {
    pub const ID: &str = "id";
    pub const URI: &str = "uri";
    pub const NAME: &str = "name";
    pub const PHONE_NUMBERS: &str = "phone_numbers";
    pub const EMAIL_ADDRESSES: &str = "email_addresses";
    pub const POSTAL_ADDRESSES: &str = "postal_addresses";
    pub const CUSTOM_ACTIONS: &str = "custom_actions";
    pub const PHOTO_URI: &str = "photo_uri";
}

pub mod location {
    pub const ID: &str = "id";
    pub const LABEL: &str = "label";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const CATEGORY: &str = "category";
    pub const ADDRESS: &str = "address";
    pub const WEBSITE_URL: &str = "website_url";
    pub const PHONE_NUMBER: &str = "phone_number";
}

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

fn present<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column).filter(|v| !v.is_null())
}

fn opt_string(row: &Row, column: &'static str) -> Result<Option<String>, ContractError> {
    match present(row, column) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(ContractError::InvalidValue {
            column,
            detail: format!("expected string, got {other}"),
        }),
    }
}

fn required_string(row: &Row, column: &'static str) -> Result<String, ContractError> {
    opt_string(row, column)?.ok_or(ContractError::MissingColumn(column))
}

fn opt_u64(row: &Row, column: &'static str) -> Result<Option<u64>, ContractError> {
    match present(row, column) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| ContractError::InvalidValue {
            column,
            detail: format!("expected unsigned integer, got {n}"),
        }),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| ContractError::InvalidValue {
            column,
            detail: format!("expected unsigned integer, got {s:?}"),
        }),
        Some(other) => Err(ContractError::InvalidValue {
            column,
            detail: format!("expected unsigned integer, got {other}"),
        }),
    }
}

/// Only finite numbers are accepted.
fn required_f64(row: &Row, column: &'static str) -> Result<f64, ContractError> {
    let value: f64 = match present(row, column) {
        None => Err(ContractError::MissingColumn(column)),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| ContractError::InvalidValue {
            column,
            detail: n.to_string(),
        }),
        Some(Value::String(s)) => s.parse().map_err(|_| ContractError::InvalidValue {
            column,
            detail: format!("expected number, got {s:?}"),
        }),
        Some(other) => Err(ContractError::InvalidValue {
            column,
            detail: format!("expected number, got {other}"),
        }),
    }?;
    if !value.is_finite() {
        return Err(ContractError::InvalidValue {
            column,
            detail: format!("expected finite number, got {value}"),
        });
    }
    Ok(value)
}

fn opt_bool(row: &Row, column: &'static str) -> Result<Option<bool>, ContractError> {
    match present(row, column) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) => Ok(Some(n.as_i64() != Some(0))),
        Some(Value::String(s)) => s.parse().map(Some).map_err(|_| ContractError::InvalidValue {
            column,
            detail: format!("expected boolean, got {s:?}"),
        }),
        Some(other) => Err(ContractError::InvalidValue {
            column,
            detail: format!("expected boolean, got {other}"),
        }),
    }
}

/// List columns are either JSON arrays or strings holding a JSON array.
fn string_list(row: &Row, column: &'static str) -> Result<Vec<String>, ContractError> {
    let invalid = |detail: String| ContractError::InvalidValue { column, detail };
    let items = match present(row, column) {
        None => return Ok(Vec::new()),
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(s)) => {
            serde_json::from_str::<Vec<Value>>(s).map_err(|e| invalid(e.to_string()))?
        }
        Some(other) => return Err(invalid(format!("expected list, got {other}"))),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Ok(s),
            other => Err(invalid(format!("expected string entry, got {other}"))),
        })
        .collect()
}

fn put(row: &mut Row, column: &str, value: impl Into<Value>) {
    row.insert(column.to_string(), value.into());
}

fn put_opt(row: &mut Row, column: &str, value: &Option<String>) {
    if let Some(value) = value {
        put(row, column, value.clone());
    }
}

pub fn decode_file(row: &Row) -> Result<File, ContractError> {
    Ok(File {
        id: required_string(row, file::ID)?,
        display_name: required_string(row, file::DISPLAY_NAME)?,
        content_uri: required_string(row, file::CONTENT_URI)?,
        mime_type: opt_string(row, file::MIME_TYPE)?.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        size: opt_u64(row, file::SIZE)?.unwrap_or(0),
        path: opt_string(row, file::PATH)?,
        thumbnail_uri: opt_string(row, file::THUMBNAIL_URI)?,
        is_directory: opt_bool(row, file::IS_DIRECTORY)?.unwrap_or(false),
    })
}

pub fn encode_file(value: &File) -> Row {
    let mut row = Row::new();
    put(&mut row, file::ID, value.id.clone());
    put(&mut row, file::DISPLAY_NAME, value.display_name.clone());
    put(&mut row, file::MIME_TYPE, value.mime_type.clone());
    put(&mut row, file::SIZE, value.size);
    put_opt(&mut row, file::PATH, &value.path);
    put(&mut row, file::CONTENT_URI, value.content_uri.clone());
    put_opt(&mut row, file::THUMBNAIL_URI, &value.thumbnail_uri);
    put(&mut row, file::IS_DIRECTORY, value.is_directory);
    row
}

pub fn decode_contact(row: &Row) -> Result<Contact, ContractError> {
    Ok(Contact {
        id: required_string(row, contact::ID)?,
        name: required_string(row, contact::NAME)?,
        uri: opt_string(row, contact::URI)?,
        phone_numbers: string_list(row, contact::PHONE_NUMBERS)?,
        email_addresses: string_list(row, contact::EMAIL_ADDRESSES)?,
        postal_addresses: string_list(row, contact::POSTAL_ADDRESSES)?,
        custom_actions: string_list(row, contact::CUSTOM_ACTIONS)?,
        photo_uri: opt_string(row, contact::PHOTO_URI)?,
    })
}

pub fn encode_contact(value: &Contact) -> Row {
    let mut row = Row::new();
    put(&mut row, contact::ID, value.id.clone());
    put(&mut row, contact::NAME, value.name.clone());
    put_opt(&mut row, contact::URI, &value.uri);
    put(&mut row, contact::PHONE_NUMBERS, value.phone_numbers.clone());
    put(&mut row, contact::EMAIL_ADDRESSES, value.email_addresses.clone());
    put(&mut row, contact::POSTAL_ADDRESSES, value.postal_addresses.clone());
    put(&mut row, contact::CUSTOM_ACTIONS, value.custom_actions.clone());
    put_opt(&mut row, contact::PHOTO_URI, &value.photo_uri);
    row
}

pub fn decode_location(row: &Row) -> Result<Location, ContractError> {
    Ok(Location {
        id: required_string(row, location::ID)?,
        label: required_string(row, location::LABEL)?,
        latitude: required_f64(row, location::LATITUDE)?,
        longitude: required_f64(row, location::LONGITUDE)?,
        category: opt_string(row, location::CATEGORY)?,
        address: opt_string(row, location::ADDRESS)?,
        website_url: opt_string(row, location::WEBSITE_URL)?,
        phone_number: opt_string(row, location::PHONE_NUMBER)?,
    })
}

pub fn encode_location(value: &Location) -> Row {
    let mut row = Row::new();
    put(&mut row, location::ID, value.id.clone());
    put(&mut row, location::LABEL, value.label.clone());
    put(&mut row, location::LATITUDE, value.latitude);
    put(&mut row, location::LONGITUDE, value.longitude);
    put_opt(&mut row, location::CATEGORY, &value.category);
    put_opt(&mut row, location::ADDRESS, &value.address);
    put_opt(&mut row, location::WEBSITE_URL, &value.website_url);
    put_opt(&mut row, location::PHONE_NUMBER, &value.phone_number);
    row
}

pub fn decode_entity(plugin_type: PluginType, row: &Row) -> Result<PluginEntity, ContractError> {
    match plugin_type {
        PluginType::FileSearch => decode_file(row).map(PluginEntity::File),
        PluginType::ContactSearch => decode_contact(row).map(PluginEntity::Contact),
        PluginType::LocationSearch | PluginType::PublicTransport => {
            decode_location(row).map(PluginEntity::Location)
        }
        PluginType::Weather => Err(ContractError::Unsupported(format!("{plugin_type:?}"))),
    }
}

pub fn encode_entity(entity: &PluginEntity) -> Row {
    match entity {
        PluginEntity::File(f) => encode_file(f),
        PluginEntity::Contact(c) => encode_contact(c),
        PluginEntity::Location(l) => encode_location(l),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn absent_file_columns_use_defaults() {
        let decoded = decode_file(&row(json!({
            "id": "7",
            "display_name": "report.pdf",
            "content_uri": "content://files/7",
            "thumbnail_uri": null,
        })))
        .unwrap();
        assert_eq!(decoded.mime_type, DEFAULT_MIME_TYPE);
        assert_eq!(decoded.size, 0);
        assert_eq!(decoded.thumbnail_uri, None);
        assert!(!decoded.is_directory);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let err = decode_file(&row(json!({ "id": "7", "content_uri": "x" }))).unwrap_err();
        assert_eq!(err, ContractError::MissingColumn(file::DISPLAY_NAME));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        for latitude in ["NaN", "inf", "-infinity", "1e400"] {
            let err = decode_location(&row(json!({
                "id": "1",
                "label": "Somewhere",
                "latitude": latitude,
                "longitude": 13.4,
            })))
            .unwrap_err();
            assert!(
                matches!(err, ContractError::InvalidValue { column: location::LATITUDE, .. }),
                "{latitude} was accepted"
            );
        }
        let decoded = decode_location(&row(json!({
            "id": "1",
            "label": "Berlin",
            "latitude": "52.52",
            "longitude": 13.4,
        })))
        .unwrap();
        assert_eq!(decoded.latitude, 52.52);
    }

    #[test]
    fn malformed_value_is_reported() {
        let err = decode_file(&row(json!({
            "id": "7",
            "display_name": "a",
            "content_uri": "x",
            "size": "big",
        })))
        .unwrap_err();
        assert!(matches!(err, ContractError::InvalidValue { column: file::SIZE, .. }));
    }

    #[test]
    fn contact_lists_accept_encoded_arrays() {
        let decoded = decode_contact(&row(json!({
            "id": "1",
            "name": "Yara",
            "phone_numbers": "[\"+1 555\", \"+1 556\"]",
            "email_addresses": ["yara@example.org"],
        })))
        .unwrap();
        assert_eq!(decoded.phone_numbers, vec!["+1 555", "+1 556"]);
        assert_eq!(decoded.email_addresses, vec!["yara@example.org"]);
        assert!(decoded.postal_addresses.is_empty());
    }

    #[test]
    fn numeric_ids_are_accepted_as_strings() {
        let decoded = decode_location(&row(json!({
            "id": 12,
            "label": "Station",
            "latitude": 52.5,
            "longitude": "13.4",
        })))
        .unwrap();
        assert_eq!(decoded.id, "12");
        assert_eq!(decoded.longitude, 13.4);
    }

    #[test]
    fn weather_plugins_have_no_search_rows() {
        assert!(decode_entity(PluginType::Weather, &Row::new()).is_err());
    }
}

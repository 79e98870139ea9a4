//! Persistable payload of a favorite.
//!
//! Most items are stored as their full serialized [`Searchable`]. Plugin
//! items whose plugin asked for `StoreReference` only keep the plugin
//! identity and the entity id, and are re-resolved on restore.

use kestrel_plugin::contract::StorageStrategy;
use kestrel_plugin::{Kind, Searchable};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// What a stored payload restores to.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Ready(Searchable),
    Reference(StoredReference),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReference {
    pub authority: String,
    pub id: String,
    /// Last known label, shown if the plugin cannot resolve the id.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_override: Option<String>,
}

const REFERENCE_TAG: &str = "ref";

#[derive(Serialize, Deserialize)]
struct ReferencePayload {
    strategy: String,
    #[serde(flatten)]
    reference: StoredReference,
}

pub fn encode(item: &Searchable) -> Result<String, StoreError> {
    match &item.kind {
        Kind::Placeholder(_) => Err(StoreError::NotPersistable(item.key.clone())),
        Kind::Plugin(plugin) if plugin.strategy == StorageStrategy::StoreReference => {
            let payload = ReferencePayload {
                strategy: REFERENCE_TAG.to_string(),
                reference: StoredReference {
                    authority: plugin.authority.clone(),
                    id: plugin.entity.id().to_string(),
                    label: item.label.clone(),
                    label_override: item.label_override.clone(),
                },
            };
            Ok(serde_json::to_string(&payload)?)
        }
        _ => Ok(serde_json::to_string(item)?),
    }
}

pub fn decode(payload: &str) -> Result<Decoded, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(payload)?;
    if value.get("strategy").and_then(|s| s.as_str()) == Some(REFERENCE_TAG) {
        let payload: ReferencePayload = serde_json::from_value(value)?;
        return Ok(Decoded::Reference(payload.reference));
    }
    Ok(Decoded::Ready(serde_json::from_value(value)?))
}

/// Authority of the plugin a payload depends on, if any.
pub fn plugin_authority(decoded: &Decoded) -> Option<&str> {
    match decoded {
        Decoded::Reference(reference) => Some(&reference.authority),
        Decoded::Ready(Searchable {
            kind: Kind::Plugin(item),
            ..
        }) => Some(&item.authority),
        Decoded::Ready(_) => None,
    }
}

use serde::{Deserialize, Serialize};

/// Persisted user state for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRecord {
    pub key: String,
    /// Domain of the item, selects the payload decoder.
    #[serde(rename = "type")]
    pub kind: String,
    pub serialized_payload: String,
    #[serde(default)]
    pub launch_count: u32,
    #[serde(default = "unpinned", with = "pin_sentinel")]
    pub pin_position: Option<u32>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub weight: f64,
}

fn unpinned() -> Option<u32> {
    None
}

impl FavoriteRecord {
    pub fn new(key: impl Into<String>, kind: impl Into<String>, serialized_payload: String) -> Self {
        Self {
            key: key.into(),
            kind: kind.into(),
            serialized_payload,
            launch_count: 0,
            pin_position: None,
            hidden: false,
            weight: 0.0,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_position.is_some()
    }
}

/// The persisted schema stores `pinPosition` as an integer with `-1` meaning
/// unpinned.
mod pin_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const UNPINNED: i64 = -1;

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.map(i64::from).unwrap_or(UNPINNED))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(u32::try_from(raw).ok())
    }
}

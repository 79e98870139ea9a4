use serde::{Deserialize, Serialize};

use crate::contract::StorageStrategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct App {
    pub desktop_file_id: String,
    pub exec: Option<String>,
    pub comment: Option<String>,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub uri: Option<String>,
    pub name: String,
    #[serde(default)]
    pub phone_numbers: Vec<String>,
    #[serde(default)]
    pub email_addresses: Vec<String>,
    #[serde(default)]
    pub postal_addresses: Vec<String>,
    #[serde(default)]
    pub custom_actions: Vec<String>,
    pub photo_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    /// Milliseconds since the unix epoch.
    pub start: i64,
    pub end: i64,
    pub location: Option<String>,
    pub calendar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct File {
    pub id: String,
    pub display_name: String,
    pub mime_type: String,
    pub size: u64,
    pub path: Option<String>,
    pub content_uri: String,
    pub thumbnail_uri: Option<String>,
    pub is_directory: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub label: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: Option<String>,
    pub address: Option<String>,
    pub website_url: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Website {
    pub url: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
    pub expression: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub input: String,
    pub outputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSetting {
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
}

/// The entity a plugin returned, typed by the plugin's column schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "lowercase")]
pub enum PluginEntity {
    File(File),
    Contact(Contact),
    Location(Location),
}

impl PluginEntity {
    pub fn id(&self) -> &str {
        match self {
            PluginEntity::File(f) => &f.id,
            PluginEntity::Contact(c) => &c.id,
            PluginEntity::Location(l) => &l.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PluginEntity::File(f) => &f.display_name,
            PluginEntity::Contact(c) => &c.name,
            PluginEntity::Location(l) => &l.label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginItem {
    pub authority: String,
    pub strategy: StorageStrategy,
    /// When the plugin produced this copy, milliseconds since the unix epoch.
    pub updated_at: i64,
    pub entity: PluginEntity,
}

/// Stand-in for a favorite that could not be restored right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    pub domain: String,
    pub reason: String,
}

/// Domain-specific part of a [`Searchable`]. The tag doubles as the domain
/// string and as the discriminant of the persisted payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "lowercase")]
pub enum Kind {
    App(App),
    Contact(Contact),
    Calendar(CalendarEvent),
    File(File),
    Location(Location),
    Website(Website),
    Wikipedia(Article),
    Calculator(Calculation),
    UnitConverter(UnitConversion),
    Setting(SystemSetting),
    Tag(Tag),
    Plugin(PluginItem),
    Placeholder(Placeholder),
}

impl Kind {
    pub fn domain(&self) -> &str {
        match self {
            Kind::App(_) => "app",
            Kind::Contact(_) => "contact",
            Kind::Calendar(_) => "calendar",
            Kind::File(_) => "file",
            Kind::Location(_) => "location",
            Kind::Website(_) => "website",
            Kind::Wikipedia(_) => "wikipedia",
            Kind::Calculator(_) => "calculator",
            Kind::UnitConverter(_) => "unitconverter",
            Kind::Setting(_) => "setting",
            Kind::Tag(_) => "tag",
            Kind::Plugin(_) => "plugin",
            Kind::Placeholder(p) => &p.domain,
        }
    }
}

/// One search hit.
///
/// `key` has the form `domain://identifier` and stays the same across queries
/// for the same underlying entity; it joins results against favorites and the
/// hidden set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Searchable {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub label_override: Option<String>,
    #[serde(default)]
    pub prefer_details_over_launch: bool,
    pub kind: Kind,
}

impl Searchable {
    pub fn new(kind: Kind, identifier: &str, label: impl Into<String>) -> Self {
        Self {
            key: make_key(kind.domain(), identifier),
            label: label.into(),
            label_override: None,
            prefer_details_over_launch: false,
            kind,
        }
    }

    pub fn from_plugin(item: PluginItem) -> Self {
        let identifier = format!("{}/{}", item.authority, item.entity.id());
        let label = item.entity.label().to_string();
        let prefer_details = matches!(item.entity, PluginEntity::Contact(_) | PluginEntity::Location(_));
        let mut searchable = Self::new(Kind::Plugin(item), &identifier, label);
        searchable.prefer_details_over_launch = prefer_details;
        searchable
    }

    /// A degraded entry that keeps `key` visible while its content is unavailable.
    pub fn placeholder(key: &str, label: impl Into<String>, reason: impl Into<String>) -> Self {
        let domain = key.split_once("://").map(|(d, _)| d).unwrap_or_default();
        Self {
            key: key.to_string(),
            label: label.into(),
            label_override: None,
            prefer_details_over_launch: true,
            kind: Kind::Placeholder(Placeholder {
                domain: domain.to_string(),
                reason: reason.into(),
            }),
        }
    }

    pub fn with_label_override(mut self, label: impl Into<String>) -> Self {
        self.label_override = Some(label.into());
        self
    }

    pub fn domain(&self) -> &str {
        self.kind.domain()
    }

    pub fn effective_label(&self) -> &str {
        self.label_override.as_deref().unwrap_or(&self.label)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, Kind::Placeholder(_))
    }
}

pub fn make_key(domain: &str, identifier: &str) -> String {
    format!("{domain}://{identifier}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(id: &str, name: &str) -> Searchable {
        Searchable::new(
            Kind::App(App {
                desktop_file_id: id.to_string(),
                exec: None,
                comment: None,
                icon: None,
            }),
            id,
            name,
        )
    }

    #[test]
    fn key_combines_domain_and_identifier() {
        let item = app("firefox.desktop", "Firefox");
        assert_eq!(item.key, "app://firefox.desktop");
        assert_eq!(item.domain(), "app");
    }

    #[test]
    fn label_override_takes_precedence() {
        let item = app("x", "Xray").with_label_override("My Xray");
        assert_eq!(item.effective_label(), "My Xray");
        assert_eq!(app("x", "Xray").effective_label(), "Xray");
    }

    #[test]
    fn payload_carries_domain_discriminant() {
        let item = app("x", "Xray");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"]["domain"], "app");
        let back: Searchable = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn plugin_keys_include_authority() {
        let item = Searchable::from_plugin(PluginItem {
            authority: "org.example.files".to_string(),
            strategy: StorageStrategy::StoreCopy,
            updated_at: 0,
            entity: PluginEntity::File(File {
                id: "42".to_string(),
                display_name: "notes.txt".to_string(),
                ..File::default()
            }),
        });
        assert_eq!(item.key, "plugin://org.example.files/42");
        assert_eq!(item.label, "notes.txt");
    }

    #[test]
    fn placeholder_keeps_key_and_domain() {
        let item = Searchable::placeholder("plugin://a/1", "notes.txt", "plugin unreachable");
        assert_eq!(item.key, "plugin://a/1");
        assert_eq!(item.domain(), "plugin");
        assert!(item.is_placeholder());
    }
}

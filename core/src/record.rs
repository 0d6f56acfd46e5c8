use serde::Serialize;
use serde_json::Value;

use crate::profile::UpstreamProfile;

/// Stands in for any field the registry row leaves out.
pub const PLACEHOLDER: &str = "N/A";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub udi_di: String,
    pub product_name: String,
    pub brand: String,
    pub model: String,
}

/// Outcome of a lookup that reached the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(DeviceRecord),
    NotFound,
}

impl DeviceRecord {
    /// Projects a registry row onto the record, falling back to `requested`
    /// when the row does not echo its identifier.
    pub fn from_item(item: &Value, profile: UpstreamProfile, requested: &str) -> Self {
        let fields = profile.fields();
        Self {
            udi_di: text(item, fields.identifier).unwrap_or_else(|| requested.to_string()),
            product_name: text_or_placeholder(item, fields.product_name),
            brand: text_or_placeholder(item, fields.brand),
            model: text_or_placeholder(item, fields.model),
        }
    }
}

fn text(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or_placeholder(item: &Value, key: &str) -> String {
    text(item, key).unwrap_or_else(|| PLACEHOLDER.to_string())
}

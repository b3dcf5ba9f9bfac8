//! Relay request payloads.
//!
//! ```json
//! { "target": "user", "userId": 123, "message": "hi",
//!   "embed": { "title": "...", "description": "...", "color": 3447003,
//!              "timestamp": "2024-05-01T12:00:00Z",
//!              "fields": [ { "name": "a", "value": "b", "inline": true } ] } }
//! ```

use serde::Deserialize;
use serde_json::{Map, Value};

/// The only recipient kind the relay knows.
pub const TARGET_USER: &str = "user";

/// Every key the request model understands, in its canonical spelling.
const CANONICAL_KEYS: &[&str] = &[
    "target",
    "userId",
    "message",
    "embed",
    "title",
    "description",
    "fields",
    "color",
    "timestamp",
    "name",
    "value",
    "inline",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRequest {
    /// Recipient kind. Validated after parsing so the error can quote it.
    #[serde(default)]
    pub target: Option<String>,
    pub user_id: u64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub embed: Option<EmbedRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmbedRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Option<Vec<EmbedField>>,
    /// Packed 0xRRGGBB.
    #[serde(default)]
    pub color: Option<u32>,
    /// ISO-8601; unparsable values are dropped when the embed is built.
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EmbedField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// What a request asks to deliver once the recipient is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery<'a> {
    Embed(&'a EmbedRequest),
    Text(&'a str),
    Nothing,
}

impl MessageRequest {
    /// Parse a raw body.
    ///
    /// With `case_insensitive_keys`, object keys are folded onto their
    /// canonical spelling before typed deserialization. A JSON `null`
    /// body is rejected like any other shape mismatch.
    pub fn from_json(body: &[u8], case_insensitive_keys: bool) -> crate::error::Result<Self> {
        let mut value: Value = serde_json::from_slice(body)?;
        if case_insensitive_keys {
            fold_keys(&mut value);
        }
        Ok(serde_json::from_value(value)?)
    }

    /// `Ok(())` when the target names a user, otherwise the received value
    /// (empty when the field was absent).
    pub fn check_target(&self) -> Result<(), String> {
        match self.target.as_deref() {
            Some(t) if t.eq_ignore_ascii_case(TARGET_USER) => Ok(()),
            Some(t) => Err(t.to_string()),
            None => Err(String::new()),
        }
    }

    /// Embed wins over plain text; an empty message counts as absent.
    pub fn delivery(&self) -> Delivery<'_> {
        if let Some(ref embed) = self.embed {
            return Delivery::Embed(embed);
        }
        match self.message.as_deref() {
            Some(m) if !m.is_empty() => Delivery::Text(m),
            _ => Delivery::Nothing,
        }
    }
}

/// Rewrite every object key that matches a canonical key case-insensitively.
fn fold_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let folded: Map<String, Value> = std::mem::take(map)
                .into_iter()
                .map(|(key, mut inner)| {
                    fold_keys(&mut inner);
                    let key = CANONICAL_KEYS
                        .iter()
                        .find(|c| c.eq_ignore_ascii_case(&key))
                        .map(|c| c.to_string())
                        .unwrap_or(key);
                    (key, inner)
                })
                .collect();
            *map = folded;
        }
        Value::Array(items) => items.iter_mut().for_each(fold_keys),
        _ => {}
    }
}

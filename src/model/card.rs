use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub name: String,
    /// Only present when the service was asked for it; list endpoints may omit it.
    #[serde(default)]
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_list: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A text value stored in one custom field of one card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomFieldValue {
    pub card_id: String,
    pub field_id: String,
    pub text: String,
}

impl CustomFieldValue {
    pub fn new(card_id: &str, field_id: &str, text: &str) -> Self {
        Self {
            card_id: card_id.to_string(),
            field_id: field_id.to_string(),
            text: text.to_string(),
        }
    }

    /// Body for `PUT /cards/{card}/customField/{field}/item`.
    pub fn request_body(&self) -> serde_json::Value {
        serde_json::json!({ "value": { "text": self.text } })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_deserializes_without_desc() {
        let json = r#"{"id":"c1","name":"Renewal (Ana Ruiz)","idList":"l1"}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.id, "c1");
        assert_eq!(card.desc, "");
        assert_eq!(card.id_list.as_deref(), Some("l1"));
    }

    #[test]
    fn card_ignores_unknown_fields() {
        let json = r#"{"id":"c1","name":"x","desc":"hello","closed":false,"labels":[]}"#;
        let card: Card = serde_json::from_str(json).unwrap();
        assert_eq!(card.desc, "hello");
        assert_eq!(card.id_list, None);
    }

    #[test]
    fn custom_field_body_wraps_text() {
        let value = CustomFieldValue::new("c1", "f1", "000123456789");
        assert_eq!(
            value.request_body(),
            serde_json::json!({ "value": { "text": "000123456789" } })
        );
    }
}

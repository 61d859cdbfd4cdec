pub mod trello;

use async_trait::async_trait;

use crate::error::RequestError;
use crate::model::card::{Attachment, Card};

/// Operations the sweep needs from the board service. Identifiers are opaque
/// and passed back unchanged.
#[async_trait]
pub trait BoardApi: Send + Sync {
    fn name(&self) -> &str;

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>, RequestError>;

    async fn list_attachments(&self, card_id: &str) -> Result<Vec<Attachment>, RequestError>;

    /// Fails if the attachment no longer exists.
    async fn delete_attachment(&self, card_id: &str, attachment_id: &str)
        -> Result<(), RequestError>;

    async fn update_card_name(&self, card_id: &str, name: &str) -> Result<(), RequestError>;

    async fn update_card_description(
        &self,
        card_id: &str,
        description: &str,
    ) -> Result<(), RequestError>;

    async fn clear_card_description(&self, card_id: &str) -> Result<(), RequestError> {
        self.update_card_description(card_id, "").await
    }

    /// Store `text` in the card's custom field as `{"text": text}`.
    async fn update_custom_field(
        &self,
        card_id: &str,
        field_id: &str,
        text: &str,
    ) -> Result<(), RequestError>;

    /// Fetch a single card including its description.
    async fn get_card_details(&self, card_id: &str) -> Result<Card, RequestError>;
}

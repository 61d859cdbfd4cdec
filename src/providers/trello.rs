use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::BoardApi;
use crate::config::Credentials;
use crate::error::RequestError;
use crate::model::card::{Attachment, Card, CustomFieldValue};

const ERROR_BODY_LIMIT: usize = 200;

pub struct TrelloClient {
    api_key: String,
    token: String,
    base_url: String,
    client: reqwest::Client,
}

impl TrelloClient {
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            api_key: credentials.api_key.clone(),
            token: credentials.token.clone(),
            base_url: credentials.base_url.clone(),
            client: reqwest::Client::new(),
        }
    }

    fn auth_params(&self) -> [(&str, &str); 2] {
        [("key", &self.api_key), ("token", &self.token)]
    }

    /// Returns the credential-free URL (for error messages) alongside the
    /// authenticated request.
    fn request(&self, method: Method, path: &str) -> (String, RequestBuilder) {
        let url = format!("{}{path}", self.base_url);
        let builder = self
            .client
            .request(method, &url)
            .query(&self.auth_params());
        (url, builder)
    }

    async fn send(&self, url: &str, builder: RequestBuilder) -> Result<Response, RequestError> {
        let request = builder.build().map_err(|source| RequestError::Transport {
            url: url.to_string(),
            source,
        })?;
        let method = request.method().to_string();

        let resp = self
            .client
            .execute(request)
            .await
            .map_err(|source| RequestError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(RequestError::Status {
            method,
            url: url.to_string(),
            status: status.as_u16(),
            body: truncate(body.trim(), ERROR_BODY_LIMIT),
        })
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        builder: RequestBuilder,
    ) -> Result<T, RequestError> {
        self.send(url, builder)
            .await?
            .json()
            .await
            .map_err(|source| RequestError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}…")
    }
}

#[async_trait]
impl BoardApi for TrelloClient {
    fn name(&self) -> &str {
        "Trello"
    }

    async fn list_cards(&self, list_id: &str) -> Result<Vec<Card>, RequestError> {
        let (url, req) = self.request(Method::GET, &format!("/lists/{list_id}/cards"));
        self.fetch(&url, req).await
    }

    async fn list_attachments(&self, card_id: &str) -> Result<Vec<Attachment>, RequestError> {
        let (url, req) = self.request(Method::GET, &format!("/cards/{card_id}/attachments"));
        self.fetch(&url, req).await
    }

    async fn delete_attachment(
        &self,
        card_id: &str,
        attachment_id: &str,
    ) -> Result<(), RequestError> {
        let (url, req) = self.request(
            Method::DELETE,
            &format!("/cards/{card_id}/attachments/{attachment_id}"),
        );
        self.send(&url, req).await?;
        Ok(())
    }

    async fn update_card_name(&self, card_id: &str, name: &str) -> Result<(), RequestError> {
        let (url, req) = self.request(Method::PUT, &format!("/cards/{card_id}"));
        self.send(&url, req.query(&[("name", name)])).await?;
        Ok(())
    }

    async fn update_card_description(
        &self,
        card_id: &str,
        description: &str,
    ) -> Result<(), RequestError> {
        let (url, req) = self.request(Method::PUT, &format!("/cards/{card_id}"));
        self.send(&url, req.query(&[("desc", description)])).await?;
        Ok(())
    }

    async fn update_custom_field(
        &self,
        card_id: &str,
        field_id: &str,
        text: &str,
    ) -> Result<(), RequestError> {
        let value = CustomFieldValue::new(card_id, field_id, text);
        let (url, req) = self.request(
            Method::PUT,
            &format!("/cards/{}/customField/{}/item", value.card_id, value.field_id),
        );
        self.send(&url, req.json(&value.request_body())).await?;
        Ok(())
    }

    async fn get_card_details(&self, card_id: &str) -> Result<Card, RequestError> {
        let (url, req) = self.request(Method::GET, &format!("/cards/{card_id}"));
        self.fetch(&url, req.query(&[("fields", "id,name,desc,idList")]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, reply with `status` and `body`, and hand back
    /// the raw request text.
    async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];

            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find(&buf, b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let response = format!(
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();

            String::from_utf8_lossy(&buf).to_string()
        });

        (format!("http://{addr}/1"), handle)
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    fn client(base_url: String) -> TrelloClient {
        TrelloClient::new(&Credentials {
            api_key: "k3y".into(),
            token: "t0ken".into(),
            base_url,
        })
    }

    fn request_line(raw: &str) -> &str {
        raw.lines().next().unwrap_or_default()
    }

    #[tokio::test]
    async fn list_cards_sends_credentials_as_query() {
        let (base, server) =
            serve_once(200, r#"[{"id":"c1","name":"Renewal (Ana Ruiz)","idList":"L1"}]"#).await;

        let cards = client(base).list_cards("L1").await.unwrap();
        let raw = server.await.unwrap();

        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].name, "Renewal (Ana Ruiz)");
        let line = request_line(&raw);
        assert!(line.starts_with("GET /1/lists/L1/cards?"), "{line}");
        assert!(line.contains("key=k3y"));
        assert!(line.contains("token=t0ken"));
    }

    #[tokio::test]
    async fn delete_attachment_uses_delete_verb() {
        let (base, server) = serve_once(200, "{}").await;

        client(base).delete_attachment("c1", "a9").await.unwrap();
        let raw = server.await.unwrap();

        assert!(request_line(&raw).starts_with("DELETE /1/cards/c1/attachments/a9?"));
    }

    #[tokio::test]
    async fn missing_attachment_is_status_error_without_credentials() {
        let (base, server) = serve_once(404, "invalid id").await;

        let err = client(base)
            .delete_attachment("c1", "gone")
            .await
            .unwrap_err();
        server.await.unwrap();

        match &err {
            RequestError::Status {
                method,
                status,
                body,
                url,
            } => {
                assert_eq!(method, "DELETE");
                assert_eq!(*status, 404);
                assert_eq!(body, "invalid id");
                assert!(!url.contains("t0ken"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.to_string().contains("t0ken"));
    }

    #[tokio::test]
    async fn update_name_is_put_with_encoded_name() {
        let (base, server) = serve_once(200, "{}").await;

        client(base).update_card_name("c1", "Juan Perez").await.unwrap();
        let raw = server.await.unwrap();

        let line = request_line(&raw);
        assert!(line.starts_with("PUT /1/cards/c1?"));
        assert!(line.contains("name=Juan+Perez"), "{line}");
    }

    #[tokio::test]
    async fn clear_description_sends_empty_desc() {
        let (base, server) = serve_once(200, "{}").await;

        client(base).clear_card_description("c1").await.unwrap();
        let raw = server.await.unwrap();

        let line = request_line(&raw);
        assert!(line.starts_with("PUT /1/cards/c1?"));
        assert!(line.contains("&desc= HTTP/1.1"), "{line}");
    }

    #[tokio::test]
    async fn custom_field_puts_wrapped_text_body() {
        let (base, server) = serve_once(200, "{}").await;

        client(base)
            .update_custom_field("c1", "f7", "000123456789")
            .await
            .unwrap();
        let raw = server.await.unwrap();

        assert!(request_line(&raw).starts_with("PUT /1/cards/c1/customField/f7/item?"));
        let body = raw.split("\r\n\r\n").nth(1).unwrap_or_default();
        let json: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(json, serde_json::json!({"value": {"text": "000123456789"}}));
    }

    #[tokio::test]
    async fn card_details_requests_description() {
        let (base, server) =
            serve_once(200, r#"{"id":"c1","name":"SUBJ-000123456789","desc":"Juan Perez"}"#)
                .await;

        let card = client(base).get_card_details("c1").await.unwrap();
        let raw = server.await.unwrap();

        assert_eq!(card.desc, "Juan Perez");
        assert!(request_line(&raw).contains("fields=id%2Cname%2Cdesc%2CidList"));
    }

    #[tokio::test]
    async fn garbage_json_is_decode_error() {
        let (base, server) = serve_once(200, "not json").await;

        let err = client(base).list_attachments("c1").await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, RequestError::Decode { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(format!("http://{addr}/1"))
            .list_cards("L1")
            .await
            .unwrap_err();

        assert!(matches!(err, RequestError::Transport { .. }));
    }

    #[test]
    fn truncate_marks_cut_bodies() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc…");
    }
}

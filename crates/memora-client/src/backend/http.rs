//! HTTP implementation of the backend collaborators

use super::{AuthBackend, ConversationBackend, MessageStreamer};
use crate::{
    Conversation, ConversationDetail, Credentials, Exchange, User,
    error::{Error, Result},
    stream::{StreamEventStream, decode_events},
    types::{ConversationRecord, MessageRecord},
};
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Memora API client.
///
/// Keeps a cookie store so the session cookie set by `/auth/login` is sent
/// with every later request.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim_end_matches('/');
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!(
                "server URL must start with http:// or https://: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder().cookie_store(true).build()?;
        Ok(Self {
            client,
            base_url: trimmed.to_string(),
        })
    }

    /// Create from the `MEMORA_SERVER_URL` environment variable, falling back to the default
    pub fn from_env() -> Result<Self> {
        let url = std::env::var("MEMORA_SERVER_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path);
        tracing::debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        read_json(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path);
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).json(body).send().await?;
        read_json(response).await
    }
}

/// Check the status and decode the body, turning failures into rejections
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthenticated);
    }
    let text = response.text().await.unwrap_or_default();
    Err(Error::rejected(status.as_u16(), error_detail(&text)))
}

/// FastAPI-style `{"detail": "..."}` bodies; anything else is passed through
fn error_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: serde_json::Value,
    }

    match serde_json::from_str::<Detail>(body) {
        Ok(Detail {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(Detail { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "no details".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

// ============================================================================
// Request/response bodies
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateConversationRequest<'a> {
    title: &'a str,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ConversationList {
    conversations: Vec<ConversationRecord>,
}

#[derive(Debug, Deserialize)]
struct ConversationWithMessages {
    id: i64,
    title: String,
    messages: Vec<MessageRecord>,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    user_message: MessageRecord,
    assistant_message: MessageRecord,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    user: User,
}

#[async_trait]
impl ConversationBackend for HttpBackend {
    async fn list(&self) -> Result<Vec<Conversation>> {
        let list: ConversationList = self.get_json("conversations").await?;
        Ok(list.conversations.into_iter().map(Conversation::from).collect())
    }

    async fn create(&self, title: &str) -> Result<Conversation> {
        let record: ConversationRecord = self
            .post_json("conversations", &CreateConversationRequest { title })
            .await?;
        Ok(record.into())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let url = self.endpoint(&format!("conversations/{}", id));
        tracing::debug!("DELETE {}", url);
        let response = self.client.delete(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn get_with_messages(&self, id: i64) -> Result<ConversationDetail> {
        let body: ConversationWithMessages =
            self.get_json(&format!("conversations/{}", id)).await?;
        Ok(ConversationDetail {
            id: body.id,
            title: body.title,
            messages: body.messages.into_iter().map(Into::into).collect(),
        })
    }
}

#[async_trait]
impl MessageStreamer for HttpBackend {
    async fn stream_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<StreamEventStream> {
        let url = self.endpoint(&format!("conversations/{}/messages/stream", conversation_id));
        tracing::debug!("POST {} (stream)", url);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&SendMessageRequest { content })
            .send()
            .await
            .map_err(|e| Error::Stream(format!("Failed to open stream: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Stream(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_detail(&text)
            )));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Stream(format!("Stream interrupted: {}", e))));
        Ok(decode_events(body))
    }

    async fn send_message(&self, conversation_id: i64, content: &str) -> Result<Exchange> {
        let body: ExchangeResponse = self
            .post_json(
                &format!("conversations/{}/messages", conversation_id),
                &SendMessageRequest { content },
            )
            .await?;
        Ok(Exchange {
            user_message: body.user_message.into(),
            assistant_message: body.assistant_message.into(),
        })
    }
}

#[async_trait]
impl AuthBackend for HttpBackend {
    async fn login(&self, credentials: &Credentials) -> Result<User> {
        let body: UserResponse = self.post_json("auth/login", credentials).await?;
        Ok(body.user)
    }

    async fn register(&self, credentials: &Credentials) -> Result<User> {
        let body: UserResponse = self.post_json("auth/register", credentials).await?;
        Ok(body.user)
    }

    async fn logout(&self) -> Result<()> {
        let url = self.endpoint("auth/logout");
        tracing::debug!("POST {}", url);
        let response = self.client.post(&url).send().await?;
        check_status(response).await?;
        Ok(())
    }

    async fn current_user(&self) -> Result<Option<User>> {
        match self.get_json::<UserResponse>("auth/me").await {
            Ok(body) => Ok(Some(body.user)),
            Err(Error::Unauthenticated) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_paths() {
        let backend = HttpBackend::new("http://localhost:8000/api/").unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000/api");
        assert_eq!(
            backend.endpoint("/conversations/3"),
            "http://localhost:8000/api/conversations/3"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            HttpBackend::new("localhost:8000"),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(error_detail(r#"{"detail":"Conversation not found"}"#), "Conversation not found");
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"field required"}]}"#),
            r#"[{"msg":"field required"}]"#
        );
        assert_eq!(error_detail("Internal Server Error"), "Internal Server Error");
        assert_eq!(error_detail(""), "no details");
    }
}

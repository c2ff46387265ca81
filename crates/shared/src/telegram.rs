use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{BotError, Result};
use crate::markup::{to_telegram_html, visible_utf16_len};
use crate::models::DeliveryResult;

const PARSE_MODE: &str = "HTML";

/// Longest photo caption the Bot API accepts, in UTF-16 units after entity parsing
pub const CAPTION_MAX_UTF16: usize = 1024;

/// Envelope every Bot API method answers with
#[derive(Debug, Clone, Deserialize)]
pub struct ApiReply {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ApiReply {
    fn failure_reason(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| "reply did not report ok".to_string())
    }
}

/// A single Bot API method call
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<ApiReply>;
}

pub struct HttpTransport {
    client: Client,
    identity_client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(api_url: &str, bot_token: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let identity_client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            identity_client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        })
    }
}

#[async_trait]
impl BotTransport for HttpTransport {
    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<ApiReply> {
        let url = format!("{}/{}", self.base_url, method);

        let request = if params.is_empty() {
            self.identity_client.get(&url)
        } else {
            self.client.post(&url).form(params)
        };

        // The request URL embeds the bot token, so errors must not carry it
        let response = request.send().await.map_err(|e| e.without_url())?;
        let status = response.status();
        let body = response.text().await.map_err(|e| e.without_url())?;

        // The API answers errors with a JSON envelope too, so parse before judging the status
        serde_json::from_str::<ApiReply>(&body).map_err(|_| {
            BotError::Delivery(format!(
                "{} returned {} with a malformed body: {}",
                method,
                status,
                body.chars().take(200).collect::<String>()
            ))
        })
    }
}

pub struct TelegramClient {
    transport: Box<dyn BotTransport>,
}

impl TelegramClient {
    pub fn new(api_url: &str, bot_token: &str) -> Result<Self> {
        Ok(Self::with_transport(Box::new(HttpTransport::new(
            api_url, bot_token,
        )?)))
    }

    pub fn with_transport(transport: Box<dyn BotTransport>) -> Self {
        Self { transport }
    }

    /// Verifies the bot token against `getMe`
    pub async fn test_connection(&self) -> Result<()> {
        let reply = self
            .transport
            .call("getMe", &[])
            .await
            .map_err(|e| BotError::connectivity("delivery API", e.to_string()))?;

        if !reply.ok {
            return Err(BotError::connectivity("delivery API", reply.failure_reason()));
        }

        let field = |name: &str| {
            reply
                .result
                .as_ref()
                .and_then(|r| r.get(name))
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_string()
        };
        tracing::info!(
            "✅ Bot connected: {} (@{})",
            field("first_name"),
            field("username")
        );
        Ok(())
    }

    /// Sends the post to one destination, falling back to a text message when
    /// the photo is rejected for any reason or the post is too long to be a
    /// caption
    pub async fn send_content(
        &self,
        destination: &str,
        text: &str,
        image_url: Option<&str>,
    ) -> DeliveryResult {
        let html = to_telegram_html(text);

        let mut fell_back_to_text = false;
        let caption_len = visible_utf16_len(&html);
        if image_url.is_some() && caption_len > CAPTION_MAX_UTF16 {
            tracing::info!(
                destination,
                caption_len,
                "Post exceeds the photo caption limit, sending text only"
            );
            fell_back_to_text = true;
        } else if let Some(image_url) = image_url {
            match self.send_photo(destination, &html, image_url).await {
                Ok(()) => {
                    tracing::info!(destination, "📸 Photo sent successfully");
                    return DeliveryResult {
                        success: true,
                        channel: destination.to_string(),
                        fell_back_to_text: false,
                    };
                }
                Err(e) => {
                    tracing::warn!(destination, error = %e, "Photo send failed, falling back to text message");
                    fell_back_to_text = true;
                }
            }
        }

        let success = match self.send_message(destination, &html).await {
            Ok(()) => {
                tracing::info!(destination, "💬 Message sent successfully");
                true
            }
            Err(e) => {
                tracing::error!(destination, error = %e, "❌ Message send failed");
                false
            }
        };

        DeliveryResult {
            success,
            channel: destination.to_string(),
            fell_back_to_text,
        }
    }

    /// Attempts every destination; the caller decides what overall success means
    pub async fn send_to_all(
        &self,
        destinations: &[String],
        text: &str,
        image_url: Option<&str>,
    ) -> Vec<DeliveryResult> {
        let mut results = Vec::with_capacity(destinations.len());
        for destination in destinations {
            results.push(self.send_content(destination, text, image_url).await);
        }
        results
    }

    async fn send_photo(&self, destination: &str, caption: &str, image_url: &str) -> Result<()> {
        let params = [
            ("chat_id", destination),
            ("photo", image_url),
            ("caption", caption),
            ("parse_mode", PARSE_MODE),
        ];
        self.expect_ok("sendPhoto", &params).await
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<()> {
        let params = [
            ("chat_id", destination),
            ("text", text),
            ("parse_mode", PARSE_MODE),
        ];
        self.expect_ok("sendMessage", &params).await
    }

    async fn expect_ok(&self, method: &str, params: &[(&str, &str)]) -> Result<()> {
        let reply = self.transport.call(method, params).await?;
        if reply.ok {
            Ok(())
        } else {
            Err(BotError::Delivery(format!(
                "{} rejected: {}",
                method,
                reply.failure_reason()
            )))
        }
    }
}

/// Every destination must have accepted the post
pub fn all_delivered(results: &[DeliveryResult]) -> bool {
    !results.is_empty() && results.iter().all(|r| r.success)
}

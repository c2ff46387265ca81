use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BotError, Result};
use crate::models::ContentRequest;

/// Something that can produce a raw market-summary response
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Cheap pre-flight request proving the API accepts our credentials
    async fn probe(&self) -> Result<()>;

    /// Raw response document; its layout is not guaranteed
    async fn fetch(&self, request: &ContentRequest) -> Result<Value>;
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

pub struct PerplexityClient {
    client: Client,
    probe_client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl PerplexityClient {
    pub fn new(api_key: String, model: String, endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let probe_client = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            client,
            probe_client,
            api_key,
            model,
            endpoint,
        })
    }

    fn prompt(request: &ContentRequest) -> String {
        format!(
            "Write a crypto market summary for {}. Keep it under {} characters including spaces. \
            Focus on Bitcoin, Ethereum, major altcoins, and market trends. \
            End with: #CryptoNews #MarketOverview",
            request.date, request.char_budget
        )
    }

    fn summary_request(&self, request: &ContentRequest) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: Self::prompt(request),
            }],
            max_tokens: 300,
            temperature: Some(0.3),
            stream: Some(false),
        }
    }

    fn probe_request(&self) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: "Hi".to_string(),
            }],
            max_tokens: 10,
            temperature: None,
            stream: None,
        }
    }
}

#[async_trait]
impl ContentSource for PerplexityClient {
    async fn probe(&self) -> Result<()> {
        let response = self
            .probe_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&self.probe_request())
            .send()
            .await
            .map_err(|e| BotError::connectivity("content API", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::connectivity(
                "content API",
                format!("status {}", status),
            ));
        }

        tracing::info!("✅ Content API connection successful");
        Ok(())
    }

    async fn fetch(&self, request: &ContentRequest) -> Result<Value> {
        tracing::info!(model = %self.model, "📡 Requesting market summary");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&self.summary_request(request))
            .send()
            .await
            .map_err(|e| BotError::Extraction(format!("request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::Extraction(format!("unreadable body: {}", e)))?;

        if !status.is_success() {
            return Err(BotError::Extraction(format!(
                "content API returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        parse_body(&body)
    }
}

/// An empty body is a valid (if useless) answer and parses to `null`
fn parse_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| BotError::Extraction(format!("invalid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> PerplexityClient {
        PerplexityClient::new(
            "key".to_string(),
            "sonar-pro".to_string(),
            "http://localhost/chat/completions".to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_summary_request_body() {
        let request = ContentRequest::new("June 1, 2025", 900);
        let body = serde_json::to_value(client().summary_request(&request)).unwrap();

        assert_eq!(body["model"], "sonar-pro");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["stream"], false);
        assert!((body["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "user");

        let prompt = body["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("June 1, 2025"));
        assert!(prompt.contains("under 900 characters"));
        assert!(prompt.ends_with("#CryptoNews #MarketOverview"));
    }

    #[test]
    fn test_probe_request_is_minimal() {
        let body = serde_json::to_value(client().probe_request()).unwrap();

        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["messages"][0]["content"], "Hi");
        assert!(body.get("temperature").is_none());
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("").unwrap(), Value::Null);
        assert_eq!(parse_body("  \n").unwrap(), Value::Null);
        assert_eq!(parse_body(r#"{"a": 1}"#).unwrap()["a"], 1);
        assert!(matches!(
            parse_body("<html>oops</html>"),
            Err(BotError::Extraction(_))
        ));
    }
}

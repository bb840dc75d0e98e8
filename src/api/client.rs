use super::logging::{debug_payload_enabled, emit_debug_payload};
use super::stream::decode_deltas;
use super::{ChatStreamer, DeltaStream};
use crate::config::Config;
use crate::types::ChatMessage;
use crate::util::is_local_endpoint_url;
use anyhow::anyhow;
use anyhow::Result;
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::json;
use serde_json::Value;

pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    api_url: String,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| anyhow!("failed to build HTTP client: {error}"))?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_url: config.api_url.clone(),
        })
    }

    fn build_request(&self, payload: &Value) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .post(&self.api_url)
            .header("content-type", "application/json")
            .header("accept", "text/event-stream")
            .json(payload);

        if let Some(api_key) = &self.api_key {
            request = request.header("authorization", format!("Bearer {api_key}"));
        }

        request
    }
}

impl ChatStreamer for ApiClient {
    fn stream_chat(&self, messages: Vec<ChatMessage>, choices: u32) -> DeltaStream {
        let payload = chat_payload(&self.model, &messages, choices);
        let request = self.build_request(&payload);
        let request_url = self.api_url.clone();

        let deltas = stream::once(async move {
            if debug_payload_enabled() {
                emit_debug_payload(&request_url, &payload);
            }

            let response = request
                .send()
                .await
                .map_err(|error| map_api_request_error(error, &request_url))?
                .error_for_status()
                .map_err(|error| map_api_request_error(error, &request_url))?;

            let request_url_for_stream = request_url.clone();
            let bytes = response.bytes_stream().map(move |item| {
                item.map_err(|error| map_api_request_error(error, &request_url_for_stream))
            });
            Ok::<_, anyhow::Error>(decode_deltas(bytes))
        })
        .try_flatten();

        Box::pin(deltas)
    }
}

fn chat_payload(model: &str, messages: &[ChatMessage], choices: u32) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "n": choices,
        "stream": true,
    })
}

fn map_api_request_error(error: reqwest::Error, request_url: &str) -> anyhow::Error {
    if error.is_connect() && is_local_endpoint_url(request_url) {
        return anyhow!(
            "cannot reach local API endpoint '{}': {}. Start your local server or update OPENAI_API_URL.",
            request_url,
            error
        );
    }
    if error.is_connect() {
        return anyhow!("cannot reach API endpoint '{}': {}", request_url, error);
    }
    if error.is_timeout() {
        return anyhow!("API request to '{}' timed out: {}", request_url, error);
    }
    if let Some(status) = error.status() {
        return anyhow!(
            "API endpoint '{}' returned HTTP {}: {}",
            request_url,
            status,
            error
        );
    }
    anyhow!("API request to '{}' failed: {}", request_url, error)
}

use std::time::Duration;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use crate::config::AnalysisConfig;
use crate::core::canvas::FlowAnalysis;
use crate::error::{CanvasError, CollaboratorError, Result};
use super::analyzer::{AnalysisRequest, FlowAnalyzer};
use super::prompts::{build_analysis_prompt, SYSTEM_PROMPT};

/// Factory function to create the appropriate flow analyzer based on config
pub fn create_analyzer(config: &AnalysisConfig) -> Result<Box<dyn FlowAnalyzer>> {
    match config.provider.as_str() {
        "openai" | "openai-compatible" => Ok(Box::new(OpenAiCompatibleProvider::new(config)?)),
        _ => Err(CanvasError::Config(format!(
            "Unsupported analysis provider: {}",
            config.provider
        ))),
    }
}

/// Chat-completions provider for OpenAI and API-compatible servers
pub struct OpenAiCompatibleProvider {
    config: AnalysisConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            CanvasError::Config(
                "API key required: set analysis.api_key or OPENAI_API_KEY".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CanvasError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            api_key,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn payload(&self, request: &AnalysisRequest) -> serde_json::Value {
        let mut payload = json!({
            "model": request.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_analysis_prompt(&request.context, &request.entrypoint) }
            ],
            "response_format": { "type": "json_object" }
        });

        if let Some(max_tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            payload["temperature"] = json!(temperature);
        }
        payload
    }
}

#[async_trait]
impl FlowAnalyzer for OpenAiCompatibleProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> std::result::Result<FlowAnalysis, CollaboratorError> {
        debug!("POST {} (model {}, {} context chars)", self.endpoint(), request.model, request.context.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.payload(request))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(status_error(status, &body));
        }

        parse_completion(&body)
    }

    fn provider_name(&self) -> &str {
        &self.config.provider
    }
}

fn transport_error(error: reqwest::Error) -> CollaboratorError {
    if error.is_timeout() || error.is_connect() {
        CollaboratorError::Timeout(error.to_string())
    } else {
        CollaboratorError::MalformedResponse(error.to_string())
    }
}

/// Map a non-success HTTP status onto the collaborator failure kinds
pub fn status_error(status: StatusCode, body: &str) -> CollaboratorError {
    let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CollaboratorError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => CollaboratorError::RateLimit(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CollaboratorError::Timeout(detail),
        _ => CollaboratorError::MalformedResponse(detail),
    }
}

/// Extract the flow analysis from a chat-completions response body
pub fn parse_completion(body: &str) -> std::result::Result<FlowAnalysis, CollaboratorError> {
    let response_data: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| CollaboratorError::MalformedResponse(format!("response is not JSON: {}", e)))?;

    let content = response_data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| CollaboratorError::MalformedResponse("response has no message content".to_string()))?;

    serde_json::from_str(strip_code_fence(content))
        .map_err(|e| CollaboratorError::MalformedResponse(format!("flow JSON does not match the schema: {}", e)))
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::canvas::StepKind;

    fn completion(content: &str) -> String {
        json!({ "choices": [ { "message": { "role": "assistant", "content": content } } ] }).to_string()
    }

    #[test]
    fn test_parse_completion() {
        let content = r#"{"summary": "Loads a user", "steps": [
            {"id": "start", "kind": "start", "label": "Receive id"},
            {"id": "found", "type": "decision", "name": "Found?", "branches": [
                {"label": "yes", "steps": [{"id": "ok", "kind": "end", "label": "Return user"}]},
                {"label": "no", "steps": [{"id": "missing", "kind": "error", "label": "404"}]}
            ]}
        ]}"#;

        let analysis = parse_completion(&completion(content)).unwrap();
        assert_eq!(analysis.summary.as_deref(), Some("Loads a user"));
        assert_eq!(analysis.steps.len(), 2);
        assert_eq!(analysis.steps[1].kind, StepKind::Decision);
        assert_eq!(analysis.steps[1].branches[1].steps[0].id, "missing");
    }

    #[test]
    fn test_parse_completion_strips_fence() {
        let content = "```json\n{\"steps\": [{\"id\": \"s\", \"kind\": \"start\", \"label\": \"Go\"}]}\n```";
        let analysis = parse_completion(&completion(content)).unwrap();
        assert_eq!(analysis.steps[0].label, "Go");
    }

    #[test]
    fn test_malformed_responses() {
        assert!(matches!(
            parse_completion("<html>bad gateway</html>"),
            Err(CollaboratorError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_completion(r#"{"choices": []}"#),
            Err(CollaboratorError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_completion(&completion(r#"{"steps": [{"id": "x", "kind": "teleport", "label": "?"}]}"#)),
            Err(CollaboratorError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(status_error(StatusCode::UNAUTHORIZED, ""), CollaboratorError::Auth(_)));
        assert!(matches!(status_error(StatusCode::FORBIDDEN, ""), CollaboratorError::Auth(_)));
        assert!(matches!(status_error(StatusCode::TOO_MANY_REQUESTS, ""), CollaboratorError::RateLimit(_)));
        assert!(matches!(status_error(StatusCode::GATEWAY_TIMEOUT, ""), CollaboratorError::Timeout(_)));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            CollaboratorError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_factory() {
        let mut config = AnalysisConfig {
            api_key: Some("sk-test".to_string()),
            ..AnalysisConfig::default()
        };
        let analyzer = create_analyzer(&config).unwrap();
        assert_eq!(analyzer.provider_name(), "openai");

        config.provider = "carrier-pigeon".to_string();
        assert!(matches!(create_analyzer(&config), Err(CanvasError::Config(_))));
    }
}

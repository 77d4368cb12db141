//! Anthropic Messages API agent.

use super::{AgentError, AgentReply, ConversationAgent};
use crate::config::AgentConfig;
use crate::models::{Domain, Message, MessageRole, Session, SnapshotReport};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use std::time::Duration;

const API_VERSION: &str = "2023-06-01";

const BASE_PROMPT: &str = "You are the Atlas Readiness Guide, a warm but direct advisor who \
helps founders assess whether their business is ready for the next stage. You interview the \
founder across five domains, in this order: market, product, gtm (go-to-market), operations, \
financials. Ask one focused question at a time and move on once a domain is reasonably covered.";

pub struct AnthropicAgent {
    config: AgentConfig,
    client: Client,
}

impl AnthropicAgent {
    pub fn new(config: AgentConfig) -> Result<Self, AgentError> {
        if config.api_key.is_none() {
            return Err(AgentError::NotConfigured("AGENT_API_KEY is not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AgentError::NotConfigured(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(
        &self,
        system: String,
        messages: Vec<ApiMessage>,
    ) -> Result<String, AgentError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| AgentError::NotConfigured("AGENT_API_KEY is not set".to_string()))?;

        let request = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages,
        };

        tracing::debug!(
            model = %self.config.model,
            message_count = request.messages.len(),
            "Sending request to agent provider"
        );

        let response = self
            .client
            .traced_post(&self.api_url())
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(AgentError::RateLimited);
            }

            return Err(AgentError::ApiError(format!(
                "Provider error {}: {}",
                status, error_text
            )));
        }

        let api_response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AgentError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        if text.trim().is_empty() {
            return Err(AgentError::InvalidResponse(
                "Provider returned no text".to_string(),
            ));
        }

        Ok(text)
    }
}

#[async_trait]
impl ConversationAgent for AnthropicAgent {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn welcome_message(&self, session: &Session) -> Result<String, AgentError> {
        let system = format!(
            "{}\n\nWrite the opening message of the assessment: greet the founder, explain the \
             five domains in one or two sentences, then ask your first {} question. Plain text only.",
            BASE_PROMPT,
            session.current_domain.label().to_lowercase()
        );

        self.complete(system, vec![ApiMessage::user("Start the assessment.")])
            .await
    }

    async fn respond(
        &self,
        session: &Session,
        history: &[Message],
    ) -> Result<AgentReply, AgentError> {
        let system = format!(
            "{}\n\nThe conversation is currently in the \"{}\" domain. Reply with a single JSON \
             object and nothing else: {{\"reply\": \"<your message to the founder>\", \
             \"currentDomain\": \"<market|product|gtm|operations|financials>\"}}. Set \
             currentDomain to the domain your reply moves the conversation into.",
            BASE_PROMPT, session.current_domain
        );

        let text = self.complete(system, conversation(history)).await?;
        Ok(parse_reply(&text, session.current_domain))
    }

    async fn draft_snapshot(
        &self,
        _session: &Session,
        history: &[Message],
    ) -> Result<SnapshotReport, AgentError> {
        let system = format!(
            "{}\n\nYou are now writing the readiness snapshot for the conversation below. \
             Respond with a single JSON object and nothing else, shaped as: \
             {{\"keyFindings\": [{{\"finding\", \"domain\", \"confidence\": \"high|medium|low\"}}], \
             \"risks\": [{{\"description\", \"domain\"}}], \
             \"strengths\": [{{\"description\", \"domain\"}}], \
             \"nextSteps\": [{{\"priority\": 1, \"action\", \"rationale\", \"domain\"}}], \
             \"validationItems\": [{{\"sourceDomain\", \"sourceTopic\", \"title\", \"description\", \
             \"validationStep\"}}]}}. Domains are market, product, gtm, operations, financials.",
            BASE_PROMPT
        );

        let prompt = format!("Conversation transcript:\n\n{}", transcript(history));
        let text = self.complete(system, vec![ApiMessage::user(&prompt)]).await?;
        parse_report(&text)
    }
}

/// Provider turns must open with a user message.
fn conversation(history: &[Message]) -> Vec<ApiMessage> {
    let mut messages: Vec<ApiMessage> = history
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| ApiMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        })
        .collect();

    if messages.first().map(|m| m.role.as_str()) != Some("user") {
        messages.insert(0, ApiMessage::user("Start the assessment."));
    }
    messages
}

fn transcript(history: &[Message]) -> String {
    history
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Outermost JSON object in a completion, ignoring code fences and prose.
fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Falls back to the raw text and the current domain when the reply is not JSON.
fn parse_reply(text: &str, current: Domain) -> AgentReply {
    let parsed = extract_json(text).and_then(|json| serde_json::from_str::<ReplyPayload>(json).ok());

    match parsed {
        Some(payload) if !payload.reply.trim().is_empty() => AgentReply {
            content: payload.reply,
            current_domain: payload.current_domain.unwrap_or(current),
        },
        _ => {
            tracing::warn!("Agent reply was not structured, keeping current domain");
            AgentReply {
                content: text.trim().to_string(),
                current_domain: current,
            }
        }
    }
}

fn parse_report(text: &str) -> Result<SnapshotReport, AgentError> {
    let json = extract_json(text)
        .ok_or_else(|| AgentError::InvalidResponse("Snapshot was not JSON".to_string()))?;

    let report: SnapshotReport = serde_json::from_str(json)
        .map_err(|e| AgentError::InvalidResponse(format!("Malformed snapshot: {}", e)))?;

    if report.is_empty() {
        return Err(AgentError::InvalidResponse("Snapshot was empty".to_string()));
    }

    Ok(report.normalized())
}

// Messages API request/response types

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: String,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl ApiMessage {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyPayload {
    reply: String,
    #[serde(default)]
    current_domain: Option<Domain>,
}

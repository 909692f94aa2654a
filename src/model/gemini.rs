//! Google Gemini `generateContent` engine.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::WeaveConfig;
use crate::error::WeaveError;
use crate::types::{Generation, Message, Part, Role, ServerTool, ToolCall};
use crate::util::retry::RetryPolicy;

use super::http::{build_client, status_to_error};
use super::{GenerateRequest, ReasoningEngine};

pub const DEFAULT_BASE_URL: &str = crate::config::DEFAULT_GEMINI_BASE_URL;

const SERVICE: &str = "gemini";

pub struct GeminiEngine {
    model: String,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl GeminiEngine {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>) -> Result<Self, WeaveError> {
        Ok(Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: build_client(Duration::from_secs(120))?,
            retry: RetryPolicy::default(),
        })
    }

    /// Build from resolved configuration; fails if no API key is configured.
    pub fn from_config(config: &WeaveConfig) -> Result<Self, WeaveError> {
        let api_key = config.api_key().ok_or_else(|| {
            WeaveError::Configuration(
                "no Gemini API key configured (set GOOGLE_API_KEY or GEMINI_API_KEY)".into(),
            )
        })?;
        Ok(Self {
            model: config.model.clone(),
            api_key: api_key.to_string(),
            base_url: config.base_url.clone(),
            client: build_client(Duration::from_secs(config.request_timeout_secs))?,
            retry: config.retry.to_policy(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, request: &GenerateRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .context
            .iter()
            .filter(|msg| !msg.parts.is_empty())
            .map(message_to_content)
            .collect();

        let mut body = serde_json::Map::new();
        body.insert("contents".into(), json!(contents));

        if !request.instruction.is_empty() {
            body.insert(
                "systemInstruction".into(),
                json!({ "parts": [{ "text": request.instruction }] }),
            );
        }

        let settings = &request.settings;
        let mut gen_config = serde_json::Map::new();
        if let Some(max) = settings.max_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        if let Some(top_k) = settings.top_k {
            gen_config.insert("topK".into(), top_k.into());
        }
        if let Some(ref stops) = settings.stop_sequences {
            gen_config.insert("stopSequences".into(), json!(stops));
        }
        if !gen_config.is_empty() {
            body.insert("generationConfig".into(), serde_json::Value::Object(gen_config));
        }

        let mut tools = Vec::new();
        if !request.tools.is_empty() {
            let fn_decls: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    let mut decl = json!({ "name": t.name, "description": t.description });
                    // Gemini rejects object schemas with no properties.
                    if has_properties(&t.parameters) {
                        decl["parameters"] = t.parameters.clone();
                    }
                    decl
                })
                .collect();
            tools.push(json!({ "functionDeclarations": fn_decls }));
        }
        for server_tool in &settings.server_tools {
            tools.push(match server_tool {
                ServerTool::GoogleSearch => json!({ "googleSearch": {} }),
                ServerTool::CodeExecution => json!({ "codeExecution": {} }),
            });
        }
        if !tools.is_empty() {
            body.insert("tools".into(), json!(tools));
        }

        serde_json::Value::Object(body)
    }

    async fn generate_once(&self, body: &serde_json::Value) -> Result<Generation, WeaveError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(SERVICE, status, &body_text));
        }

        let data: GeminiResponse = resp.json().await?;
        let candidate = data.candidates.into_iter().next().ok_or_else(|| {
            let reason = data
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked: {r}"))
                .unwrap_or_else(|| "no candidates in response".to_string());
            WeaveError::upstream(SERVICE, reason)
        })?;

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(code) = part.executable_code {
                let language = code.language.unwrap_or_default().to_lowercase();
                push_block(&mut text, &language, &code.code);
            }
            if let Some(result) = part.code_execution_result {
                if let Some(output) = result.output.filter(|o| !o.is_empty()) {
                    push_block(&mut text, "", &output);
                }
                if result.outcome.as_deref().is_some_and(|o| o != "OUTCOME_OK") {
                    debug!(model = %self.model, outcome = ?result.outcome, "code execution did not succeed");
                }
            }
            if let Some(fc) = part.function_call {
                tool_calls.push(ToolCall::new(
                    fc.name,
                    fc.args.unwrap_or_else(|| json!({})),
                ));
            }
        }

        text.truncate(text.trim_end_matches('\n').len());

        let search_queries = candidate
            .grounding_metadata
            .map(|g| g.web_search_queries)
            .unwrap_or_default();
        debug!(
            model = %self.model,
            finish_reason = candidate.finish_reason.as_deref().unwrap_or("unknown"),
            tool_calls = tool_calls.len(),
            ?search_queries,
            "gemini response"
        );

        Ok(Generation { text, tool_calls })
    }
}

#[async_trait]
impl ReasoningEngine for GeminiEngine {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, WeaveError> {
        let body = self.build_request_body(request);
        debug!(model = %self.model, messages = request.context.len(), tools = request.tools.len(), "gemini generate");
        self.retry.execute(|| self.generate_once(&body)).await
    }
}

impl std::fmt::Debug for GeminiEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiEngine")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("retry", &self.retry)
            .finish()
    }
}

fn has_properties(schema: &serde_json::Value) -> bool {
    schema
        .get("properties")
        .and_then(serde_json::Value::as_object)
        .is_some_and(|props| !props.is_empty())
}

/// Append a fenced block, on its own lines, to generated text.
fn push_block(text: &mut String, language: &str, body: &str) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str("```");
    text.push_str(language);
    text.push('\n');
    text.push_str(body.trim_end_matches('\n'));
    text.push_str("\n```\n");
}

fn message_to_content(msg: &Message) -> serde_json::Value {
    let role = match msg.role {
        Role::Agent => "model",
        Role::User | Role::Tool => "user",
    };
    let parts: Vec<serde_json::Value> = msg
        .parts
        .iter()
        .map(|part| match part {
            Part::Text { text } => json!({ "text": text }),
            Part::ToolCall(call) => json!({
                "functionCall": { "name": call.name, "args": call.arguments }
            }),
            Part::ToolResult(result) => {
                // functionResponse.response must be an object
                let response = match &result.result {
                    serde_json::Value::Object(_) => result.result.clone(),
                    other => json!({ "result": other }),
                };
                json!({
                    "functionResponse": { "name": result.name, "response": response }
                })
            }
        })
        .collect();
    json!({ "role": role, "parts": parts })
}

// Internal Gemini response types

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
    grounding_metadata: Option<GeminiGroundingMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGroundingMetadata {
    #[serde(default)]
    web_search_queries: Vec<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
    executable_code: Option<GeminiExecutableCode>,
    code_execution_result: Option<GeminiCodeExecutionResult>,
}

#[derive(Deserialize)]
struct GeminiExecutableCode {
    language: Option<String>,
    code: String,
}

#[derive(Deserialize)]
struct GeminiCodeExecutionResult {
    outcome: Option<String>,
    output: Option<String>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

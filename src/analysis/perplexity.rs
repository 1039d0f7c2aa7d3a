use crate::analysis::generator::TextGenerator;
use crate::config::AnalysisConfig;
use crate::model::{Citation, Generation, GenerationError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const PERPLEXITY_URL: &str = "https://api.perplexity.ai/chat/completions";

pub struct PerplexityClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    frequency_penalty: f64,
    search_recency_filter: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    frequency_penalty: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    search_recency_filter: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
}

impl PerplexityClient {
    pub fn new(settings: &AnalysisConfig) -> Result<Self, GenerationError> {
        let api_key = settings.resolved_api_key().ok_or(GenerationError::MissingApiKey)?;
        let client = Client::builder()
            .user_agent("PriceOfGoodsBot/0.1")
            .build()?;

        Ok(Self {
            client,
            endpoint: PERPLEXITY_URL.to_string(),
            api_key,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            frequency_penalty: settings.frequency_penalty,
            search_recency_filter: settings.search_recency_filter.clone(),
        })
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            frequency_penalty: self.frequency_penalty,
            max_tokens: self.max_tokens,
            search_recency_filter: self.search_recency_filter.as_deref(),
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for PerplexityClient {
    fn provider(&self) -> &str {
        "perplexity"
    }

    async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        info!("📤 Requesting analysis from {} ({} chars)", self.model, prompt.len());

        let response = self.client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "unknown".into());
            warn!("❌ Perplexity API responded [{}]: {}", status, body);
            return Err(GenerationError::Api { status: status.as_u16(), body });
        }

        let body: ChatResponse = response.json().await?;
        into_generation(body)
    }
}

fn into_generation(response: ChatResponse) -> Result<Generation, GenerationError> {
    let markdown = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or(GenerationError::EmptyResponse)?;

    let citations = response
        .citations
        .iter()
        .enumerate()
        .map(|(i, url)| {
            let found = response.search_results.iter().find(|r| &r.url == url);
            Citation {
                id: i as u32 + 1,
                url: url.clone(),
                title: found
                    .and_then(|r| r.title.clone())
                    .unwrap_or_else(|| citation_title(url)),
                text: found.and_then(|r| r.snippet.clone()).unwrap_or_default(),
            }
        })
        .collect();

    Ok(Generation { markdown, citations })
}

/// Host name without `www.`, used when the service gives no title.
fn citation_title(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    host.trim_start_matches("www.").to_string()
}

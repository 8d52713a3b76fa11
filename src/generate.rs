//! Caption and overlay generation.
//!
//! [`TextGenerator`] is the collaborator seam; [`OpenAiGenerator`] talks to an
//! OpenAI-compatible chat completions endpoint with two requests per run: one
//! for the post caption and one for the short overlay phrase.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::GeneratorConfig;
use crate::types::{ContentKind, GeneratedText, HotelProfile};

const CAPTION_EXAMPLES: usize = 5;
const OVERLAY_EXAMPLES: usize = 3;
const OVERLAY_EXAMPLE_CHARS: usize = 100;

/// Produces caption + overlay for a run
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, profile: &HotelProfile, kind: ContentKind) -> Result<GeneratedText>;
}

/// One chat-completion request
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: &'static str,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Chat completions client
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    brand: String,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig) -> crate::error::Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| crate::error::PipelineError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            brand: config.brand.clone(),
        })
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.prompt},
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "n": 1,
        });
        debug!(
            "POST {}/chat/completions (model {}, max_tokens {})",
            self.api_base, self.model, request.max_tokens
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            bail!("chat completion API error {status}: {error}");
        }

        let api_response: serde_json::Value = response
            .json()
            .await
            .context("failed to parse chat completion response")?;

        let content = api_response["choices"][0]["message"]["content"]
            .as_str()
            .context("chat completion response has no message content")?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, profile: &HotelProfile, kind: ContentKind) -> Result<GeneratedText> {
        info!("Generating caption for {}", kind);
        let caption = self.complete(&caption_request(&self.brand, profile, kind)).await?;
        debug!("Caption: {}", caption);

        info!("Generating overlay text");
        let overlay = clean_overlay(&self.complete(&overlay_request(&self.brand, profile)).await?);
        debug!("Overlay: {}", overlay);

        Ok(GeneratedText { caption, overlay })
    }
}

fn kind_label(kind: ContentKind) -> &'static str {
    match kind {
        ContentKind::Video => "видео",
        ContentKind::Carousel => "карусели",
    }
}

/// Caption prompt: up to five full reference posts
#[must_use]
pub fn caption_request(brand: &str, profile: &HotelProfile, kind: ContentKind) -> ChatRequest {
    let examples = profile
        .reference_captions
        .iter()
        .take(CAPTION_EXAMPLES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let prompt = format!(
        "Ты - креативный копирайтер, создающий посты для Instagram отеля \"{brand}\".

ОПИСАНИЕ ОТЕЛЯ:
{description}

ПРИМЕРЫ СТИЛЯ (для референса):
{examples}

ЗАДАЧА:
Создай короткую цепляющую подпись для Instagram-{label} в том же стиле, что и примеры.

ТРЕБОВАНИЯ:
- Длина: 15-30 слов
- Стиль: легкий, приятный, привлекающий внимание
- Тон: дружелюбный, вдохновляющий
- Используй эмодзи умеренно
- Фокус на комфорте, расположении или удобствах отеля
- НЕ копируй примеры напрямую, создай новый уникальный текст

Ответь только текстом подписи, без дополнительных пояснений.",
        description = profile.description,
        label = kind_label(kind),
    );

    ChatRequest {
        system: "Ты - профессиональный копирайтер для отелей.",
        prompt,
        max_tokens: 200,
        temperature: 0.8,
    }
}

/// Overlay prompt: the first 100 characters of three reference posts
#[must_use]
pub fn overlay_request(brand: &str, profile: &HotelProfile) -> ChatRequest {
    let examples = profile
        .reference_captions
        .iter()
        .take(OVERLAY_EXAMPLES)
        .map(|p| p.chars().take(OVERLAY_EXAMPLE_CHARS).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "Ты - креативный копирайтер для отеля \"{brand}\".

ОПИСАНИЕ ОТЕЛЯ:
{description}

ПРИМЕРЫ СТИЛЯ:
{examples}

ЗАДАЧА:
Создай ОЧЕНЬ КОРОТКИЙ текст (3-7 слов) для наложения на видео.

ТРЕБОВАНИЯ:
- Длина: строго 3-7 слов
- Стиль: емкий, цепляющий
- Без эмодзи
- Фокус на одной ключевой идее: комфорт, отдых, удобства, расположение
- Примеры формата: \"Твой идеальный отдых\", \"Комфорт в центре города\", \"Здесь начинается отпуск\"

Ответь только текстом, без дополнительных пояснений.",
        description = profile.description,
    );

    ChatRequest {
        system: "Ты - профессиональный копирайтер.",
        prompt,
        max_tokens: 50,
        temperature: 0.9,
    }
}

/// Trim whitespace and surrounding quote characters from a model answer
#[must_use]
pub fn clean_overlay(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '«' | '»' | '“' | '”'))
        .trim()
        .to_string()
}

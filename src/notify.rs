//! Approval delivery.
//!
//! [`Notifier`] sends a finished artifact and its caption to a human approver
//! and returns as soon as the provider acknowledges the upload. The approve /
//! reject answer arrives later and is collected separately with
//! [`TelegramNotifier::poll_decisions`].

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::TelegramConfig;
use crate::types::{ApprovalDecision, DeliveryAck};

/// Telegram's limit for media captions
pub const MAX_CAPTION_CHARS: usize = 1024;

const APPROVE_PREFIX: &str = "approve:";
const REJECT_PREFIX: &str = "reject:";

/// Delivers an artifact for approval
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `artifact` with `caption`; `tag` identifies the run in replies
    async fn deliver(&self, artifact: &Path, caption: &str, tag: &str) -> Result<DeliveryAck>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    message: Option<CallbackMessage>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackMessage {
    message_id: i64,
    chat: Chat,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    date: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Telegram Bot API notifier
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
    next_offset: Mutex<Option<i64>>,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> crate::error::Result<Self> {
        let (token, chat_id) = config.require()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| crate::error::PipelineError::Configuration(format!("http client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
            next_offset: Mutex::new(None),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    async fn call_json<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Telegram {method} request failed"))?;
        parse_response(method, response).await
    }

    /// Fetch pending approve/reject button presses.
    ///
    /// Each press is acknowledged and the original message caption is
    /// prefixed with the verdict. Presses from other chats and unrelated
    /// callbacks are skipped.
    pub async fn poll_decisions(&self) -> Result<Vec<ApprovalDecision>> {
        let offset = self.next_offset.lock().ok().and_then(|o| *o);
        let mut body = serde_json::json!({
            "timeout": 0,
            "allowed_updates": ["callback_query"],
        });
        if let Some(offset) = offset {
            body["offset"] = offset.into();
        }

        let updates: Vec<Update> = self.call_json("getUpdates", &body).await?;
        debug!("getUpdates returned {} update(s)", updates.len());

        let mut decisions = Vec::new();
        let mut max_id = None;
        for update in updates {
            max_id = Some(max_id.map_or(update.update_id, |m: i64| m.max(update.update_id)));
            let Some(query) = update.callback_query else {
                continue;
            };
            let Some((approved, tag)) = query.data.as_deref().and_then(parse_callback) else {
                continue;
            };
            if let Some(message) = &query.message {
                if message.chat.id.to_string() != self.chat_id {
                    debug!("Ignoring callback from chat {}", message.chat.id);
                    continue;
                }
            }

            let verdict = if approved { "✅ Видео одобрено!" } else { "❌ Видео отклонено" };
            self.acknowledge(&query, verdict).await;

            info!(
                "Run {} {} by {}",
                tag,
                if approved { "approved" } else { "rejected" },
                query.from.id
            );
            decisions.push(ApprovalDecision {
                run_tag: tag.to_string(),
                approved,
                decided_by: Some(
                    query
                        .from
                        .username
                        .clone()
                        .unwrap_or_else(|| query.from.id.to_string()),
                ),
                decided_at: query
                    .message
                    .as_ref()
                    .and_then(|m| m.date)
                    .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                    .unwrap_or_else(Utc::now),
            });
        }

        if let Some(max_id) = max_id {
            let next = max_id + 1;
            if let Ok(mut guard) = self.next_offset.lock() {
                *guard = Some(next);
            }
            // Confirm so the same presses are not returned to the next process
            let confirm = serde_json::json!({ "offset": next, "timeout": 0, "limit": 1 });
            if let Err(e) = self.call_json::<Vec<serde_json::Value>>("getUpdates", &confirm).await {
                warn!("Failed to confirm updates: {e:#}");
            }
        }

        Ok(decisions)
    }

    async fn acknowledge(&self, query: &CallbackQuery, verdict: &str) {
        let answer = serde_json::json!({ "callback_query_id": query.id, "text": verdict });
        if let Err(e) = self.call_json::<bool>("answerCallbackQuery", &answer).await {
            warn!("answerCallbackQuery failed: {e:#}");
        }

        if let Some(message) = &query.message {
            let caption = truncate_caption(&format!(
                "{verdict}\n\n{}",
                message.caption.as_deref().unwrap_or_default()
            ));
            let edit = serde_json::json!({
                "chat_id": message.chat.id,
                "message_id": message.message_id,
                "caption": caption,
            });
            if let Err(e) = self
                .call_json::<serde_json::Value>("editMessageCaption", &edit)
                .await
            {
                warn!("editMessageCaption failed: {e:#}");
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, artifact: &Path, caption: &str, tag: &str) -> Result<DeliveryAck> {
        let data = tokio::fs::read(artifact)
            .await
            .with_context(|| format!("Failed to read {}", artifact.display()))?;
        let file_name = artifact
            .file_name()
            .map_or_else(|| "video.mp4".to_string(), |n| n.to_string_lossy().to_string());
        let size = data.len();

        let video = reqwest::multipart::Part::bytes(data)
            .file_name(file_name)
            .mime_str("video/mp4")?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", approval_message(caption))
            .text("supports_streaming", "true")
            .text("reply_markup", approval_keyboard(tag).to_string())
            .part("video", video);

        debug!("sendVideo {} ({} bytes)", artifact.display(), size);
        let response = self
            .client
            .post(self.method_url("sendVideo"))
            .multipart(form)
            .send()
            .await
            .context("Telegram sendVideo request failed")?;

        let sent: SentMessage = parse_response("sendVideo", response).await?;
        info!("Sent {} for approval (message {})", tag, sent.message_id);

        Ok(DeliveryAck {
            message_id: Some(sent.message_id),
            delivered_at: Utc::now(),
        })
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .with_context(|| format!("Failed to read Telegram {method} response"))?;
    let parsed: ApiResponse<T> = serde_json::from_str(&text)
        .with_context(|| format!("Telegram {method} returned {status}: {text}"))?;
    if !parsed.ok {
        bail!(
            "Telegram {method} failed ({status}): {}",
            parsed.description.unwrap_or_default()
        );
    }
    parsed
        .result
        .with_context(|| format!("Telegram {method} response has no result"))
}

/// Message shown above the approve / reject buttons
#[must_use]
pub fn approval_message(caption: &str) -> String {
    truncate_caption(&format!(
        "📹 Новое видео для одобрения\n\n📝 Подпись для Instagram:\n{caption}\n\nПожалуйста, просмотрите видео и выберите действие:"
    ))
}

/// Inline keyboard with approve / reject buttons bound to `tag`
#[must_use]
pub fn approval_keyboard(tag: &str) -> serde_json::Value {
    serde_json::json!({
        "inline_keyboard": [[
            {"text": "✅ Одобрить", "callback_data": format!("{APPROVE_PREFIX}{tag}")},
            {"text": "❌ Отклонить", "callback_data": format!("{REJECT_PREFIX}{tag}")},
        ]]
    })
}

/// Parse button callback data into (approved, run tag)
#[must_use]
pub fn parse_callback(data: &str) -> Option<(bool, &str)> {
    let (approved, tag) = if let Some(tag) = data.strip_prefix(APPROVE_PREFIX) {
        (true, tag)
    } else if let Some(tag) = data.strip_prefix(REJECT_PREFIX) {
        (false, tag)
    } else {
        return None;
    };
    (!tag.is_empty()).then_some((approved, tag))
}

fn truncate_caption(text: &str) -> String {
    if text.chars().count() <= MAX_CAPTION_CHARS {
        return text.to_string();
    }
    let mut out: String = text.chars().take(MAX_CAPTION_CHARS - 1).collect();
    out.push('…');
    out
}

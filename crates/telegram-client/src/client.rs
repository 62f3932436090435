//! Telegram Bot API HTTP client.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::error::{BotApiError, PartialPost};
use crate::types::{
    split_media_groups, AnswerCallbackParams, Chat, ChatMember, ChatRef, DeleteMessageParams,
    ForwardMessageParams, GetChatMemberParams, GetChatParams, GetUpdatesParams, InputMedia,
    Message, SendMediaGroupParams, SendMessageParams, Update, User,
};

/// Request timeout. Must exceed the long-polling timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Bot API response envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i32>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Client for the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    config: BotConfig,
}

impl TelegramClient {
    /// Build a client without contacting the server.
    pub fn new(config: BotConfig) -> Result<Self, BotApiError> {
        if config.token.trim().is_empty() {
            return Err(BotApiError::Config("bot token is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(BotApiError::Http)?;

        Ok(Self { http, config })
    }

    /// Build a client and verify the token with `getMe`.
    pub async fn connect(config: BotConfig) -> Result<Self, BotApiError> {
        let client = Self::new(config)?;
        let me = client.get_me().await?;
        info!(
            "Connected to Bot API at {} as @{}",
            client.config.api_url,
            me.username.as_deref().unwrap_or("<unnamed>")
        );
        Ok(client)
    }

    /// Get the bot's own user record.
    pub async fn get_me(&self) -> Result<User, BotApiError> {
        self.call::<(), _>("getMe", None).await
    }

    /// Fetch pending updates (long polling).
    pub async fn get_updates(&self, params: &GetUpdatesParams) -> Result<Vec<Update>, BotApiError> {
        self.call("getUpdates", Some(params)).await
    }

    /// Send a message using the full parameter structure.
    pub async fn send_message(&self, params: &SendMessageParams) -> Result<Message, BotApiError> {
        self.call("sendMessage", Some(params)).await
    }

    /// Send a plain text message.
    pub async fn send_text(
        &self,
        chat_id: impl Into<ChatRef>,
        text: &str,
    ) -> Result<Message, BotApiError> {
        self.send_message(&SendMessageParams::text(chat_id, text)).await
    }

    /// Send one photo, video or document by file id.
    pub async fn send_single(
        &self,
        chat_id: impl Into<ChatRef>,
        media: &InputMedia,
    ) -> Result<Message, BotApiError> {
        let (method, field) = media.single_method();
        let body = media.body();
        let chat_id: ChatRef = chat_id.into();

        let mut params = serde_json::Map::new();
        params.insert("chat_id".to_string(), serde_json::to_value(&chat_id)?);
        params.insert(field.to_string(), serde_json::Value::String(body.media.clone()));
        if let Some(ref caption) = body.caption {
            params.insert("caption".to_string(), serde_json::Value::String(caption.clone()));
        }

        self.call(method, Some(&params)).await
    }

    /// Send one media group (2 to 10 compatible items).
    pub async fn send_media_group(
        &self,
        chat_id: impl Into<ChatRef>,
        media: Vec<InputMedia>,
    ) -> Result<Vec<Message>, BotApiError> {
        let params = SendMediaGroupParams {
            chat_id: chat_id.into(),
            media,
        };
        self.call("sendMediaGroup", Some(&params)).await
    }

    /// Send a post of any size: one item goes out as a single message,
    /// more are split into compatible media groups sent in order.
    ///
    /// Stops at the first failing group. The error keeps the messages that
    /// earlier groups already produced, since those stay in the chat.
    pub async fn send_post(
        &self,
        chat_id: impl Into<ChatRef>,
        media: Vec<InputMedia>,
    ) -> Result<Vec<Message>, PartialPost> {
        if media.is_empty() {
            return Err(PartialPost::nothing_sent(BotApiError::EmptyMedia));
        }
        let chat_id = chat_id.into();

        let mut sent = Vec::with_capacity(media.len());
        for group in split_media_groups(media) {
            let result = if group.len() == 1 {
                self.send_single(chat_id.clone(), &group[0])
                    .await
                    .map(|message| vec![message])
            } else {
                self.send_media_group(chat_id.clone(), group).await
            };

            match result {
                Ok(messages) => sent.extend(messages),
                Err(e) => {
                    if !sent.is_empty() {
                        warn!(
                            "Post to {} stopped after {} message(s): {}",
                            chat_id,
                            sent.len(),
                            e
                        );
                    }
                    return Err(PartialPost::after(sent, e));
                }
            }
        }
        Ok(sent)
    }

    /// Forward a message to another chat.
    pub async fn forward_message(
        &self,
        chat_id: impl Into<ChatRef>,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<Message, BotApiError> {
        let params = ForwardMessageParams {
            chat_id: chat_id.into(),
            from_chat_id,
            message_id,
        };
        self.call("forwardMessage", Some(&params)).await
    }

    /// Delete a message.
    pub async fn delete_message(
        &self,
        chat_id: impl Into<ChatRef>,
        message_id: i32,
    ) -> Result<(), BotApiError> {
        let params = DeleteMessageParams {
            chat_id: chat_id.into(),
            message_id,
        };
        let _: bool = self.call("deleteMessage", Some(&params)).await?;
        Ok(())
    }

    /// Look up a chat by id or public `@username`.
    pub async fn get_chat(&self, chat_id: impl Into<ChatRef>) -> Result<Chat, BotApiError> {
        let params = GetChatParams {
            chat_id: chat_id.into(),
        };
        self.call("getChat", Some(&params)).await
    }

    /// Look up a user's membership in a chat or channel.
    pub async fn get_chat_member(
        &self,
        chat_id: impl Into<ChatRef>,
        user_id: i64,
    ) -> Result<ChatMember, BotApiError> {
        let params = GetChatMemberParams {
            chat_id: chat_id.into(),
            user_id,
        };
        self.call("getChatMember", Some(&params)).await
    }

    /// Answer a callback query, optionally with a toast or alert.
    pub async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<(), BotApiError> {
        let params = AnswerCallbackParams {
            callback_query_id: callback_query_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        };
        let _: bool = self.call("answerCallbackQuery", Some(&params)).await?;
        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Call a Bot API method.
    async fn call<P: Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<&P>,
    ) -> Result<R, BotApiError> {
        let url = self.config.method_url(method);
        debug!("Bot API call: {}", method);

        let mut request = self.http.post(&url);
        if let Some(params) = params {
            request = request.json(params);
        }

        let response = request.send().await.map_err(BotApiError::Http)?;
        let status = response.status();
        let body = response.text().await.map_err(BotApiError::Http)?;

        // Error responses carry a JSON envelope too; only bail on bodies that
        // are not one.
        let envelope: ApiResponse<R> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(BotApiError::Json(e)),
            Err(_) => {
                return Err(BotApiError::Connection(format!("HTTP {}: {}", status, body)));
            }
        };

        if !envelope.ok {
            let code = envelope.error_code.unwrap_or(status.as_u16() as i32);
            let description = envelope
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            warn!("Bot API {} failed: {} {}", method, code, description);
            return Err(BotApiError::Api {
                code,
                description,
                retry_after: envelope.parameters.and_then(|p| p.retry_after),
            });
        }

        envelope.result.ok_or_else(|| BotApiError::Api {
            code: -1,
            description: "No result in response".to_string(),
            retry_after: None,
        })
    }
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("config", &self.config)
            .finish()
    }
}

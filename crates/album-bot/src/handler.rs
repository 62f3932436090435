//! Update routing: uploads, deep links, group buttons and admin commands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use album_core::{AccessMode, AlbumPipeline, CoreError, PublishError, UploadEvent};
use futures::StreamExt;
use telegram_client::{
    subscribe, BotApiError, CallbackQuery, ChatRef, Message, PollingConfig, SendMessageParams,
    TelegramClient, Update,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::commands::{extract_key, parse_target, CallbackAction, Command, Target};
use crate::config::Config;
use crate::replies;
use crate::routing::{route_message, Route};

/// Routes updates to the album pipeline and answers users.
pub struct BotHandler {
    client: TelegramClient,
    pipeline: Arc<AlbumPipeline>,
    config: Arc<Config>,
    bot_username: String,
}

impl BotHandler {
    pub fn new(
        client: TelegramClient,
        pipeline: Arc<AlbumPipeline>,
        config: Arc<Config>,
        bot_username: impl Into<String>,
    ) -> Self {
        Self {
            client,
            pipeline,
            config,
            bot_username: bot_username.into(),
        }
    }

    /// Poll for updates until `shutdown` completes or polling gives up.
    ///
    /// Uploads are handled in arrival order; everything else runs on its
    /// own task so a slow publish does not hold up polling.
    pub async fn run_with_shutdown<S>(self: Arc<Self>, shutdown: S) -> Result<(), BotApiError>
    where
        S: Future<Output = ()> + Send,
    {
        info!("Starting update loop as @{}", self.bot_username);
        let mut stream = subscribe(&self.client, PollingConfig::default());
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping update loop");
                    self.pipeline.shutdown().await;
                    return Ok(());
                }

                result = stream.next() => {
                    match result {
                        Some(Ok(update)) => self.dispatch(update).await,
                        Some(Err(e)) => {
                            error!("Update stream error: {}", e);
                        }
                        None => {
                            warn!("Update stream ended");
                            self.pipeline.shutdown().await;
                            return Err(BotApiError::Connection(
                                "update polling gave up".to_string(),
                            ));
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(self: &Arc<Self>, update: Update) {
        let update_id = update.update_id;
        let handler = Arc::clone(self);

        if let Some(message) = update.message {
            match route_message(&message, &self.config, &self.bot_username) {
                Route::Upload(media) => self.pipeline.aggregator.ingest(media).await,
                Route::Ignore => {}
                route => {
                    tokio::spawn(async move {
                        if let Err(e) = handler.handle_route(&message, route).await {
                            warn!(update_id, "Failed to handle message: {}", e);
                        }
                    });
                }
            }
        } else if let Some(query) = update.callback_query {
            tokio::spawn(async move {
                if let Err(e) = handler.handle_callback(query).await {
                    warn!(update_id, "Failed to handle callback: {}", e);
                }
            });
        }
    }

    /// Handle a routed message other than an upload.
    pub async fn handle_route(&self, message: &Message, route: Route) -> Result<(), BotApiError> {
        match route {
            Route::Upload(media) => {
                self.pipeline.aggregator.ingest(media).await;
                Ok(())
            }
            Route::Command { sender, command } => {
                self.handle_command(message, sender, command).await
            }
            Route::GroupPaste {
                key,
                chat_id,
                message_id,
            } => self.handle_group_paste(&key, chat_id, message_id).await,
            Route::Ignore => Ok(()),
        }
    }

    async fn handle_command(
        &self,
        message: &Message,
        sender: i64,
        command: Command,
    ) -> Result<(), BotApiError> {
        let chat_id = message.chat.id;

        match command {
            Command::Start(payload) => {
                if !message.chat.is_private() {
                    return Ok(());
                }
                match payload.as_deref().and_then(extract_key) {
                    Some(key) => self.publish_from_dm(chat_id, sender, &key).await,
                    None if payload.is_some() => self.reply(message, replies::KEY_UNKNOWN).await,
                    None => self.reply(message, replies::GREETING).await,
                }
            }
            Command::Publish(arg) => {
                if chat_id != self.config.group_id {
                    return self.reply(message, replies::WRONG_CHAT).await;
                }
                let Some(key) = arg.as_deref().and_then(extract_key) else {
                    return self.reply(message, &replies::usage("publish")).await;
                };
                if !self.key_exists(&key).await {
                    return self.reply(message, replies::KEY_UNKNOWN).await;
                }
                self.post_open_button(&key).await?;
                self.reply(message, replies::BUTTON_PUBLISHED).await
            }
            Command::ModeOn => {
                let result = self
                    .pipeline
                    .settings
                    .set_access_mode(AccessMode::Restricted)
                    .await;
                let text = settings_reply(result, replies::MODE_ON);
                self.reply(message, &text).await
            }
            Command::ModeOff => {
                let result = self.pipeline.settings.set_access_mode(AccessMode::Open).await;
                let text = settings_reply(result, replies::MODE_OFF);
                self.reply(message, &text).await
            }
            Command::Allow(arg) => {
                let user = match self.resolve_target(message, "allow", arg.as_deref()).await {
                    Ok(user) => user,
                    Err(text) => return self.reply(message, &text).await,
                };
                let text = match self.pipeline.access.allow(user).await {
                    Ok(_) => replies::allowed(user),
                    Err(e) => failure_text(&e),
                };
                self.reply(message, &text).await
            }
            Command::Disallow(arg) => {
                let user = match self.resolve_target(message, "disallow", arg.as_deref()).await {
                    Ok(user) => user,
                    Err(text) => return self.reply(message, &text).await,
                };
                let text = match self.pipeline.access.disallow(user).await {
                    Ok(_) => replies::disallowed(user),
                    Err(e) => failure_text(&e),
                };
                self.reply(message, &text).await
            }
            Command::ListAllowed => {
                let text = match self.pipeline.access.allowed().await {
                    Ok(users) => replies::allowed_list(&users),
                    Err(e) => failure_text(&e),
                };
                self.reply(message, &text).await
            }
            Command::SetDeleteTime(arg) => {
                let Some(seconds) = arg.as_deref().and_then(|a| a.parse::<u64>().ok()) else {
                    return self.reply(message, &replies::usage("set_delete_time")).await;
                };
                let text = match self
                    .pipeline
                    .settings
                    .set_delete_after(Duration::from_secs(seconds))
                    .await
                {
                    Ok(_) => replies::delete_time_set(seconds),
                    Err(CoreError::DeleteDelayTooShort { minimum, .. }) => {
                        replies::delete_time_too_short(minimum)
                    }
                    Err(e) => failure_text(&e),
                };
                self.reply(message, &text).await
            }
            Command::SubOn(arg) => {
                let Some(channel) = arg.as_deref().and_then(ChatRef::parse_public) else {
                    return self.reply(message, &replies::usage("sub_on")).await;
                };
                // Stored as `@name` or an id so membership lookups resolve
                let channel = channel.to_string();
                let text = match self
                    .pipeline
                    .settings
                    .enable_subscription_gate(channel.clone())
                    .await
                {
                    Ok(_) => replies::sub_on(&channel),
                    Err(e) => failure_text(&e),
                };
                self.reply(message, &text).await
            }
            Command::SubOff => {
                let result = self.pipeline.settings.disable_subscription_gate().await;
                let text = settings_reply(result, replies::SUB_OFF);
                self.reply(message, &text).await
            }
            Command::Status => {
                let settings = self.pipeline.settings.current().await;
                let allowed = self
                    .pipeline
                    .access
                    .allowed()
                    .await
                    .map(|users| users.len())
                    .unwrap_or_default();
                let text = replies::status(
                    &settings,
                    allowed,
                    self.pipeline.aggregator.pending_groups(),
                );
                self.reply(message, &text).await
            }
        }
    }

    /// Turn a pasted key or deep link from an admin into an "Open album" button.
    async fn handle_group_paste(
        &self,
        key: &str,
        chat_id: i64,
        message_id: i32,
    ) -> Result<(), BotApiError> {
        if !self.key_exists(key).await {
            return Ok(());
        }

        self.post_open_button(key).await?;
        if let Err(e) = self.client.delete_message(chat_id, message_id).await {
            debug!("Could not delete pasted key message: {}", e);
        }
        Ok(())
    }

    async fn handle_callback(&self, query: CallbackQuery) -> Result<(), BotApiError> {
        let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
            return self
                .client
                .answer_callback_query(&query.id, Some(replies::INVALID_BUTTON), false)
                .await;
        };

        let requester = query.from.id;
        match self.pipeline.publish_by_key(requester, action.key()).await {
            Ok(receipt) => {
                self.client
                    .answer_callback_query(
                        &query.id,
                        replies::publish_toast(&receipt).as_deref(),
                        false,
                    )
                    .await?;
                // The subscription prompt has served its purpose
                if let (CallbackAction::Verify(_), Some(prompt)) = (&action, &query.message) {
                    if let Err(e) = self
                        .client
                        .delete_message(prompt.chat.id, prompt.message_id)
                        .await
                    {
                        debug!("Could not delete subscription prompt: {}", e);
                    }
                }
                Ok(())
            }
            Err(error) => {
                let text = replies::publish_error(&error);
                self.client
                    .answer_callback_query(&query.id, Some(&text), replies::is_alert(&error))
                    .await?;

                if let (PublishError::SubscriptionRequired { channel }, CallbackAction::Open(key)) =
                    (&error, &action)
                {
                    if let Some(origin) = &query.message {
                        let params = SendMessageParams::text(origin.chat.id, text.clone())
                            .with_keyboard(replies::subscription_keyboard(channel, key));
                        self.client.send_message(&params).await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Publish a deep-linked key into the group and report back in the DM.
    async fn publish_from_dm(
        &self,
        chat_id: i64,
        requester: i64,
        key: &str,
    ) -> Result<(), BotApiError> {
        match self.pipeline.publish_by_key(requester, key).await {
            Ok(receipt) => {
                let text = replies::publish_toast(&receipt)
                    .unwrap_or_else(|| replies::DELIVERED.to_string());
                let note = self.client.send_text(chat_id, &text).await?;
                self.delete_later(chat_id, note.message_id, replies::NOTE_LIFETIME);
                Ok(())
            }
            Err(error) => {
                let text = replies::publish_error(&error);
                let mut params = SendMessageParams::text(chat_id, text);
                if let PublishError::SubscriptionRequired { channel } = &error {
                    params = params.with_keyboard(replies::subscription_keyboard(channel, key));
                }
                self.client.send_message(&params).await?;
                Ok(())
            }
        }
    }

    async fn post_open_button(&self, key: &str) -> Result<(), BotApiError> {
        let params = SendMessageParams::text(self.config.group_id, replies::BUTTON_CARRIER)
            .with_keyboard(replies::open_album_keyboard(key));
        self.client.send_message(&params).await?;
        info!(key, "Posted open-album button");
        Ok(())
    }

    async fn key_exists(&self, key: &str) -> bool {
        match self.pipeline.store.resolve(key).await {
            Ok(found) => found.is_some(),
            Err(e) => {
                warn!(key, "Key lookup failed: {}", e);
                false
            }
        }
    }

    /// Target of `/allow` or `/disallow`: the replied-to user, else the argument.
    ///
    /// Returns the reply text on failure.
    async fn resolve_target(
        &self,
        message: &Message,
        command: &str,
        arg: Option<&str>,
    ) -> Result<i64, String> {
        if let Some(user) = message
            .reply_to_message
            .as_ref()
            .and_then(|replied| replied.sender_id())
        {
            return Ok(user);
        }

        match arg.and_then(parse_target) {
            Some(Target::Id(user)) => Ok(user),
            Some(Target::Username(name)) => match self.client.get_chat(ChatRef::Username(name)).await {
                Ok(chat) => Ok(chat.id),
                Err(e) => {
                    debug!("Username lookup failed: {}", e);
                    Err(replies::CANNOT_RESOLVE.to_string())
                }
            },
            None => Err(replies::usage(command)),
        }
    }

    async fn reply(&self, message: &Message, text: &str) -> Result<(), BotApiError> {
        let params = SendMessageParams::html(message.chat.id, text).replying_to(message.message_id);
        self.client.send_message(&params).await?;
        Ok(())
    }

    fn delete_later(&self, chat_id: i64, message_id: i32, after: Duration) {
        let client = self.client.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Err(e) = client.delete_message(chat_id, message_id).await {
                debug!("Could not delete note: {}", e);
            }
        });
    }
}

fn settings_reply<T>(result: Result<T, CoreError>, ok: &str) -> String {
    match result {
        Ok(_) => ok.to_string(),
        Err(e) => failure_text(&e),
    }
}

fn failure_text(error: &CoreError) -> String {
    error!("Admin command failed: {}", error);
    format!("⚠️ Failed: {}", replies::escape_html(&error.to_string()))
}

/// Tell uploaders the key of each stored upload, until the pipeline is dropped.
pub async fn run_upload_notifier(
    client: TelegramClient,
    mut events: mpsc::UnboundedReceiver<UploadEvent>,
    bot_username: String,
) {
    while let Some(event) = events.recv().await {
        let (chat_id, text) = match &event {
            UploadEvent::Finalized(upload) => {
                (upload.chat_id, replies::upload_saved(upload, &bot_username))
            }
            UploadEvent::Failed(failed) => (failed.chat_id, replies::upload_failed(failed)),
        };

        if let Err(e) = client
            .send_message(&SendMessageParams::html(chat_id, text))
            .await
        {
            warn!(chat_id, "Failed to notify uploader: {}", e);
        }
    }
    debug!("Upload event channel closed");
}

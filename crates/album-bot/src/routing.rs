//! Decides what an incoming message asks of the bot.

use album_core::InboundMedia;
use telegram_client::Message;

use crate::commands::{extract_key, Command};
use crate::config::Config;
use crate::inbound::inbound_media;

/// Where a message is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Media an admin sent the bot privately.
    Upload(InboundMedia),
    Command { sender: i64, command: Command },
    /// A key or deep link an admin pasted into the group. The paste itself
    /// is removed once the button is up.
    GroupPaste {
        key: String,
        chat_id: i64,
        message_id: i32,
    },
    Ignore,
}

/// Only admins upload, and only in a private chat with the bot.
pub fn is_admin_upload(message: &Message, config: &Config) -> bool {
    message.chat.is_private()
        && message.text.is_none()
        && message.sender_id().is_some_and(|id| config.is_admin(id))
}

/// Key pasted as plain text or hidden behind a text link.
pub fn pasted_key(message: &Message) -> Option<String> {
    message
        .text
        .as_deref()
        .and_then(extract_key)
        .or_else(|| message.text_links().find_map(extract_key))
}

pub fn route_message(message: &Message, config: &Config, bot_username: &str) -> Route {
    let Some(sender) = message.sender_id() else {
        return Route::Ignore;
    };

    if is_admin_upload(message, config) {
        return inbound_media(message).map_or(Route::Ignore, Route::Upload);
    }

    let text = message.text.as_deref().unwrap_or_default();
    if let Some(command) = Command::parse(text, Some(bot_username)) {
        if command.is_admin_only() && !config.is_admin(sender) {
            return Route::Ignore;
        }
        return Route::Command { sender, command };
    }

    if message.chat.id == config.group_id && config.is_admin(sender) {
        if let Some(key) = pasted_key(message) {
            return Route::GroupPaste {
                key,
                chat_id: message.chat.id,
                message_id: message.message_id,
            };
        }
    }

    // Anything else, including private chatter from non-admins
    Route::Ignore
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use telegram_client::{Chat, MessageEntity, PhotoSize, User};

    const GROUP: i64 = -1001;
    const ADMIN: i64 = 11;
    const STRANGER: i64 = 99;
    const KEY: &str = "xK3-p9QaZ0w";

    fn config() -> Config {
        let vars: HashMap<&str, &str> = [
            ("BOT_TOKEN", "123:abc"),
            ("GROUP_ID", "-1001"),
            ("ADMINS", "11"),
        ]
        .into_iter()
        .collect();
        Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap()
    }

    fn message(from: i64, chat_id: i64) -> Message {
        Message {
            message_id: 7,
            from: Some(User {
                id: from,
                ..Default::default()
            }),
            chat: Chat {
                id: chat_id,
                kind: if chat_id > 0 { "private" } else { "supergroup" }.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn photo(from: i64, chat_id: i64) -> Message {
        let mut message = message(from, chat_id);
        message.photo = vec![PhotoSize {
            file_id: "AgAC".to_string(),
            ..Default::default()
        }];
        message
    }

    fn text(from: i64, chat_id: i64, body: &str) -> Message {
        let mut message = message(from, chat_id);
        message.text = Some(body.to_string());
        message
    }

    fn route(message: &Message) -> Route {
        route_message(message, &config(), "AlbumBot")
    }

    #[test]
    fn test_admin_private_media_is_an_upload() {
        match route(&photo(ADMIN, ADMIN)) {
            Route::Upload(media) => {
                assert_eq!(media.uploader, ADMIN);
                assert_eq!(media.item.file_id, "AgAC");
            }
            other => panic!("expected upload, got {other:?}"),
        }
    }

    #[test]
    fn test_media_from_non_admin_or_group_is_ignored() {
        assert_eq!(route(&photo(STRANGER, STRANGER)), Route::Ignore);
        assert_eq!(route(&photo(ADMIN, GROUP)), Route::Ignore);
        assert!(!is_admin_upload(&photo(ADMIN, GROUP), &config()));
    }

    #[test]
    fn test_non_admin_private_messages_are_ignored() {
        assert_eq!(route(&text(STRANGER, STRANGER, "hello")), Route::Ignore);
        assert_eq!(route(&text(STRANGER, STRANGER, KEY)), Route::Ignore);
        assert_eq!(route(&text(STRANGER, STRANGER, "/mode_on")), Route::Ignore);
    }

    #[test]
    fn test_anyone_may_start_but_only_admins_administer() {
        assert_eq!(
            route(&text(STRANGER, STRANGER, &format!("/start {KEY}"))),
            Route::Command {
                sender: STRANGER,
                command: Command::Start(Some(KEY.to_string())),
            }
        );
        assert_eq!(
            route(&text(ADMIN, ADMIN, "/mode_on")),
            Route::Command {
                sender: ADMIN,
                command: Command::ModeOn,
            }
        );
    }

    #[test]
    fn test_admin_paste_in_group_becomes_button() {
        let link = format!("https://t.me/AlbumBot?start={KEY}");
        assert_eq!(
            route(&text(ADMIN, GROUP, &link)),
            Route::GroupPaste {
                key: KEY.to_string(),
                chat_id: GROUP,
                message_id: 7,
            }
        );
    }

    #[test]
    fn test_admin_paste_behind_text_link() {
        let mut message = text(ADMIN, GROUP, "open this");
        message.entities = vec![MessageEntity {
            kind: "text_link".to_string(),
            offset: 0,
            length: 9,
            url: Some(format!("https://t.me/AlbumBot?start={KEY}")),
        }];
        assert!(matches!(
            route(&message),
            Route::GroupPaste { key, .. } if key == KEY
        ));
    }

    #[test]
    fn test_pastes_outside_rules_are_ignored() {
        // Non-admin in the group
        assert_eq!(route(&text(STRANGER, GROUP, KEY)), Route::Ignore);
        // Admin pasting privately
        assert_eq!(route(&text(ADMIN, ADMIN, KEY)), Route::Ignore);
        // Admin chatting in the group
        assert_eq!(route(&text(ADMIN, GROUP, "hi all")), Route::Ignore);
    }
}

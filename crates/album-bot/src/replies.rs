//! User-facing texts and keyboards.

use std::time::Duration;

use album_core::{FinalizedUpload, PublishError, PublishReceipt, Settings, UploadFailed};
use telegram_client::{start_link, ChatRef, InlineKeyboardButton, InlineKeyboardMarkup};

use crate::commands::CallbackAction;

pub const GREETING: &str =
    "Hi! This bot only sends albums inside the group. Please use the album buttons there.";
pub const DELIVERED: &str = "Album delivered to the group.";
pub const WRONG_CHAT: &str = "Please run this command inside the target group.";
pub const BUTTON_PUBLISHED: &str = "Published album button to group.";
pub const KEY_UNKNOWN: &str = "Album key not found.";
pub const INVALID_BUTTON: &str = "This button is not valid here.";
pub const CANNOT_RESOLVE: &str = "Cannot resolve username.";
pub const MODE_ON: &str = "Qualified-user mode is now ON (allow-list only).";
pub const MODE_OFF: &str = "Open mode is now ON (anyone can open links).";
pub const SUB_OFF: &str = "Subscription check disabled.";
pub const NO_ALLOWED: &str = "No qualified users configured.";

/// Text of the group message carrying the "Open album" button.
pub const BUTTON_CARRIER: &str = "\u{200b}";

/// How long the DM delivery note stays visible.
pub const NOTE_LIFETIME: Duration = Duration::from_secs(2);

/// Escape text for messages sent with HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Command usage hint, escaped for HTML replies.
pub fn usage(command: &str) -> String {
    let text = match command {
        "publish" => "Usage: /publish <album_key>".to_string(),
        "allow" => "Usage: /allow <user id or @username>, or reply to a user's message.".to_string(),
        "disallow" => {
            "Usage: /disallow <user id or @username>, or reply to a user's message.".to_string()
        }
        "set_delete_time" => "Usage: /set_delete_time <seconds>".to_string(),
        "sub_on" => "Usage: /sub_on <@channel>".to_string(),
        other => format!("Usage: /{other}"),
    };
    escape_html(&text)
}

/// Confirmation sent to the uploader once an upload is stored.
pub fn upload_saved(upload: &FinalizedUpload, bot_username: &str) -> String {
    let link = start_link(bot_username, &upload.key);
    let what = if upload.album_count > 1 {
        format!(
            "✅ Collection saved ({} items in {} posts).",
            upload.item_count, upload.album_count
        )
    } else {
        format!("✅ Album saved ({} items).", upload.item_count)
    };
    format!(
        "{what}\nAlbum key: <code>{key}</code>\nLink: {link}\n\n\
         Use /publish {key} in the group or paste the key there (the bot will create a button).",
        key = upload.key
    )
}

pub fn upload_failed(failed: &UploadFailed) -> String {
    format!(
        "⚠️ Could not save your upload of {} items. Please send it again.",
        failed.item_count
    )
}

/// Text for a publish that did not deliver anything.
pub fn publish_error(error: &PublishError) -> String {
    match error {
        PublishError::NotFound { .. } => "This album link is invalid or expired.".to_string(),
        PublishError::Unauthorized { .. } => "You are not allowed to open this album.".to_string(),
        PublishError::SubscriptionRequired { channel } => {
            format!("Please join {channel} first, then tap \"I've subscribed\".")
        }
        PublishError::AlreadyPublished { .. } => {
            "This album was just posted in the group. Scroll up to see it.".to_string()
        }
        PublishError::DeliveryFailed { .. } => "Failed to deliver album.".to_string(),
    }
}

/// Callback toast for a successful publish. Silent unless some posts failed.
pub fn publish_toast(receipt: &PublishReceipt) -> Option<String> {
    receipt.is_partial().then(|| {
        format!(
            "Posted {} items. {} of {} parts could not be fully delivered.",
            receipt.items,
            receipt.failed_posts,
            receipt.posts + receipt.failed_posts
        )
    })
}

/// Whether the error should be shown as a blocking alert rather than a toast.
pub fn is_alert(error: &PublishError) -> bool {
    !matches!(error, PublishError::AlreadyPublished { .. })
}

pub fn open_album_keyboard(key: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::column(vec![InlineKeyboardButton::callback(
        "📁 Open Album",
        CallbackAction::Open(key.to_string()).data(),
    )])
}

/// Join link for a channel reference such as `@news` or `https://t.me/news`.
pub fn channel_url(channel: &str) -> Option<String> {
    match ChatRef::parse_public(channel)? {
        ChatRef::Username(name) => Some(format!("https://t.me/{}", name.trim_start_matches('@'))),
        ChatRef::Id(_) => None,
    }
}

/// Prompt with a join button (when the channel is public) and a retry button.
pub fn subscription_keyboard(channel: &str, key: &str) -> InlineKeyboardMarkup {
    let mut buttons = Vec::with_capacity(2);
    if let Some(url) = channel_url(channel) {
        buttons.push(InlineKeyboardButton::url("📢 Join channel", url));
    }
    buttons.push(InlineKeyboardButton::callback(
        "✅ I've subscribed",
        CallbackAction::Verify(key.to_string()).data(),
    ));
    InlineKeyboardMarkup::column(buttons)
}

pub fn allowed(user: i64) -> String {
    format!("User <code>{user}</code> allowed.")
}

pub fn disallowed(user: i64) -> String {
    format!("User <code>{user}</code> removed from allowed list.")
}

pub fn allowed_list(users: &[i64]) -> String {
    if users.is_empty() {
        return NO_ALLOWED.to_string();
    }
    let lines: Vec<String> = users.iter().map(i64::to_string).collect();
    format!("Qualified user IDs:\n{}", lines.join("\n"))
}

pub fn delete_time_set(seconds: u64) -> String {
    format!("Global delete time set to {seconds} seconds.")
}

pub fn delete_time_too_short(minimum: Duration) -> String {
    format!("Minimum is {} seconds.", minimum.as_secs())
}

pub fn sub_on(channel: &str) -> String {
    format!("Subscription check enabled for {}.", escape_html(channel))
}

pub fn status(settings: &Settings, allowed: usize, pending_uploads: usize) -> String {
    format!(
        "Mode: {}\nDelete after: {} seconds\nSubscription check: {}\nAllowed users: {}\nUploads in progress: {}",
        settings.access_mode.as_str(),
        settings.delete_after.as_secs(),
        escape_html(settings.subscription_channel.as_deref().unwrap_or("off")),
        allowed,
        pending_uploads
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use album_core::AccessMode;

    #[test]
    fn test_upload_saved_contains_key_and_link() {
        let upload = FinalizedUpload {
            uploader: 1,
            chat_id: 1,
            key: "xK3-p9QaZ0w".to_string(),
            item_count: 3,
            album_count: 1,
        };
        let text = upload_saved(&upload, "AlbumBot");
        assert!(text.contains("<code>xK3-p9QaZ0w</code>"));
        assert!(text.contains("https://t.me/AlbumBot?start=xK3-p9QaZ0w"));
        assert!(text.starts_with("✅ Album saved (3 items)."));

        let collection = FinalizedUpload {
            item_count: 23,
            album_count: 3,
            ..upload
        };
        assert!(upload_saved(&collection, "AlbumBot").contains("23 items in 3 posts"));
    }

    #[test]
    fn test_subscription_keyboard() {
        let keyboard = subscription_keyboard("@news", "xK3-p9QaZ0w");
        assert_eq!(keyboard.inline_keyboard.len(), 2);
        assert_eq!(
            keyboard.inline_keyboard[0][0].url.as_deref(),
            Some("https://t.me/news")
        );
        assert_eq!(
            keyboard.inline_keyboard[1][0].callback_data.as_deref(),
            Some("verify:xK3-p9QaZ0w")
        );

        // Private channels have no public join link
        let keyboard = subscription_keyboard("-1001234", "xK3-p9QaZ0w");
        assert_eq!(keyboard.inline_keyboard.len(), 1);

        assert_eq!(
            channel_url("https://t.me/news").as_deref(),
            Some("https://t.me/news")
        );
        assert_eq!(channel_url("https://t.me/+invite"), None);
    }

    #[test]
    fn test_open_album_keyboard() {
        let keyboard = open_album_keyboard("xK3-p9QaZ0w");
        assert_eq!(
            keyboard.inline_keyboard[0][0].callback_data.as_deref(),
            Some("open:xK3-p9QaZ0w")
        );
    }

    #[test]
    fn test_publish_texts() {
        let already = PublishError::AlreadyPublished {
            key: "k".to_string(),
        };
        assert!(!is_alert(&already));
        assert!(publish_error(&already).contains("Scroll up"));
        assert!(is_alert(&PublishError::Unauthorized { requester: 1 }));

        let receipt = PublishReceipt {
            key: "k".to_string(),
            posts: 2,
            items: 20,
            failed_posts: 1,
            delete_after: Duration::from_secs(30),
        };
        assert_eq!(
            publish_toast(&receipt).as_deref(),
            Some("Posted 20 items. 1 of 3 parts could not be fully delivered.")
        );
        assert_eq!(
            publish_toast(&PublishReceipt {
                failed_posts: 0,
                ..receipt
            }),
            None
        );
    }

    #[test]
    fn test_allowed_list_and_status() {
        assert_eq!(allowed_list(&[]), NO_ALLOWED);
        assert_eq!(allowed_list(&[1, 2]), "Qualified user IDs:\n1\n2");

        let settings = Settings {
            access_mode: AccessMode::Restricted,
            delete_after: Duration::from_secs(60),
            subscription_channel: None,
        };
        let text = status(&settings, 2, 0);
        assert!(text.contains("Mode: restricted"));
        assert!(text.contains("Subscription check: off"));

        let gated = Settings {
            subscription_channel: Some("<news&co>".to_string()),
            ..settings
        };
        assert!(status(&gated, 0, 0).contains("Subscription check: &lt;news&amp;co&gt;"));
    }

    #[test]
    fn test_html_replies_escape_user_text() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html("@plain_channel"), "@plain_channel");
        assert_eq!(
            sub_on("<b>news</b>"),
            "Subscription check enabled for &lt;b&gt;news&lt;/b&gt;."
        );
        assert_eq!(usage("publish"), "Usage: /publish &lt;album_key&gt;");
        assert!(!usage("set_delete_time").contains('<'));
    }
}

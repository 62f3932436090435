//! Conversion of Telegram messages into pipeline input.

use album_core::{InboundMedia, MediaItem, MediaKind};
use telegram_client::Message;

/// Extract the storable media of a message, if it carries any.
///
/// Photos keep their largest size. Audio and animations are stored as
/// documents, since they can only be re-sent inside document groups.
pub fn inbound_media(message: &Message) -> Option<InboundMedia> {
    let uploader = message.sender_id()?;

    let (file_id, kind) = if let Some(photo) = message.largest_photo() {
        (photo.file_id.clone(), MediaKind::Photo)
    } else if let Some(video) = &message.video {
        (video.file_id.clone(), MediaKind::Video)
    } else if let Some(file) = message
        .document
        .as_ref()
        .or(message.audio.as_ref())
        .or(message.animation.as_ref())
    {
        (file.file_id.clone(), MediaKind::Document)
    } else {
        return None;
    };

    let mut item = MediaItem::new(file_id, kind);
    item.caption = message
        .caption
        .as_deref()
        .map(str::trim)
        .filter(|caption| !caption.is_empty())
        .map(str::to_string);

    Some(InboundMedia {
        uploader,
        chat_id: message.chat.id,
        message_id: message.message_id,
        group_id: message.media_group_id.clone(),
        item,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use telegram_client::{Chat, FileRef, PhotoSize, User};

    fn base() -> Message {
        Message {
            message_id: 10,
            from: Some(User {
                id: 42,
                ..Default::default()
            }),
            chat: Chat {
                id: 42,
                kind: "private".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn file(id: &str) -> FileRef {
        FileRef {
            file_id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let mut message = base();
        message.media_group_id = Some("g1".to_string());
        message.caption = Some(" sunset ".to_string());
        message.photo = vec![
            PhotoSize {
                file_id: "small".to_string(),
                ..Default::default()
            },
            PhotoSize {
                file_id: "large".to_string(),
                ..Default::default()
            },
        ];

        let media = inbound_media(&message).unwrap();
        assert_eq!(media.uploader, 42);
        assert_eq!(media.message_id, 10);
        assert_eq!(media.group_id.as_deref(), Some("g1"));
        assert_eq!(media.item.file_id, "large");
        assert_eq!(media.item.kind, MediaKind::Photo);
        assert_eq!(media.item.caption.as_deref(), Some("sunset"));
    }

    #[test]
    fn test_video_and_documents() {
        let mut message = base();
        message.video = Some(file("vid"));
        assert_eq!(inbound_media(&message).unwrap().item.kind, MediaKind::Video);

        let mut message = base();
        message.audio = Some(file("song"));
        let media = inbound_media(&message).unwrap();
        assert_eq!(media.item.kind, MediaKind::Document);
        assert_eq!(media.item.file_id, "song");
        assert_eq!(media.group_id, None);
    }

    #[test]
    fn test_text_only_is_ignored() {
        let mut message = base();
        message.text = Some("hello".to_string());
        assert!(inbound_media(&message).is_none());

        let mut anonymous = base();
        anonymous.from = None;
        anonymous.video = Some(file("vid"));
        assert!(inbound_media(&anonymous).is_none());
    }
}

//! Parsing of bot commands, pasted keys and callback data.

use album_core::key::looks_like_key;

/// A slash command addressed to the bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/start [payload]`, the deep-link entry point.
    Start(Option<String>),
    /// `/publish <key>`: post an "Open album" button in the group.
    Publish(Option<String>),
    /// Switch to restricted mode.
    ModeOn,
    /// Switch to open mode.
    ModeOff,
    Allow(Option<String>),
    Disallow(Option<String>),
    ListAllowed,
    SetDeleteTime(Option<String>),
    SubOn(Option<String>),
    SubOff,
    Status,
}

impl Command {
    /// Parse a message text. Returns `None` for non-commands, unknown
    /// commands and commands addressed to another bot (`/cmd@OtherBot`).
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;

        let (head, arg) = match rest.split_once(char::is_whitespace) {
            Some((head, arg)) => (head, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        let name = match head.split_once('@') {
            Some((name, target)) => {
                let ours = bot_username
                    .map(|bot| bot.trim_start_matches('@').eq_ignore_ascii_case(target))
                    .unwrap_or(true);
                if !ours {
                    return None;
                }
                name
            }
            None => head,
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start(arg),
            "publish" => Command::Publish(arg),
            "mode_on" => Command::ModeOn,
            "mode_off" => Command::ModeOff,
            "allow" => Command::Allow(arg),
            "disallow" => Command::Disallow(arg),
            "list_allowed" => Command::ListAllowed,
            "set_delete_time" => Command::SetDeleteTime(arg),
            "sub_on" => Command::SubOn(arg),
            "sub_off" => Command::SubOff,
            "status" => Command::Status,
            _ => return None,
        };
        Some(command)
    }

    /// Whether only admins may run this command.
    pub fn is_admin_only(&self) -> bool {
        !matches!(self, Command::Start(_))
    }
}

/// Pull an album key out of a bare key or a pasted deep link.
pub fn extract_key(text: &str) -> Option<String> {
    let text = text.trim();
    let candidate = match text.split_once("start=") {
        Some((_, tail)) => tail
            .split(|c: char| c.is_whitespace() || c == '&' || c == '#')
            .next()
            .unwrap_or(""),
        None => text.split_whitespace().next().unwrap_or(""),
    };

    let candidate = candidate.trim();
    looks_like_key(candidate).then(|| candidate.to_string())
}

/// Who an allow-list command targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Id(i64),
    Username(String),
}

/// Parse `/allow` and `/disallow` arguments: a numeric id or `@username`.
pub fn parse_target(arg: &str) -> Option<Target> {
    let arg = arg.trim();
    if let Some(name) = arg.strip_prefix('@') {
        return (!name.is_empty()).then(|| Target::Username(arg.to_string()));
    }
    arg.parse::<i64>().ok().map(Target::Id)
}

/// Action carried by an inline button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// "Open album" button in the group.
    Open(String),
    /// "I've subscribed" retry after the subscription prompt.
    Verify(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let (action, key) = data.split_once(':')?;
        if !looks_like_key(key) {
            return None;
        }
        match action {
            "open" => Some(CallbackAction::Open(key.to_string())),
            "verify" => Some(CallbackAction::Verify(key.to_string())),
            _ => None,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            CallbackAction::Open(key) | CallbackAction::Verify(key) => key,
        }
    }

    /// Encode as callback data.
    pub fn data(&self) -> String {
        match self {
            CallbackAction::Open(key) => format!("open:{key}"),
            CallbackAction::Verify(key) => format!("verify:{key}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("/start abcdEFGH123", None),
            Some(Command::Start(Some("abcdEFGH123".to_string())))
        );
        assert_eq!(Command::parse("/start", None), Some(Command::Start(None)));
        assert_eq!(Command::parse("/mode_on", None), Some(Command::ModeOn));
        assert_eq!(
            Command::parse("/set_delete_time  60 ", None),
            Some(Command::SetDeleteTime(Some("60".to_string())))
        );
        assert_eq!(Command::parse("hello", None), None);
        assert_eq!(Command::parse("/unknown", None), None);
    }

    #[test]
    fn test_bot_suffix() {
        assert_eq!(
            Command::parse("/publish@AlbumBot key12345", Some("albumbot")),
            Some(Command::Publish(Some("key12345".to_string())))
        );
        assert_eq!(Command::parse("/publish@OtherBot key12345", Some("AlbumBot")), None);
    }

    #[test]
    fn test_admin_only() {
        assert!(!Command::Start(None).is_admin_only());
        assert!(Command::Status.is_admin_only());
        assert!(Command::Publish(None).is_admin_only());
    }

    #[test]
    fn test_extract_key() {
        assert_eq!(extract_key("  xK3-p9QaZ0w "), Some("xK3-p9QaZ0w".to_string()));
        assert_eq!(
            extract_key("look https://t.me/AlbumBot?start=xK3-p9QaZ0w now"),
            Some("xK3-p9QaZ0w".to_string())
        );
        assert_eq!(
            extract_key("https://t.me/AlbumBot?start=xK3-p9QaZ0w&x=1"),
            Some("xK3-p9QaZ0w".to_string())
        );
        assert_eq!(extract_key("hi"), None);
        assert_eq!(extract_key("what a nice picture"), None);
        assert_eq!(extract_key(""), None);
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(parse_target("12345"), Some(Target::Id(12345)));
        assert_eq!(
            parse_target("@someone"),
            Some(Target::Username("@someone".to_string()))
        );
        assert_eq!(parse_target("@"), None);
        assert_eq!(parse_target("someone"), None);
    }

    #[test]
    fn test_callback_action() {
        let open = CallbackAction::parse("open:xK3-p9QaZ0w").unwrap();
        assert_eq!(open, CallbackAction::Open("xK3-p9QaZ0w".to_string()));
        assert_eq!(open.data(), "open:xK3-p9QaZ0w");

        let verify = CallbackAction::parse("verify:xK3-p9QaZ0w").unwrap();
        assert_eq!(verify.key(), "xK3-p9QaZ0w");

        assert_eq!(CallbackAction::parse("close:xK3-p9QaZ0w"), None);
        assert_eq!(CallbackAction::parse("open:"), None);
        assert_eq!(CallbackAction::parse("garbage"), None);
    }
}

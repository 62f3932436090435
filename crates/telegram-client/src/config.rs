//! Configuration types for telegram-client.

/// Default Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Configuration for connecting to the Bot API.
#[derive(Clone)]
pub struct BotConfig {
    /// Bot token issued by BotFather.
    pub token: String,
    /// Base URL of the Bot API server (e.g., "https://api.telegram.org").
    pub api_url: String,
}

impl BotConfig {
    /// Create a new configuration for the public Bot API.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_url: DEFAULT_API_URL.to_string(),
        }
    }

    /// Create configuration pointing at a self-hosted Bot API server.
    pub fn with_api_url(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            token: token.into(),
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    /// Get the endpoint URL for a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Build a `t.me` deep link that opens the bot with a `/start` payload.
pub fn start_link(bot_username: &str, payload: &str) -> String {
    format!(
        "https://t.me/{}?start={}",
        bot_username.trim_start_matches('@'),
        urlencoding::encode(payload)
    )
}

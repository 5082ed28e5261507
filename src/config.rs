use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,

    /// Telegram user ID allowed to run /stats
    pub admin_id: i64,

    /// Minimum seconds between two processed messages from the same user
    pub message_cooldown_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")?,
            gemini_api_key: std::env::var("GEMINI_API_KEY")?,
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-flash".to_string()),
            admin_id: std::env::var("ADMIN_ID")?.trim().parse()?,
            message_cooldown_secs: std::env::var("MESSAGE_COOLDOWN_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_id == user_id
    }
}

#[cfg(test)]
impl AppConfig {
    pub fn for_tests(admin_id: i64) -> Self {
        Self {
            telegram_bot_token: "test-token".to_string(),
            gemini_api_key: "test-key".to_string(),
            gemini_model: "gemini-test".to_string(),
            admin_id,
            message_cooldown_secs: 10,
        }
    }
}

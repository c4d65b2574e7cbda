use std::env;
use std::str::FromStr;

use crate::errors::{AppError, AppResult};

/// Discord rejects invites that live longer than seven days.
pub const MAX_INVITE_AGE_HOURS: u32 = 168;

/// How the guild invite flow picks the channel an invite points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InviteChannelPolicy {
    /// Rules channel if the guild has one, else the text channel with the
    /// highest member count. Best-effort guess at the "main" channel.
    RulesOrBusiest,
    /// Rules channel if set, else the first text channel by position.
    RulesOrFirstText,
    /// Always invite into this channel.
    Fixed(String),
}

impl FromStr for InviteChannelPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rules-or-busiest" => Ok(Self::RulesOrBusiest),
            "rules-or-first-text" => Ok(Self::RulesOrFirstText),
            other => match other.strip_prefix("channel:") {
                Some(id) if !id.is_empty() => Ok(Self::Fixed(id.to_string())),
                _ => Err(AppError::Config(format!(
                    "INVITE_CHANNEL_POLICY must be rules-or-busiest, rules-or-first-text or channel:<id>, got {other:?}"
                ))),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    // Discord
    pub discord_token: String,
    pub discord_api_base: String,
    pub http_timeout_secs: u64,

    // Sync
    pub member_page_size: u32,

    // Provisioning
    pub invite_max_age_hours: u32,
    pub invite_channel_policy: InviteChannelPolicy,

    // HTTP surface
    pub host: String,
    pub port: u16,
    pub api_key: String,

    // One-shot sync
    pub sync_output: String,
}

impl AppConfig {
    /// Config with test-appropriate defaults (no env vars needed).
    pub fn test_default() -> Self {
        Self {
            discord_token: "test-bot-token".into(),
            discord_api_base: "http://127.0.0.1:0".into(),
            http_timeout_secs: 5,
            member_page_size: 1000,
            invite_max_age_hours: 72,
            invite_channel_policy: InviteChannelPolicy::RulesOrBusiest,
            host: "127.0.0.1".into(),
            port: 0,
            api_key: String::new(),
            sync_output: "/tmp/discord-connector-test-sync.json".into(),
        }
    }

    pub fn from_env() -> AppResult<Self> {
        let config = Self {
            discord_token: env::var("DISCORD_TOKEN").unwrap_or_default(),
            discord_api_base: env::var("DISCORD_API_BASE")
                .unwrap_or_else(|_| "https://discord.com/api/v10".into()),
            http_timeout_secs: parse_var("DISCORD_HTTP_TIMEOUT_SECS", 30)?,

            member_page_size: parse_var::<u32>("MEMBER_PAGE_SIZE", 1000)?.clamp(1, 1000),

            invite_max_age_hours: parse_var("INVITE_MAX_AGE_HOURS", 72)?,
            invite_channel_policy: env::var("INVITE_CHANNEL_POLICY")
                .unwrap_or_else(|_| "rules-or-busiest".into())
                .parse()?,

            host: env::var("CONNECTOR_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("CONNECTOR_PORT", 8090)?,
            api_key: env::var("CONNECTOR_API_KEY").unwrap_or_default(),

            sync_output: env::var("SYNC_OUTPUT").unwrap_or_else(|_| "sync.json".into()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the connector cannot start with.
    pub fn validate(&self) -> AppResult<()> {
        if self.discord_token.trim().is_empty() {
            return Err(AppError::Config("token is empty".into()));
        }
        if self.invite_max_age_hours > MAX_INVITE_AGE_HOURS {
            return Err(AppError::Config(format!(
                "INVITE_MAX_AGE_HOURS must be at most {MAX_INVITE_AGE_HOURS}, got {}",
                self.invite_max_age_hours
            )));
        }
        if self.http_timeout_secs == 0 {
            return Err(AppError::Config("DISCORD_HTTP_TIMEOUT_SECS must be positive".into()));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> AppResult<T> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{name} must be a valid number, got {raw:?}"))),
        Err(_) => Ok(default),
    }
}

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::AppConfig;
use crate::discord::{
    Channel, DiscordApi, DmChannel, Guild, Invite, InviteOptions, Member, Message, Role, User,
};
use crate::errors::{AppError, AppResult};
use crate::permissions;

/// `/users/@me/guilds` returns at most this many guilds per page.
const GUILD_PAGE_LIMIT: usize = 200;

const USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/discord-connector, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// [`DiscordApi`] over the Discord REST API, authenticated as a bot.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.discord_api_base.trim_end_matches('/').to_string(),
            token: config.discord_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request
            .header(AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or(body);

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(message));
        }

        tracing::warn!("Discord API request failed with {}: {}", status, message);
        Err(AppError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let response = self.send(self.http.get(self.url(path))).await?;
        Ok(response.json().await?)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: serde_json::Value) -> AppResult<T> {
        let response = self.send(self.http.post(self.url(path)).json(&body)).await?;
        Ok(response.json().await?)
    }

    /// A single guild member, roles included.
    pub async fn guild_member(&self, guild_id: &str, user_id: &str) -> AppResult<Member> {
        self.get(&format!("/guilds/{guild_id}/members/{user_id}")).await
    }
}

fn with_after(path: String, after: &str) -> String {
    if after.is_empty() {
        path
    } else {
        format!("{path}&after={}", urlencoding::encode(after))
    }
}

#[async_trait]
impl DiscordApi for RestClient {
    async fn current_user(&self) -> AppResult<User> {
        self.get("/users/@me").await
    }

    async fn list_guilds(&self) -> AppResult<Vec<Guild>> {
        let mut guilds: Vec<Guild> = Vec::new();
        let mut after = String::new();

        loop {
            let path = with_after(format!("/users/@me/guilds?limit={GUILD_PAGE_LIMIT}"), &after);
            let page: Vec<Guild> = self.get(&path).await?;
            let page_len = page.len();

            if let Some(last) = page.last() {
                after = last.id.clone();
            }
            guilds.extend(page);

            if page_len < GUILD_PAGE_LIMIT {
                break;
            }
        }

        Ok(guilds)
    }

    async fn guild(&self, guild_id: &str) -> AppResult<Guild> {
        self.get(&format!("/guilds/{guild_id}")).await
    }

    async fn guild_channels(&self, guild_id: &str) -> AppResult<Vec<Channel>> {
        self.get(&format!("/guilds/{guild_id}/channels")).await
    }

    async fn guild_roles(&self, guild_id: &str) -> AppResult<Vec<Role>> {
        self.get(&format!("/guilds/{guild_id}/roles")).await
    }

    async fn guild_members(&self, guild_id: &str, after: &str, limit: u32) -> AppResult<Vec<Member>> {
        let path = with_after(format!("/guilds/{guild_id}/members?limit={limit}"), after);
        self.get(&path).await
    }

    async fn channel(&self, channel_id: &str) -> AppResult<Channel> {
        self.get(&format!("/channels/{channel_id}")).await
    }

    async fn user_channel_permissions(&self, user_id: &str, channel_id: &str) -> AppResult<u64> {
        let channel = self.channel(channel_id).await?;
        let guild_id = channel
            .guild_id
            .clone()
            .ok_or_else(|| AppError::NotFound(format!("channel {channel_id} is not in a guild")))?;

        let guild = self.guild(&guild_id).await?;
        let member = self.guild_member(&guild_id, user_id).await?;

        Ok(permissions::compute_channel_permissions(&guild, &member, &channel))
    }

    async fn channel_invite_create(&self, channel_id: &str, options: &InviteOptions) -> AppResult<Invite> {
        self.post(
            &format!("/channels/{channel_id}/invites"),
            serde_json::to_value(options)?,
        )
        .await
    }

    async fn user_channel_create(&self, user_id: &str) -> AppResult<DmChannel> {
        self.post("/users/@me/channels", json!({ "recipient_id": user_id }))
            .await
    }

    async fn channel_message_send(&self, channel_id: &str, content: &str) -> AppResult<Message> {
        self.post(
            &format!("/channels/{channel_id}/messages"),
            json!({ "content": content }),
        )
        .await
    }

    async fn guild_member_delete_with_reason(
        &self,
        guild_id: &str,
        user_id: &str,
        reason: &str,
    ) -> AppResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/guilds/{guild_id}/members/{user_id}")))
            .header("X-Audit-Log-Reason", urlencoding::encode(reason).into_owned());
        self.send(request).await?;
        Ok(())
    }
}

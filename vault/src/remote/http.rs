use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::config::ApiSection;
use crate::error::{Error, Result};
use crate::remote::host::GuildHost;
use crate::remote::types::{
    BanEntry, CreateChannelRequest, CreateRoleRequest, CreateThreadRequest, GuildInfo, GuildPatch,
    LiveChannel, LiveEmoji, LiveMember, LiveMessage, LiveRole, LiveThread, OverwriteRecord,
    RelayMessage, WebhookInfo,
};

/// HTTP binding of [`GuildHost`] against the guild service REST API.
///
/// One instance is scoped to a single target guild. Every request carries
/// the configured bearer token and the client-level timeout, so a hung
/// remote call stalls only its own sub-task branch.
pub struct HttpGuildHost {
    client: reqwest::Client,
    base_url: String,
    guild_id: String,
    token: String,
}

#[derive(Deserialize)]
struct SentMessage {
    id: String,
}

impl HttpGuildHost {
    pub fn new(api: &ApiSection, guild_id: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            guild_id: guild_id.to_string(),
            token: api.token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn guild_path(&self, suffix: &str) -> String {
        format!("/guilds/{}{}", self.guild_id, suffix)
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .request(method, self.url(path))
            .bearer_auth(&self.token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        check_status(resp, path).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.request(Method::GET, path, None).await?;
        Ok(resp.json().await?)
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T> {
        let resp = self.request(Method::POST, path, Some(body)).await?;
        Ok(resp.json().await?)
    }
}

/// Map non-success statuses to the error taxonomy, carrying the response
/// body text for diagnostics.
async fn check_status(resp: reqwest::Response, path: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(Error::NotFound(path.to_string())),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(Error::Precondition(format!(
            "{path} refused ({status}): {message}"
        ))),
        _ => Err(Error::Remote {
            status: status.as_u16(),
            message,
        }),
    }
}

#[async_trait]
impl GuildHost for HttpGuildHost {
    async fn fetch_guild(&self) -> Result<GuildInfo> {
        self.get_json(&self.guild_path("")).await
    }

    async fn edit_guild(&self, patch: &GuildPatch) -> Result<()> {
        self.request(
            Method::PATCH,
            &self.guild_path(""),
            Some(serde_json::to_value(patch)?),
        )
        .await?;
        Ok(())
    }

    async fn list_roles(&self) -> Result<Vec<LiveRole>> {
        self.get_json(&self.guild_path("/roles")).await
    }

    async fn create_role(&self, req: &CreateRoleRequest) -> Result<LiveRole> {
        self.post_json(&self.guild_path("/roles"), serde_json::to_value(req)?)
            .await
    }

    async fn edit_role(&self, role_id: &str, req: &CreateRoleRequest) -> Result<()> {
        self.request(
            Method::PATCH,
            &self.guild_path(&format!("/roles/{role_id}")),
            Some(serde_json::to_value(req)?),
        )
        .await?;
        Ok(())
    }

    async fn delete_role(&self, role_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &self.guild_path(&format!("/roles/{role_id}")),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<LiveChannel>> {
        self.get_json(&self.guild_path("/channels")).await
    }

    async fn create_channel(&self, req: &CreateChannelRequest) -> Result<LiveChannel> {
        self.post_json(&self.guild_path("/channels"), serde_json::to_value(req)?)
            .await
    }

    async fn delete_channel(&self, channel_id: &str) -> Result<()> {
        self.request(Method::DELETE, &format!("/channels/{channel_id}"), None)
            .await?;
        Ok(())
    }

    async fn replace_overwrites(
        &self,
        channel_id: &str,
        overwrites: &[OverwriteRecord],
    ) -> Result<()> {
        self.request(
            Method::PUT,
            &format!("/channels/{channel_id}/overwrites"),
            Some(serde_json::to_value(overwrites)?),
        )
        .await?;
        Ok(())
    }

    async fn list_threads(&self, channel_id: &str) -> Result<Vec<LiveThread>> {
        self.get_json(&format!("/channels/{channel_id}/threads"))
            .await
    }

    async fn create_thread(
        &self,
        channel_id: &str,
        req: &CreateThreadRequest,
    ) -> Result<LiveThread> {
        self.post_json(
            &format!("/channels/{channel_id}/threads"),
            serde_json::to_value(req)?,
        )
        .await
    }

    async fn list_channel_webhooks(&self, channel_id: &str) -> Result<Vec<WebhookInfo>> {
        self.get_json(&format!("/channels/{channel_id}/webhooks"))
            .await
    }

    async fn list_guild_webhooks(&self) -> Result<Vec<WebhookInfo>> {
        self.get_json(&self.guild_path("/webhooks")).await
    }

    async fn create_webhook(
        &self,
        channel_id: &str,
        name: &str,
        avatar_url: Option<&str>,
    ) -> Result<WebhookInfo> {
        self.post_json(
            &format!("/channels/{channel_id}/webhooks"),
            json!({ "name": name, "avatar_url": avatar_url }),
        )
        .await
    }

    async fn delete_webhook(&self, webhook_id: &str) -> Result<()> {
        self.request(Method::DELETE, &format!("/webhooks/{webhook_id}"), None)
            .await?;
        Ok(())
    }

    async fn execute_webhook(
        &self,
        webhook: &WebhookInfo,
        message: &RelayMessage,
    ) -> Result<String> {
        // Token-bearing endpoints execute unauthenticated on the token
        // path; otherwise fall back to the authenticated execute route.
        let path = match &webhook.token {
            Some(token) => format!("/webhooks/{}/{}", webhook.id, token),
            None => format!("/webhooks/{}/execute", webhook.id),
        };
        let sent: SentMessage = self.post_json(&path, serde_json::to_value(message)?).await?;
        Ok(sent.id)
    }

    async fn fetch_messages(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<LiveMessage>> {
        let mut path = format!("/channels/{channel_id}/messages?limit={limit}");
        if let Some(before) = before {
            path.push_str(&format!("&before={before}"));
        }
        self.get_json(&path).await
    }

    async fn pin_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.request(
            Method::PUT,
            &format!("/channels/{channel_id}/pins/{message_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_bans(&self) -> Result<Vec<BanEntry>> {
        self.get_json(&self.guild_path("/bans")).await
    }

    async fn create_ban(&self, user_id: &str, reason: Option<&str>) -> Result<()> {
        self.request(
            Method::PUT,
            &self.guild_path(&format!("/bans/{user_id}")),
            Some(json!({ "reason": reason })),
        )
        .await?;
        Ok(())
    }

    async fn remove_ban(&self, user_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &self.guild_path(&format!("/bans/{user_id}")),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_emojis(&self) -> Result<Vec<LiveEmoji>> {
        self.get_json(&self.guild_path("/emojis")).await
    }

    async fn create_emoji(&self, name: &str, image: &str) -> Result<LiveEmoji> {
        self.post_json(
            &self.guild_path("/emojis"),
            json!({ "name": name, "image": image }),
        )
        .await
    }

    async fn delete_emoji(&self, emoji_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &self.guild_path(&format!("/emojis/{emoji_id}")),
            None,
        )
        .await?;
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<LiveMember>> {
        self.get_json(&self.guild_path("/members")).await
    }

    async fn download_blob(&self, url: &str) -> Result<Vec<u8>> {
        // Attachment and image URLs are absolute and may point outside
        // the service; no auth header is attached.
        let resp = self.client.get(url).send().await?;
        let resp = check_status(resp, url).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

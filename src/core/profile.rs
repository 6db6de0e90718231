use super::{
    client::QuestClient,
    http::{RetryPolicy, read_json, retry},
    utils::truncate,
};
use crate::error::Result;
use log::{info, warn};
use reqwest::Method;
use serde::Deserialize;

const USER_INFO_ATTEMPTS: u32 = 3;
const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub name: String,
    pub connected_wallet: String,
    pub xp: u64,
}

impl Default for UserInfo {
    fn default() -> Self {
        RawUserInfo::default().into()
    }
}

/// Wire shape; any field may be missing or null.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserInfo {
    name: Option<String>,
    connected_wallet: Option<String>,
    xp: Option<u64>,
}

impl From<RawUserInfo> for UserInfo {
    fn from(raw: RawUserInfo) -> Self {
        let or_unknown =
            |v: Option<String>| v.filter(|s| !s.is_empty()).unwrap_or_else(|| UNKNOWN.into());
        Self {
            name: or_unknown(raw.name),
            connected_wallet: or_unknown(raw.connected_wallet),
            xp: raw.xp.unwrap_or_default(),
        }
    }
}

#[derive(Deserialize)]
struct IpResponse {
    ip: String,
}

/// External quest-platform profile; falls back to `Unknown`/0 XP when unreachable.
pub async fn get_user_info(client: &QuestClient<'_>) -> UserInfo {
    let path = format!("/api/zealy/user/{}", client.external_user_id);
    let policy = RetryPolicy::new(USER_INFO_ATTEMPTS, client.delays.retry());
    let result: Result<RawUserInfo> = retry(policy, "fetch user info", || async {
        let response = client
            .speedrun(Method::GET, &path, "/campaign")?
            .send()
            .await?;
        read_json(response).await
    })
    .await;

    match result {
        Ok(raw) => raw.into(),
        Err(e) => {
            warn!("Failed to fetch user info: {}", truncate(&e.to_string(), 120));
            UserInfo::default()
        }
    }
}

/// Exit IP as seen through the account's transport.
pub async fn get_public_ip(client: &QuestClient<'_>) -> Result<String> {
    let response = client
        .http()
        .get(client.endpoints.ip_lookup.clone())
        .send()
        .await?;
    let IpResponse { ip } = read_json(response).await?;
    match &client.proxy {
        Some(proxy) => info!("IP: {ip} (proxy: {proxy})"),
        None => info!("IP: {ip}"),
    }
    Ok(ip)
}

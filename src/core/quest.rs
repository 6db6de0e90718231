use super::{
    client::QuestClient,
    http::{RetryPolicy, read_json, retry},
    utils::truncate,
};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const PAGE_LIMIT: usize = 10;
/// Protocol listing has no server-side total; this many pages are walked at most.
pub const PROTOCOL_PAGES: usize = 12;
const QUEST_ATTEMPTS: u32 = 3;
const AWARDED_MESSAGE: &str = "Points awarded and visit recorded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestKind {
    Campaign,
    Protocol,
}

impl QuestKind {
    fn list_path(&self) -> &'static str {
        match self {
            QuestKind::Campaign => "/api/get-campaigns",
            QuestKind::Protocol => "/api/get-protocols",
        }
    }

    fn track_path(&self) -> &'static str {
        match self {
            QuestKind::Campaign => "/api/track-campaign",
            QuestKind::Protocol => "/api/track-protocol",
        }
    }

    fn id_field(&self) -> &'static str {
        match self {
            QuestKind::Campaign => "campaignId",
            QuestKind::Protocol => "protocolId",
        }
    }
}

impl fmt::Display for QuestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestKind::Campaign => write!(f, "campaign"),
            QuestKind::Protocol => write!(f, "protocol"),
        }
    }
}

/// The platform uses both numeric and string ids; they are echoed back as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestId {
    Number(u64),
    Text(String),
}

impl fmt::Display for QuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestId::Number(n) => write!(f, "{n}"),
            QuestId::Text(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quest {
    pub id: QuestId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub visited: bool,
    #[serde(default)]
    pub points_awarded: bool,
}

impl Quest {
    pub fn is_pending(&self) -> bool {
        !self.visited && !self.points_awarded
    }
}

#[derive(Debug, Deserialize)]
struct QuestPage {
    #[serde(alias = "campaigns", alias = "protocols")]
    items: Option<Vec<Quest>>,
    total: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    message: Option<String>,
}

async fn fetch_page(
    client: &QuestClient<'_>,
    kind: QuestKind,
    page: usize,
) -> Result<QuestPage> {
    let response = client
        .speedrun(Method::GET, kind.list_path(), "/campaign")?
        .query(&[
            ("page", page.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
            ("zealyUserId", client.external_user_id.to_string()),
        ])
        .send()
        .await?;
    let page: QuestPage = read_json(response).await?;
    if page.items.is_none() {
        return Err(Error::UnexpectedResponse(format!("{kind} list has no records")));
    }
    if kind == QuestKind::Campaign && page.total.is_none() {
        return Err(Error::UnexpectedResponse("campaign list has no total".into()));
    }
    Ok(page)
}

async fn fetch_all_once(client: &QuestClient<'_>, kind: QuestKind) -> Result<Vec<Quest>> {
    let mut all = vec![];
    let mut page = 1;
    loop {
        let QuestPage { items, total } = fetch_page(client, kind, page).await?;
        let items = items.unwrap_or_default();
        let received = items.len();
        all.extend(items);
        debug!("{kind} page {page}: {received} records");

        let done = match kind {
            QuestKind::Campaign => {
                received == 0 || (page * PAGE_LIMIT) as u64 >= total.unwrap_or_default()
            }
            QuestKind::Protocol => received < PAGE_LIMIT || page >= PROTOCOL_PAGES,
        };
        if done {
            return Ok(all);
        }
        page += 1;
        tokio::time::sleep(client.delays.page()).await;
    }
}

/// Every record of `kind`, walking pages until the listing is exhausted.
pub async fn fetch_quests(client: &QuestClient<'_>, kind: QuestKind) -> Result<Vec<Quest>> {
    let policy = RetryPolicy::new(QUEST_ATTEMPTS, client.delays.retry());
    let label = format!("list {kind}s");
    let quests = retry(policy, &label, || fetch_all_once(client, kind)).await?;
    info!("{} {kind}s found", quests.len());
    Ok(quests)
}

async fn complete_once(client: &QuestClient<'_>, kind: QuestKind, body: &Value) -> Result<()> {
    let response = client
        .speedrun(Method::POST, kind.track_path(), "/campaign")?
        .json(body)
        .send()
        .await?;
    let response: TrackResponse = read_json(response).await?;
    match response.message.as_deref() {
        Some(AWARDED_MESSAGE) => Ok(()),
        other => Err(Error::UnexpectedResponse(
            other.unwrap_or("no message").to_string(),
        )),
    }
}

pub async fn complete_quest(
    client: &QuestClient<'_>,
    kind: QuestKind,
    quest: &Quest,
) -> Result<()> {
    let mut body = Map::new();
    body.insert("userId".into(), Value::String(client.address().to_string()));
    body.insert(kind.id_field().into(), serde_json::to_value(&quest.id)?);
    body.insert(
        "zealyUserId".into(),
        Value::String(client.external_user_id.to_string()),
    );
    let body = Value::Object(body);

    let policy = RetryPolicy::new(QUEST_ATTEMPTS, client.delays.retry());
    let label = format!("complete {kind} {}", quest.id);
    let result = retry(policy, &label, || complete_once(client, kind, &body)).await;
    if let Err(e) = &result {
        warn!(
            "Failed to complete {kind} {} (ID: {}): {}",
            quest.name,
            quest.id,
            truncate(&e.to_string(), 120)
        );
    }
    result
}

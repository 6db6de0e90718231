use super::{
    auth::Session,
    client::QuestClient,
    http::{RetryPolicy, read_json, retry},
    utils::truncate,
};
use crate::error::{Error, Result};
use log::{info, warn};
use rand::seq::IndexedRandom;
use reqwest::Method;
use serde::{Deserialize, Serialize};

const KNOWLEDGE_BASE_ID: &str = "b4393b93-e603-426d-8b9f-0af145498c92";
const ATTEMPTS_PER_QUERY: u32 = 5;
/// Distinct queries tried before a chat interaction counts as failed.
pub const QUERY_BUDGET: usize = 3;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    kb_id: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    answer: Option<String>,
}

pub fn random_query(messages: &[String]) -> Option<&str> {
    messages.choose(&mut rand::rng()).map(String::as_str)
}

/// A random query other than `current`, unless `current` is the only one there is.
pub fn other_query<'a>(messages: &'a [String], current: &str) -> Option<&'a str> {
    let others: Vec<&str> = messages
        .iter()
        .map(String::as_str)
        .filter(|m| *m != current)
        .collect();
    match others.choose(&mut rand::rng()) {
        Some(query) => Some(*query),
        None => random_query(messages),
    }
}

async fn search(client: &QuestClient<'_>, session: &Session, query: &str) -> Result<String> {
    let policy = RetryPolicy::new(ATTEMPTS_PER_QUERY, client.delays.chat_retry());
    let body = SearchRequest {
        query,
        kb_id: KNOWLEDGE_BASE_ID,
    };
    retry(policy, "chat", || async {
        let response = client
            .enso_authed(Method::POST, "/api/search", session)?
            .json(&body)
            .send()
            .await?;
        let response: SearchResponse = read_json(response).await?;
        response
            .answer
            .ok_or_else(|| Error::UnexpectedResponse("search response has no answer".into()))
    })
    .await
}

/// Sends `first_query`; when its retries run out, switches to another random query
/// from `messages`, up to [`QUERY_BUDGET`] queries in total.
pub async fn chat(
    client: &QuestClient<'_>,
    session: &Session,
    first_query: &str,
    messages: &[String],
) -> Result<String> {
    let mut query = first_query.to_string();
    let mut used = 1;
    loop {
        match search(client, session, &query).await {
            Ok(answer) => {
                info!("Chat answer: {}", truncate(&answer, 80));
                return Ok(answer);
            }
            Err(e) if used < QUERY_BUDGET => {
                query = other_query(messages, &query)
                    .unwrap_or(first_query)
                    .to_string();
                warn!(
                    "Chat failed ({}), trying another query: {query}",
                    truncate(&e.to_string(), 120)
                );
                tokio::time::sleep(client.delays.retry()).await;
                used += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

use super::{
    client::QuestClient,
    http::{RetryPolicy, ensure_success, read_json, retry},
    utils::{iso_timestamp_now, short_address},
};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use reqwest::{Method, header::SET_COOKIE};
use serde::Serialize;
use serde_json::Value;

const STATEMENT: &str = "By signing this message, you confirm you have read and accepted the following Terms and Conditions: https://terms.enso.build/";
const TOKEN_COOKIE: &str = "brian-token=";
const AUTH_ATTEMPTS: u32 = 5;

/// Bearer credential for one account, sent back as cookies.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub address: String,
}

impl Session {
    pub fn cookie_header(&self) -> String {
        format!("brian-address={}; brian-token={}", self.address, self.token)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInMessage {
    pub domain: String,
    pub address: String,
    pub statement: String,
    pub uri: String,
    pub version: String,
    pub nonce: String,
    pub issued_at: String,
    pub chain_id: u64,
}

impl SignInMessage {
    pub fn new(domain: &str, uri: &str, address: String, chain_id: u64, nonce: String) -> Self {
        Self {
            domain: domain.to_string(),
            address,
            statement: STATEMENT.to_string(),
            uri: uri.to_string(),
            version: "1".to_string(),
            nonce,
            issued_at: iso_timestamp_now(),
            chain_id,
        }
    }

    /// The exact text that gets signed.
    pub fn to_text(&self) -> String {
        [
            format!("{} wants you to sign in with your Ethereum account:", self.domain),
            self.address.clone(),
            String::new(),
            self.statement.clone(),
            String::new(),
            format!("URI: {}", self.uri),
            format!("Version: {}", self.version),
            format!("Chain ID: {}", self.chain_id),
            format!("Nonce: {}", self.nonce),
            format!("Issued At: {}", self.issued_at),
        ]
        .join("\n")
    }
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    message: &'a SignInMessage,
    signature: &'a str,
}

pub async fn get_nonce(client: &QuestClient<'_>) -> Result<String> {
    let policy = RetryPolicy::new(AUTH_ATTEMPTS, client.delays.retry());
    retry(policy, "fetch nonce", || async {
        let response = client.enso(Method::GET, "/api/auth/nonce")?.send().await?;
        let nonce = ensure_success(response)
            .await?
            .text()
            .await?
            .trim()
            .trim_matches('"')
            .to_string();
        match nonce.is_empty() {
            true => Err(Error::UnexpectedResponse("empty nonce".into())),
            false => Ok(nonce),
        }
    })
    .await
}

pub async fn sign_in_message(
    client: &QuestClient<'_>,
    nonce: String,
) -> Result<(SignInMessage, String)> {
    let endpoints = client.endpoints;
    let message = SignInMessage::new(
        endpoints.enso_domain(),
        &endpoints.enso_origin(),
        client.address().to_string(),
        client.chain.id(),
        nonce,
    );
    let signature = client.sign_message(&message.to_text()).await?;
    debug!("Signed sign-in message for {}", short_address(&message.address));
    Ok((message, signature))
}

/// Pulls the session token out of the `Set-Cookie` headers.
pub fn extract_token<'a>(set_cookies: impl IntoIterator<Item = &'a str>) -> Option<String> {
    set_cookies.into_iter().find_map(|cookie| {
        let (_, rest) = cookie.split_once(TOKEN_COOKIE)?;
        let token = rest.split(';').next().unwrap_or_default();
        (!token.is_empty()).then(|| token.to_string())
    })
}

pub async fn verify(
    client: &QuestClient<'_>,
    message: &SignInMessage,
    signature: &str,
) -> Result<Session> {
    let policy = RetryPolicy::new(AUTH_ATTEMPTS, client.delays.retry());
    let body = VerifyRequest { message, signature };
    retry(policy, "verify signature", || async {
        let response = client
            .enso(Method::POST, "/api/auth/verify")?
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let token = extract_token(
            response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        )
        .ok_or_else(|| Error::Auth("brian-token cookie missing".into()))?;

        Ok(Session {
            token,
            address: message.address.clone(),
        })
    })
    .await
}

pub async fn get_account_info(client: &QuestClient<'_>, session: &Session) -> Result<Value> {
    let policy = RetryPolicy::new(AUTH_ATTEMPTS, client.delays.retry());
    let info: Value = retry(policy, "fetch account info", || async {
        let response = client
            .enso_authed(Method::GET, "/api/auth/me", session)?
            .send()
            .await?;
        read_json(response).await
    })
    .await?;

    match info.pointer("/account/address").and_then(Value::as_str) {
        Some(address) => info!("Logged in as {}", short_address(address)),
        None => warn!("Account info has no address field"),
    }
    Ok(info)
}

/// nonce -> signature -> session token -> profile confirmation.
pub async fn authenticate(client: &QuestClient<'_>) -> Result<Session> {
    let nonce = get_nonce(client).await?;
    let (message, signature) = sign_in_message(client, nonce).await?;
    let session = verify(client, &message, &signature).await?;
    info!(
        "Verified, brian-token={}...",
        session.token.chars().take(10).collect::<String>()
    );
    get_account_info(client, &session).await?;
    Ok(session)
}

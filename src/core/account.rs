use super::utils::{read_lines, read_lines_skip_comments};
use crate::error::{Error, Result};
use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use log::{info, warn};
use std::{fmt, io::ErrorKind, path::Path, str::FromStr};
use uuid::Uuid;

/// A wallet plus the quest platform user it is linked to.
#[derive(Clone)]
pub struct Account {
    pub signer: PrivateKeySigner,
    pub external_user_id: Uuid,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address())
            .field("private_key", &"<redacted>")
            .field("external_user_id", &self.external_user_id)
            .finish()
    }
}

impl Account {
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Parses one `privateKey,externalUserId` line. `line_no` is 1-based.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidAccount {
            line: line_no,
            reason: reason.to_string(),
        };

        let mut parts = line.split(',').map(str::trim);
        let private_key = parts.next().unwrap_or_default();
        let user_id = parts.next().unwrap_or_default();
        if private_key.is_empty() || user_id.is_empty() {
            return Err(invalid("expected `privateKey,externalUserId`"));
        }

        if !is_valid_private_key(private_key) {
            return Err(invalid("private key must be 64 hex characters"));
        }
        let external_user_id = parse_hyphenated_uuid(user_id)
            .ok_or_else(|| invalid("external user id is not a valid UUID"))?;

        let signer = PrivateKeySigner::from_str(private_key.trim_start_matches("0x"))
            .map_err(|e| invalid(&format!("cannot derive wallet: {e}")))?;

        Ok(Self {
            signer,
            external_user_id,
        })
    }
}

pub fn is_valid_private_key(key: &str) -> bool {
    let hex = key.strip_prefix("0x").unwrap_or(key);
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

/// Only the canonical 8-4-4-4-12 form is accepted; braced, urn and simple forms are not.
pub fn parse_hyphenated_uuid(value: &str) -> Option<Uuid> {
    if value.len() != 36 {
        return None;
    }
    Uuid::try_parse(value).ok()
}

pub fn parse_accounts(lines: &[String]) -> Result<Vec<Account>> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| Account::parse_line(line, i + 1))
        .collect()
}

pub async fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<Account>> {
    let path = path.as_ref();
    let accounts = parse_accounts(&read_lines(path).await?)?;
    if accounts.is_empty() {
        return Err(Error::EmptyInput(path.display().to_string()));
    }
    info!("Loaded {} accounts", accounts.len());
    Ok(accounts)
}

pub async fn load_messages(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let messages = read_lines(path).await?;
    if messages.is_empty() {
        return Err(Error::EmptyInput(path.display().to_string()));
    }
    info!("Loaded {} chat messages", messages.len());
    Ok(messages)
}

/// A missing or empty proxy file means direct connections.
pub async fn load_proxies(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let proxies = match read_lines_skip_comments(path).await {
        Ok(proxies) => proxies,
        Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
            warn!("{} not found, running without proxies", path.display());
            return Ok(vec![]);
        }
        Err(e) => return Err(e),
    };

    match proxies.len() {
        0 => warn!("{} is empty, running without proxies", path.display()),
        n => info!("Loaded {n} proxies"),
    }
    Ok(proxies.into_iter().map(normalize_proxy).collect())
}

fn normalize_proxy(proxy: String) -> String {
    match proxy.contains("://") {
        true => proxy,
        false => format!("http://{proxy}"),
    }
}

pub fn assign_proxy(pool: &[String], index: usize) -> Option<&str> {
    match pool.len() {
        0 => None,
        n => Some(pool[index % n].as_str()),
    }
}

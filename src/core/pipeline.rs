use super::{
    account::{Account, assign_proxy},
    auth::{Session, authenticate},
    chat::{chat, random_query},
    client::QuestClient,
    profile::{UserInfo, get_public_ip, get_user_info},
    project::{ProjectOutcome, create_project, generate_project_slug},
    quest::{QuestKind, complete_quest, fetch_quests},
    utils::{short_address, truncate},
};
use crate::{config::Config, error::Result};
use log::{error, info, warn};
use serde::Deserialize;
use std::collections::BTreeMap;
use strum::{Display, EnumIter, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[strum(serialize = "chat")]
    Chat,
    #[strum(serialize = "project")]
    Project,
    #[strum(serialize = "campaign")]
    Campaign,
    #[strum(serialize = "protocol")]
    Protocol,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub succeeded: u32,
    pub failed: u32,
}

impl Tally {
    pub fn attempted(&self) -> u32 {
        self.succeeded + self.failed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskTallies(BTreeMap<TaskKind, Tally>);

impl TaskTallies {
    pub fn record(&mut self, kind: TaskKind, succeeded: bool) {
        let tally = self.0.entry(kind).or_default();
        match succeeded {
            true => tally.succeeded += 1,
            false => tally.failed += 1,
        }
    }

    pub fn get(&self, kind: TaskKind) -> Tally {
        self.0.get(&kind).copied().unwrap_or_default()
    }

    pub fn attempted(&self) -> u32 {
        self.0.values().map(Tally::attempted).sum()
    }

    pub fn failed(&self) -> u32 {
        self.0.values().map(|t| t.failed).sum()
    }

    pub fn absorb(&mut self, other: &TaskTallies) {
        for (kind, tally) in &other.0 {
            let total = self.0.entry(*kind).or_default();
            total.succeeded += tally.succeeded;
            total.failed += tally.failed;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AccountStatus {
    Success,
    Partial,
    #[strum(serialize = "Total task failure")]
    TotalTaskFailure,
    #[strum(serialize = "No tasks")]
    NoTasks,
    #[strum(serialize = "Critical error")]
    CriticalError,
}

impl AccountStatus {
    pub fn derive(tallies: &TaskTallies, critical: bool) -> Self {
        if critical {
            return AccountStatus::CriticalError;
        }
        match (tallies.attempted(), tallies.failed()) {
            (0, _) => AccountStatus::NoTasks,
            (_, 0) => AccountStatus::Success,
            (attempted, failed) if failed == attempted => AccountStatus::TotalTaskFailure,
            _ => AccountStatus::Partial,
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, AccountStatus::Success | AccountStatus::NoTasks)
    }
}

#[derive(Debug, Clone)]
pub struct AccountReport {
    /// 1-based position in the accounts file.
    pub index: usize,
    pub name: String,
    pub address: String,
    pub status: AccountStatus,
    pub tallies: TaskTallies,
    pub xp: u64,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<AccountReport>,
    pub succeeded_accounts: usize,
    pub failed_accounts: usize,
    pub totals: TaskTallies,
}

impl RunSummary {
    pub fn fold(mut self, report: AccountReport) -> Self {
        match report.status.is_failure() {
            true => self.failed_accounts += 1,
            false => self.succeeded_accounts += 1,
        }
        self.totals.absorb(&report.tallies);
        self.reports.push(report);
        self
    }

    pub fn exit_code(&self) -> u8 {
        match self.failed_accounts {
            0 => 0,
            _ => 1,
        }
    }

    pub fn log(&self) {
        info!(
            "Done: {} accounts fully succeeded, {} failed or partial",
            self.succeeded_accounts, self.failed_accounts
        );
        for kind in TaskKind::iter() {
            let tally = self.totals.get(kind);
            if tally.attempted() > 0 {
                info!("{kind}: {} succeeded, {} failed", tally.succeeded, tally.failed);
            }
        }
    }
}

async fn run_chats(
    client: &QuestClient<'_>,
    session: &Session,
    config: &Config,
    messages: &[String],
    tallies: &mut TaskTallies,
) {
    for i in 1..=config.chat_interactions {
        let Some(query) = random_query(messages) else {
            warn!("No chat messages available");
            return;
        };
        info!("Chat {i}/{}: {query}", config.chat_interactions);
        let ok = chat(client, session, query, messages).await.is_ok();
        tallies.record(TaskKind::Chat, ok);
        tokio::time::sleep(client.delays.chat()).await;
    }
}

async fn run_projects(client: &QuestClient<'_>, config: &Config, tallies: &mut TaskTallies) {
    for i in 1..=config.project_limit {
        let slug = generate_project_slug();
        info!("Project {i}/{}: {slug}", config.project_limit);
        match create_project(client, &slug).await {
            Ok(ProjectOutcome::Created) => tallies.record(TaskKind::Project, true),
            Ok(ProjectOutcome::DailyLimit) | Err(_) => {
                tallies.record(TaskKind::Project, false);
                warn!("Stopping project creation");
                return;
            }
        }
        tokio::time::sleep(client.delays.task()).await;
    }
}

async fn run_quests(client: &QuestClient<'_>, kind: QuestKind, tallies: &mut TaskTallies) {
    let task = match kind {
        QuestKind::Campaign => TaskKind::Campaign,
        QuestKind::Protocol => TaskKind::Protocol,
    };
    let quests = match fetch_quests(client, kind).await {
        Ok(quests) => quests,
        Err(e) => {
            warn!("Failed to list {kind}s: {}", truncate(&e.to_string(), 120));
            tallies.record(task, false);
            return;
        }
    };

    let pending: Vec<_> = quests.iter().filter(|q| q.is_pending()).collect();
    if pending.is_empty() {
        info!("All {kind}s already completed");
        return;
    }
    info!("{} pending {kind}s", pending.len());

    let mut done = 0;
    for (i, quest) in pending.iter().enumerate() {
        let ok = complete_quest(client, kind, quest).await.is_ok();
        tallies.record(task, ok);
        done += ok as usize;
        info!("{kind}s processed: {}/{}", i + 1, pending.len());
        tokio::time::sleep(client.delays.task()).await;
    }
    info!("{done} of {} {kind}s completed", pending.len());
}

async fn run_tasks(
    client: &QuestClient<'_>,
    config: &Config,
    messages: &[String],
    tallies: &mut TaskTallies,
) -> Result<()> {
    let session = authenticate(client).await?;

    if config.is_enabled(TaskKind::Chat) {
        run_chats(client, &session, config, messages, tallies).await;
    }
    if config.is_enabled(TaskKind::Project) {
        run_projects(client, config, tallies).await;
    }
    if config.is_enabled(TaskKind::Campaign) {
        run_quests(client, QuestKind::Campaign, tallies).await;
    }
    if config.is_enabled(TaskKind::Protocol) {
        run_quests(client, QuestKind::Protocol, tallies).await;
    }
    Ok(())
}

/// Runs one account end to end. Errors never escape; they end up in the report status.
pub async fn process_account(
    index: usize,
    account: &Account,
    proxy: Option<&str>,
    config: &Config,
    messages: &[String],
) -> AccountReport {
    let address = account.address().to_string();
    let short = short_address(&address);
    let mut tallies = TaskTallies::default();

    let client = match QuestClient::new(account, proxy, &config.endpoints, &config.delays) {
        Ok(client) => client,
        Err(e) => {
            error!("Account {short}: cannot build transport: {e}");
            return AccountReport {
                index,
                name: "Unknown".into(),
                address,
                status: AccountStatus::CriticalError,
                tallies,
                xp: 0,
            };
        }
    };

    if let Err(e) = get_public_ip(&client).await {
        warn!("Account {short}: IP lookup failed: {}", truncate(&e.to_string(), 120));
    }

    let outcome = run_tasks(&client, config, messages, &mut tallies).await;
    let critical = outcome.is_err();
    let user = match outcome {
        Ok(()) => {
            let user = get_user_info(&client).await;
            info!(
                "User {} ({}), XP {}",
                user.name,
                short_address(&user.connected_wallet),
                user.xp
            );
            user
        }
        Err(e) => {
            error!("Account {short}: {}", truncate(&e.to_string(), 200));
            error!("Account {short}: {e:?}");
            UserInfo::default()
        }
    };

    let status = AccountStatus::derive(&tallies, critical);
    info!("Account {short}: {status}");
    AccountReport {
        index,
        name: user.name,
        address,
        status,
        tallies,
        xp: user.xp,
    }
}

/// Processes accounts strictly one after another and folds their reports.
pub async fn run(
    config: &Config,
    accounts: &[Account],
    messages: &[String],
    proxies: &[String],
) -> RunSummary {
    let mut summary = RunSummary::default();
    for (i, account) in accounts.iter().enumerate() {
        info!(
            "===== Account {}/{} @ {} =====",
            i + 1,
            accounts.len(),
            chrono::Local::now().format("%d/%m/%Y %H:%M:%S")
        );
        let proxy = assign_proxy(proxies, i);
        let report = process_account(i + 1, account, proxy, config, messages).await;
        summary = summary.fold(report);
    }
    summary.log();
    summary
}

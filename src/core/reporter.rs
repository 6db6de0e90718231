use super::{
    http::ensure_success,
    pipeline::{AccountReport, RunSummary, TaskKind},
    utils::{short_address, truncate},
};
use crate::error::Result;
use chrono::Local;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use url::Url;

/// Telegram rejects messages longer than this.
pub const MAX_MESSAGE_CHARS: usize = 4096;
const RULE: &str = "------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Markdown,
    Html,
}

impl ReportFormat {
    pub fn formatter(&self) -> Box<dyn ReportFormatter> {
        match self {
            ReportFormat::Markdown => Box::new(MarkdownV2),
            ReportFormat::Html => Box::new(Html),
        }
    }
}

pub trait ReportFormatter {
    fn parse_mode(&self) -> &'static str;

    fn escape(&self, text: &str) -> String;

    fn bold(&self, text: &str) -> String;

    fn code(&self, text: &str) -> String;

    fn truncation_marker(&self) -> &'static str;

    fn header(&self, summary: &RunSummary) -> String {
        let mut out = self.bold(&self.escape(&format!(
            "Enso Bot Report - {}",
            Local::now().format("%d/%m/%Y, %H:%M:%S")
        )));
        out.push_str("\n\n");
        out.push_str(&self.escape(&format!(
            "Summary: {} succeeded, {} failed/partial",
            summary.succeeded_accounts, summary.failed_accounts
        )));
        out.push('\n');
        out.push_str(&self.escape(RULE));
        out.push('\n');
        if summary.reports.is_empty() {
            out.push_str(&self.escape("No account data to report."));
            out.push('\n');
        }
        out
    }

    fn footer(&self) -> String {
        format!("{}\n{}", self.escape(RULE), self.escape("Report complete."))
    }

    /// Whole account blocks are appended while they fit in [`MAX_MESSAGE_CHARS`];
    /// the rest is replaced by the truncation marker so markup is never cut.
    fn render(&self, summary: &RunSummary) -> String {
        let footer = self.footer();
        let marker = self.truncation_marker();
        let reserve = char_len(&footer).max(char_len(marker));

        let mut out = self.header(summary);
        let mut used = char_len(&out);
        for (shown, report) in summary.reports.iter().enumerate() {
            let block = self.render_account(report);
            let len = char_len(&block);
            if used + len + reserve > MAX_MESSAGE_CHARS {
                warn!(
                    "Report too long, {} of {} accounts left out",
                    summary.reports.len() - shown,
                    summary.reports.len()
                );
                out.push_str(marker);
                return out;
            }
            out.push_str(&block);
            used += len;
        }
        out.push_str(&footer);
        out
    }

    fn render_account(&self, report: &AccountReport) -> String {
        let mut out = self.bold(&self.escape(&format!(
            "Account {} ({})",
            report.index, report.status
        )));
        out.push('\n');
        let mut line = |label: &str, value: &str| {
            out.push_str(&self.escape(&format!("  - {label}: ")));
            out.push_str(&self.code(&self.escape(value)));
            out.push('\n');
        };
        line("Name", &report.name);
        line("Address", &short_address(&report.address));
        line("XP", &report.xp.to_string());
        for kind in TaskKind::iter() {
            let tally = report.tallies.get(kind);
            if tally.attempted() > 0 {
                line(
                    &kind.to_string(),
                    &format!("{} ok / {} failed", tally.succeeded, tally.failed),
                );
            }
        }
        out.push('\n');
        out
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub struct MarkdownV2;

impl ReportFormatter for MarkdownV2 {
    fn parse_mode(&self) -> &'static str {
        "MarkdownV2"
    }

    fn escape(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for c in text.chars() {
            if "_*[]()~`>#+-=|{}.!\\".contains(c) {
                out.push('\\');
            }
            out.push(c);
        }
        out
    }

    fn bold(&self, text: &str) -> String {
        format!("*{text}*")
    }

    fn code(&self, text: &str) -> String {
        format!("`{text}`")
    }

    fn truncation_marker(&self) -> &'static str {
        "\n\n\\[Message truncated\\]"
    }
}

pub struct Html;

impl ReportFormatter for Html {
    fn parse_mode(&self) -> &'static str {
        "HTML"
    }

    fn escape(&self, text: &str) -> String {
        text.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
    }

    fn bold(&self, text: &str) -> String {
        format!("<b>{text}</b>")
    }

    fn code(&self, text: &str) -> String {
        format!("<code>{text}</code>")
    }

    fn truncation_marker(&self) -> &'static str {
        "\n\n[Message truncated]"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct TelegramReporter {
    bot_token: String,
    chat_id: String,
    api: Url,
    formatter: Box<dyn ReportFormatter>,
    http: Client,
}

impl TelegramReporter {
    pub fn new(bot_token: String, chat_id: String, api: Url, format: ReportFormat) -> Self {
        Self {
            bot_token,
            chat_id,
            api,
            formatter: format.formatter(),
            http: Client::new(),
        }
    }

    /// `None` unless both `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID` are set.
    pub fn from_env(api: Url, format: ReportFormat) -> Option<Self> {
        Self::from_settings(
            std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            std::env::var("TELEGRAM_CHAT_ID").ok(),
            api,
            format,
        )
    }

    /// Blank values count as unset.
    pub fn from_settings(
        token: Option<String>,
        chat_id: Option<String>,
        api: Url,
        format: ReportFormat,
    ) -> Option<Self> {
        let token = token.filter(|v| !v.trim().is_empty());
        let chat_id = chat_id.filter(|v| !v.trim().is_empty());
        match (token, chat_id) {
            (Some(token), Some(chat_id)) => Some(Self::new(token, chat_id, api, format)),
            _ => {
                info!("Telegram token or chat id not set, skipping report");
                None
            }
        }
    }

    async fn try_send(&self, summary: &RunSummary) -> Result<()> {
        let text = self.formatter.render(summary);
        let url = self.api.join(&format!("/bot{}/sendMessage", self.bot_token))?;
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            parse_mode: self.formatter.parse_mode(),
        };
        // keep the bot token out of logged errors
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Delivery problems are logged and swallowed.
    pub async fn send(&self, summary: &RunSummary) {
        match self.try_send(summary).await {
            Ok(()) => info!("Report sent to Telegram"),
            Err(e) => warn!(
                "Failed to send Telegram report: {}",
                truncate(&e.to_string(), 200)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        mock::{self, Behaviour},
        pipeline::{AccountStatus, TaskTallies},
    };

    fn report(index: usize, name: &str) -> AccountReport {
        let mut tallies = TaskTallies::default();
        tallies.record(TaskKind::Campaign, true);
        AccountReport {
            index,
            name: name.into(),
            address: "0x8ba1f109551bD432803012645Ac136ddd64DBA72".into(),
            status: AccountStatus::Success,
            tallies,
            xp: 42,
        }
    }

    #[test]
    fn markdown_escapes_reserved_characters() {
        assert_eq!(MarkdownV2.escape("a_b.c!"), "a\\_b\\.c\\!");
        let text = MarkdownV2.render(&RunSummary::default().fold(report(1, "bob.eth")));
        assert!(text.contains("`bob\\.eth`"));
        assert!(text.contains("0x8ba1f1\\.\\.\\.4DBA72"));
        assert!(text.contains("*Account 1 \\(Success\\)*"));
        assert!(text.ends_with("Report complete\\."));
    }

    #[test]
    fn html_escapes_markup() {
        assert_eq!(Html.escape("<a & b>"), "&lt;a &amp; b&gt;");
        let text = Html.render(&RunSummary::default().fold(report(1, "<x>")));
        assert!(text.contains("<code>&lt;x&gt;</code>"));
        assert!(text.contains("<code>1 ok / 0 failed</code>"));
    }

    fn unescaped(text: &str, target: char) -> usize {
        let mut count = 0;
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            match c {
                '\\' => {
                    chars.next();
                }
                c if c == target => count += 1,
                _ => {}
            }
        }
        count
    }

    #[test]
    fn long_reports_are_capped_on_block_boundaries() {
        for accounts in [40, 57, 120, 200] {
            let summary = (1..=accounts).fold(RunSummary::default(), |s, i| {
                s.fold(report(i, "a-very-long-account-name"))
            });

            let text = Html.render(&summary);
            assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
            assert!(text.ends_with(Html.truncation_marker()));
            assert_eq!(text.matches("<b>").count(), text.matches("</b>").count());
            assert_eq!(text.matches("<code>").count(), text.matches("</code>").count());

            let text = MarkdownV2.render(&summary);
            assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
            assert!(text.ends_with(MarkdownV2.truncation_marker()));
            assert_eq!(unescaped(&text, '*') % 2, 0);
            assert_eq!(unescaped(&text, '`') % 2, 0);
            assert!(text.contains("*Account 1 \\(Success\\)*"));
        }
    }

    #[test]
    fn short_reports_keep_footer() {
        let summary = RunSummary::default().fold(report(1, "alice"));
        let text = Html.render(&summary);
        assert!(text.ends_with("Report complete."));
        assert!(!text.contains("[Message truncated]"));
    }

    #[test]
    fn reporter_needs_both_settings() {
        let api = Url::parse("https://api.telegram.org").unwrap();
        let build = |token: Option<&str>, chat: Option<&str>| {
            TelegramReporter::from_settings(
                token.map(String::from),
                chat.map(String::from),
                api.clone(),
                ReportFormat::Markdown,
            )
        };
        assert!(build(Some("123:abc"), Some("42")).is_some());
        assert!(build(None, Some("42")).is_none());
        assert!(build(Some("123:abc"), None).is_none());
        assert!(build(Some("  "), Some("42")).is_none());
        assert!(build(Some("123:abc"), Some("")).is_none());
    }

    #[tokio::test]
    async fn posts_to_telegram_and_absorbs_failures() {
        let (base, state) = mock::start(Behaviour::default()).await;
        let summary = RunSummary::default().fold(report(1, "alice"));

        let reporter =
            TelegramReporter::new("123:abc".into(), "42".into(), base, ReportFormat::Html);
        reporter.send(&summary).await;
        assert_eq!(state.hits("telegram"), 1);

        let unreachable = Url::parse("http://127.0.0.1:9").unwrap();
        let reporter = TelegramReporter::new(
            "123:abc".into(),
            "42".into(),
            unreachable,
            ReportFormat::Markdown,
        );
        reporter.send(&summary).await;
    }
}

use super::{
    client::QuestClient,
    http::{RetryPolicy, retry},
    utils::truncate,
};
use crate::error::{Error, Result};
use log::{info, warn};
use rand::{Rng, seq::IndexedRandom};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};

const CREATE_ATTEMPTS: u32 = 3;
const DAILY_LIMIT_CODE: i64 = 3;

const WORDS: [&str; 100] = [
    "lucky", "star", "nova", "cool", "hoki", "prime", "sky", "neo", "blaze", "tech", "moon",
    "pulse", "vibe", "spark", "glow", "ace", "zen", "flash", "bolt", "wave", "fire", "storm",
    "dream", "edge", "flow", "peak", "rush", "light", "force", "dash", "glint", "surge", "breeze",
    "shade", "frost", "flame", "core", "drift", "bloom", "quest", "wind", "tide", "dawn", "dusk",
    "mist", "cloud", "ridge", "vale", "forge", "link", "beam", "spire", "gleam", "twist", "loop",
    "arc", "vault", "crux", "nexus", "orbit", "zest", "chill", "haze", "glory", "swift", "bold",
    "vivid", "pure", "clear", "bright", "epic", "grand", "royal", "noble", "wild", "free", "soar",
    "rise", "shine", "grow", "vapor", "trail", "echo", "pulse", "swing", "shift", "turn", "blend",
    "forge", "craft", "seek", "hunt", "roam", "drift", "sail", "climb", "reach", "touch", "spark",
    "ignite",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOutcome {
    Created,
    /// Daily quota used up; no more creations for this account today.
    DailyLimit,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest<'a> {
    user_id: String,
    project_slug: &'a str,
    zealy_user_id: String,
    project_type: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct CreateProjectResponse {
    #[serde(default)]
    success: bool,
    code: Option<i64>,
    message: Option<String>,
}

impl CreateProjectResponse {
    fn is_daily_limit(&self) -> bool {
        self.code == Some(DAILY_LIMIT_CODE)
    }
}

/// `word-word-NNNN.widget`
pub fn generate_project_slug() -> String {
    let mut rng = rand::rng();
    let first = WORDS.choose(&mut rng).copied().unwrap_or(WORDS[0]);
    let second = WORDS.choose(&mut rng).copied().unwrap_or(WORDS[1]);
    let number: u16 = rng.random_range(0..10_000);
    format!("{first}-{second}-{number:04}.widget")
}

/// A `success` acknowledgement wins; otherwise `code: 3` in any body, 2xx or not,
/// is the daily limit.
fn classify(status: StatusCode, text: &str) -> Result<ProjectOutcome> {
    let parsed: CreateProjectResponse = serde_json::from_str(text).unwrap_or_default();
    if status.is_success() && parsed.success {
        return Ok(ProjectOutcome::Created);
    }
    if parsed.is_daily_limit() {
        warn!(
            "Daily project limit reached: {}",
            parsed.message.as_deref().unwrap_or("no message")
        );
        return Ok(ProjectOutcome::DailyLimit);
    }
    if !status.is_success() {
        return Err(Error::Status {
            status,
            body: text.to_string(),
        });
    }
    Err(Error::UnexpectedResponse(
        parsed
            .message
            .unwrap_or_else(|| "project creation not acknowledged".into()),
    ))
}

async fn create_once(
    client: &QuestClient<'_>,
    body: &CreateProjectRequest<'_>,
) -> Result<ProjectOutcome> {
    let response = client
        .speedrun(
            Method::POST,
            "/api/track-project-creation",
            "/create/de-fi/shortcuts-widget",
        )?
        .json(body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    classify(status, &text)
}

pub async fn create_project(client: &QuestClient<'_>, slug: &str) -> Result<ProjectOutcome> {
    let body = CreateProjectRequest {
        user_id: client.address().to_string(),
        project_slug: slug,
        zealy_user_id: client.external_user_id.to_string(),
        project_type: "shortcuts-widget",
    };
    let policy = RetryPolicy::new(CREATE_ATTEMPTS, client.delays.retry());
    let outcome = retry(policy, "create project", || create_once(client, &body)).await;
    match &outcome {
        Ok(ProjectOutcome::Created) => info!("Project created: {slug}"),
        Ok(ProjectOutcome::DailyLimit) => {}
        Err(e) => warn!("Project {slug} failed: {}", truncate(&e.to_string(), 120)),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::{self, Behaviour};

    fn is_slug(slug: &str) -> bool {
        let Some(stem) = slug.strip_suffix(".widget") else {
            return false;
        };
        let parts: Vec<_> = stem.split('-').collect();
        parts.len() == 3
            && parts[..2]
                .iter()
                .all(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_lowercase()))
            && parts[2].len() == 4
            && parts[2].chars().all(|c| c.is_ascii_digit())
    }

    #[test]
    fn slugs_are_well_formed() {
        for _ in 0..10_000 {
            let slug = generate_project_slug();
            assert!(is_slug(&slug), "{slug}");
        }
        assert!(!is_slug("nova-star-42.widget"));
        assert!(!is_slug("Nova-star-0042.widget"));
    }

    #[test]
    fn daily_limit_code() {
        let parsed: CreateProjectResponse =
            serde_json::from_str(r#"{"success":false,"code":3,"message":"limit"}"#).unwrap();
        assert!(parsed.is_daily_limit());
        let parsed: CreateProjectResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(parsed.success && !parsed.is_daily_limit());
    }

    #[test]
    fn acknowledgement_checked_before_limit_code() {
        let ok = classify(StatusCode::OK, r#"{"success":true,"code":3}"#).unwrap();
        assert_eq!(ok, ProjectOutcome::Created);

        let limit = classify(StatusCode::OK, r#"{"success":false,"code":3}"#).unwrap();
        assert_eq!(limit, ProjectOutcome::DailyLimit);

        let limit = classify(StatusCode::TOO_MANY_REQUESTS, r#"{"code":3}"#).unwrap();
        assert_eq!(limit, ProjectOutcome::DailyLimit);

        let err = classify(StatusCode::INTERNAL_SERVER_ERROR, "oops").unwrap_err();
        assert!(matches!(err, Error::Status { .. }));
        let err = classify(StatusCode::OK, r#"{"success":false}"#).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn limit_in_error_body_is_not_retried() {
        let (base, state) = mock::start(Behaviour {
            project_limit_status: true,
            ..Default::default()
        })
        .await;
        let config = mock::config_for(&base);
        let account = mock::test_account(0);
        let client = QuestClient::new(&account, None, &config.endpoints, &config.delays).unwrap();

        let outcome = create_project(&client, "nova-star-0042.widget").await.unwrap();
        assert_eq!(outcome, ProjectOutcome::DailyLimit);
        assert_eq!(state.hits("track-project-creation"), 1);
    }

    #[tokio::test]
    async fn generic_failure_uses_every_attempt() {
        let (base, state) = mock::start(Behaviour {
            project_fails: true,
            ..Default::default()
        })
        .await;
        let config = mock::config_for(&base);
        let account = mock::test_account(0);
        let client = QuestClient::new(&account, None, &config.endpoints, &config.delays).unwrap();

        let result = create_project(&client, "nova-star-0042.widget").await;
        assert!(matches!(result, Err(Error::Status { .. })));
        assert_eq!(state.hits("track-project-creation"), 3);
    }
}

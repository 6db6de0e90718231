//! In-process stand-in for the enso/speedrun APIs, used by tests.

use crate::config::{Config, Delays, Endpoints};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct Behaviour {
    pub omit_session_cookie: bool,
    pub pending_campaigns: usize,
    pub done_campaigns: usize,
    pub protocols: usize,
    /// Report a campaign total larger than what is actually served.
    pub inflated_campaign_total: bool,
    pub chat_fails: bool,
    /// Creations accepted before the daily limit kicks in.
    pub project_quota: Option<usize>,
    /// Every creation answers 500.
    pub project_fails: bool,
    /// The daily limit arrives as a 429 error body.
    pub project_limit_status: bool,
    pub omit_campaign_total: bool,
    pub track_fails: bool,
}

#[derive(Default)]
pub struct MockState {
    pub behaviour: Behaviour,
    hits: Mutex<HashMap<String, usize>>,
    projects: Mutex<usize>,
}

impl MockState {
    fn hit(&self, route: &str) {
        *self.hits.lock().unwrap().entry(route.to_string()).or_default() += 1;
    }

    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or_default()
    }

    pub fn task_hits(&self) -> usize {
        [
            "search",
            "track-project-creation",
            "get-campaigns",
            "track-campaign",
            "get-protocols",
            "track-protocol",
        ]
        .iter()
        .map(|r| self.hits(r))
        .sum()
    }
}

type Shared = State<Arc<MockState>>;

fn page_of(items: Vec<Value>, params: &HashMap<String, String>) -> Vec<Value> {
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let limit: usize = params.get("limit").and_then(|p| p.parse().ok()).unwrap_or(10);
    items.into_iter().skip((page - 1) * limit).take(limit).collect()
}

async fn ip(State(state): Shared) -> Json<Value> {
    state.hit("ip");
    Json(json!({ "ip": "127.0.0.1" }))
}

async fn nonce(State(state): Shared) -> &'static str {
    state.hit("nonce");
    "\"n0nce\""
}

async fn verify(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("verify");
    if body["signature"].as_str().is_none_or(|s| s.len() != 132) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let body = Json(json!({ "ok": true }));
    match state.behaviour.omit_session_cookie {
        true => body.into_response(),
        false => (
            [(SET_COOKIE, "brian-token=tok3n-value; Path=/; HttpOnly")],
            body,
        )
            .into_response(),
    }
}

async fn me(State(state): Shared) -> Json<Value> {
    state.hit("me");
    Json(json!({
        "account": { "address": "0x8ba1f109551bD432803012645Ac136ddd64DBA72" }
    }))
}

async fn search(State(state): Shared) -> Response {
    state.hit("search");
    match state.behaviour.chat_fails {
        true => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        false => Json(json!({ "answer": "Enso is a shortcut engine." })).into_response(),
    }
}

async fn create_project(State(state): Shared) -> Response {
    state.hit("track-project-creation");
    let b = &state.behaviour;
    if b.project_fails {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if b.project_limit_status {
        let body = Json(json!({ "code": 3, "message": "Daily limit reached" }));
        return (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    }
    let mut created = state.projects.lock().unwrap();
    match b.project_quota {
        Some(quota) if *created >= quota => {
            Json(json!({ "success": false, "code": 3, "message": "Daily limit reached" }))
                .into_response()
        }
        _ => {
            *created += 1;
            Json(json!({ "success": true })).into_response()
        }
    }
}

async fn campaigns(
    State(state): Shared,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hit("get-campaigns");
    let b = &state.behaviour;
    let all: Vec<Value> = (0..b.pending_campaigns + b.done_campaigns)
        .map(|i| {
            let done = i >= b.pending_campaigns;
            json!({
                "id": i + 1,
                "name": format!("Campaign {}", i + 1),
                "visited": done,
                "pointsAwarded": done,
            })
        })
        .collect();
    let total = match b.inflated_campaign_total {
        true => all.len() + 100,
        false => all.len(),
    };
    match b.omit_campaign_total {
        true => Json(json!({ "campaigns": page_of(all, &params) })),
        false => Json(json!({ "campaigns": page_of(all, &params), "total": total })),
    }
}

async fn protocols(
    State(state): Shared,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.hit("get-protocols");
    let all: Vec<Value> = (0..state.behaviour.protocols)
        .map(|i| {
            json!({
                "id": format!("proto-{i}"),
                "name": format!("Protocol {i}"),
                "visited": false,
                "pointsAwarded": false,
            })
        })
        .collect();
    Json(json!({ "protocols": page_of(all, &params) }))
}

async fn track(state: &MockState, route: &str) -> Response {
    state.hit(route);
    match state.behaviour.track_fails {
        true => Json(json!({ "message": "Already visited" })).into_response(),
        false => Json(json!({ "message": "Points awarded and visit recorded" })).into_response(),
    }
}

async fn user(State(state): Shared) -> Json<Value> {
    state.hit("user");
    Json(json!({
        "name": "tester",
        "connectedWallet": "0x8ba1f109551bD432803012645Ac136ddd64DBA72",
        "xp": 250,
    }))
}

async fn telegram(State(state): Shared, Json(body): Json<Value>) -> Response {
    state.hit("telegram");
    match body["text"].as_str() {
        Some(_) => Json(json!({ "ok": true })).into_response(),
        None => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Serves the mock on an ephemeral port and returns its base URL.
pub async fn start(behaviour: Behaviour) -> (Url, Arc<MockState>) {
    let state = Arc::new(MockState {
        behaviour,
        ..Default::default()
    });

    let app = Router::new()
        .route("/ip", get(ip))
        .route("/api/auth/nonce", get(nonce))
        .route("/api/auth/verify", post(verify))
        .route("/api/auth/me", get(me))
        .route("/api/search", post(search))
        .route("/api/track-project-creation", post(create_project))
        .route("/api/get-campaigns", get(campaigns))
        .route(
            "/api/track-campaign",
            post(|State(s): Shared| async move { track(&s, "track-campaign").await }),
        )
        .route("/api/get-protocols", get(protocols))
        .route(
            "/api/track-protocol",
            post(|State(s): Shared| async move { track(&s, "track-protocol").await }),
        )
        .route("/api/zealy/user/{id}", get(user))
        .route("/{bot}/sendMessage", post(telegram))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    (Url::parse(&format!("http://{addr}")).unwrap(), state)
}

/// Default config pointed at the mock, with every pause set to zero.
pub fn config_for(base: &Url) -> Config {
    Config {
        endpoints: Endpoints {
            enso: base.clone(),
            speedrun: base.clone(),
            ip_lookup: base.join("/ip").unwrap(),
            telegram: base.clone(),
        },
        delays: Delays::zero(),
        ..Config::default()
    }
}

/// Deterministic account; `n` selects the private key.
pub fn test_account(n: u64) -> crate::core::account::Account {
    let line = format!("{:064x},3f2504e0-4f89-41d3-9a0c-0305e82c33{:02x}", n + 1, n % 256);
    crate::core::account::Account::parse_line(&line, 1).unwrap()
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use hearth_core::{Account, Friend, Reminder, Transaction};
use hearth_gateway::{Channel, Gateway, Reply, SessionKey};
use serde::{Deserialize, Serialize};
use tracing::info;

mod page;

#[derive(Clone)]
struct AppState {
    gateway: Arc<Gateway>,
}

#[derive(Debug, Serialize)]
struct ApiHealth {
    status: &'static str,
    decoder: &'static str,
}

#[derive(Debug, Serialize)]
struct AccountsDto {
    accounts: Vec<Account>,
    total_balance: f64,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChatInput {
    session_id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChoiceInput {
    session_id: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct ConfirmInput {
    session_id: String,
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct SessionInput {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct LogoutOutput {
    status: &'static str,
    session_id: String,
}

pub fn router(gateway: Arc<Gateway>) -> Router {
    let state = Arc::new(AppState { gateway });
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(api_health))
        .route("/api/accounts", get(api_accounts))
        .route("/api/friends", get(api_friends))
        .route("/api/transactions", get(api_transactions))
        .route("/api/reminders", get(api_reminders))
        .route("/api/reminders/{id}/done", post(api_reminder_done))
        .route("/api/chat", post(api_chat))
        .route("/api/chat/choice", post(api_choice))
        .route("/api/confirm", post(api_confirm))
        .route("/api/refresh", post(api_refresh))
        .route("/api/sessions/{id}/logout", post(api_logout))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, gateway: Arc<Gateway>) -> Result<()> {
    let app = router(gateway);
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("invalid bind address: {bind_addr}"))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "web dashboard listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Html(page::DASHBOARD)
}

async fn api_health(State(state): State<Arc<AppState>>) -> Json<ApiHealth> {
    Json(ApiHealth {
        status: "ok",
        decoder: state.gateway.decoder_name(),
    })
}

async fn api_accounts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AccountsDto>, (StatusCode, String)> {
    let accounts = state.gateway.view().map_err(internal_error)?.accounts;
    let total_balance = accounts.iter().map(|a| a.balance).sum();
    Ok(Json(AccountsDto {
        accounts,
        total_balance,
    }))
}

async fn api_friends(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Friend>>, (StatusCode, String)> {
    let friends = state.gateway.view().map_err(internal_error)?.friends;
    Ok(Json(friends))
}

async fn api_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Transaction>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(20).min(200);
    let mut transactions = state.gateway.view().map_err(internal_error)?.transactions;
    transactions.reverse();
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
    transactions.truncate(limit);
    Ok(Json(transactions))
}

async fn api_reminders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Reminder>>, (StatusCode, String)> {
    let mut reminders = state.gateway.view().map_err(internal_error)?.reminders;
    reminders.sort_by(|a, b| (a.done, a.date, a.time).cmp(&(b.done, b.date, b.time)));
    Ok(Json(reminders))
}

async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ChatInput>,
) -> Result<Json<Reply>, (StatusCode, String)> {
    let key = session_key(&input.session_id)?;
    Ok(Json(state.gateway.handle_text(&key, &input.text).await))
}

async fn api_choice(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ChoiceInput>,
) -> Result<Json<Reply>, (StatusCode, String)> {
    let key = session_key(&input.session_id)?;
    Ok(Json(state.gateway.handle_choice(&key, &input.value).await))
}

async fn api_confirm(
    State(state): State<Arc<AppState>>,
    Json(input): Json<ConfirmInput>,
) -> Result<Json<Reply>, (StatusCode, String)> {
    let key = session_key(&input.session_id)?;
    Ok(Json(state.gateway.confirm(&key, input.accepted).await))
}

async fn api_reminder_done(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(input): Json<SessionInput>,
) -> Result<Json<Reply>, (StatusCode, String)> {
    let key = session_key(&input.session_id)?;
    Ok(Json(state.gateway.complete_reminder(&key, &id).await))
}

async fn api_refresh(State(state): State<Arc<AppState>>) -> Json<Reply> {
    Json(state.gateway.refresh().await)
}

async fn api_logout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LogoutOutput>, (StatusCode, String)> {
    let key = session_key(&id)?;
    let status = if state.gateway.logout(&key) {
        "logged_out"
    } else {
        "not_found"
    };
    Ok(Json(LogoutOutput {
        status,
        session_id: id,
    }))
}

fn session_key(session_id: &str) -> Result<SessionKey, (StatusCode, String)> {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "session_id is required".to_string()));
    }
    Ok(SessionKey::new(Channel::Web, trimmed))
}

fn internal_error(err: impl std::fmt::Display) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {}", err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::NaiveDate;
    use hearth_common::MatchPolicy;
    use hearth_core::Record;
    use hearth_gateway::{KeywordDecoder, SyncEngine};
    use hearth_store::InMemoryStore;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = Arc::new(InMemoryStore::with_records([
            Record::Account(Account::new("Cash", "wallet", 1000.0)),
            Record::Reminder(Reminder::new(
                "Pay rent",
                NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
                None,
            )),
        ]));
        let sync = Arc::new(SyncEngine::new(store));
        sync.refresh().await.expect("load");
        let gateway = Gateway::new(sync, Arc::new(KeywordDecoder), "₹", MatchPolicy::First)
            .with_today(NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"));
        router(Arc::new(gateway))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    #[tokio::test]
    async fn health_reports_the_decoder() {
        let response = app()
            .await
            .oneshot(Request::get("/api/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["decoder"], "keyword");
    }

    #[tokio::test]
    async fn chat_then_accounts_shows_new_balance() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat",
                json!({"session_id": "tab-1", "text": "spent 250 on books"}),
            ))
            .await
            .expect("response");
        let reply = json_body(response).await;
        assert_eq!(reply["status"], "executed");

        let response = app
            .oneshot(Request::get("/api/accounts").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let body = json_body(response).await;
        assert_eq!(body["accounts"][0]["balance"], 750.0);
        assert_eq!(body["total_balance"], 750.0);
    }

    #[tokio::test]
    async fn destructive_chat_waits_for_confirm_endpoint() {
        let app = app().await;
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/chat",
                json!({"session_id": "tab-1", "text": "delete the rent reminder"}),
            ))
            .await
            .expect("response");
        let reply = json_body(response).await;
        assert_eq!(reply["status"], "pending_confirmation");

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/confirm",
                json!({"session_id": "tab-1", "accepted": true}),
            ))
            .await
            .expect("response");
        assert_eq!(json_body(response).await["status"], "executed");

        let response = app
            .oneshot(Request::get("/api/reminders").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(json_body(response).await, json!([]));
    }

    #[tokio::test]
    async fn blank_session_id_is_a_bad_request() {
        let response = app()
            .await
            .oneshot(post_json("/api/chat", json!({"session_id": " ", "text": "hi"})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_reports_unknown_sessions() {
        let response = app()
            .await
            .oneshot(post_json("/api/sessions/tab-9/logout", json!({})))
            .await
            .expect("response");
        assert_eq!(json_body(response).await["status"], "not_found");
    }
}

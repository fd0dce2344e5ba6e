// Mini Wallet - API Server
// Binds the wallet endpoints to the ledger engine. Callers authenticate
// with the bearer token issued by /api/v1/init; every other endpoint
// resolves that token to an account id before touching the engine.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use mini_wallet::{
    setup_database, Config, Ledger, LedgerError, SqliteStore, TokenCodec, Transaction,
    TransferRequest, Wallet, WalletStatus,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    ledger: Ledger<SqliteStore>,
}

// ============================================================================
// Response Envelope
// ============================================================================
// { "status": "success" | "fail" | "error", "data": ... }
// "fail" is a client-correctable condition (validation, business rule),
// "error" is an infrastructure failure.

fn success(code: StatusCode, data: Value) -> (StatusCode, Json<Value>) {
    (code, Json(json!({ "status": "success", "data": data })))
}

fn failure(err: LedgerError) -> (StatusCode, Json<Value>) {
    match err {
        LedgerError::Validation(fields) => {
            let details: Value = fields
                .iter()
                .map(|f| (f.field.clone(), json!(f.message)))
                .collect::<serde_json::Map<_, _>>()
                .into();
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "fail", "data": { "validation": details } })),
            )
        }
        err if err.is_business() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "fail", "data": { "error": err.to_string() } })),
        ),
        LedgerError::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "fail", "data": { "error": "not found" } })),
        ),
        LedgerError::Token(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "fail", "data": { "error": "invalid token" } })),
        ),
        err => {
            tracing::error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "status": "error", "message": "internal error" })),
            )
        }
    }
}

/// Pull the account id out of `Authorization: Token <token>`
fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Uuid, (StatusCode, Json<Value>)> {
    let header = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let token = header
        .strip_prefix("Token ")
        .or_else(|| header.strip_prefix("Bearer "))
        .unwrap_or_default();
    if token.is_empty() {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "fail", "data": { "error": "missing token" } })),
        ));
    }

    state.ledger.authenticate(token).map_err(failure)
}

// ============================================================================
// Projections
// ============================================================================

fn wallet_view(wallet: &Wallet) -> Value {
    let mut view = json!({
        "id": wallet.id,
        "owned_by": wallet.owned_by,
        "status": wallet.status.as_str(),
        "balance": wallet.balance,
    });
    // Exactly one of the toggle timestamps is exposed, matching the status
    match wallet.status {
        WalletStatus::Enabled => {
            view["enabled_at"] = json!(wallet.enabled_at);
        }
        WalletStatus::Disabled => {
            view["disabled_at"] = json!(wallet.disabled_at);
        }
    }
    view
}

fn transaction_view(tx: &Transaction) -> Value {
    json!({
        "id": tx.id,
        "status": tx.status.as_str(),
        "transacted_at": tx.transacted_at,
        "type": tx.kind.as_str(),
        "amount": tx.amount,
        "reference_id": tx.reference_id,
    })
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Deserialize)]
struct InitPayload {
    #[serde(default)]
    customer_xid: String,
}

#[derive(Deserialize)]
struct TransferPayload {
    #[serde(default)]
    reference_id: String,
    #[serde(default)]
    amount: i64,
}

/// POST /api/v1/init - provision account + wallet, issue a session token
async fn init(State(state): State<AppState>, Json(payload): Json<InitPayload>) -> impl IntoResponse {
    match state.ledger.init(&payload.customer_xid) {
        Ok(token) => success(StatusCode::CREATED, json!({ "token": token })),
        Err(err) => failure(err),
    }
}

/// POST /api/v1/wallet - enable the caller's wallet
async fn enable_wallet(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let account_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.ledger.enable(account_id) {
        Ok(wallet) => success(StatusCode::OK, json!({ "wallet": wallet_view(&wallet) })),
        Err(err) => failure(err),
    }
}

/// PATCH /api/v1/wallet - disable the caller's wallet
async fn disable_wallet(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let account_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.ledger.disable(account_id) {
        Ok(wallet) => success(StatusCode::OK, json!({ "wallet": wallet_view(&wallet) })),
        Err(err) => failure(err),
    }
}

/// GET /api/v1/wallet - view the caller's wallet
async fn get_wallet(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let account_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.ledger.get(account_id) {
        Ok(wallet) => success(StatusCode::OK, json!({ "wallet": wallet_view(&wallet) })),
        Err(err) => failure(err),
    }
}

/// GET /api/v1/wallet/transactions - list the caller's transactions
async fn get_transactions(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let account_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match state.ledger.transactions(account_id) {
        Ok(transactions) => {
            let views: Vec<Value> = transactions.iter().map(transaction_view).collect();
            success(StatusCode::OK, json!({ "transactions": views }))
        }
        Err(err) => failure(err),
    }
}

/// POST /api/v1/wallet/deposits - add funds
async fn deposit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TransferPayload>,
) -> impl IntoResponse {
    let account_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = TransferRequest {
        reference_id: payload.reference_id,
        amount: payload.amount,
    };
    match state.ledger.deposit(account_id, request) {
        Ok(tx) => success(
            StatusCode::CREATED,
            json!({ "deposit": {
                "id": tx.id,
                "deposited_by": account_id,
                "status": tx.status.as_str(),
                "deposited_at": tx.transacted_at,
                "amount": tx.amount,
                "reference_id": tx.reference_id,
            }}),
        ),
        Err(err) => failure(err),
    }
}

/// POST /api/v1/wallet/withdrawals - take funds out
async fn withdraw(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TransferPayload>,
) -> impl IntoResponse {
    let account_id = match authenticate(&state, &headers) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let request = TransferRequest {
        reference_id: payload.reference_id,
        amount: payload.amount,
    };
    match state.ledger.withdraw(account_id, request) {
        Ok(tx) => success(
            StatusCode::CREATED,
            json!({ "withdrawal": {
                "id": tx.id,
                "withdrawn_by": account_id,
                "status": tx.status.as_str(),
                "withdrawn_at": tx.transacted_at,
                "amount": tx.amount,
                "reference_id": tx.reference_id,
            }}),
        ),
        Err(err) => failure(err),
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let conn = mini_wallet::open(&config.db_path)?;
    setup_database(&conn)?;
    tracing::info!(path = %config.db_path.display(), "database ready");

    let state = AppState {
        ledger: Ledger::new(
            SqliteStore::new(conn),
            TokenCodec::new(&config.token_secret)?,
        ),
    };

    let app = Router::new()
        .route("/api/v1/init", post(init))
        .route(
            "/api/v1/wallet",
            post(enable_wallet).patch(disable_wallet).get(get_wallet),
        )
        .route("/api/v1/wallet/transactions", get(get_transactions))
        .route("/api/v1/wallet/deposits", post(deposit))
        .route("/api/v1/wallet/withdrawals", post(withdraw))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "wallet server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

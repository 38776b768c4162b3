//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{Account, AccountNumber, OperationContext, TransactionRecord, TransactionType};
use crate::error::AppError;
use crate::handlers::{RegisterUserCommand, TransferCommand};

use super::middleware::RequestUser;
use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub name: String,
    pub account_number: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub account_numbers: Vec<AccountNumber>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub account_number: AccountNumber,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            account_number: account.account_number,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AccountOwnerResponse {
    pub account_number: AccountNumber,
    pub owner_name: String,
}

/// Transfer request body. `amount` may arrive as a JSON number or string;
/// it is validated by the transfer engine.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account: String,
    pub to_account: String,
    #[serde(default)]
    pub amount: Value,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub from_account: AccountNumber,
    pub to_account: AccountNumber,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionRecord> for TransactionResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            from_account: record.from_account,
            to_account: record.to_account,
            amount: record.amount,
            transaction_type: record.transaction_type,
            description: record.description,
            created_at: record.created_at,
        }
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn caller(user: Option<Extension<RequestUser>>) -> Result<Uuid, AppError> {
    user.map(|Extension(user)| user.user_id)
        .ok_or(AppError::Unauthenticated)
}

fn parse_account_number(field: &str, raw: &str) -> Result<AccountNumber, AppError> {
    raw.parse()
        .map_err(|_| AppError::InvalidRequest(format!("{field} must be a 10-digit account number")))
}

fn amount_text(amount: &Value) -> String {
    match amount {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/accounts", post(create_account).get(list_accounts))
        .route("/accounts/:account_number", get(find_account))
        .route("/transactions", post(transfer).get(owner_history))
        .route("/transactions/:account_number", get(account_history))
}

// =========================================================================
// POST /auth/register
// =========================================================================

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let result = state
        .users
        .register(RegisterUserCommand::new(request.name, request.email, request.password))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: result.user_id,
            name: result.name,
            account_number: result.account_number.to_string(),
        }),
    ))
}

// =========================================================================
// POST /auth/login
// =========================================================================

async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state.users.authenticate(&request.email, &request.password).await?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        email: user.email,
        account_numbers: user.account_numbers,
    }))
}

// =========================================================================
// POST /accounts, GET /accounts
// =========================================================================

async fn create_account(
    State(state): State<AppState>,
    user: Option<Extension<RequestUser>>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    let owner_id = caller(user)?;

    let number = state.accounts.create_account(owner_id).await?;
    let account = state.accounts.find_by_account_number(number.as_str()).await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn list_accounts(
    State(state): State<AppState>,
    user: Option<Extension<RequestUser>>,
) -> Result<Json<Vec<AccountResponse>>, AppError> {
    let owner_id = caller(user)?;

    let accounts = state.accounts.list_by_owner(owner_id).await?;
    Ok(Json(accounts.into_iter().map(Into::into).collect()))
}

// =========================================================================
// GET /accounts/:account_number
// =========================================================================

/// Public lookup of the owner's name, used before sending a transfer
async fn find_account(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<AccountOwnerResponse>, AppError> {
    let number = parse_account_number("account_number", &account_number)?;
    let owner_name = state.accounts.owner_name(number.as_str()).await?;

    Ok(Json(AccountOwnerResponse {
        account_number: number,
        owner_name,
    }))
}

// =========================================================================
// POST /transactions
// =========================================================================

async fn transfer(
    State(state): State<AppState>,
    user: Option<Extension<RequestUser>>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<TransferRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), AppError> {
    let requesting_user_id = caller(user)?;

    parse_account_number("from_account", &request.from_account)?;
    parse_account_number("to_account", &request.to_account)?;

    let mut command = TransferCommand::new(
        request.from_account,
        request.to_account,
        amount_text(&request.amount),
        requesting_user_id,
    );
    command.description = request.description;

    let record = state.transfers.execute(command, &context).await?;

    Ok((StatusCode::CREATED, Json(record.into())))
}

// =========================================================================
// GET /transactions, GET /transactions/:account_number
// =========================================================================

async fn owner_history(
    State(state): State<AppState>,
    user: Option<Extension<RequestUser>>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let owner_id = caller(user)?;

    let records = state.history.history_for_owner(owner_id).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// History of one of the caller's accounts. Accounts the caller does not
/// own are reported as not found.
async fn account_history(
    State(state): State<AppState>,
    user: Option<Extension<RequestUser>>,
    Path(account_number): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, AppError> {
    let owner_id = caller(user)?;
    let number = parse_account_number("account_number", &account_number)?;

    let account = state.accounts.find_by_account_number(number.as_str()).await?;
    if !account.is_owned_by(owner_id) {
        return Err(crate::domain::DomainError::AccountNotFound(number.to_string()).into());
    }

    let records = state.history.history_for_account(&number).await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_amount_text() {
        assert_eq!(amount_text(&json!(1000)), "1000");
        assert_eq!(amount_text(&json!("250")), "250");
        assert_eq!(amount_text(&json!(-5)), "-5");
        assert_eq!(amount_text(&json!(1.5)), "1.5");
        assert_eq!(amount_text(&Value::Null), "null");
    }

    #[test]
    fn test_parse_account_number() {
        assert!(parse_account_number("from_account", "1234567890").is_ok());
        assert!(matches!(
            parse_account_number("from_account", "12345"),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_transfer_request_accepts_numeric_amount() {
        let request: TransferRequest = serde_json::from_value(json!({
            "from_account": "1111111111",
            "to_account": "2222222222",
            "amount": 1000
        }))
        .unwrap();

        assert_eq!(amount_text(&request.amount), "1000");
        assert!(request.description.is_none());
    }
}

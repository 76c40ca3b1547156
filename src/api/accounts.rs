use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::db::entities::email_account;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AccountInput {
    pub email: String,
    pub name: String,
}

/// GET /api/email-accounts
pub async fn list_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<email_account::Model>>, ApiError> {
    let accounts = email_account::Entity::find()
        .order_by_asc(email_account::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(accounts))
}

/// POST /api/email-accounts
pub async fn create_account(
    State(state): State<AppState>,
    Json(input): Json<AccountInput>,
) -> Result<Json<email_account::Model>, ApiError> {
    let email = input.email.trim();
    if email.is_empty() {
        return Err(ApiError::BadRequest("Sender email is required".to_string()));
    }

    let account = email_account::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(input.name.trim().to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Email account '{}' registered", account.email);
    Ok(Json(account))
}

/// DELETE /api/email-accounts/{id}
pub async fn delete_account(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = email_account::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Email account not found".to_string()));
    }

    Ok(Json(
        serde_json::json!({ "message": "Email account deleted successfully" }),
    ))
}

pub async fn find_account(state: &AppState, id: Uuid) -> Result<email_account::Model, ApiError> {
    email_account::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Email account '{}' not found", id)))
}

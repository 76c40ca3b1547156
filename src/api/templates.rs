use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::db::entities::email_template;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    pub subject: String,
    pub body: String,
}

/// GET /api/templates
pub async fn list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<email_template::Model>>, ApiError> {
    let templates = email_template::Entity::find()
        .order_by_asc(email_template::Column::CreatedAt)
        .all(&state.db)
        .await?;
    Ok(Json(templates))
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<AppState>,
    Json(input): Json<TemplateInput>,
) -> Result<Json<email_template::Model>, ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Template name is required".to_string()));
    }

    let template = email_template::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(input.name.trim().to_string()),
        subject: Set(input.subject),
        body: Set(input.body),
        created_at: Set(Utc::now()),
    }
    .insert(&state.db)
    .await?;

    tracing::info!("Template '{}' saved ({})", template.name, template.id);
    Ok(Json(template))
}

/// DELETE /api/templates/{id}
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let result = email_template::Entity::delete_by_id(id)
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Template not found".to_string()));
    }

    tracing::info!("Template {} deleted", id);
    Ok(Json(
        serde_json::json!({ "message": "Template deleted successfully" }),
    ))
}

/// Load one template for a batch run
pub async fn find_template(state: &AppState, id: Uuid) -> Result<email_template::Model, ApiError> {
    email_template::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Template '{}' not found", id)))
}

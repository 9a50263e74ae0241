use crate::error::AppError;
use crate::models::{score_response, validate_form, validate_response, Form, QuestionScore, SubmittedAnswer};
use crate::state::{AppState, FormRecord, ResponseRecord};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

pub async fn create_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<Form>,
) -> Result<(StatusCode, Json<FormRecord>), AppError> {
    let req_id = request_id_from_headers(&headers);
    if let Err(issues) = validate_form(&form) {
        return Err(AppError::validation("form validation failed", issues, req_id));
    }
    let record = state.create_form(form).await;
    info!(form_id = %record.form.id, questions = record.form.questions.len(), "form created");
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Serialize)]
pub struct FormSummary {
    pub id: String,
    pub title: String,
    #[serde(rename = "questionCount")]
    pub question_count: usize,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct FormListResponse {
    pub items: Vec<FormSummary>,
    pub total: usize,
}

pub async fn list_forms(State(state): State<AppState>) -> Json<FormListResponse> {
    let forms = state.db.forms.read().await;
    let mut items: Vec<FormSummary> = forms
        .values()
        .map(|r| FormSummary {
            id: r.form.id.clone(),
            title: r.form.title.clone(),
            question_count: r.form.questions.len(),
            created_at: r.created_at,
        })
        .collect();
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(FormListResponse { total: items.len(), items })
}

pub async fn get_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<FormRecord>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let form = state
        .db
        .forms
        .read()
        .await
        .get(&id)
        .cloned()
        .ok_or_else(|| AppError::not_found("form not found", req_id))?;
    Ok(Json(form))
}

pub async fn update_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(form): Json<Form>,
) -> Result<Json<FormRecord>, AppError> {
    let req_id = request_id_from_headers(&headers);
    if let Err(issues) = validate_form(&form) {
        return Err(AppError::validation("form validation failed", issues, req_id));
    }
    let record = state
        .replace_form(&id, form)
        .await
        .ok_or_else(|| AppError::not_found("form not found", req_id))?;
    Ok(Json(record))
}

pub async fn delete_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let req_id = request_id_from_headers(&headers);
    if !state.delete_form(&id).await {
        return Err(AppError::not_found("form not found", req_id));
    }
    info!(form_id = %id, "form deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponsePayload {
    #[serde(default)]
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponseOut {
    #[serde(rename = "responseId")]
    pub response_id: String,
    pub message: &'static str,
}

pub async fn submit_response(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<SubmitResponsePayload>,
) -> Result<(StatusCode, Json<SubmitResponseOut>), AppError> {
    let req_id = request_id_from_headers(&headers);
    let form = state
        .db
        .forms
        .read()
        .await
        .get(&id)
        .map(|r| r.form.clone())
        .ok_or_else(|| AppError::not_found("form not found", req_id.clone()))?;
    if let Err(issues) = validate_response(&form, &payload.answers) {
        return Err(AppError::validation("response validation failed", issues, req_id));
    }
    let record = state.record_response(&id, payload.answers).await;
    info!(form_id = %id, response_id = %record.id, answers = record.answers.len(), "response recorded");
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponseOut {
            response_id: record.id,
            message: "response recorded",
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct ScoredResponse {
    #[serde(flatten)]
    pub response: ResponseRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<QuestionScore>,
}

#[derive(Debug, Serialize)]
pub struct ResponseListResponse {
    pub items: Vec<ScoredResponse>,
    pub total: usize,
}

pub async fn list_responses(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<ResponseListResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let form = state
        .db
        .forms
        .read()
        .await
        .get(&id)
        .map(|r| r.form.clone())
        .ok_or_else(|| AppError::not_found("form not found", req_id))?;
    let responses = state.db.responses.read().await;
    let items: Vec<ScoredResponse> = responses
        .get(&id)
        .map(|list| {
            list.iter()
                .map(|r| ScoredResponse {
                    score: score_response(&form, &r.answers),
                    response: r.clone(),
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(Json(ResponseListResponse { total: items.len(), items }))
}

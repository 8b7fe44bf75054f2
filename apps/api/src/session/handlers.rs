use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::intake::{intake_audio, AudioUpload, IntakeError, UploadOwner};
use crate::routes::extract::{ApiPath, ApiQuery};
use crate::session::listing::{ListQuery, SessionSummary};
use crate::session::model::{InterviewSession, SessionDetails};
use crate::session::orchestrator::AnswerSubmission;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuery {
    pub experience_level: String,
    pub language: String,
}

#[derive(Deserialize)]
pub struct EndQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct QuestionResponse {
    pub question: String,
}

/// POST /interviews/start/:user_id
pub async fn handle_start(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(params): ApiQuery<StartQuery>,
) -> Result<Json<InterviewSession>, AppError> {
    let session = state
        .orchestrator
        .start_session(&user_id, &params.experience_level, &params.language)
        .await?;
    Ok(Json(session))
}

/// GET /interviews/:session_id/question
pub async fn handle_first_question(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> Result<Json<QuestionResponse>, AppError> {
    let question = state.orchestrator.get_first_question(session_id).await?;
    Ok(Json(QuestionResponse { question }))
}

/// POST /interviews/:session_id/answer
/// Multipart form: `file` (the recording), `userId`, `userName`.
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnswerSubmission>, AppError> {
    let mut multipart = multipart?;
    let limit = state.max_audio_bytes;
    let read_err = |e: MultipartError| -> AppError {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            IntakeError::TooLarge { limit }.into()
        } else {
            AppError::Validation(e.body_text())
        }
    };

    let mut upload: Option<AudioUpload> = None;
    let mut user_id: Option<String> = None;
    let mut user_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(read_err)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(read_err)?;
                upload = Some(AudioUpload {
                    file_name,
                    content_type,
                    data,
                });
            }
            "userId" => user_id = Some(field.text().await.map_err(read_err)?),
            "userName" => user_name = Some(field.text().await.map_err(read_err)?),
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| AppError::Validation("Missing part: file".to_string()))?;
    let user_id = required_part(user_id, "userId")?;
    let user_name = required_part(user_name, "userName")?;

    let owner = UploadOwner {
        user_id: &user_id,
        user_name: &user_name,
        session_id,
    };
    let audio_ref = intake_audio(state.audio_store.as_ref(), upload, &owner, limit).await?;

    let submission = state
        .orchestrator
        .submit_answer(session_id, &audio_ref)
        .await?;
    Ok(Json(submission))
}

fn required_part(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("Missing part: {name}")))
}

/// POST /interviews/:session_id/end
pub async fn handle_end(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<EndQuery>,
) -> Result<Json<InterviewSession>, AppError> {
    let session = state
        .orchestrator
        .end_session(session_id, params.force)
        .await?;
    Ok(Json(session))
}

/// GET /interviews/:session_id/details
pub async fn handle_details(
    State(state): State<AppState>,
    ApiPath(session_id): ApiPath<Uuid>,
) -> Result<Json<SessionDetails>, AppError> {
    let details = state.orchestrator.get_session_details(session_id).await?;
    Ok(Json(details))
}

/// GET /interviews/sessions/:user_id
pub async fn handle_list(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<String>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    let sessions = state.orchestrator.list_sessions(&user_id, query).await?;
    Ok(Json(sessions))
}

pub mod extract;
pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    http::{Method, Uri},
    middleware,
    routing::{get, post},
    Router,
};

use crate::errors::{attach_error_path, AppError};
use crate::session::handlers;
use crate::state::AppState;

/// Multipart framing and the text parts ride on top of the recording itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}

async fn method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(method.to_string())
}

pub fn build_router(state: AppState) -> Router {
    let answer_body_limit = state
        .max_audio_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/interviews/start/:user_id", post(handlers::handle_start))
        .route(
            "/interviews/:session_id/question",
            get(handlers::handle_first_question),
        )
        .route(
            "/interviews/:session_id/answer",
            post(handlers::handle_submit_answer)
                .layer(DefaultBodyLimit::max(answer_body_limit)),
        )
        .route("/interviews/:session_id/end", post(handlers::handle_end))
        .route(
            "/interviews/:session_id/details",
            get(handlers::handle_details),
        )
        .route("/interviews/sessions/:user_id", get(handlers::handle_list))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn(attach_error_path))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::ai_client::AgentReply;
    use crate::session::ledger::Feedback;
    use crate::session::orchestrator::SessionOrchestrator;
    use crate::session::store::InMemorySessionStore;
    use crate::testing::{FakeTranscriber, ManualClock, MemoryAudioStore, ScriptedAgent};

    const BOUNDARY: &str = "interview-test-boundary";

    struct TestApp {
        router: Router,
        agent: Arc<ScriptedAgent>,
        audio: Arc<MemoryAudioStore>,
        clock: Arc<ManualClock>,
    }

    fn app_with_limit(max_audio_bytes: usize) -> TestApp {
        let agent = Arc::new(ScriptedAgent::new("What is ownership in Rust?"));
        let audio = Arc::new(MemoryAudioStore::default());
        let clock = Arc::new(ManualClock::default());
        let orchestrator = SessionOrchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(FakeTranscriber::new("Each value has a single owner")),
            agent.clone(),
            clock.clone(),
        );
        let router = build_router(AppState {
            orchestrator,
            audio_store: audio.clone(),
            max_audio_bytes,
        });
        TestApp {
            router,
            agent,
            audio,
            clock,
        }
    }

    fn app() -> TestApp {
        app_with_limit(1024)
    }

    fn multipart_body(file_name: &str, data: &[u8], user_id: &str, user_name: &str) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: audio/webm\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
        for (name, value) in [("userId", user_id), ("userName", user_name)] {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
        let response: Response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn answer_request(session_id: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/interviews/{session_id}/answer"))
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn start(app: &TestApp, user_id: &str) -> String {
        let (status, json) = send(
            app,
            empty(
                "POST",
                &format!("/interviews/start/{user_id}?experienceLevel=SENIOR&language=Rust"),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, json) = send(&app, empty("GET", "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["service"], "interview-api");
    }

    #[tokio::test]
    async fn test_start_then_conflict() {
        let app = app();
        let (status, json) = send(
            &app,
            empty(
                "POST",
                "/interviews/start/u1?experienceLevel=JUNIOR&language=Go",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["questionAnswers"], serde_json::json!([]));

        let (status, json) = send(
            &app,
            empty(
                "POST",
                "/interviews/start/u1?experienceLevel=JUNIOR&language=Go",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["status"], 409);
        assert_eq!(json["path"], "/interviews/start/u1");
    }

    #[tokio::test]
    async fn test_missing_query_parameter_is_uniform_400() {
        let app = app();
        let (status, json) =
            send(&app, empty("POST", "/interviews/start/u1?language=Go")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Validation Failed");
        assert_eq!(json["path"], "/interviews/start/u1");
    }

    #[tokio::test]
    async fn test_full_conversation_over_http() {
        let app = app();
        app.agent.push_reply(Ok(AgentReply {
            feedback: Some(Feedback {
                feedback: Some("Clear and correct".to_string()),
                score: Some(8),
            }),
            question: Some("Explain borrowing".to_string()),
        }));
        let id = start(&app, "u2").await;

        let (status, json) =
            send(&app, empty("GET", &format!("/interviews/{id}/question"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["question"], "What is ownership in Rust?");

        let body = multipart_body("a1.webm", b"OggS-audio", "u2", "Grace");
        let (status, json) = send(&app, answer_request(&id, body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["questionIndex"], 1);
        assert_eq!(json["answer"], "Each value has a single owner");
        assert_eq!(json["totalQuestionsAnswered"], 1);
        assert_eq!(json["sessionStatus"], "ACTIVE");
        assert_eq!(json["feedback"]["score"], 8);
        assert_eq!(json["nextQuestion"], "Explain borrowing");
        assert_eq!(
            app.audio.keys(),
            vec![format!("uploads/u2_Grace/{id}/a1.webm")]
        );

        let (status, json) =
            send(&app, empty("GET", &format!("/interviews/{id}/details"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["sessionId"], id.as_str());
        let turns = json["questionAnswers"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["questionIndex"], 1);
        assert_eq!(turns[1]["question"], "Explain borrowing");
    }

    #[tokio::test]
    async fn test_answer_rejects_bad_extension() {
        let app = app();
        let id = start(&app, "u3").await;
        send(&app, empty("GET", &format!("/interviews/{id}/question"))).await;

        let body = multipart_body("notes.pdf", b"%PDF", "u3", "Linus");
        let (status, json) = send(&app, answer_request(&id, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Invalid File");
        assert!(app.audio.keys().is_empty());
    }

    #[tokio::test]
    async fn test_answer_rejects_oversized_recording() {
        let app = app_with_limit(16);
        let id = start(&app, "u4").await;
        send(&app, empty("GET", &format!("/interviews/{id}/question"))).await;

        let body = multipart_body("a1.mp3", &[7u8; 64], "u4", "Barbara");
        let (status, json) = send(&app, answer_request(&id, body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["status"], 413);
    }

    #[tokio::test]
    async fn test_answer_requires_user_parts() {
        let app = app();
        let id = start(&app, "u5").await;
        send(&app, empty("GET", &format!("/interviews/{id}/question"))).await;

        let body = multipart_body("a1.mp3", b"ID3", "u5", " ");
        let (status, json) = send(&app, answer_request(&id, body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Missing part: userName");
    }

    #[tokio::test]
    async fn test_end_too_early_reports_remaining_minutes() {
        let app = app();
        let id = start(&app, "u6").await;

        let (status, json) = send(&app, empty("POST", &format!("/interviews/{id}/end"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Session Time Not Completed");
        assert_eq!(json["remainingMinutes"], 30);
        assert_eq!(json["path"], format!("/interviews/{id}/end"));

        let (status, json) = send(
            &app,
            empty("POST", &format!("/interviews/{id}/end?force=true")),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "COMPLETED");
    }

    #[tokio::test]
    async fn test_end_after_minimum_duration() {
        let app = app();
        let id = start(&app, "u7").await;
        app.clock.advance(chrono::Duration::minutes(31));

        let (status, json) = send(&app, empty("POST", &format!("/interviews/{id}/end"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "COMPLETED");
        assert!(json["endTime"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_session_and_bad_id() {
        let app = app();
        let missing = uuid::Uuid::new_v4();
        let (status, json) =
            send(&app, empty("GET", &format!("/interviews/{missing}/details"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"], "Session Not Found");

        let (status, json) = send(&app, empty("GET", "/interviews/not-a-uuid/details")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["path"], "/interviews/not-a-uuid/details");
    }

    #[tokio::test]
    async fn test_unknown_route_uses_uniform_body() {
        let app = app();
        let (status, json) = send(&app, empty("GET", "/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["path"], "/nope");
    }

    #[tokio::test]
    async fn test_wrong_method_uses_uniform_body() {
        let app = app();
        let (status, json) = send(&app, empty("GET", "/interviews/start/u1")).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["status"], 405);
        assert_eq!(json["error"], "Method Not Allowed");
        assert_eq!(json["message"], "Method GET is not allowed here");
        assert_eq!(json["path"], "/interviews/start/u1");
    }

    #[tokio::test]
    async fn test_session_response_hides_version() {
        let app = app();
        let (status, json) = send(
            &app,
            empty("POST", "/interviews/start/u9?experienceLevel=JUNIOR&language=Go"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(json.get("version").is_none());
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let app = app();
        let first = start(&app, "u8").await;
        send(
            &app,
            empty("POST", &format!("/interviews/{first}/end?force=true")),
        )
        .await;
        app.clock.advance(chrono::Duration::hours(1));
        let second = start(&app, "u8").await;

        let (status, json) = send(&app, empty("GET", "/interviews/sessions/u8")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<_> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["sessionId"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec![second.clone(), first]);

        let (status, json) = send(
            &app,
            empty("GET", "/interviews/sessions/u8?pagination=true&page=0&size=1"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["sessionId"], second.as_str());

        let (status, _) = send(
            &app,
            empty("GET", "/interviews/sessions/u8?pagination=true&size=500"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

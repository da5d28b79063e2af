use ayurwell_api::{build_app_with_config, ApiConfig, DEFAULT_API_KEY};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use tower::ServiceExt;

async fn app() -> Router {
    build_app_with_config(ApiConfig::default())
        .await
        .expect("app should build")
}

async fn json_body(response: Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-api-key", DEFAULT_API_KEY);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, cookie: Option<&str>, payload: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", DEFAULT_API_KEY);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(payload.to_string())).unwrap()
}

async fn sign_in(app: &Router, email: &str) -> String {
    let response = app
        .clone()
        .oneshot(post("/v1/auth/sign_in", None, json!({ "email": email })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie header should be present");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair should be present")
        .to_string()
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["status"], "ok");
    assert_eq!(parsed["storage"], "memory");
    assert_eq!(parsed["capabilities"]["content_generation"], false);
}

#[tokio::test]
async fn questionnaire_is_public() {
    let app = app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/prakriti/questions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["count"], 5);
    assert_eq!(parsed["questions"][0]["options"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn classify_requires_api_key() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/prakriti/classify")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "answers": ["vata", "vata", "vata", "pitta", "kapha"] }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn classify_breaks_ties_toward_later_category() {
    let app = app().await;

    let response = app
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": ["vata", "pitta", "vata", "pitta", "kapha"] }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["prakritiType"], "Pitta");
    assert_eq!(parsed["score"]["vata"], 2);
    assert_eq!(parsed["score"]["pitta"], 2);
    assert_eq!(parsed["score"]["kapha"], 1);
    assert_eq!(parsed["contenders"], json!(["Vata", "Pitta"]));
}

#[tokio::test]
async fn classify_accepts_indexed_answers() {
    let app = app().await;

    let response = app
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": { "0": "kapha", "1": "kapha", "2": "vata", "3": "kapha", "4": "pitta" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let parsed = json_body(response).await;
    assert_eq!(parsed["prakritiType"], "Kapha");
}

#[tokio::test]
async fn invalid_answers_are_unprocessable() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": ["vata", "vata", "pitta"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let parsed = json_body(response).await;
    assert_eq!(parsed["error"], "invalid_answer");

    let response = app
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": ["vata", "fire", "pitta", "kapha", "vata"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn null_and_aliased_answers_are_unprocessable() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": { "0": "vata", "1": null, "2": "pitta", "3": "kapha", "4": "vata" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let parsed = json_body(response).await;
    assert_eq!(parsed["error"], "invalid_answer");
    assert_eq!(parsed["reason"], "missing_answer");

    let response = app
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": { "0": "vata", "00": "kapha", "1": "pitta", "2": "pitta", "3": "kapha", "4": "vata" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["reason"], "bad_question_key");
}

#[tokio::test]
async fn non_string_answers_get_a_json_error() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(post(
            "/v1/prakriti/classify",
            None,
            json!({ "answers": ["vata", 5, "pitta", "kapha", "vata"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let parsed = json_body(response).await;
    assert_eq!(parsed["error"], "invalid_answer");
    assert_eq!(parsed["reason"], "malformed_answers");
    assert!(parsed["message"].as_str().is_some());

    let cookie = sign_in(&app, "ravi@example.com").await;
    let response = app
        .oneshot(post(
            "/v1/prakriti/submit",
            Some(&cookie),
            json!({ "answers": { "0": true } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json_body(response).await["reason"], "malformed_answers");
}

#[tokio::test]
async fn member_endpoints_require_session() {
    let app = app().await;

    let response = app
        .oneshot(get("/v1/prakriti/latest", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let parsed = json_body(response).await;
    assert_eq!(parsed["error"], "not_authenticated");
}

#[tokio::test]
async fn sign_in_requires_service_key() {
    let app = app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/auth/sign_in")
        .header("content-type", "application/json")
        .header("origin", "http://localhost:5173")
        .body(Body::from(json!({ "email": "guest@example.com" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn submission_drives_latest_diet_and_schedule() {
    let app = app().await;
    let cookie = sign_in(&app, "meera@example.com").await;

    let response = app
        .clone()
        .oneshot(get("/v1/diet", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "prakriti_required");

    let response = app
        .clone()
        .oneshot(post(
            "/v1/prakriti/submit",
            Some(&cookie),
            json!({ "answers": ["kapha", "kapha", "vata", "kapha", "pitta"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let submitted = json_body(response).await;
    assert_eq!(submitted["prakritiType"], "Kapha");
    assert!(submitted["result_id"].as_str().is_some());

    let response = app
        .clone()
        .oneshot(get("/v1/prakriti/latest", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let latest = json_body(response).await;
    assert_eq!(latest["result"]["result_id"], submitted["result_id"]);
    assert_eq!(latest["result"]["prakritiType"], "Kapha");

    let response = app
        .clone()
        .oneshot(get("/v1/diet", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["prakriti_type"], "Kapha");

    let response = app
        .clone()
        .oneshot(get("/v1/schedule", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let schedule = json_body(response).await;
    assert!(schedule["wake_up"].as_str().is_some());

    let response = app
        .oneshot(get("/v1/history", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn follow_ups_can_be_added_listed_and_deleted() {
    let app = app().await;
    let cookie = sign_in(&app, "arjun@example.com").await;

    let response = app
        .clone()
        .oneshot(post(
            "/v1/follow_ups",
            Some(&cookie),
            json!({ "reminder_date": "2026-11-01", "feedback": "Sleeping better" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let follow_up_id = created["follow_up"]["follow_up_id"]
        .as_str()
        .expect("follow-up id")
        .to_string();

    let response = app
        .clone()
        .oneshot(post(
            "/v1/follow_ups",
            Some(&cookie),
            json!({ "reminder_date": "2026-11-02", "feedback": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(get("/v1/follow_ups", Some(&cookie)))
        .await
        .unwrap();
    let listed = json_body(response).await;
    assert_eq!(listed["follow_ups"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/follow_ups/delete",
            Some(&cookie),
            json!({ "follow_up_id": follow_up_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/v1/follow_ups/delete",
            Some(&cookie),
            json!({ "follow_up_id": follow_up_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_round_trips_through_session() {
    let app = app().await;
    let cookie = sign_in(&app, "priya.sharma@example.com").await;

    let response = app
        .clone()
        .oneshot(get("/v1/profile", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["profile"]["name"], "priya.sharma");

    let response = app
        .clone()
        .oneshot(post(
            "/v1/profile",
            Some(&cookie),
            json!({ "name": "Priya", "age": 34, "gender": "female" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post("/v1/profile", Some(&cookie), json!({ "age": 0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(get("/v1/auth/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let me = json_body(response).await;
    assert_eq!(me["user"]["name"], "Priya");
    assert_eq!(me["user"]["age"], 34);
    assert_eq!(me["role"], "user");
}

#[tokio::test]
async fn sign_out_revokes_the_session() {
    let app = app().await;
    let cookie = sign_in(&app, "dev@example.com").await;

    let response = app
        .clone()
        .oneshot(post("/v1/auth/sign_out", Some(&cookie), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get("/v1/auth/me", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_endpoints_require_admin_role() {
    let app = app().await;

    let member = sign_in(&app, "member@example.com").await;
    let response = app
        .clone()
        .oneshot(get("/v1/admin/stats", Some(&member)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(post(
            "/v1/prakriti/submit",
            Some(&member),
            json!({ "answers": ["vata", "vata", "vata", "pitta", "kapha"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let admin = sign_in(&app, "admin@ayurwell.app").await;
    let response = app
        .clone()
        .oneshot(get("/v1/admin/stats", Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = json_body(response).await;
    assert_eq!(stats["stats"]["total_users"], 2);
    assert_eq!(stats["stats"]["total_prakriti_tests"], 1);

    let response = app
        .oneshot(get("/v1/admin/activity", Some(&admin)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let activity = json_body(response).await;
    assert_eq!(activity["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn assist_reports_unconfigured_providers() {
    let app = app().await;
    let cookie = sign_in(&app, "voice@example.com").await;

    let response = app
        .clone()
        .oneshot(post(
            "/v1/assist/content",
            Some(&cookie),
            json!({ "content_type": "daily_tips" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "assist_not_configured");

    let response = app
        .clone()
        .oneshot(post(
            "/v1/assist/content",
            Some(&cookie),
            json!({ "content_type": "horoscope" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post(
            "/v1/assist/text_to_voice",
            Some(&cookie),
            json!({ "text": "Namaste", "voice": "nova" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

fn browser_post(uri: &str, cookie: Option<&str>, origin: Option<(&str, &str)>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    if let Some((name, value)) = origin {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(
            json!({ "reminder_date": "2026-11-01", "feedback": "Less bloating" }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn cookie_writes_without_origin_are_forbidden() {
    let app = app().await;
    let cookie = sign_in(&app, "lila@example.com").await;

    let response = app
        .oneshot(browser_post("/v1/follow_ups", Some(&cookie), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "origin_required");
}

#[tokio::test]
async fn cookie_writes_from_foreign_origins_are_forbidden() {
    let app = app().await;
    let cookie = sign_in(&app, "lila@example.com").await;

    let response = app
        .clone()
        .oneshot(browser_post(
            "/v1/follow_ups",
            Some(&cookie),
            Some(("origin", "https://evil.example")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "origin_not_allowed");

    let response = app
        .oneshot(browser_post(
            "/v1/follow_ups",
            Some(&cookie),
            Some(("referer", "https://evil.example/form")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"], "origin_not_allowed");
}

#[tokio::test]
async fn allowed_browser_origins_write_without_service_key() {
    let app = app().await;
    let cookie = sign_in(&app, "lila@example.com").await;

    let response = app
        .clone()
        .oneshot(browser_post(
            "/v1/follow_ups",
            Some(&cookie),
            Some(("origin", "http://localhost:5173")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(browser_post(
            "/v1/follow_ups",
            Some(&cookie),
            Some(("referer", "http://localhost:5173/dashboard")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn foreign_origins_without_a_session_need_the_service_key() {
    let app = app().await;

    let response = app
        .oneshot(browser_post(
            "/v1/follow_ups",
            None,
            Some(("origin", "https://evil.example")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "unauthorized");
}

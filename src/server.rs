use std::convert::Infallible;
use std::sync::Arc;
use http::StatusCode;
use serde::de::DeserializeOwned;
use warp::{Filter, Rejection, Reply};
use crate::api::*;
use crate::auth::{Credentials, AUTH_HEADER};
use crate::config::Config;
use crate::db::DataBase;
use crate::error::ApiError;
use crate::{handlers, UserId};

pub const MAX_BODY_BYTES: u64 = 64 * 1024;
pub const BANNER: &str = "FitFusion API is running!";

/// immutable server context handed to every request handler
#[derive(Clone)]
pub struct App {
    db: DataBase,
    credentials: Arc<Credentials>,
}

impl App {
    pub async fn new(config: &Config) -> Result<Self, ApiError> {
        let db = DataBase::new(&config.database_url).await?;
        Ok(Self::from_parts(db, config.credentials()))
    }

    pub fn from_parts(db: DataBase, credentials: Credentials) -> Self {
        Self { db, credentials: Arc::new(credentials) }
    }

    pub fn db(&self) -> &DataBase {
        &self.db
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// key stretching runs on the blocking pool
    pub async fn hash_password(&self, password: String) -> Result<String, ApiError> {
        let credentials = self.credentials.clone();
        let digest = tokio::task::spawn_blocking(move || credentials.hash_password(&password))
            .await
            .map_err(|e| ApiError::Internal(format!("password hashing task failed: {}", e)))??;
        Ok(digest)
    }

    pub async fn verify_password(&self, password: String, digest: String) -> Result<bool, ApiError> {
        let credentials = self.credentials.clone();
        tokio::task::spawn_blocking(move || credentials.verify_password(&password, &digest))
            .await
            .map_err(|e| ApiError::Internal(format!("password check task failed: {}", e)))
    }
}

fn with_app(app: App) -> impl Filter<Extract = (App,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

/// extracts the caller's user id from the bearer token, rejecting with 401 otherwise
pub fn with_identity(app: App) -> impl Filter<Extract = (UserId,), Error = Rejection> + Clone {
    warp::header::optional::<String>(AUTH_HEADER)
        .and(with_app(app))
        .and_then(|header: Option<String>, app: App| async move {
            app.credentials()
                .identity_from_header(header.as_deref())
                .map_err(|e| {
                    tracing::debug!(error = %e, "rejected bearer token");
                    warp::reject::custom(ApiError::from(e))
                })
        })
}

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

pub fn routes(app: App) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| BANNER);

    let register = warp::path!("api" / "register")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(json_body())
        .and_then(|app: App, req: RegisterRequest| async move {
            handlers::register(app, req).await.map_err(warp::reject::custom)
        });

    let login = warp::path!("api" / "login")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(json_body())
        .and_then(|app: App, req: LoginRequest| async move {
            handlers::login(app, req).await.map_err(warp::reject::custom)
        });

    let me = warp::path!("api" / "me")
        .and(warp::get())
        .and(with_app(app.clone()))
        .and(with_identity(app.clone()))
        .and_then(|app: App, user_id: UserId| async move {
            handlers::me(app, user_id).await.map_err(warp::reject::custom)
        });

    let generate = warp::path!("api" / "generate")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(with_identity(app.clone()))
        .and(json_body())
        .and_then(|app: App, user_id: UserId, req: GenerateRequest| async move {
            handlers::generate(app, user_id, req).await.map_err(warp::reject::custom)
        });

    let history = warp::path!("api" / "history")
        .and(warp::get())
        .and(with_app(app.clone()))
        .and(with_identity(app.clone()))
        .and_then(|app: App, user_id: UserId| async move {
            handlers::history(app, user_id).await.map_err(warp::reject::custom)
        });

    let log_workout = warp::path!("api" / "workouts")
        .and(warp::post())
        .and(with_app(app.clone()))
        .and(with_identity(app.clone()))
        .and(json_body())
        .and_then(|app: App, user_id: UserId, req: NewWorkoutRequest| async move {
            handlers::log_workout(app, user_id, req).await.map_err(warp::reject::custom)
        });

    let list_workouts = warp::path!("api" / "workouts")
        .and(warp::get())
        .and(with_app(app.clone()))
        .and(with_identity(app))
        .and_then(|app: App, user_id: UserId| async move {
            handlers::list_workouts(app, user_id).await.map_err(warp::reject::custom)
        });

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["authorization", "content-type"]);

    index
        .or(register)
        .or(login)
        .or(me)
        .or(generate)
        .or(history)
        .or(log_workout)
        .or(list_workouts)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::trace::request())
}

/// renders every rejection as `{"msg": ...}` with the matching status code
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if let Some(e) = err.find::<ApiError>() {
        if e.is_internal() {
            tracing::error!(error = %e, "request failed");
        }
        code = e.status();
        message = e.public_message();
    } else if let Some(e) = err.find::<warp::body::BodyDeserializeError>() {
        code = StatusCode::BAD_REQUEST;
        message = format!("invalid json body: {}", e);
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        code = StatusCode::PAYLOAD_TOO_LARGE;
        message = "request body too large".to_string();
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        code = StatusCode::LENGTH_REQUIRED;
        message = "content-length header required".to_string();
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        code = StatusCode::UNSUPPORTED_MEDIA_TYPE;
        message = "expected a json body".to_string();
    } else if err.find::<warp::reject::InvalidHeader>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "invalid header".to_string();
    } else if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "not found".to_string();
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "method not allowed".to_string();
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "internal server error".to_string();
    };

    let json = warp::reply::json(&MsgResponse { msg: message });

    Ok(warp::reply::with_status(json, code))
}

#[allow(unused)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    async fn test_app() -> App {
        App::new(&Config::in_memory()).await.unwrap()
    }

    async fn call(app: &App, method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            req = req.header("authorization", format!("Bearer {}", token));
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.reply(&routes(app.clone())).await;
        let body = serde_json::from_slice(resp.body()).unwrap_or(Value::Null);
        (resp.status(), body)
    }

    async fn register(app: &App, email: &str, password: &str, name: &str) -> String {
        let (status, body) = call(app, "POST", "/api/register", None,
            Some(json!({"email": email, "password": password, "name": name}))).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["access_token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn index_reports_liveness() {
        let app = test_app().await;
        let resp = warp::test::request().path("/").reply(&routes(app)).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.body().as_ref(), BANNER.as_bytes());
    }

    #[tokio::test]
    async fn register_returns_token_and_profile() {
        let app = test_app().await;
        let (status, body) = call(&app, "POST", "/api/register", None,
            Some(json!({"email": "ann@example.com", "password": "pw", "name": "Ann"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["user"]["email"], "ann@example.com");
        assert_eq!(body["user"]["name"], "Ann");

        let user_id = body["user"]["id"].as_i64().unwrap();
        let token = body["access_token"].as_str().unwrap();
        assert_eq!(app.credentials().identity_of(token).unwrap(), user_id);

        let stored = app.db().fetch_user(user_id).await.unwrap().unwrap();
        assert_ne!(stored.password, "pw");
        assert!(app.credentials().verify_password("pw", &stored.password));
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let app = test_app().await;
        register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, body) = call(&app, "POST", "/api/register", None,
            Some(json!({"email": "ann@example.com", "password": "other", "name": "Ann 2"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"msg": "User already exists"}));
        assert_eq!(app.db().table_counts().await.unwrap().users, 1);
    }

    #[tokio::test]
    async fn registration_requires_fields() {
        let app = test_app().await;
        let (status, body) = call(&app, "POST", "/api/register", None,
            Some(json!({"email": "ann@example.com", "password": "pw"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "name is required");

        let (status, _) = call(&app, "POST", "/api/register", None,
            Some(json!({"email": "", "password": "pw", "name": "Ann"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.db().table_counts().await.unwrap().users, 0);
    }

    #[tokio::test]
    async fn login_issues_token_for_registered_user() {
        let app = test_app().await;
        register(&app, "ann@example.com", "pw", "Ann").await;
        let ann = app.db().fetch_user_by_email("ann@example.com").await.unwrap().unwrap();

        let (status, body) = call(&app, "POST", "/api/login", None,
            Some(json!({"email": "ann@example.com", "password": "pw"}))).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["access_token"].as_str().unwrap();
        assert_eq!(app.credentials().identity_of(token).unwrap(), ann.id);
    }

    #[tokio::test]
    async fn login_failures_share_one_message() {
        let app = test_app().await;
        register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, wrong_pw) = call(&app, "POST", "/api/login", None,
            Some(json!({"email": "ann@example.com", "password": "nope"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, unknown) = call(&app, "POST", "/api/login", None,
            Some(json!({"email": "bob@example.com", "password": "pw"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(wrong_pw, unknown);
        assert_eq!(unknown, json!({"msg": "Bad email or password"}));

        let (status, _) = call(&app, "POST", "/api/login", None, Some(json!({"email": "ann@example.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn me_requires_valid_token() {
        let app = test_app().await;
        let token = register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, body) = call(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"name": "Ann", "email": "ann@example.com"}));

        let (status, body) = call(&app, "GET", "/api/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Missing Authorization Header");

        let (status, _) = call(&app, "GET", "/api/me", Some("not.a.token"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let foreign = Config { jwt_secret_key: Some("someone-else".into()), ..Config::in_memory() }
            .credentials()
            .issue_token(1)
            .unwrap();
        let (status, body) = call(&app, "GET", "/api/me", Some(&foreign), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["msg"], "Signature verification failed");
    }

    #[tokio::test]
    async fn me_for_vanished_user_is_not_found() {
        let app = test_app().await;
        let token = app.credentials().issue_token(999).unwrap();
        let (status, body) = call(&app, "GET", "/api/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "User not found");
    }

    #[tokio::test]
    async fn generate_matches_documented_example_and_records_history() {
        let app = test_app().await;
        let token = register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, body) = call(&app, "POST", "/api/generate", Some(&token),
            Some(json!({"time": 30, "goal": "strength"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"workout": "30 mins of strength workout using bodyweight"}));

        let (_, body) = call(&app, "POST", "/api/generate", Some(&token),
            Some(json!({"time": "45", "goal": "cardio", "equipment": "rower"}))).await;
        assert_eq!(body["workout"], "45 mins of cardio workout using rower");

        let (_, body) = call(&app, "POST", "/api/generate", Some(&token),
            Some(json!({"time": 10, "goal": "mobility", "equipment": ""}))).await;
        assert_eq!(body["workout"], "10 mins of mobility workout using bodyweight");

        assert_eq!(app.db().table_counts().await.unwrap().history, 3);
    }

    #[tokio::test]
    async fn rejected_generate_writes_nothing() {
        let app = test_app().await;
        let token = register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, _) = call(&app, "POST", "/api/generate", None,
            Some(json!({"time": 30, "goal": "strength"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(&app, "POST", "/api/generate", Some(&token),
            Some(json!({"time": 30}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "goal is required");

        assert_eq!(app.db().table_counts().await.unwrap().history, 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_private() {
        let app = test_app().await;
        let ann = register(&app, "ann@example.com", "pw", "Ann").await;
        let bob = register(&app, "bob@example.com", "pw", "Bob").await;

        for goal in &["first", "second", "third"] {
            call(&app, "POST", "/api/generate", Some(&ann), Some(json!({"time": 20, "goal": goal}))).await;
        }
        call(&app, "POST", "/api/generate", Some(&bob), Some(json!({"time": 20, "goal": "bobs"}))).await;

        let (status, body) = call(&app, "GET", "/api/history", Some(&ann), None).await;
        assert_eq!(status, StatusCode::OK);
        let items = body.as_array().unwrap();
        let workouts: Vec<&str> = items.iter().map(|i| i["workout"].as_str().unwrap()).collect();
        assert_eq!(workouts, vec![
            "20 mins of third workout using bodyweight",
            "20 mins of second workout using bodyweight",
            "20 mins of first workout using bodyweight",
        ]);
        let times: Vec<&str> = items.iter().map(|i| i["time"].as_str().unwrap()).collect();
        assert!(times.windows(2).all(|w| w[0] >= w[1]));
        assert!(times.iter().all(|t| t.len() == "2024-03-09 07:05".len()));

        let (_, body) = call(&app, "GET", "/api/history", Some(&bob), None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["workout"], "20 mins of bobs workout using bodyweight");

        let (status, _) = call(&app, "GET", "/api/history", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logging_a_workout_writes_header_and_every_exercise() {
        let app = test_app().await;
        let token = register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, body) = call(&app, "POST", "/api/workouts", Some(&token), Some(json!({
            "date": "2024-03-09",
            "exercises": [
                {"name": "squat", "sets": 5, "reps": 5, "weight": 100},
                {"name": "bench", "sets": 5, "reps": 5, "weight": 72.5},
                {"name": "pull-up", "sets": 3, "reps": 8}
            ]
        }))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["msg"], "Workout logged");
        let workout_id = body["workout_id"].as_i64().unwrap();

        let counts = app.db().table_counts().await.unwrap();
        assert_eq!((counts.workouts, counts.exercises), (1, 3));

        let (status, body) = call(&app, "GET", "/api/workouts", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let listed: Vec<ListWorkoutsItem> = serde_json::from_value(body).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, workout_id);
        assert_eq!(listed[0].date.format("%Y-%m-%d").to_string(), "2024-03-09");
        let names: Vec<&str> = listed[0].exercises.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["squat", "bench", "pull-up"]);
        assert_eq!(listed[0].exercises[2].weight, None);
    }

    #[tokio::test]
    async fn invalid_exercise_persists_nothing() {
        let app = test_app().await;
        let token = register(&app, "ann@example.com", "pw", "Ann").await;

        let (status, body) = call(&app, "POST", "/api/workouts", Some(&token), Some(json!({
            "exercises": [
                {"name": "squat", "sets": 5, "reps": 5},
                {"sets": 3, "reps": 8}
            ]
        }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["msg"], "exercise 1 is missing 'name'");

        let counts = app.db().table_counts().await.unwrap();
        assert_eq!((counts.workouts, counts.exercises), (0, 0));
    }

    #[tokio::test]
    async fn workouts_listing_is_per_user() {
        let app = test_app().await;
        let ann = register(&app, "ann@example.com", "pw", "Ann").await;
        let bob = register(&app, "bob@example.com", "pw", "Bob").await;

        call(&app, "POST", "/api/workouts", Some(&ann),
            Some(json!({"exercises": [{"name": "row", "sets": 3, "reps": 10}]}))).await;

        let (status, body) = call(&app, "GET", "/api/workouts", Some(&bob), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn malformed_requests_get_json_errors() {
        let app = test_app().await;

        let resp = warp::test::request()
            .method("POST")
            .path("/api/register")
            .header("content-type", "application/json")
            .body("{not json")
            .reply(&routes(app.clone()))
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: MsgResponse = serde_json::from_slice(resp.body()).unwrap();
        assert!(body.msg.starts_with("invalid json body"));

        let (status, body) = call(&app, "GET", "/api/nothing-here", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["msg"], "not found");

        let (status, _) = call(&app, "GET", "/api/register", None, None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn instances_do_not_share_state() {
        let first = test_app().await;
        let second = test_app().await;
        register(&first, "ann@example.com", "pw", "Ann").await;

        assert_eq!(first.db().table_counts().await.unwrap().users, 1);
        assert_eq!(second.db().table_counts().await.unwrap().users, 0);
        register(&second, "ann@example.com", "pw", "Ann").await;
    }

    #[tokio::test]
    async fn cors_headers_are_added() {
        let app = test_app().await;
        let resp = warp::test::request()
            .path("/")
            .header("origin", "http://localhost:3000")
            .reply(&routes(app))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().contains_key("access-control-allow-origin"));
    }
}

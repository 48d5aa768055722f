//! Request handlers. Each takes the server context, the caller's identity
//! where the route requires one, and the parsed body.

use chrono::prelude::*;
use http::StatusCode;
use warp::Reply;
use crate::api::*;
use crate::error::ApiError;
use crate::server::App;
use crate::UserId;

pub const USER_EXISTS: &str = "User already exists";
pub const BAD_CREDENTIALS: &str = "Bad email or password";
pub const USER_NOT_FOUND: &str = "User not found";
pub const WORKOUT_LOGGED: &str = "Workout logged";

pub async fn register(app: App, req: RegisterRequest) -> Result<impl Reply, ApiError> {
    let Registration { email, name, password } = req.validate()?;

    // checked before hashing so duplicates cost no key stretching
    if app.db().fetch_user_by_email(&email).await?.is_some() {
        return Err(ApiError::Conflict(USER_EXISTS.to_string()))
    }

    let digest = app.hash_password(password).await?;

    // a concurrent registration may have won the race since the check above
    let user = app.db().insert_user(&email, &name, &digest).await?
        .ok_or_else(|| ApiError::Conflict(USER_EXISTS.to_string()))?;

    let access_token = app.credentials().issue_token(user.id)?;

    tracing::info!(user_id = user.id, "registered user");

    let resp = RegisterResponse { access_token, user: RegisteredUser::from(&user) };
    Ok(warp::reply::with_status(warp::reply::json(&resp), StatusCode::CREATED))
}

pub async fn login(app: App, req: LoginRequest) -> Result<impl Reply, ApiError> {
    let (email, password) = req.validate()?;

    let user = match app.db().fetch_user_by_email(&email).await? {
        Some(user) => user,
        None => return Err(ApiError::Unauthenticated(BAD_CREDENTIALS.to_string())),
    };

    if !app.verify_password(password, user.password.clone()).await? {
        tracing::debug!(user_id = user.id, "login with wrong password");
        return Err(ApiError::Unauthenticated(BAD_CREDENTIALS.to_string()))
    }

    let access_token = app.credentials().issue_token(user.id)?;
    Ok(warp::reply::json(&LoginResponse { access_token }))
}

pub async fn me(app: App, user_id: UserId) -> Result<impl Reply, ApiError> {
    let user = app.db().fetch_user(user_id).await?
        .ok_or_else(|| ApiError::NotFound(USER_NOT_FOUND.to_string()))?;
    Ok(warp::reply::json(&ProfileResponse::from(&user)))
}

pub async fn generate(app: App, user_id: UserId, req: GenerateRequest) -> Result<impl Reply, ApiError> {
    let prompt = req.validate()?;
    let workout = prompt.describe();
    app.db().insert_history(user_id, &workout, Utc::now()).await?;
    Ok(warp::reply::json(&GenerateResponse { workout }))
}

pub async fn history(app: App, user_id: UserId) -> Result<impl Reply, ApiError> {
    let items: Vec<HistoryItem> = app.db().fetch_user_history(user_id).await?
        .iter()
        .map(HistoryItem::from)
        .collect();
    Ok(warp::reply::json(&items))
}

pub async fn log_workout(app: App, user_id: UserId, req: NewWorkoutRequest) -> Result<impl Reply, ApiError> {
    let WorkoutLog { date, exercises } = req.validate(Utc::now())?;
    let logged = app.db().insert_workout(user_id, date, &exercises).await?;

    tracing::debug!(user_id, workout_id = logged.workout.id, n_exercises = exercises.len(), "logged workout");

    let resp = NewWorkoutResponse { msg: WORKOUT_LOGGED.to_string(), workout_id: logged.workout.id };
    Ok(warp::reply::with_status(warp::reply::json(&resp), StatusCode::CREATED))
}

pub async fn list_workouts(app: App, user_id: UserId) -> Result<impl Reply, ApiError> {
    let items: Vec<ListWorkoutsItem> = app.db().fetch_user_workouts(user_id).await?
        .iter()
        .map(ListWorkoutsItem::from)
        .collect();
    Ok(warp::reply::json(&items))
}

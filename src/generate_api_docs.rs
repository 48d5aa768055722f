use std::error::Error;
use chrono::prelude::*;
use serde::Serialize;
use fitfusion::*;
use fitfusion::auth::{Credentials, AUTH_HEADER, AUTH_SCHEME};
use fitfusion::db::SCHEMA_SQL;
use fitfusion::handlers::{BAD_CREDENTIALS, USER_EXISTS, WORKOUT_LOGGED};
use fitfusion::server::BANNER;
use fitfusion::workout::DEFAULT_EQUIPMENT;

const API_DOCS_TEMPLATE: &str = include_str!("../static/api-documentation.tera.md");
const OUTPUT_PATH: &str = "./README.md";

fn pretty<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut tera = tera::Tera::default();
    tera.add_raw_template("api-documentation.md", API_DOCS_TEMPLATE)?;
    let mut ctx = tera::Context::new();
    ctx.insert("current_time", &Utc::now().to_rfc2822());
    ctx.insert("api_prefix", API_PREFIX);
    ctx.insert("auth_header", AUTH_HEADER);
    ctx.insert("auth_scheme", AUTH_SCHEME);
    ctx.insert("banner", BANNER);
    ctx.insert("default_equipment", DEFAULT_EQUIPMENT);
    ctx.insert("schema_sql", SCHEMA_SQL);

    let credentials = Credentials::ephemeral(chrono::Duration::minutes(15), 1_000);
    let access_token = credentials.issue_token(1)?;
    ctx.insert("token_ttl_minutes", &credentials.token_ttl().num_minutes());

    let user = User {
        id: 1,
        email: "ann@example.com".to_string(),
        name: "Ann".to_string(),
        password: String::new(),
    };

    let register_req = RegisterRequest {
        email: Some(user.email.clone()),
        password: Some("correct horse battery staple".to_string()),
        name: Some(user.name.clone()),
    };
    ctx.insert("register_req_json", &pretty(&register_req)?);

    let register_resp = RegisterResponse { access_token: access_token.clone(), user: RegisteredUser::from(&user) };
    ctx.insert("register_resp_json", &pretty(&register_resp)?);

    let login_req = LoginRequest { email: register_req.email.clone(), password: register_req.password.clone() };
    ctx.insert("login_req_json", &pretty(&login_req)?);
    ctx.insert("login_resp_json", &pretty(&LoginResponse { access_token })?);

    ctx.insert("me_resp_json", &pretty(&ProfileResponse::from(&user))?);

    let generate_req = GenerateRequest {
        time: Some(serde_json::json!(30)),
        goal: Some("strength".to_string()),
        equipment: None,
    };
    ctx.insert("generate_req_json", &pretty(&generate_req)?);
    let prompt = generate_req.validate()?;
    let workout = prompt.describe();
    ctx.insert("generate_resp_json", &pretty(&GenerateResponse { workout: workout.clone() })?);

    let now = Utc::now();
    let history = vec![
        HistoryItem::from(&WorkoutHistory { id: 2, user_id: user.id, workout: "45 mins of cardio workout using rower".to_string(), timestamp: now }),
        HistoryItem::from(&WorkoutHistory { id: 1, user_id: user.id, workout, timestamp: now - chrono::Duration::days(1) }),
    ];
    ctx.insert("history_resp_json", &pretty(&history)?);

    let new_workout_req = NewWorkoutRequest {
        date: Some(now.format("%Y-%m-%d").to_string()),
        exercises: Some(vec![
            NewExerciseItem { name: Some("squat".to_string()), sets: Some(5), reps: Some(5), weight: Some(100.0) },
            NewExerciseItem { name: Some("pull-up".to_string()), sets: Some(3), reps: Some(8), weight: None },
        ]),
    };
    ctx.insert("new_workout_req_json", &pretty(&new_workout_req)?);
    let log = new_workout_req.validate(now)?;
    ctx.insert("new_workout_resp_json", &pretty(&NewWorkoutResponse { msg: WORKOUT_LOGGED.to_string(), workout_id: 1 })?);

    let logged = LoggedWorkout {
        workout: Workout { id: 1, user_id: user.id, date: log.date },
        exercises: log.exercises.iter().enumerate().map(|(i, e)| WorkoutExercise {
            id: i as i64 + 1,
            workout_id: 1,
            name: e.name.clone(),
            sets: e.sets,
            reps: e.reps,
            weight: e.weight,
        }).collect(),
    };
    ctx.insert("list_workouts_resp_json", &pretty(&vec![ListWorkoutsItem::from(&logged)])?);

    ctx.insert("conflict_json", &pretty(&MsgResponse::from(USER_EXISTS))?);
    ctx.insert("bad_credentials_json", &pretty(&MsgResponse::from(BAD_CREDENTIALS))?);

    let api_docs = tera.render("api-documentation.md", &ctx)?;
    std::fs::write(OUTPUT_PATH, &api_docs)?;
    Ok(())
}

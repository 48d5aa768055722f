use serde::{Serialize, Deserialize};
use chrono::prelude::*;

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod workout;

pub use api::*;

pub const API_PREFIX: &str = "api";

/// primary key of the `users` table, also the `sub` claim of access tokens
pub type UserId = i64;

/// user representation matching `users` db table
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    /// pbkdf2 digest, never the plain password
    pub password: String,
}

/// generated workout text matching `workout_history` db table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutHistory {
    pub id: i64,
    pub user_id: UserId,
    pub workout: String,
    pub timestamp: DateTime<Utc>,
}

/// structured session header matching `workouts` db table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: i64,
    pub user_id: UserId,
    pub date: DateTime<Utc>,
}

/// exercise row matching `workout_exercises` db table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub id: i64,
    pub workout_id: i64,
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    pub weight: Option<f64>,
}

/// a `Workout` together with its exercises, in insertion order
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedWorkout {
    pub workout: Workout,
    pub exercises: Vec<WorkoutExercise>,
}

/// validated exercise data that has not been written yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewExercise {
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    pub weight: Option<f64>,
}

use serde::{Serialize, Deserialize};
use serde_json::Value;
use chrono::prelude::*;
use crate::error::ApiError;
use crate::workout::HISTORY_TIME_FORMAT;
use crate::{User, UserId, WorkoutHistory, LoggedWorkout, WorkoutExercise, NewExercise};

/// api request to create an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// validated contents of a `RegisterRequest`
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// api response to a successful `RegisterRequest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub access_token: String,
    pub user: RegisteredUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

/// api request to exchange credentials for an access token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

/// api response to `GET /api/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
}

/// api request to generate a workout description
///
/// `time` may be sent as a number or a string; it is echoed verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub equipment: Option<String>,
}

/// validated contents of a `GenerateRequest`
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutPrompt {
    pub time: String,
    pub goal: String,
    pub equipment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub workout: String,
}

/// one row of the `GET /api/history` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub workout: String,
    pub time: String,
}

/// api request to log a structured workout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewWorkoutRequest {
    /// rfc 3339 datetime or `YYYY-MM-DD`; the current time when absent
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub exercises: Option<Vec<NewExerciseItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewExerciseItem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sets: Option<i64>,
    #[serde(default)]
    pub reps: Option<i64>,
    #[serde(default)]
    pub weight: Option<f64>,
}

/// validated contents of a `NewWorkoutRequest`
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutLog {
    pub date: DateTime<Utc>,
    pub exercises: Vec<NewExercise>,
}

/// api response to a `NewWorkoutRequest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkoutResponse {
    pub msg: String,
    pub workout_id: i64,
}

/// listed workout in the `GET /api/workouts` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListWorkoutsItem {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub exercises: Vec<ExerciseItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseItem {
    pub name: String,
    pub sets: i64,
    pub reps: i64,
    pub weight: Option<f64>,
}

/// body of every error response, and of bare acknowledgements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

/// `Some` only for a non-blank string
fn present(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.trim().is_empty())
}

fn required(field: Option<String>, name: &str) -> Result<String, ApiError> {
    present(field).ok_or_else(|| ApiError::validation(format!("{} is required", name)))
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration, ApiError> {
        Ok(Registration {
            email: required(self.email, "email")?,
            password: required(self.password, "password")?,
            name: required(self.name, "name")?,
        })
    }
}

impl LoginRequest {
    /// returns `(email, password)`
    pub fn validate(self) -> Result<(String, String), ApiError> {
        Ok((required(self.email, "email")?, required(self.password, "password")?))
    }
}

impl GenerateRequest {
    pub fn validate(self) -> Result<WorkoutPrompt, ApiError> {
        let time = match self.time {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            Some(Value::Null) | Some(Value::String(_)) | None => {
                return Err(ApiError::validation("time is required"))
            }
            Some(_) => return Err(ApiError::validation("time must be a number or a string")),
        };
        Ok(WorkoutPrompt {
            time,
            goal: required(self.goal, "goal")?,
            equipment: present(self.equipment),
        })
    }
}

/// accepts rfc 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (read as utc), or a bare date (utc midnight)
pub fn parse_workout_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc))
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive))
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

impl NewExerciseItem {
    fn validate(self, i: usize) -> Result<NewExercise, ApiError> {
        let missing = |field: &str| ApiError::validation(format!("exercise {} is missing '{}'", i, field));
        let name = present(self.name).ok_or_else(|| missing("name"))?;
        let sets = self.sets.ok_or_else(|| missing("sets"))?;
        let reps = self.reps.ok_or_else(|| missing("reps"))?;
        if sets < 0 || reps < 0 {
            return Err(ApiError::validation(format!("exercise {}: sets and reps must not be negative", i)))
        }
        if let Some(w) = self.weight {
            if !w.is_finite() || w < 0.0 {
                return Err(ApiError::validation(format!("exercise {}: weight must be a non-negative number", i)))
            }
        }
        Ok(NewExercise { name, sets, reps, weight: self.weight })
    }
}

impl NewWorkoutRequest {
    /// validates every exercise before anything is written; `now` fills in a missing date
    pub fn validate(self, now: DateTime<Utc>) -> Result<WorkoutLog, ApiError> {
        let date = match present(self.date) {
            Some(s) => parse_workout_date(&s)
                .ok_or_else(|| ApiError::validation(format!("invalid date: {}", s)))?,
            None => now,
        };
        let exercises = self.exercises
            .ok_or_else(|| ApiError::validation("exercises is required"))?
            .into_iter()
            .enumerate()
            .map(|(i, item)| item.validate(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(WorkoutLog { date, exercises })
    }
}

impl<'a> From<&'a User> for RegisteredUser {
    fn from(user: &'a User) -> Self {
        Self { id: user.id, name: user.name.clone(), email: user.email.clone() }
    }
}

impl<'a> From<&'a User> for ProfileResponse {
    fn from(user: &'a User) -> Self {
        Self { name: user.name.clone(), email: user.email.clone() }
    }
}

impl<'a> From<&'a WorkoutHistory> for HistoryItem {
    fn from(entry: &'a WorkoutHistory) -> Self {
        Self {
            workout: entry.workout.clone(),
            time: entry.timestamp.format(HISTORY_TIME_FORMAT).to_string(),
        }
    }
}

impl<'a> From<&'a WorkoutExercise> for ExerciseItem {
    fn from(e: &'a WorkoutExercise) -> Self {
        Self { name: e.name.clone(), sets: e.sets, reps: e.reps, weight: e.weight }
    }
}

impl<'a> From<&'a LoggedWorkout> for ListWorkoutsItem {
    fn from(logged: &'a LoggedWorkout) -> Self {
        Self {
            id: logged.workout.id,
            date: logged.workout.date,
            exercises: logged.exercises.iter().map(ExerciseItem::from).collect(),
        }
    }
}

impl From<&str> for MsgResponse {
    fn from(msg: &str) -> Self {
        Self { msg: msg.to_string() }
    }
}

use std::str::FromStr;
use sqlx::{Pool, Executor};
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions};
use chrono::prelude::*;
use itertools::Itertools;
use crate::{User, UserId, WorkoutHistory, Workout, WorkoutExercise, LoggedWorkout, NewExercise};

pub const SCHEMA_SQL: &str = include_str!("../sql/schema-sqlite.sql");

/// row counts per table, logged at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub users: i64,
    pub history: i64,
    pub workouts: i64,
    pub exercises: i64,
}

/// wrapper around sqlite connection pool to encapsulate db-related functionality
#[derive(Clone)]
pub struct DataBase {
    pool: Pool<Sqlite>,
}

impl DataBase {
    /// connects (creating the database file if needed) and creates missing tables
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // each connection to `sqlite::memory:` is its own database
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .connect_with(options)
                .await?
        };

        let db = Self { pool };
        db.create_tables().await?;
        Ok(db)
    }

    pub async fn create_tables(&self) -> Result<(), sqlx::Error> {
        self.pool.execute(SCHEMA_SQL).await?;
        Ok(())
    }

    pub async fn table_counts(&self) -> Result<TableCounts, sqlx::Error> {
        let (users, history, workouts, exercises): (i64, i64, i64, i64) = sqlx::query_as(
                "select \
                     (select count(*) from users), \
                     (select count(*) from workout_history), \
                     (select count(*) from workouts), \
                     (select count(*) from workout_exercises)")
            .fetch_one(&self.pool)
            .await?;
        Ok(TableCounts { users, history, workouts, exercises })
    }

    /// returns `None` when the email is already registered
    pub async fn insert_user(&self, email: &str, name: &str, password_digest: &str) -> Result<Option<User>, sqlx::Error> {
        let result = sqlx::query(
                "insert into users (email, name, password) values (?, ?, ?) \
                 on conflict (email) do nothing")
            .bind(email)
            .bind(name)
            .bind(password_digest)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None)
        }

        Ok(Some(User {
            id: result.last_insert_rowid(),
            email: email.to_string(),
            name: name.to_string(),
            password: password_digest.to_string(),
        }))
    }

    pub async fn fetch_user(&self, user_id: UserId) -> Result<Option<User>, sqlx::Error> {
        let row: Option<(i64, String, String, String)> = sqlx::query_as(
                "select id, email, name, password from users where id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, email, name, password)| User { id, email, name, password }))
    }

    pub async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        let row: Option<(i64, String, String, String)> = sqlx::query_as(
                "select id, email, name, password from users where email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, email, name, password)| User { id, email, name, password }))
    }

    pub async fn insert_history(&self, user_id: UserId, workout: &str, timestamp: DateTime<Utc>) -> Result<WorkoutHistory, sqlx::Error> {
        let result = sqlx::query(
                "insert into workout_history (user_id, workout, timestamp) values (?, ?, ?)")
            .bind(user_id)
            .bind(workout)
            .bind(timestamp)
            .execute(&self.pool)
            .await?;

        Ok(WorkoutHistory {
            id: result.last_insert_rowid(),
            user_id,
            workout: workout.to_string(),
            timestamp,
        })
    }

    /// newest first; rows sharing a timestamp come back newest insert first
    pub async fn fetch_user_history(&self, user_id: UserId) -> Result<Vec<WorkoutHistory>, sqlx::Error> {
        let rows: Vec<(i64, String, DateTime<Utc>)> = sqlx::query_as(
                "select id, workout, timestamp \
                 from workout_history \
                 where user_id = ? \
                 order by timestamp desc, id desc")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, workout, timestamp)| {
            WorkoutHistory { id, user_id, workout, timestamp }
        }).collect())
    }

    /// inserts the header and every exercise in one transaction
    pub async fn insert_workout(&self, user_id: UserId, date: DateTime<Utc>, exercises: &[NewExercise]) -> Result<LoggedWorkout, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let workout_id = sqlx::query("insert into workouts (user_id, date) values (?, ?)")
            .bind(user_id)
            .bind(date)
            .execute(&mut tx)
            .await?
            .last_insert_rowid();

        let mut rows = Vec::with_capacity(exercises.len());

        for e in exercises {
            let id = sqlx::query(
                    "insert into workout_exercises (workout_id, name, sets, reps, weight) values (?, ?, ?, ?, ?)")
                .bind(workout_id)
                .bind(&e.name)
                .bind(e.sets)
                .bind(e.reps)
                .bind(e.weight)
                .execute(&mut tx)
                .await?
                .last_insert_rowid();

            rows.push(WorkoutExercise {
                id,
                workout_id,
                name: e.name.clone(),
                sets: e.sets,
                reps: e.reps,
                weight: e.weight,
            });
        }

        tx.commit().await?;

        Ok(LoggedWorkout {
            workout: Workout { id: workout_id, user_id, date },
            exercises: rows,
        })
    }

    /// newest date first, exercises in insertion order
    pub async fn fetch_user_workouts(&self, user_id: UserId) -> Result<Vec<LoggedWorkout>, sqlx::Error> {
        let rows: Vec<(i64, DateTime<Utc>, Option<i64>, Option<String>, Option<i64>, Option<i64>, Option<f64>)> =
            sqlx::query_as(
                "select w.id, w.date, e.id, e.name, e.sets, e.reps, e.weight \
                 from workouts w \
                 left join workout_exercises e on e.workout_id = w.id \
                 where w.user_id = ? \
                 order by w.date desc, w.id desc, e.id asc")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        let grouped = rows.into_iter().group_by(|row| (row.0, row.1));

        let mut workouts = Vec::new();

        for ((workout_id, date), group) in &grouped {
            let exercises = group
                .filter_map(|(_, _, id, name, sets, reps, weight)| {
                    Some(WorkoutExercise { id: id?, workout_id, name: name?, sets: sets?, reps: reps?, weight })
                })
                .collect();

            workouts.push(LoggedWorkout {
                workout: Workout { id: workout_id, user_id, date },
                exercises,
            });
        }

        Ok(workouts)
    }
}

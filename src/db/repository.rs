use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{NewPlanRequest, Reminder, StudyPlan, Task, UpdatePlanRequest, User};

/// Raw row shape. Tasks and reminders are JSON arrays in TEXT columns since
/// they have no lifecycle outside their owning plan.
#[derive(Debug, FromRow)]
struct PlanRow {
    id: String,
    user_id: String,
    title: String,
    subject: String,
    description: Option<String>,
    start_date: String,
    end_date: String,
    tasks: String,
    reminders: String,
    progress: i64,
    version: i64,
    created_at: String,
    updated_at: String,
}

impl PlanRow {
    fn into_plan(self) -> Result<StudyPlan, AppError> {
        let tasks: Vec<Task> = serde_json::from_str(&self.tasks)?;
        let reminders: Vec<Reminder> = serde_json::from_str(&self.reminders)?;
        Ok(StudyPlan {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            subject: self.subject,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            tasks,
            reminders,
            progress: self.progress,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const PLAN_COLUMNS: &str = "id, user_id, title, subject, description, start_date, end_date, tasks, reminders, progress, version, created_at, updated_at";

pub async fn find_user_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, user_type, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(db)
    .await?;

    Ok(user)
}

pub async fn insert_user(
    db: &SqlitePool,
    name: String,
    email: String,
    password_hash: String,
    user_type: String,
) -> Result<User, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, user_type, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .bind(&user_type)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(User {
        id,
        name,
        email,
        password_hash,
        user_type,
        created_at: now,
    })
}

pub async fn fetch_plans_for_user(
    db: &SqlitePool,
    user_id: &str,
) -> Result<Vec<StudyPlan>, AppError> {
    let rows = sqlx::query_as::<_, PlanRow>(&format!(
        "SELECT {PLAN_COLUMNS} FROM study_plans WHERE user_id = ? ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(PlanRow::into_plan).collect()
}

pub async fn find_plan_by_id(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<StudyPlan>, AppError> {
    let row = sqlx::query_as::<_, PlanRow>(&format!(
        "SELECT {PLAN_COLUMNS} FROM study_plans WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;

    row.map(PlanRow::into_plan).transpose()
}

pub async fn insert_plan(
    db: &SqlitePool,
    req: NewPlanRequest,
) -> Result<StudyPlan, AppError> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let progress = req.progress.clamp(0, 100);
    let tasks_json = serde_json::to_string(&req.tasks)?;
    let reminders_json = serde_json::to_string(&req.reminders)?;

    sqlx::query(
        "INSERT INTO study_plans \
            (id, user_id, title, subject, description, start_date, end_date, \
            tasks, reminders, progress, version, created_at, updated_at) \
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
    )
    .bind(&id)
    .bind(&req.user_id)
    .bind(&req.title)
    .bind(&req.subject)
    .bind(&req.description)
    .bind(&req.start_date)
    .bind(&req.end_date)
    .bind(&tasks_json)
    .bind(&reminders_json)
    .bind(progress)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(StudyPlan {
        id,
        user_id: req.user_id,
        title: req.title,
        subject: req.subject,
        description: req.description,
        start_date: req.start_date,
        end_date: req.end_date,
        tasks: req.tasks,
        reminders: req.reminders,
        progress,
        version: 0,
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Shallow merge of `req` into the stored plan. A supplied `tasks` or
/// `reminders` array replaces the embedded list wholesale.
///
/// The read-merge-write runs in one transaction and the write is guarded by
/// the plan's version, so a concurrent writer cannot silently lose an update:
/// the loser gets `Conflict` instead.
pub async fn update_plan(
    db: &SqlitePool,
    id: &str,
    req: UpdatePlanRequest,
) -> Result<Option<StudyPlan>, AppError> {
    let mut tx = db.begin().await?;

    let row = sqlx::query_as::<_, PlanRow>(&format!(
        "SELECT {PLAN_COLUMNS} FROM study_plans WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let mut current = match row {
        Some(row) => row.into_plan()?,
        None => return Ok(None),
    };
    let snapshot_version = current.version;

    if let Some(expected) = req.version {
        if expected != snapshot_version {
            return Err(AppError::Conflict(format!(
                "Study plan was modified concurrently (expected version {expected}, found {snapshot_version})"
            )));
        }
    }

    if let Some(title) = req.title {
        current.title = title;
    }
    if let Some(subject) = req.subject {
        current.subject = subject;
    }
    if let Some(description) = req.description {
        current.description = Some(description);
    }
    if let Some(start_date) = req.start_date {
        current.start_date = start_date;
    }
    if let Some(end_date) = req.end_date {
        current.end_date = end_date;
    }
    if let Some(tasks) = req.tasks {
        current.tasks = tasks;
    }
    if let Some(reminders) = req.reminders {
        current.reminders = reminders;
    }
    if let Some(progress) = req.progress {
        current.progress = progress.clamp(0, 100);
    }
    current.updated_at = Utc::now().to_rfc3339();
    current.version = snapshot_version + 1;

    let tasks_json = serde_json::to_string(&current.tasks)?;
    let reminders_json = serde_json::to_string(&current.reminders)?;

    let result = sqlx::query(
        "UPDATE study_plans \
        SET title = ?, subject = ?, description = ?, start_date = ?, end_date = ?, \
            tasks = ?, reminders = ?, progress = ?, version = ?, updated_at = ? \
        WHERE id = ? AND version = ?",
    )
    .bind(&current.title)
    .bind(&current.subject)
    .bind(&current.description)
    .bind(&current.start_date)
    .bind(&current.end_date)
    .bind(&tasks_json)
    .bind(&reminders_json)
    .bind(current.progress)
    .bind(current.version)
    .bind(&current.updated_at)
    .bind(id)
    .bind(snapshot_version)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Study plan was modified concurrently".to_string(),
        ));
    }

    tx.commit().await?;

    Ok(Some(current))
}

pub async fn delete_plan(db: &SqlitePool, id: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM study_plans WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

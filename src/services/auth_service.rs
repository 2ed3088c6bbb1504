use sqlx::SqlitePool;
use tracing::info;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{AuthRequest, UserSummary};

// Matches the original deployment's bcrypt work factor.
const BCRYPT_COST: u32 = 10;

pub async fn signup(db: &SqlitePool, req: AuthRequest) -> Result<UserSummary, AppError> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    if repository::find_user_by_email(db, &req.email).await?.is_some() {
        return Err(AppError::DuplicateAccount);
    }

    let password_hash =
        bcrypt::hash(&req.password, BCRYPT_COST).map_err(|_| AppError::InternalServerError)?;

    let user = repository::insert_user(
        db,
        req.name.unwrap_or_default(),
        req.email,
        password_hash,
        req.user_type.unwrap_or_else(|| "student".to_string()),
    )
    .await?;

    info!("created user {}", user.id);
    Ok(user.into())
}

/// Unknown email and wrong password yield the identical error, so a caller
/// cannot probe which part was wrong.
pub async fn login(db: &SqlitePool, req: AuthRequest) -> Result<UserSummary, AppError> {
    let user = repository::find_user_by_email(db, &req.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let valid = bcrypt::verify(&req.password, &user.password_hash)
        .map_err(|_| AppError::InternalServerError)?;
    if !valid {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user.into())
}

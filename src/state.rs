use std::sync::Arc;

use sqlx::SqlitePool;

use crate::gemini::GenerativeClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// `None` when no GEMINI_API_KEY is configured; the chat endpoint then
    /// fails without attempting a network call.
    pub gemini: Option<Arc<dyn GenerativeClient>>,
}

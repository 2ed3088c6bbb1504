use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// A to-do item embedded in a plan. Tasks have no lifecycle of their own:
/// they are written and replaced only as part of the owning plan's task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "dueDate", default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: TaskPriority,
}

/// Embedded alongside tasks. Round-tripped through create/update but no
/// endpoint manipulates reminders independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub message: String,
    pub date: String,
    #[serde(rename = "isCompleted", default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlan {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub title: String,
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    pub tasks: Vec<Task>,
    pub reminders: Vec<Reminder>,
    pub progress: i64,
    pub version: i64,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlanRequest {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub title: String,
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: String,
    #[serde(rename = "endDate")]
    pub end_date: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    #[serde(default)]
    pub progress: i64,
}

/// Shallow merge: a present field replaces the stored value wholesale.
/// Supplying `tasks` replaces the entire embedded list, never merges it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanRequest {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub tasks: Option<Vec<Task>>,
    pub reminders: Option<Vec<Reminder>>,
    pub progress: Option<i64>,
    /// Optimistic concurrency: when supplied, the update only applies if the
    /// stored version still matches; a stale snapshot yields 409.
    pub version: Option<i64>,
}

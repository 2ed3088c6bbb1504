pub mod plan;
pub mod user;

pub use plan::{
    NewPlanRequest, Reminder, StudyPlan, Task, TaskPriority, TaskStatus, UpdatePlanRequest,
};
pub use user::{AuthRequest, User, UserSummary};

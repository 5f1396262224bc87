//! Business logic layer
//!
//! Services orchestrate operations by coordinating repositories,
//! applying business rules, and managing transactions.

pub mod achievements;
pub mod admins;
pub mod applications;
pub mod changes_log;
pub mod chat;
pub mod codeficator;
pub mod notifications;
pub mod providers;
pub mod scope;
pub mod search_sync;
pub mod status_permissions;
pub mod users;
pub mod workshops;

pub use achievements::AchievementService;
pub use admins::AdminService;
pub use applications::ApplicationService;
pub use changes_log::ChangesLogService;
pub use chat::{ChatService, ChatSide};
pub use codeficator::CodeficatorService;
pub use notifications::NotificationService;
pub use providers::ProviderService;
pub use scope::AdminScope;
pub use search_sync::{SearchSyncService, SyncPass};
pub use users::{ChildService, ParentService, UserService};
pub use workshops::WorkshopService;

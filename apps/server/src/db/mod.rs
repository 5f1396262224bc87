//! Database access layer
//!
//! `Repository<E>` covers the reads every entity shares; each submodule maps
//! one entity to its tables and adds the writes that entity needs.

mod achievements;
mod admins;
mod applications;
mod changes_log;
mod chat;
mod codeficator;
pub mod filter;
mod notifications;
mod providers;
pub mod repository;
mod search_sync;
mod users;
mod workshops;

pub use applications::ApplicationStatusChange;
pub use filter::{Filter, OrderBy, Page, Value};
pub use repository::{ensure_updated, Entity, Repository};
pub use users::NewUser;

use crate::models::{
    Achievement, Admin, Application, ChangesLogEntry, ChatMessage, ChatRoom, Child, Codeficator,
    Notification, Parent, Provider, SyncRecord, User, Workshop,
};

pub type UserRepository = Repository<User>;
pub type ParentRepository = Repository<Parent>;
pub type ChildRepository = Repository<Child>;
pub type ProviderRepository = Repository<Provider>;
pub type WorkshopRepository = Repository<Workshop>;
pub type ApplicationRepository = Repository<Application>;
pub type AchievementRepository = Repository<Achievement>;
pub type ChatRoomRepository = Repository<ChatRoom>;
pub type ChatMessageRepository = Repository<ChatMessage>;
pub type CodeficatorRepository = Repository<Codeficator>;
pub type ChangesLogRepository = Repository<ChangesLogEntry>;
pub type NotificationRepository = Repository<Notification>;
pub type AdminRepository = Repository<Admin>;
pub type SyncRecordRepository = Repository<SyncRecord>;

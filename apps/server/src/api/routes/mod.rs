//! Route tables

use crate::api::handlers::{
    achievements, admins, applications, changes_log, chat, codeficator, jobs, notifications,
    providers, stream, users, workshops,
};
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

/// Public and authenticated API, mounted under `/api/v1`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Users, parents and children
        .route(
            "/users/me",
            get(users::get_current_user).put(users::update_current_user),
        )
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user).delete(users::delete_user))
        .route("/parents", post(users::create_parent))
        .route("/parents/me", get(users::get_current_parent))
        .route(
            "/parents/personal-info",
            get(users::get_personal_info).put(users::update_personal_info),
        )
        .route("/parents/block", put(users::block_parent))
        .route(
            "/parents/:id",
            get(users::get_parent).delete(users::delete_parent),
        )
        .route(
            "/children",
            get(users::list_my_children).post(users::create_child),
        )
        .route("/children/all", get(users::list_children))
        .route(
            "/children/:id",
            get(users::get_child)
                .put(users::update_child)
                .delete(users::delete_child),
        )
        // Providers
        .route(
            "/providers",
            get(providers::list_providers)
                .post(providers::create_provider)
                .put(providers::update_provider),
        )
        .route("/providers/by-user", get(providers::get_provider_by_user))
        .route(
            "/providers/:id",
            get(providers::get_provider).delete(providers::delete_provider),
        )
        .route("/providers/:id/status", put(providers::update_provider_status))
        .route(
            "/providers/:id/license-status",
            put(providers::update_provider_license_status),
        )
        .route("/providers/:id/block", put(providers::block_provider))
        // Workshops
        .route(
            "/workshops",
            get(workshops::list_workshops)
                .post(workshops::create_workshop)
                .put(workshops::update_workshop),
        )
        .route(
            "/workshops/by-provider/:id",
            get(workshops::list_workshops_by_provider),
        )
        .route(
            "/workshops/:id",
            get(workshops::get_workshop).delete(workshops::delete_workshop),
        )
        .route("/workshops/:id/status", put(workshops::update_workshop_status))
        .route("/workshops/:id/taken-seats", get(workshops::get_taken_seats))
        // Applications
        .route(
            "/applications",
            get(applications::list_applications)
                .post(applications::create_application)
                .put(applications::update_application),
        )
        .route(
            "/applications/block-parent",
            put(applications::block_parent_by_provider),
        )
        .route("/applications/:id", get(applications::get_application))
        .route(
            "/applications/by-parent/:id",
            get(applications::list_by_parent),
        )
        .route(
            "/applications/by-parent/:id/count",
            get(applications::count_by_parent),
        )
        .route("/applications/by-child/:id", get(applications::list_by_child))
        .route(
            "/applications/by-workshop/:id",
            get(applications::list_by_workshop),
        )
        .route(
            "/applications/by-provider/:id",
            get(applications::list_by_provider),
        )
        .route(
            "/applications/allowed/:workshop_id/:child_id",
            get(applications::allowed_new_application),
        )
        .route(
            "/applications/review/:parent_id/:workshop_id",
            get(applications::allowed_to_review),
        )
        // Achievements
        .route(
            "/achievements",
            get(achievements::list_achievements)
                .post(achievements::create_achievement)
                .put(achievements::update_achievement),
        )
        .route("/achievements/types", get(achievements::list_types))
        .route(
            "/achievements/:id",
            get(achievements::get_achievement).delete(achievements::delete_achievement),
        )
        // Chat
        .route("/chat/messages", post(chat::send_message))
        .route(
            "/chat/rooms",
            get(chat::list_my_rooms).post(chat::open_room),
        )
        .route("/chat/rooms/ids", get(chat::list_my_room_ids))
        .route("/chat/rooms/find", get(chat::find_room))
        .route(
            "/chat/rooms/by-parent-and-provider",
            get(chat::list_rooms_by_parent_and_provider),
        )
        .route(
            "/chat/rooms/by-workshop/:id",
            get(chat::list_rooms_by_workshop),
        )
        .route(
            "/chat/rooms/:id",
            get(chat::get_room).delete(chat::delete_room),
        )
        .route("/chat/rooms/:id/messages", get(chat::get_messages))
        .route("/chat/workshops/:id/unread", get(chat::count_unread))
        // CATOTTG
        .route("/codeficator", get(codeficator::children))
        .route("/codeficator/names", get(codeficator::children_names))
        .route("/codeficator/search", get(codeficator::search))
        .route("/codeficator/nearest", get(codeficator::nearest))
        .route("/codeficator/:id", get(codeficator::get_by_id))
        .route(
            "/codeficator/:id/address-parts",
            get(codeficator::address_parts),
        )
        // Changes log
        .route("/changes-log", get(changes_log::list_changes))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list_notifications),
        )
        .route("/notifications/grouped", get(notifications::list_grouped))
        .route("/notifications/amount", get(notifications::amount_of_new))
        .route(
            "/notifications/read-by-type/:kind",
            put(notifications::read_by_type),
        )
        .route("/notifications/:id/read", put(notifications::read))
        .route("/notifications/:id", delete(notifications::delete))
        // Admins
        .route(
            "/admins/:kind",
            get(admins::list_admins)
                .post(admins::create_admin)
                .put(admins::update_admin),
        )
        .route("/admins/:kind/me", get(admins::get_current_admin))
        .route(
            "/admins/:kind/:user_id",
            get(admins::get_admin).delete(admins::delete_admin),
        )
        .route("/admins/:kind/:user_id/block", put(admins::block_admin))
        // Push streams
        .route("/stream/notifications", get(stream::notifications))
        .route("/stream/chat/:id", get(stream::chat_room))
}

/// Operational endpoints, mounted under `/internal`.
pub fn internal_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/health", get(jobs::get_queue_health))
        .route("/jobs/cleanup", post(jobs::cleanup_old_jobs))
        .route("/jobs/search-sync", post(jobs::trigger_search_sync))
        .route("/jobs/:id", get(jobs::get_job).delete(jobs::delete_job))
        .route("/jobs/:id/cancel", post(jobs::cancel_job))
}

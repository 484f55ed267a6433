pub mod health;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::state::AppState;
use crate::{advisor, college_list, credits, fit, profile, search};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Profile / document ingestion boundary
        .route(
            "/api/v1/profile",
            get(profile::handlers::handle_get_profile),
        )
        .route(
            "/api/v1/profile/uploads",
            post(profile::handlers::handle_upload),
        )
        .route(
            "/api/v1/profile/uploads/:filename",
            delete(profile::handlers::handle_remove_upload),
        )
        .route(
            "/api/v1/profile/onboarding",
            post(profile::handlers::handle_onboarding),
        )
        // Fit boundary
        .route("/api/v1/fit/:university_id", get(fit::handlers::handle_get_fit))
        // Search boundary
        .route("/api/v1/search", get(search::handlers::handle_search))
        // College list
        .route(
            "/api/v1/colleges",
            get(college_list::handle_list).post(college_list::handle_add),
        )
        .route(
            "/api/v1/colleges/reorder",
            patch(college_list::handle_reorder),
        )
        .route(
            "/api/v1/colleges/:university_id",
            delete(college_list::handle_remove),
        )
        // Credits
        .route(
            "/api/v1/credits",
            get(credits::handlers::handle_get_balances),
        )
        .route("/api/v1/credits/grant", post(credits::handlers::handle_grant))
        // Advisor glue
        .route("/api/v1/advisor/ask", post(advisor::handle_ask))
        .with_state(state)
}

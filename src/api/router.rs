use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, assess_fine, cancel_reservation, change_tier, checkout, delete_member,
    deactivate_member, enroll_member, get_borrowing, get_member, get_reservation,
    list_member_borrowings, list_member_reservations, list_members, list_membership_types,
    overdue_sweep, reactivate_member, receive_reservation, reserve, return_book, settle_fine,
    update_member,
};

/// Creates the API router with all lending endpoints
///
/// Members:
/// - POST /members, GET /members?q=&tier=&active=
/// - GET /members/membership-types
/// - GET/PUT/DELETE /members/:id
/// - PUT /members/:id/tier
/// - POST /members/:id/deactivate, POST /members/:id/reactivate
/// - POST /members/:id/fines/assess, POST /members/:id/fines/settle
/// - GET /members/:id/borrowings, GET /members/:id/reservations
///
/// Borrowings:
/// - POST /borrowings, GET /borrowings/:id
/// - POST /borrowings/:id/return
/// - POST /borrowings/overdue-sweep
///
/// Reservations:
/// - POST /reservations, GET /reservations/:id
/// - POST /reservations/:id/receive, POST /reservations/:id/cancel
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        // Members
        .route("/members", post(enroll_member).get(list_members))
        .route("/members/membership-types", get(list_membership_types))
        .route(
            "/members/:id",
            get(get_member).put(update_member).delete(delete_member),
        )
        .route("/members/:id/tier", put(change_tier))
        .route("/members/:id/deactivate", post(deactivate_member))
        .route("/members/:id/reactivate", post(reactivate_member))
        .route("/members/:id/fines/assess", post(assess_fine))
        .route("/members/:id/fines/settle", post(settle_fine))
        .route("/members/:id/borrowings", get(list_member_borrowings))
        .route("/members/:id/reservations", get(list_member_reservations))
        // Borrowings
        .route("/borrowings", post(checkout))
        .route("/borrowings/overdue-sweep", post(overdue_sweep))
        .route("/borrowings/:id", get(get_borrowing))
        .route("/borrowings/:id/return", post(return_book))
        // Reservations
        .route("/reservations", post(reserve))
        .route("/reservations/:id", get(get_reservation))
        .route("/reservations/:id/receive", post(receive_reservation))
        .route("/reservations/:id/cancel", post(cancel_reservation))
        // Add tracing middleware
        .layer(TraceLayer::new_for_http())
        // Add application state
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

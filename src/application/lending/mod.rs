mod borrowing_service;
mod dependencies;
mod errors;
mod identifier_generator;
mod locks;
mod member_service;
mod overdue_detection;
mod repository;
mod reservation_service;

pub use borrowing_service::{checkout, get_borrowing, list_borrowings_for_member, return_book};
pub use dependencies::{DEFAULT_MAX_WRITE_ATTEMPTS, LendingSettings, ServiceDependencies};
pub use errors::{LendingError, Result};
pub use identifier_generator::next_identifier;
pub use locks::MemberLocks;
pub use member_service::{
    active_members, assess_fine, change_tier, current_loan_count, deactivate, delete_member,
    enroll, find_member_by_email, get_member, members_by_tier, reactivate, search_members,
    settle_fine, update_member_profile,
};
pub use overdue_detection::detect_overdue_borrowings;
pub use repository::{Entity, Versioned};
pub use reservation_service::{
    cancel, get_reservation, list_reservations_for_member, mark_received, reserve,
};

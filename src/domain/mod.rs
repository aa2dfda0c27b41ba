pub mod borrowing;
pub mod errors;
pub mod identifiers;
pub mod member;
pub mod membership;
pub mod reservation;
pub mod value_objects;

pub use borrowing::{Borrowing, BorrowingStatus};
pub use errors::*;
pub use identifiers::{IdentifierKind, format_identifier};
pub use member::Member;
pub use membership::{
    MembershipPolicy, MembershipTier, membership_catalogue, policy_for, policy_for_name,
};
pub use reservation::{Reservation, ReservationStatus};
pub use value_objects::*;

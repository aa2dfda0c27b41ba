pub mod book_availability;

pub use book_availability::BookAvailability;

pub use in_memory_ledger::InMemoryCirculationLedger;

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::api::{BookDetails, UserDetails, UserId};

mod in_memory_ledger;

/// Number of days a copy may be kept per checkout or renewal.
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Daily rate applied when an overdue return updates the fine balance.
pub const OVERDUE_FINE_RATE: f64 = 0.5;

/// The rendered messages are the observable contract of the ledger and must
/// not change; callers branch on them.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CirculationError {
    #[error("User does not exist")]
    UserNotFound,

    #[error("Book does not exist")]
    BookNotFound,

    #[error("No copies available")]
    NoCopiesAvailable,

    #[error("Book is reserved by another user")]
    BookReservedByDifferentUser,

    #[error("Book was not checked out")]
    BookNotCheckedOut,

    #[error("User did not borrow this book")]
    BookNotBorrowedByUser,

    #[error("Book not borrowed by user")]
    NoLoanToRenew,

    #[error("Book is already reserved")]
    BookAlreadyReserved,

    #[error("Book is reserved and cannot be renewed")]
    ReservationBlocksRenewal,
}

#[async_trait::async_trait]
pub trait CirculationLedger: Send + Sync {
    /// Adds copies of a title to the catalog, creating the entry if needed
    async fn add_book(&self, title: &str, author: &str, copies: u32);

    /// Registers a user; re-registering an existing id resets their record
    async fn add_user(&self, user_id: &str, name: &str);

    /// Lists titles whose author matches exactly, in catalog iteration order
    async fn find_books_by_author(&self, author: &str) -> Vec<String>;

    /// Checks a copy out to the user, returns the due date as `YYYY-MM-DD`
    async fn check_out_book(&self, user_id: &str, title: &str)
        -> Result<String, CirculationError>;

    /// Returns a borrowed copy, applying an overdue fine when the due date
    /// has passed
    async fn return_book(&self, user_id: &str, title: &str) -> Result<String, CirculationError>;

    /// Extends the due date of an existing loan by another loan period
    async fn renew_book(&self, user_id: &str, title: &str) -> Result<String, CirculationError>;

    /// Places a single-slot hold on a title for the user
    async fn reserve_book(&self, user_id: &str, title: &str) -> Result<String, CirculationError>;

    /// Maps each title with at least one free copy to its available count
    async fn get_available_books(&self) -> HashMap<String, u32>;

    /// Retrieves the catalog entry for a title
    async fn get_book_details(&self, title: &str) -> Option<BookDetails>;

    /// Maps each user with overdue loans to their overdue titles and due dates
    async fn get_overdue_books(&self) -> HashMap<UserId, HashMap<String, DateTime<Utc>>>;

    /// Retrieves the record for a user
    async fn get_user_details(&self, user_id: &str) -> Option<UserDetails>;

    /// Accumulated fine balance for the user, 0 if none recorded
    async fn get_fines(&self, user_id: &str) -> f64;
}

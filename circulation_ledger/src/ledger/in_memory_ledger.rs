use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::api::{BookDetails, UserDetails, UserId};
use crate::ledger::{
    CirculationError, CirculationLedger, LOAN_PERIOD_DAYS, OVERDUE_FINE_RATE,
};

/// The only ledger backend: all state lives in process memory and is dropped
/// with the struct.
///
/// Lock acquisition order across operations is users, books, loan counters,
/// reservations, fines.
#[derive(Default)]
pub struct InMemoryCirculationLedger {
    users: parking_lot::RwLock<HashMap<UserId, UserDetails>>,
    books: parking_lot::RwLock<HashMap<String, BookDetails>>,
    checked_out: parking_lot::RwLock<HashMap<String, u32>>,
    reservations: parking_lot::RwLock<HashMap<String, UserId>>,
    fines: parking_lot::RwLock<HashMap<UserId, f64>>,
}

#[async_trait::async_trait]
impl CirculationLedger for InMemoryCirculationLedger {
    async fn add_book(&self, title: &str, author: &str, copies: u32) {
        match self.books.write().entry(title.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().copies += copies;
            }
            Entry::Vacant(entry) => {
                entry.insert(BookDetails {
                    author: author.to_string(),
                    copies,
                    reservations: vec![],
                });
            }
        }
        tracing::debug!(title, author, copies, "book added to catalog");
    }

    async fn add_user(&self, user_id: &str, name: &str) {
        // Re-adding an existing id resets their loans and reservations.
        self.users.write().insert(
            user_id.to_string(),
            UserDetails {
                name: name.to_string(),
                borrowed_books: HashMap::new(),
                reservations: vec![],
            },
        );
        tracing::debug!(user_id, name, "user registered");
    }

    async fn find_books_by_author(&self, author: &str) -> Vec<String> {
        self.books
            .read()
            .iter()
            .filter(|(_, details)| details.author == author)
            .map(|(title, _)| title.clone())
            .collect()
    }

    async fn check_out_book(
        &self,
        user_id: &str,
        title: &str,
    ) -> Result<String, CirculationError> {
        let mut users_lock = self.users.write();
        let user = users_lock
            .get_mut(user_id)
            .ok_or(CirculationError::UserNotFound)?;

        let mut books_lock = self.books.write();
        let book = books_lock
            .get_mut(title)
            .ok_or(CirculationError::BookNotFound)?;
        if book.copies == 0 {
            return Err(CirculationError::NoCopiesAvailable);
        }

        let mut reservations_lock = self.reservations.write();
        let held_by_this_user = match reservations_lock.get(title) {
            Some(holder) if holder != user_id => {
                return Err(CirculationError::BookReservedByDifferentUser)
            }
            Some(_) => true,
            None => false,
        };

        book.copies -= 1;
        *self.checked_out.write().entry(title.to_string()).or_insert(0) += 1;

        let due_date = Utc::now() + Duration::days(LOAN_PERIOD_DAYS);
        user.borrowed_books.insert(title.to_string(), due_date);

        // Checkout by the reservation holder consumes the reservation.
        if held_by_this_user {
            reservations_lock.remove(title);
            user.reservations.retain(|reserved| reserved != title);
        }

        tracing::debug!(user_id, title, %due_date, "book checked out");
        Ok(due_date.format("%Y-%m-%d").to_string())
    }

    async fn return_book(&self, user_id: &str, title: &str) -> Result<String, CirculationError> {
        let mut users_lock = self.users.write();
        let user = users_lock
            .get_mut(user_id)
            .ok_or(CirculationError::UserNotFound)?;

        let mut books_lock = self.books.write();
        let mut checked_out_lock = self.checked_out.write();
        match checked_out_lock.get(title) {
            Some(count) if *count > 0 => {}
            _ => return Err(CirculationError::BookNotCheckedOut),
        }
        if !user.borrowed_books.contains_key(title) {
            return Err(CirculationError::BookNotBorrowedByUser);
        }

        if let Some(count) = checked_out_lock.get_mut(title) {
            *count -= 1;
        }
        if let Some(book) = books_lock.get_mut(title) {
            book.copies += 1;
        }
        let due_date = user
            .borrowed_books
            .remove(title)
            .ok_or(CirculationError::BookNotBorrowedByUser)?;

        let now = Utc::now();
        if due_date < now {
            let overdue_days = (now - due_date).num_days();
            let mut fines_lock = self.fines.write();
            let balance = fines_lock.entry(user_id.to_string()).or_insert(0.0);
            *balance *= overdue_days as f64 * OVERDUE_FINE_RATE;
            tracing::debug!(user_id, title, overdue_days, fine = *balance, "overdue return");
        }

        tracing::debug!(user_id, title, "book returned");
        Ok("Book returned successfully".to_string())
    }

    async fn renew_book(&self, user_id: &str, title: &str) -> Result<String, CirculationError> {
        let mut users_lock = self.users.write();
        let user = users_lock
            .get_mut(user_id)
            .ok_or(CirculationError::UserNotFound)?;
        let due_date = user
            .borrowed_books
            .get_mut(title)
            .ok_or(CirculationError::NoLoanToRenew)?;

        // Any outstanding reservation blocks renewal, including the renewing
        // user's own.
        if self.reservations.read().contains_key(title) {
            return Err(CirculationError::ReservationBlocksRenewal);
        }

        *due_date += Duration::days(LOAN_PERIOD_DAYS);
        tracing::debug!(user_id, title, due_date = %due_date, "loan renewed");
        Ok(format!("Book renewed for another {LOAN_PERIOD_DAYS} days"))
    }

    async fn reserve_book(&self, user_id: &str, title: &str) -> Result<String, CirculationError> {
        let mut users_lock = self.users.write();
        let user = users_lock
            .get_mut(user_id)
            .ok_or(CirculationError::UserNotFound)?;
        if !self.books.read().contains_key(title) {
            return Err(CirculationError::BookNotFound);
        }

        match self.reservations.write().entry(title.to_string()) {
            Entry::Occupied(_) => Err(CirculationError::BookAlreadyReserved),
            Entry::Vacant(entry) => {
                entry.insert(user_id.to_string());
                user.reservations.push(title.to_string());
                tracing::debug!(user_id, title, "book reserved");
                Ok("Book reserved successfully".to_string())
            }
        }
    }

    async fn get_available_books(&self) -> HashMap<String, u32> {
        self.books
            .read()
            .iter()
            .filter(|(_, details)| details.copies > 0)
            .map(|(title, details)| (title.clone(), details.copies))
            .collect()
    }

    async fn get_book_details(&self, title: &str) -> Option<BookDetails> {
        self.books.read().get(title).cloned()
    }

    async fn get_overdue_books(&self) -> HashMap<UserId, HashMap<String, DateTime<Utc>>> {
        let now = Utc::now();
        self.users
            .read()
            .iter()
            .filter_map(|(user_id, details)| {
                let overdue: HashMap<String, DateTime<Utc>> = details
                    .borrowed_books
                    .iter()
                    .filter(|(_, due_date)| **due_date < now)
                    .map(|(title, due_date)| (title.clone(), *due_date))
                    .collect();
                if overdue.is_empty() {
                    None
                } else {
                    Some((user_id.clone(), overdue))
                }
            })
            .collect()
    }

    async fn get_user_details(&self, user_id: &str) -> Option<UserDetails> {
        self.users.read().get(user_id).cloned()
    }

    async fn get_fines(&self, user_id: &str) -> f64 {
        self.fines.read().get(user_id).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
impl InMemoryCirculationLedger {
    /// Rewrites the stored due date of an existing loan, standing in for the
    /// passage of time in overdue scenarios.
    fn set_due_date(&self, user_id: &str, title: &str, due_date: DateTime<Utc>) {
        self.users
            .write()
            .get_mut(user_id)
            .expect("user not found")
            .borrowed_books
            .insert(title.to_string(), due_date);
    }

    fn set_fine(&self, user_id: &str, amount: f64) {
        self.fines.write().insert(user_id.to_string(), amount);
    }
}

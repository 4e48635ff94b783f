use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External identifier assigned to a user by the caller.
pub type UserId = String;

/// Catalog entry for a single title.
///
/// `reservations` mirrors the reference record shape and is informational
/// only; live reservation state is kept in the ledger's reservation map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookDetails {
    pub author: String,
    pub copies: u32,
    pub reservations: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDetails {
    pub name: String,
    /// Borrowed title mapped to its due date.
    pub borrowed_books: HashMap<String, DateTime<Utc>>,
    /// Titles this user has reserved and not yet checked out.
    pub reservations: Vec<String>,
}

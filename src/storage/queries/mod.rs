//! Database query modules.
//!
//! Each module provides plain functions over a `rusqlite::Connection`; the
//! async wrapping happens in [`super::Database`].

pub mod assignments;
pub mod categories;
pub mod users;
pub mod watermarks;

//! Datastore collaborators for the retrieval pipeline.
//!
//! A [`Datastore`] answers two kinds of questions: field-equality and
//! field-prefix lookups against named collateral tables, and similarity search
//! over the unified chunk store. Three backends are provided: PostgREST
//! (Supabase) over HTTP, a local `SQLite` mirror, and an in-memory store.

pub mod datastore;
pub mod error;
mod http;
pub mod in_memory_store;
pub mod postgrest;
pub mod sqlite;
pub mod types;

pub use datastore::{BoxFuture, Datastore};
pub use error::StoreError;
pub use types::{ChunkMatch, TableRow};

/// `true` when `name` is safe to splice into a query as a table or column name.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

//! PostgreSQL implementation of the URL store.
//!
//! - [`PgUrlStore`] - Short URL storage and lookups

pub mod pg_url_store;

pub use pg_url_store::PgUrlStore;

//! Per-account channel preferences.
//!
//! A preference row holds one opt-in flag per channel plus the external
//! handles chat-app channels need. Rows are scoped to a merchant or global;
//! the resolver prefers the merchant row and falls back to the global one.

mod postgres_store;
mod resolver;
mod store;
mod types;

pub use postgres_store::PostgresPreferenceStore;
pub use resolver::{PreferenceResolver, ResolvedPreferences};
pub use store::{MemoryPreferenceStore, PreferenceStore};
pub use types::Preferences;

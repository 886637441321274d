//! Notification template system.
//!
//! This module provides:
//! - Template definitions scoped to a merchant or global, per channel and locale
//! - Template storage backends (in-memory and PostgreSQL)
//! - Variable substitution for `{{variable}}` placeholders
//! - A resolver that picks the best template with a bounded locale fallback
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(MemoryTemplateStore::new());
//! store.upsert(
//!     Template::new(None, "reservation_confirmed", Channel::Email, "en",
//!         "Hi {{guest_name}}, see you at {{time}}")
//!         .with_subject("Booking {{reservation_code}} confirmed"),
//! ).await?;
//!
//! let resolver = TemplateResolver::new(store, "en");
//! let template = resolver
//!     .lookup(Some(merchant_id), "reservation_confirmed", Channel::Email, "vi")
//!     .await; // falls back to "en"
//! ```

mod postgres_store;
mod resolver;
mod store;
mod substitution;
mod types;

pub use postgres_store::PostgresTemplateStore;
pub use resolver::TemplateResolver;
pub use store::{MemoryTemplateStore, TemplateStore};
pub use substitution::{render_str, substitute_variables};
pub use types::{Template, TemplateError, TemplateResult};

//! Derive MySQL tables, CRUD statements and select queries from plain Rust
//! structs, and gate schema evolution with versioned migrations.
//!
//! ```ignore
//! use tabler::{Record, Table};
//!
//! #[derive(Debug, Default, Record)]
//! pub struct User {
//!     #[embed]
//!     pub model: tabler::Model,
//!     pub email: String,
//!     #[sql(raw = "DEFAULT 0")]
//!     pub login_attempts: u32,
//! }
//!
//! let users = Table::<User>::new("users")?.with_key("UNIQUE KEY `email` (`email`(191))");
//! db.execute(&users.create_statement(), &[]).await?;
//! users.insert(&[user], &mut db).await?;
//! let found = users.select("*").r#where("{{email}} = ?").run(&mut db, &[email.into()]).await?;
//! ```

extern crate self as tabler;

pub mod libs;

pub use libs::*;
pub use tabler_derive::Record;

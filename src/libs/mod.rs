pub mod config;
pub mod database;
pub mod descriptor;
pub mod error;
pub mod migration;
pub mod model;
pub mod queryer;
pub mod registry;
pub mod schema;
pub mod select;
pub mod table;
pub mod types;
pub mod value;

// Re-export them for easier access from the crate root
pub use config::*;
pub use database::*;
pub use descriptor::*;
pub use error::*;
pub use migration::*;
pub use model::*;
pub use queryer::*;
pub use registry::*;
pub use schema::*;
pub use select::*;
pub use table::*;
pub use types::*;
pub use value::*;

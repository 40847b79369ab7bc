use serde::{Deserialize, Serialize};

use crate::types::DateTime;

/// Common columns for records that are updated and deleted by id. Embed it
/// with `#[embed]`; every column is filled in by the database.
///
/// ```ignore
/// #[derive(Debug, Default, Record)]
/// pub struct Invitation {
///     #[embed]
///     pub model: Model,
///     pub email: String,
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, tabler::Record)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sql(auto, raw = "NOT NULL AUTO_INCREMENT")]
    pub id: u64,
    #[sql(auto, raw = "DEFAULT CURRENT_TIMESTAMP")]
    pub created_at: DateTime,
    #[sql(auto, raw = "DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")]
    pub modified_at: DateTime,
    #[serde(skip)]
    #[sql(auto, raw = "DEFAULT 0")]
    pub deleted: bool,
}

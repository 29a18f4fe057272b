pub mod aggregated_rights;
pub mod aggregations;
pub mod health;
pub mod sharing;

use serde::Deserialize;

/// `?scope=` query parameter carried by delete and download requests.
#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    #[serde(default)]
    pub scope: String,
}

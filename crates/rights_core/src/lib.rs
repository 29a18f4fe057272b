//! Aggregated rights core: domain types, port traits, validators, change
//! events and the `RightsService` workflows. No database or HTTP code lives here.

pub mod caller;
pub mod error;
pub mod events;
pub mod memory;
pub mod normalize;
pub mod ports;
pub mod service;
pub mod types;
pub mod validate;

pub use caller::Caller;
pub use error::RightsError;
pub use service::{RightsService, RightsServiceImpl};

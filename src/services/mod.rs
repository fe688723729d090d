//! Device protocol logic
//!
//! Pure functions mapping between controller state and the text the access
//! point understands or prints. Nothing here performs I/O.

pub mod bandwidth;
pub mod wifi_config;
pub mod wifi_status;

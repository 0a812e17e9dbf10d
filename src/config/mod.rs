//! Configuration module

/// Trader configuration
pub mod base;
/// Venue credentials
pub mod credentials;

pub use base::TraderConfig;
pub use credentials::{VenueCredentials, strip_hex_prefix};

//! Venue-driver tests against mockito REST stand-ins

pub mod binance_driver;
pub mod bybit_driver;
pub mod okx_driver;

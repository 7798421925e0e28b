pub mod config;
pub mod error;
pub mod fleet;
pub mod locale;
pub mod output;
pub mod tariff;
pub mod ticker;
pub mod trip;

pub mod config;
pub mod logging;
pub mod observability;
pub mod realtime;
pub mod repositories;

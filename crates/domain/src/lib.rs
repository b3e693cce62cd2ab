pub mod aggregator;
pub mod cache;
pub mod channel;
pub mod conversation;
pub mod cursors;
pub mod error;
pub mod identity;
pub mod invalidator;
pub mod mark_read;
pub mod message;
pub mod ports;
pub mod resolver;
pub mod unread;
pub mod util;

pub type DomainResult<T> = Result<T, error::DomainError>;

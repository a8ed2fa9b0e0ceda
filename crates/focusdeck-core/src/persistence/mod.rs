//! Durable storage of completed sessions.
//!
//! The engine never awaits persistence. A [`PersistenceDispatcher`] queues
//! finished sessions on a channel and a [`PersistenceWriter`] task drains it
//! into a [`SessionGateway`], reporting failures instead of retrying.

mod gateway;
mod sqlite;
mod writer;

pub use gateway::SessionGateway;
pub use sqlite::SqliteGateway;
pub use writer::{PersistenceDispatcher, PersistenceWriter, WriterReport};

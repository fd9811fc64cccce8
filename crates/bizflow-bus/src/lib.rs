//! In-process command and query buses.
//!
//! Both buses implement the executor traits from `bizflow-core`, so a flow
//! can dispatch through them without knowing how handlers are found. Routing
//! is by the concrete message type: one handler per command or query type,
//! registered up front with [`CommandBus::register`] / [`QueryBus::register`].

pub mod command;
pub mod query;
mod registry;

pub use command::CommandBus;
pub use query::QueryBus;

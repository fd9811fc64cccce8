//! Flow graph: builder, execution engine, and diagram export.
//!
//! A flow is a directed graph of `Node`s joined by `Connection`s. Nodes
//! dispatch commands or queries, evaluate conditions, or run caller code;
//! connections are either unconditional or guarded by a named predicate.
//!
//! `FlowGraph::execute` seeds a FIFO queue with every node nothing points at,
//! runs each node once, stores its output in the shared `Context`, and
//! follows the outgoing connections whose guards hold. The outcome is always
//! a `FlowResult`, never an error.

pub mod context;
pub mod edge;
pub mod executor;
pub mod export;
pub mod flow;
pub mod node;
pub mod result;
mod unrouted;

pub use context::Context;
pub use edge::{Connection, Guard};
pub use flow::{FlowGraph, FlowOptions};
pub use node::{Node, NodeExecutor, NodeKind};
pub use result::FlowResult;

pub mod graph;

pub use graph::{Connection, Context, FlowGraph, FlowOptions, FlowResult, Node, NodeKind};

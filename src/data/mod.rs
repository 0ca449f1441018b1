//! Graph input handling

pub mod json;

pub use json::{load_graph, parse_graph, GraphDocument};

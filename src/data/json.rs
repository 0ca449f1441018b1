//! Node-link JSON documents

use anyhow::{Context, Result};
use crate::graph::{Graph, GraphBuilder, Link, NodeData};
use serde::Deserialize;
use std::path::Path;

/// `{ "nodes": [...], "links": [...] }`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<NodeData>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl GraphDocument {
    /// Build the graph; links without an id get `<source>_<target>`
    pub fn into_graph(self) -> Graph {
        let mut builder = GraphBuilder::with_capacity(self.nodes.len());
        for mut node in self.nodes {
            // incident lists are derived from the document's links
            node.links.clear();
            builder.add_node(node);
        }
        for link in self.links {
            builder.add_link(link);
        }
        builder.build()
    }
}

/// Parse a graph from a JSON string
pub fn parse_graph(json: &str) -> Result<Graph> {
    let document: GraphDocument = serde_json::from_str(json).context("Malformed graph document")?;
    Ok(document.into_graph())
}

/// Load a graph from a JSON file
pub fn load_graph<P: AsRef<Path>>(path: P) -> Result<Graph> {
    let path = path.as_ref();
    log::info!("Reading graph file: {}", path.display());

    if !path.exists() {
        return Err(anyhow::anyhow!("File not found: {}", path.display()));
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let graph = parse_graph(&contents)?;

    log::info!("Loaded graph with {} nodes and {} links", graph.node_count(), graph.link_count());
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_graph_defaults() {
        let graph = parse_graph(
            r#"{
                "nodes": [
                    {"id": "a", "type": "person", "weight": 2.0},
                    {"id": "b", "type": "person", "label": "Bee"}
                ],
                "links": [
                    {"source": "a", "target": "b"},
                    {"id": "l2", "source": "b", "target": "nowhere", "weight": 3.0}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(0).data().label, "a");
        assert_eq!(graph.node(1).data().label, "Bee");
        assert_eq!(graph.node(1).weight(), 1.0);
        assert_eq!(graph.links()[0].id, "a_b");
        assert_eq!(graph.node(1).data().links, vec!["a_b", "l2"]);
        assert_eq!(graph.resolved_links().count(), 1);
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_graph(r#"{"nodes": [{"type": "x"}]}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_graph("/definitely/not/here.json").unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}

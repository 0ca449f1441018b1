//! Plain and aggregate links

use serde::{Serialize, Deserialize};

fn default_weight() -> f64 {
    1.0
}

fn default_members() -> u32 {
    1
}

/// A link between two nodes, treated as undirected by the clustering algorithms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique identifier; defaults to `<source>_<target>` when loaded without one
    #[serde(default)]
    pub id: String,

    pub source: String,

    pub target: String,

    #[serde(default = "default_weight")]
    pub weight: f64,

    #[serde(default = "default_members")]
    pub num_members: u32,
}

impl Link {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            weight: 1.0,
            num_members: 1,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_members(mut self, num_members: u32) -> Self {
        self.num_members = num_members;
        self
    }
}

/// A link accumulating every remapped link that landed on the same summary endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateLink {
    /// `<source>_<target>` of the summary endpoints
    pub id: String,

    pub source: String,

    pub target: String,

    /// Sum of member link weights
    pub weight: f64,

    /// Sum of member link member counts
    pub num_members: u32,

    /// Ids of the original links folded in
    pub member_links: Vec<String>,
}

impl AggregateLink {
    pub(crate) fn new(id: String, source: String, target: String) -> Self {
        Self {
            id,
            source,
            target,
            weight: 0.0,
            num_members: 0,
            member_links: Vec::new(),
        }
    }

    pub(crate) fn absorb(&mut self, link: &Link) {
        self.weight += link.weight;
        self.num_members += link.num_members;
        self.member_links.push(link.id.clone());
    }
}

/// A link in a summary graph: either passed through untouched or aggregated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SummaryLink {
    Original(Link),
    Aggregate(AggregateLink),
}

impl SummaryLink {
    pub fn id(&self) -> &str {
        match self {
            SummaryLink::Original(link) => &link.id,
            SummaryLink::Aggregate(link) => &link.id,
        }
    }

    pub fn source(&self) -> &str {
        match self {
            SummaryLink::Original(link) => &link.source,
            SummaryLink::Aggregate(link) => &link.source,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            SummaryLink::Original(link) => &link.target,
            SummaryLink::Aggregate(link) => &link.target,
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            SummaryLink::Original(link) => link.weight,
            SummaryLink::Aggregate(link) => link.weight,
        }
    }

    pub fn num_members(&self) -> u32 {
        match self {
            SummaryLink::Original(link) => link.num_members,
            SummaryLink::Aggregate(link) => link.num_members,
        }
    }
}

//! Plan graph types
//!
//! A [`Plan`] is the unit handed to the validator and, once validated, to the
//! external executor. Node ids are caller-supplied strings and must be unique
//! within a plan.

use crate::error::PlanError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Identifier of a node, unique within one plan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create node id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Scalar literal carried by a node (slider value, panel text, toggle state)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    /// Boolean toggle
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Number(f64),
    /// Text value
    Text(String),
}

impl LiteralValue {
    /// Numeric view of the literal, if it has one
    ///
    /// Text literals are parsed so that panels holding `"10"` still feed
    /// numeric inputs.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Self::Bool(_) => None,
        }
    }

    /// Whether the literal is usable (no NaN or infinity)
    #[inline]
    #[must_use]
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// Port address on an edge endpoint
///
/// Ports addressed by positional index are stable across tool versions;
/// names are subject to fuzzy matching on the tool side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRef {
    /// Zero-based positional index
    Index(u32),
    /// Port name or nickname
    Name(String),
}

impl PortRef {
    /// Name of the port, if addressed by name
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(n) => Some(n),
            Self::Index(_) => None,
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "#{i}"),
            Self::Name(n) => f.write_str(n),
        }
    }
}

impl From<&str> for PortRef {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<u32> for PortRef {
    fn from(value: u32) -> Self {
        Self::Index(value)
    }
}

/// A single operation node in a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanNode {
    /// Unique id within the plan
    pub id: NodeId,
    /// Type tag (component kind)
    pub kind: String,
    /// Literal value for value-carrying nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<LiteralValue>,
    /// Explicit implementation identifier for kinds with several candidates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    /// Free-form attributes
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl PlanNode {
    /// Create node without literal, identity or attributes
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            literal: None,
            identity: None,
            attributes: BTreeMap::new(),
        }
    }

    /// With literal value
    #[inline]
    #[must_use]
    pub fn with_literal(mut self, literal: LiteralValue) -> Self {
        self.literal = Some(literal);
        self
    }

    /// With numeric literal
    #[inline]
    #[must_use]
    pub fn with_number(self, value: f64) -> Self {
        self.with_literal(LiteralValue::Number(value))
    }

    /// With explicit identity
    #[inline]
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// With attribute
    #[inline]
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Directed connection between two node ports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanEdge {
    /// Source node
    pub from: NodeId,
    /// Source output port
    pub from_port: PortRef,
    /// Target node
    pub to: NodeId,
    /// Target input port
    pub to_port: PortRef,
}

impl PlanEdge {
    /// Create edge
    #[inline]
    #[must_use]
    pub fn new(
        from: impl Into<NodeId>,
        from_port: impl Into<PortRef>,
        to: impl Into<NodeId>,
        to_port: impl Into<PortRef>,
    ) -> Self {
        Self {
            from: from.into(),
            from_port: from_port.into(),
            to: to.into(),
            to_port: to_port.into(),
        }
    }
}

/// A candidate plan: nodes, edges and the tool commands it relies on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Nodes in declaration order
    pub nodes: Vec<PlanNode>,
    /// Edges in declaration order
    #[serde(default)]
    pub edges: Vec<PlanEdge>,
    /// Design-tool commands the plan declares using
    #[serde(default)]
    pub commands: Vec<String>,
}

impl Plan {
    /// Empty plan
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start a builder
    #[inline]
    #[must_use]
    pub fn builder() -> PlanBuilder {
        PlanBuilder::new()
    }

    /// Parse a plan from JSON and check its structure
    ///
    /// Edges pointing at missing nodes are accepted here; the syntactic
    /// checker reports them.
    ///
    /// # Errors
    /// Returns error on malformed JSON, unknown fields, duplicate ids or
    /// non-finite literals.
    pub fn from_json(json: &str) -> Result<Self, PlanError> {
        let plan: Self = serde_json::from_str(json)?;
        plan.check_structure()?;
        Ok(plan)
    }

    /// Serialize as pretty JSON
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_pretty(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check id uniqueness and literal finiteness
    ///
    /// # Errors
    /// Returns the first structural violation found, in node order.
    pub fn check_structure(&self) -> Result<(), PlanError> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(&node.id) {
                return Err(PlanError::DuplicateNode(node.id.clone()));
            }
            if node.literal.as_ref().is_some_and(|l| !l.is_finite()) {
                return Err(PlanError::NonFiniteLiteral(node.id.clone()));
            }
        }
        Ok(())
    }

    /// Look up node by id
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&PlanNode> {
        self.nodes.iter().find(|n| n.id.as_str() == id)
    }

    /// Whether a node with this id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Distinct node kinds present in the plan
    #[must_use]
    pub fn kinds(&self) -> BTreeSet<&str> {
        self.nodes.iter().map(|n| n.kind.as_str()).collect()
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Build an adjacency index over the plan
    #[must_use]
    pub fn index(&self) -> PlanIndex<'_> {
        PlanIndex::new(self)
    }
}

/// Adjacency view over a [`Plan`]
///
/// Positions refer to indices into `plan.nodes`. Edges whose endpoints do
/// not resolve are kept aside as dangling and excluded from adjacency.
#[derive(Debug)]
pub struct PlanIndex<'a> {
    plan: &'a Plan,
    positions: IndexMap<&'a str, usize>,
    incoming: Vec<Vec<usize>>,
    outgoing: Vec<Vec<usize>>,
    dangling: Vec<usize>,
}

impl<'a> PlanIndex<'a> {
    fn new(plan: &'a Plan) -> Self {
        let mut positions = IndexMap::with_capacity(plan.nodes.len());
        for (pos, node) in plan.nodes.iter().enumerate() {
            // first occurrence wins on duplicates
            positions.entry(node.id.as_str()).or_insert(pos);
        }

        let mut incoming = vec![Vec::new(); plan.nodes.len()];
        let mut outgoing = vec![Vec::new(); plan.nodes.len()];
        let mut dangling = Vec::new();

        for (edge_idx, edge) in plan.edges.iter().enumerate() {
            match (
                positions.get(edge.from.as_str()),
                positions.get(edge.to.as_str()),
            ) {
                (Some(&from), Some(&to)) => {
                    outgoing[from].push(edge_idx);
                    incoming[to].push(edge_idx);
                }
                _ => dangling.push(edge_idx),
            }
        }

        Self {
            plan,
            positions,
            incoming,
            outgoing,
            dangling,
        }
    }

    /// Underlying plan
    #[inline]
    #[must_use]
    pub fn plan(&self) -> &'a Plan {
        self.plan
    }

    /// Position of node id
    #[inline]
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Edges into the node at `pos`
    pub fn incoming(&self, pos: usize) -> impl Iterator<Item = &'a PlanEdge> + '_ {
        self.incoming[pos].iter().map(|&e| &self.plan.edges[e])
    }

    /// Edges out of the node at `pos`
    pub fn outgoing(&self, pos: usize) -> impl Iterator<Item = &'a PlanEdge> + '_ {
        self.outgoing[pos].iter().map(|&e| &self.plan.edges[e])
    }

    /// Total resolved edges touching the node at `pos`
    #[inline]
    #[must_use]
    pub fn degree(&self, pos: usize) -> usize {
        self.incoming[pos].len() + self.outgoing[pos].len()
    }

    /// Edges with at least one unresolved endpoint
    pub fn dangling(&self) -> impl Iterator<Item = &'a PlanEdge> + '_ {
        self.dangling.iter().map(|&e| &self.plan.edges[e])
    }

    /// Resolved `(from, to)` position pairs, in edge order
    pub fn resolved_pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.plan.edges.iter().filter_map(|e| {
            Some((self.position(e.from.as_str())?, self.position(e.to.as_str())?))
        })
    }
}

/// Incremental plan construction with boundary checks
///
/// Unlike [`Plan::from_json`], the builder refuses edges to unknown nodes.
#[derive(Debug, Default)]
pub struct PlanBuilder {
    nodes: IndexMap<NodeId, PlanNode>,
    edges: Vec<PlanEdge>,
    commands: Vec<String>,
}

impl PlanBuilder {
    /// Create empty builder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    ///
    /// # Errors
    /// Returns error on duplicate id or non-finite literal
    pub fn add_node(&mut self, node: PlanNode) -> Result<NodeId, PlanError> {
        if self.nodes.contains_key(&node.id) {
            return Err(PlanError::DuplicateNode(node.id));
        }
        if node.literal.as_ref().is_some_and(|l| !l.is_finite()) {
            return Err(PlanError::NonFiniteLiteral(node.id));
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Connect two existing nodes
    ///
    /// # Errors
    /// Returns error if either endpoint is unknown
    pub fn add_edge(&mut self, edge: PlanEdge) -> Result<(), PlanError> {
        for end in [&edge.from, &edge.to] {
            if !self.nodes.contains_key(end) {
                return Err(PlanError::UnknownNode(end.clone()));
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Declare a tool command the plan uses
    pub fn add_command(&mut self, command: impl Into<String>) -> &mut Self {
        self.commands.push(command.into());
        self
    }

    /// Finish the plan
    #[must_use]
    pub fn build(self) -> Plan {
        Plan {
            nodes: self.nodes.into_values().collect(),
            edges: self.edges,
            commands: self.commands,
        }
    }
}

//! Optional collaborators available to the host

use lodestar_plan::Plan;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// What the host can offer beyond the required collaborators
///
/// Built once at startup and passed by reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// A renderer for flowchart previews is attached
    pub diagram_renderer: bool,
}

/// Plan preview attached to confirmations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body", rename_all = "snake_case")]
pub enum Preview {
    /// One line per node and edge
    Text(String),
    /// Flowchart source for the diagram renderer
    Diagram(String),
}

impl Preview {
    /// Preview body regardless of format
    #[must_use]
    pub fn body(&self) -> &str {
        match self {
            Self::Text(body) | Self::Diagram(body) => body,
        }
    }
}

impl Capabilities {
    /// With diagram renderer
    #[inline]
    #[must_use]
    pub fn with_diagram_renderer(mut self) -> Self {
        self.diagram_renderer = true;
        self
    }

    /// Render a plan in the richest format available
    #[must_use]
    pub fn preview(&self, plan: &Plan) -> Preview {
        if self.diagram_renderer {
            Preview::Diagram(flowchart(plan))
        } else {
            Preview::Text(listing(plan))
        }
    }
}

fn listing(plan: &Plan) -> String {
    let mut out = String::new();
    for node in &plan.nodes {
        let _ = write!(out, "{} ({})", node.id, node.kind);
        if let Some(literal) = &node.literal {
            let _ = write!(out, " = {literal}");
        }
        out.push('\n');
    }
    for edge in &plan.edges {
        let _ = writeln!(
            out,
            "{}.{} -> {}.{}",
            edge.from, edge.from_port, edge.to, edge.to_port
        );
    }
    out
}

fn flowchart(plan: &Plan) -> String {
    let mut out = String::from("flowchart LR\n");
    for node in &plan.nodes {
        let _ = writeln!(out, "    {}[\"{}\"]", node.id, node.kind.replace('"', "'"));
    }
    for edge in &plan.edges {
        let _ = writeln!(
            out,
            "    {} -- \"{}:{}\" --> {}",
            edge.from, edge.from_port, edge.to_port, edge.to
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_plan::{PlanEdge, PlanNode};

    fn plan() -> Plan {
        let mut b = Plan::builder();
        b.add_node(PlanNode::new("n", "Number Slider").with_number(4.0))
            .unwrap();
        b.add_node(PlanNode::new("s", "Series")).unwrap();
        b.add_edge(PlanEdge::new("n", 0u32, "s", "C")).unwrap();
        b.build()
    }

    #[test]
    fn text_without_renderer() {
        let preview = Capabilities::default().preview(&plan());
        assert!(matches!(preview, Preview::Text(_)));
        assert!(preview.body().contains("n (Number Slider)"));
        assert!(preview.body().contains("n.#0 -> s.C"));
    }

    #[test]
    fn diagram_with_renderer() {
        let preview = Capabilities::default().with_diagram_renderer().preview(&plan());
        assert!(matches!(preview, Preview::Diagram(_)));
        assert!(preview.body().starts_with("flowchart LR"));
        assert!(preview.body().contains("n -- \"#0:C\" --> s"));
    }
}

//! Validation tables
//!
//! Declarative data consulted by both phases: command lists, identity and
//! literal requirements, behavior specs and pattern-risk rules. Deployments
//! load their own tables from YAML or JSON; the defaults are illustrative.

use crate::error::TablesError;
use indexmap::IndexMap;
use lodestar_plan::Severity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Behavior of a node kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BehaviorSpec {
    /// Input port name -> meaning, in positional order
    pub inputs: IndexMap<String, String>,
    /// Output multiplier expression
    pub output: String,
}

/// An input of a given kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindInput {
    /// Node kind
    pub kind: String,
    /// Input port name
    pub input: String,
}

/// Declarative pattern-risk rule
///
/// Fires when every `present` kind occurs, no `absent` kind occurs and, if
/// given, some node of `unconnected.kind` leaves `unconnected.input` unfed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternRule {
    /// Rule name
    pub name: String,
    /// Kinds that must all be present
    #[serde(default)]
    pub present: Vec<String>,
    /// Kinds that must all be absent
    #[serde(default)]
    pub absent: Vec<String>,
    /// Optional input left unconnected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unconnected: Option<KindInput>,
    /// Severity of the resulting issue
    pub severity: Severity,
    /// Issue message
    pub message: String,
    /// Issue suggestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

fn default_explosion_threshold() -> f64 {
    100.0
}

/// All validation tables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidationTables {
    /// Commands known to be safe
    #[serde(default)]
    pub allowed_commands: BTreeSet<String>,
    /// Denied command -> replacement
    #[serde(default)]
    pub denied_commands: BTreeMap<String, String>,
    /// Kind with several implementations -> trusted default identity
    #[serde(default)]
    pub multi_identity: BTreeMap<String, String>,
    /// Port short names that collide across kinds (compared case-insensitively)
    #[serde(default)]
    pub ambiguous_ports: BTreeSet<String>,
    /// Kinds that must carry a literal
    #[serde(default)]
    pub literal_required: BTreeSet<String>,
    /// Kinds that should carry a literal
    #[serde(default)]
    pub literal_recommended: BTreeSet<String>,
    /// Kinds that legitimately have no inputs
    #[serde(default)]
    pub input_sources: BTreeSet<String>,
    /// Behavior by kind
    #[serde(default)]
    pub behaviors: BTreeMap<String, BehaviorSpec>,
    /// Pattern-risk rules in evaluation order
    #[serde(default)]
    pub rules: Vec<PatternRule>,
    /// Estimated cardinality above which a node explodes
    #[serde(default = "default_explosion_threshold")]
    pub explosion_threshold: f64,
}

impl ValidationTables {
    /// Tables with nothing in them
    #[must_use]
    pub fn empty() -> Self {
        Self {
            allowed_commands: BTreeSet::new(),
            denied_commands: BTreeMap::new(),
            multi_identity: BTreeMap::new(),
            ambiguous_ports: BTreeSet::new(),
            literal_required: BTreeSet::new(),
            literal_recommended: BTreeSet::new(),
            input_sources: BTreeSet::new(),
            behaviors: BTreeMap::new(),
            rules: Vec::new(),
            explosion_threshold: default_explosion_threshold(),
        }
    }

    /// Parse from YAML
    ///
    /// # Errors
    /// Returns error on malformed YAML or unknown fields
    pub fn from_yaml(yaml: &str) -> Result<Self, TablesError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error on malformed JSON or unknown fields
    pub fn from_json(json: &str) -> Result<Self, TablesError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, TablesError> {
        let content = std::fs::read_to_string(path).map_err(|source| TablesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// With allowed commands
    #[must_use]
    pub fn with_allowed(mut self, commands: &[&str]) -> Self {
        self.allowed_commands
            .extend(commands.iter().map(|c| (*c).to_string()));
        self
    }

    /// With denied command and its replacement
    #[must_use]
    pub fn with_denied(mut self, command: &str, replacement: &str) -> Self {
        self.denied_commands
            .insert(command.to_string(), replacement.to_string());
        self
    }

    /// With multi-identity kind
    #[must_use]
    pub fn with_multi_identity(mut self, kind: &str, default_identity: &str) -> Self {
        self.multi_identity
            .insert(kind.to_string(), default_identity.to_string());
        self
    }

    /// With ambiguous port names
    #[must_use]
    pub fn with_ambiguous_ports(mut self, ports: &[&str]) -> Self {
        self.ambiguous_ports
            .extend(ports.iter().map(|p| (*p).to_string()));
        self
    }

    /// With kinds that must carry a literal
    #[must_use]
    pub fn with_literal_required(mut self, kinds: &[&str]) -> Self {
        self.literal_required
            .extend(kinds.iter().map(|k| (*k).to_string()));
        self
    }

    /// With kinds that should carry a literal
    #[must_use]
    pub fn with_literal_recommended(mut self, kinds: &[&str]) -> Self {
        self.literal_recommended
            .extend(kinds.iter().map(|k| (*k).to_string()));
        self
    }

    /// With input-source kinds
    #[must_use]
    pub fn with_input_sources(mut self, kinds: &[&str]) -> Self {
        self.input_sources
            .extend(kinds.iter().map(|k| (*k).to_string()));
        self
    }

    /// With behavior
    #[must_use]
    pub fn with_behavior(mut self, kind: &str, inputs: &[(&str, &str)], output: &str) -> Self {
        self.behaviors.insert(
            kind.to_string(),
            BehaviorSpec {
                inputs: inputs
                    .iter()
                    .map(|(name, meaning)| ((*name).to_string(), (*meaning).to_string()))
                    .collect(),
                output: output.to_string(),
            },
        );
        self
    }

    /// With pattern-risk rule
    #[must_use]
    pub fn with_rule(mut self, rule: PatternRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// With explosion threshold
    #[must_use]
    pub fn with_explosion_threshold(mut self, threshold: f64) -> Self {
        self.explosion_threshold = threshold;
        self
    }
}

impl Default for ValidationTables {
    fn default() -> Self {
        const SOURCES: &[&str] = &[
            "Number Slider",
            "Panel",
            "Boolean Toggle",
            "Number",
            "Integer",
            "Point",
            "Curve",
        ];

        Self::empty()
            .with_allowed(&[
                "add_component",
                "connect",
                "set_value",
                "set_identity",
                "group",
                "recompute",
                "preview",
            ])
            .with_denied("delete_all", "delete_component")
            .with_denied("bake_all", "bake_selected")
            .with_denied("run_script", "add_component")
            .with_multi_identity("Box", "box_center")
            .with_multi_identity("Line", "line_two_point")
            .with_multi_identity("Divide Curve", "divide_by_count")
            .with_ambiguous_ports(&["x", "y", "z", "n", "t", "p", "d", "r"])
            .with_literal_required(&["Number Slider", "Boolean Toggle"])
            .with_literal_recommended(&["Panel", "Number", "Integer"])
            .with_input_sources(SOURCES)
            .with_behavior(
                "Series",
                &[("S", "start"), ("N", "step"), ("C", "count")],
                "1:C",
            )
            .with_behavior("Range", &[("D", "domain"), ("N", "steps")], "1:N")
            .with_behavior(
                "Rectangular Grid",
                &[("P", "plane"), ("Ex", "x count"), ("Ey", "y count")],
                "1:Ex*Ey",
            )
            .with_behavior(
                "Box Array",
                &[("X", "x count"), ("Y", "y count"), ("Z", "z count")],
                "1:X*Y*Z",
            )
            .with_behavior(
                "Box Array Faces",
                &[("X", "x count"), ("Y", "y count"), ("Z", "z count")],
                "1:X*Y*Z*6",
            )
            .with_behavior(
                "Move",
                &[("G", "geometry"), ("T", "motion")],
                "1:N where N = cardinality(G)",
            )
            .with_behavior(
                "Rotate",
                &[("G", "geometry"), ("A", "angle"), ("P", "plane")],
                "1:N where N = cardinality(G)",
            )
            .with_behavior("Area", &[("G", "geometry")], "1:N where N = cardinality(G)")
            .with_behavior(
                "Remap Numbers",
                &[("V", "values"), ("S", "source domain"), ("T", "target domain")],
                "1:N where N = cardinality(V)",
            )
            .with_rule(PatternRule {
                name: "loft_unsorted_sections".to_string(),
                present: vec!["Loft".to_string()],
                absent: vec!["Sort Curves".to_string()],
                unconnected: None,
                severity: Severity::Warning,
                message: "loft over unsorted section curves may twist".to_string(),
                suggestion: Some("sort section curves before lofting".to_string()),
            })
            .with_rule(PatternRule {
                name: "remap_without_target".to_string(),
                present: vec!["Remap Numbers".to_string()],
                absent: Vec::new(),
                unconnected: Some(KindInput {
                    kind: "Remap Numbers".to_string(),
                    input: "T".to_string(),
                }),
                severity: Severity::Info,
                message: "remap without a target domain maps to 0..1".to_string(),
                suggestion: Some("connect a target domain to T".to_string()),
            })
            .with_rule(PatternRule {
                name: "attractor_without_bounds".to_string(),
                present: vec!["Distance".to_string(), "Move".to_string()],
                absent: vec!["Bounds".to_string(), "Remap Numbers".to_string()],
                unconnected: None,
                severity: Severity::Warning,
                message: "raw attractor distances drive motion without normalization".to_string(),
                suggestion: Some("remap distances into a bounded domain".to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_keeps_input_order() {
        let yaml = r"
behaviors:
  Box Array:
    inputs:
      Z: z count
      X: x count
      Y: y count
    output: '1:X*Y*Z'
";
        let tables = ValidationTables::from_yaml(yaml).unwrap();
        let inputs: Vec<_> = tables.behaviors["Box Array"].inputs.keys().collect();
        assert_eq!(inputs, vec!["Z", "X", "Y"]);
        assert!((tables.explosion_threshold - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(ValidationTables::from_json(r#"{"aliases": {}}"#).is_err());
    }

    #[test]
    fn rule_severity_parses_snake_case() {
        let yaml = r"
rules:
  - name: r
    present: [Loft]
    severity: warning
    message: m
";
        let tables = ValidationTables::from_yaml(yaml).unwrap();
        assert_eq!(tables.rules[0].severity, Severity::Warning);
    }

    #[test]
    fn load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.json");
        std::fs::write(&path, r#"{"explosion_threshold": 50}"#).unwrap();
        let tables = ValidationTables::load(&path).unwrap();
        assert!((tables.explosion_threshold - 50.0).abs() < f64::EPSILON);
    }
}

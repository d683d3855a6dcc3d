//! Router lookup tables
//!
//! Domain keywords, intent verbs and the pattern-template registry. The
//! built-in tables are illustrative; deployments load their own from YAML
//! or JSON.

use crate::error::RouterError;
use crate::intent::IntentType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Named connection/structure template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternTemplate {
    /// Template name
    pub name: String,
    /// Keywords that indicate the template
    pub keywords: Vec<String>,
    /// Domains the template belongs to (empty = any)
    #[serde(default)]
    pub domains: Vec<String>,
}

impl PatternTemplate {
    /// Create template
    #[must_use]
    pub fn new(name: &str, keywords: &[&str], domains: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| (*s).to_string()).collect(),
            domains: domains.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// All tables the router consults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouterTables {
    /// Domain name -> keywords
    #[serde(default)]
    pub domains: BTreeMap<String, Vec<String>>,
    /// Intent -> verbs
    #[serde(default)]
    pub intent_verbs: BTreeMap<IntentType, Vec<String>>,
    /// Pattern registry, in declaration order
    #[serde(default)]
    pub patterns: Vec<PatternTemplate>,
}

impl RouterTables {
    /// Tables with nothing in them
    #[must_use]
    pub fn empty() -> Self {
        Self {
            domains: BTreeMap::new(),
            intent_verbs: BTreeMap::new(),
            patterns: Vec::new(),
        }
    }

    /// Parse from YAML
    ///
    /// # Errors
    /// Returns error on malformed YAML or unknown fields
    pub fn from_yaml(yaml: &str) -> Result<Self, RouterError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse from JSON
    ///
    /// # Errors
    /// Returns error on malformed JSON or unknown fields
    pub fn from_json(json: &str) -> Result<Self, RouterError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a `.yaml`/`.yml` or `.json` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, RouterError> {
        let content = std::fs::read_to_string(path).map_err(|source| RouterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// With domain
    #[must_use]
    pub fn with_domain(mut self, name: &str, keywords: &[&str]) -> Self {
        self.domains.insert(
            name.to_string(),
            keywords.iter().map(|s| (*s).to_string()).collect(),
        );
        self
    }

    /// With intent verbs
    #[must_use]
    pub fn with_verbs(mut self, intent: IntentType, verbs: &[&str]) -> Self {
        self.intent_verbs
            .insert(intent, verbs.iter().map(|s| (*s).to_string()).collect());
        self
    }

    /// With pattern template
    #[must_use]
    pub fn with_pattern(mut self, pattern: PatternTemplate) -> Self {
        self.patterns.push(pattern);
        self
    }
}

impl Default for RouterTables {
    fn default() -> Self {
        Self::empty()
            .with_domain(
                "geometry",
                &[
                    "point", "curve", "surface", "brep", "mesh", "cube", "box", "sphere",
                    "cylinder", "polyline", "circle",
                ],
            )
            .with_domain(
                "transform",
                &["rotate", "scale", "mirror", "orient", "translate", "array", "twist"],
            )
            .with_domain(
                "data",
                &["list", "tree", "flatten", "graft", "sort", "series", "range", "cull"],
            )
            .with_domain(
                "analysis",
                &["area", "volume", "length", "distance", "curvature", "centroid"],
            )
            .with_domain(
                "architecture",
                &["facade", "tower", "floor", "panel", "roof", "column", "building"],
            )
            .with_verbs(
                IntentType::Create,
                &["create", "make", "build", "generate", "draw", "design", "add"],
            )
            .with_verbs(
                IntentType::Modify,
                &["modify", "change", "update", "adjust", "edit", "replace", "rename"],
            )
            .with_verbs(
                IntentType::Analyze,
                &["analyze", "analyse", "measure", "calculate", "evaluate", "inspect"],
            )
            .with_verbs(
                IntentType::Debug,
                &["debug", "fix", "error", "broken", "wrong", "not working"],
            )
            .with_verbs(
                IntentType::Explore,
                &["explore", "experiment", "what if", "alternative", "variations", "brainstorm"],
            )
            .with_pattern(PatternTemplate::new(
                "rectangular_grid",
                &["grid", "rectangular array"],
                &["geometry", "transform"],
            ))
            .with_pattern(PatternTemplate::new(
                "facade_panelization",
                &["facade", "panelize", "panelization"],
                &["architecture"],
            ))
            .with_pattern(PatternTemplate::new(
                "twisted_tower",
                &["twisted", "tower", "floor plate"],
                &["architecture", "transform"],
            ))
            .with_pattern(PatternTemplate::new(
                "attractor_field",
                &["attractor", "distance field"],
                &["geometry", "analysis"],
            ))
            .with_pattern(PatternTemplate::new(
                "tree_restructure",
                &["flatten", "graft", "simplify tree"],
                &["data"],
            ))
            .with_pattern(PatternTemplate::new(
                "surface_division",
                &["divide surface", "subdivide", "isotrim"],
                &["geometry"],
            ))
    }
}

//! Kind registry compiled from validation tables
//!
//! String-keyed lookups are resolved once here into typed [`KindTraits`],
//! and every behavior expression is parsed up front.

use crate::error::TablesError;
use crate::expr::CardinalityExpr;
use crate::tables::{PatternRule, ValidationTables};
use std::collections::{BTreeMap, BTreeSet};

/// Literal expectation of a kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LiteralRequirement {
    /// No expectation
    #[default]
    None,
    /// Missing literal is informational
    Recommended,
    /// Missing literal is a warning
    Required,
}

/// Compiled behavior of a kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behavior {
    /// Declared inputs `(name, meaning)` in positional order
    pub inputs: Vec<(String, String)>,
    /// Output multiplier
    pub output: CardinalityExpr,
}

impl Behavior {
    /// Position of a named input
    #[must_use]
    pub fn input_position(&self, name: &str) -> Option<usize> {
        self.inputs
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }
}

/// Everything the validator knows about one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindTraits {
    /// Trusted default for multi-identity kinds
    pub identity_default: Option<String>,
    /// Literal expectation
    pub literal: LiteralRequirement,
    /// Kind legitimately has no inputs
    pub input_source: bool,
    /// Dataflow behavior
    pub behavior: Option<Behavior>,
}

/// Typed view over [`ValidationTables`]
#[derive(Debug, Clone)]
pub struct KindRegistry {
    kinds: BTreeMap<String, KindTraits>,
    allowed_commands: BTreeSet<String>,
    denied_commands: BTreeMap<String, String>,
    ambiguous_ports: BTreeSet<String>,
    rules: Vec<PatternRule>,
    explosion_threshold: f64,
    unknown: KindTraits,
}

/// How a declared command is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandPolicy<'a> {
    /// On the allow-list
    Allowed,
    /// On the deny-list, with its replacement
    Denied(&'a str),
    /// On neither list
    Unknown,
}

impl KindRegistry {
    /// Compile tables
    ///
    /// # Errors
    /// Returns error on an unparsable behavior expression or a
    /// non-positive threshold
    pub fn compile(tables: &ValidationTables) -> Result<Self, TablesError> {
        let threshold = tables.explosion_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(TablesError::InvalidThreshold(threshold));
        }

        let mut kinds: BTreeMap<String, KindTraits> = BTreeMap::new();

        for (kind, default) in &tables.multi_identity {
            kinds.entry(kind.clone()).or_default().identity_default = Some(default.clone());
        }
        for kind in &tables.literal_recommended {
            kinds.entry(kind.clone()).or_default().literal = LiteralRequirement::Recommended;
        }
        // required wins over recommended
        for kind in &tables.literal_required {
            kinds.entry(kind.clone()).or_default().literal = LiteralRequirement::Required;
        }
        for kind in &tables.input_sources {
            kinds.entry(kind.clone()).or_default().input_source = true;
        }
        for (kind, spec) in &tables.behaviors {
            let output =
                CardinalityExpr::parse(&spec.output).map_err(|message| TablesError::Expression {
                    kind: kind.clone(),
                    message,
                })?;
            let inputs: Vec<(String, String)> = spec
                .inputs
                .iter()
                .map(|(n, m)| (n.clone(), m.clone()))
                .collect();
            for name in output.referenced_inputs() {
                if !inputs.iter().any(|(n, _)| n == name) {
                    return Err(TablesError::Expression {
                        kind: kind.clone(),
                        message: format!("'{}' references undeclared input '{name}'", spec.output),
                    });
                }
            }
            kinds.entry(kind.clone()).or_default().behavior = Some(Behavior { inputs, output });
        }

        tracing::debug!(kinds = kinds.len(), rules = tables.rules.len(), "compiled kind registry");

        Ok(Self {
            kinds,
            allowed_commands: tables.allowed_commands.clone(),
            denied_commands: tables.denied_commands.clone(),
            ambiguous_ports: tables
                .ambiguous_ports
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            rules: tables.rules.clone(),
            explosion_threshold: threshold,
            unknown: KindTraits::default(),
        })
    }

    /// Traits of a kind; kinds absent from the tables have none
    #[must_use]
    pub fn traits(&self, kind: &str) -> &KindTraits {
        self.kinds.get(kind).unwrap_or(&self.unknown)
    }

    /// Policy for a declared command
    #[must_use]
    pub fn command_policy(&self, command: &str) -> CommandPolicy<'_> {
        if self.allowed_commands.contains(command) {
            CommandPolicy::Allowed
        } else if let Some(replacement) = self.denied_commands.get(command) {
            CommandPolicy::Denied(replacement)
        } else {
            CommandPolicy::Unknown
        }
    }

    /// Whether a port name is ambiguous (case-insensitive)
    #[must_use]
    pub fn is_ambiguous_port(&self, name: &str) -> bool {
        self.ambiguous_ports.contains(&name.to_lowercase())
    }

    /// Pattern-risk rules in evaluation order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Explosion threshold
    #[inline]
    #[must_use]
    pub fn explosion_threshold(&self) -> f64 {
        self.explosion_threshold
    }

    /// Override the explosion threshold
    ///
    /// # Errors
    /// Returns error if the threshold is not positive and finite
    pub fn set_explosion_threshold(&mut self, threshold: f64) -> Result<(), TablesError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(TablesError::InvalidThreshold(threshold));
        }
        self.explosion_threshold = threshold;
        Ok(())
    }
}

//! Output cardinality expressions
//!
//! Three forms, parsed once when tables are compiled:
//! - `1:1` one output per evaluation
//! - `1:X*Y*Z*6` product of named input values and integer constants
//! - `1:N where N = cardinality(G)` pass-through of an input's cardinality

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

static PASS_THROUGH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\w+)\s+where\s+(\w+)\s*=\s*cardinality\(\s*([^()\s]+)\s*\)$").unwrap()
});

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// One factor of a product expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Factor {
    /// Value of a named input
    Input(String),
    /// Integer constant
    Const(u64),
}

/// Parsed output multiplier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardinalityExpr {
    /// `1:1`
    One,
    /// `1:A*B*...`
    Product(Vec<Factor>),
    /// `1:N where N = cardinality(port)`
    PassThrough {
        /// Input port whose cardinality flows through
        port: String,
    },
}

/// Input values an expression is evaluated against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExprInputs {
    /// Numeric value per input (sum of literals or upstream cardinalities)
    pub values: BTreeMap<String, f64>,
    /// Data cardinality per input
    pub cardinalities: BTreeMap<String, f64>,
}

impl CardinalityExpr {
    /// Parse an expression
    ///
    /// # Errors
    /// Returns a message describing the first problem
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let (head, body) = text
            .split_once(':')
            .ok_or_else(|| format!("'{text}' is missing the '1:' prefix"))?;
        if head.trim() != "1" {
            return Err(format!("'{text}' must start with '1:'"));
        }
        let body = body.trim();

        if let Some(caps) = PASS_THROUGH.captures(body) {
            if caps[1] != caps[2] {
                return Err(format!(
                    "'{text}': variable '{}' does not match '{}'",
                    &caps[1], &caps[2]
                ));
            }
            return Ok(Self::PassThrough {
                port: caps[3].to_string(),
            });
        }
        if body.contains("where") {
            return Err(format!("'{text}': malformed pass-through clause"));
        }
        if body == "1" {
            return Ok(Self::One);
        }

        let mut factors = Vec::new();
        for raw in body.split('*') {
            let token = raw.trim();
            if token.is_empty() {
                return Err(format!("'{text}': empty factor"));
            }
            if let Ok(n) = token.parse::<u64>() {
                factors.push(Factor::Const(n));
            } else if IDENT.is_match(token) {
                factors.push(Factor::Input(token.to_string()));
            } else {
                return Err(format!("'{text}': invalid factor '{token}'"));
            }
        }
        Ok(Self::Product(factors))
    }

    /// Named inputs the expression reads
    #[must_use]
    pub fn referenced_inputs(&self) -> Vec<&str> {
        match self {
            Self::One => Vec::new(),
            Self::Product(factors) => factors
                .iter()
                .filter_map(|f| match f {
                    Factor::Input(name) => Some(name.as_str()),
                    Factor::Const(_) => None,
                })
                .collect(),
            Self::PassThrough { port } => vec![port.as_str()],
        }
    }

    /// Evaluate; inputs absent from `inputs` count as 1
    #[must_use]
    pub fn evaluate(&self, inputs: &ExprInputs) -> f64 {
        match self {
            Self::One => 1.0,
            Self::Product(factors) => factors
                .iter()
                .map(|f| match f {
                    Factor::Input(name) => inputs.values.get(name).copied().unwrap_or(1.0),
                    #[allow(clippy::cast_precision_loss)]
                    Factor::Const(n) => *n as f64,
                })
                .product(),
            Self::PassThrough { port } => inputs.cardinalities.get(port).copied().unwrap_or(1.0),
        }
    }
}

impl fmt::Display for CardinalityExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1:1"),
            Self::Product(factors) => {
                f.write_str("1:")?;
                for (i, factor) in factors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    match factor {
                        Factor::Input(name) => f.write_str(name)?,
                        Factor::Const(n) => write!(f, "{n}")?,
                    }
                }
                Ok(())
            }
            Self::PassThrough { port } => write!(f, "1:N where N = cardinality({port})"),
        }
    }
}

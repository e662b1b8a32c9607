use std::fmt;

use serde::{Deserialize, Serialize};

/// How much of a clue a mystery calls for.
///
/// Quantities are free-form: anything that reads as a finite number is
/// `Numeric`, everything else is a `Label` ("a pinch", "two cups").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Quantity {
    Numeric(f64),
    Label(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityError {
    Empty,
    NotPositive,
}

impl fmt::Display for QuantityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityError::Empty => f.write_str("quantity is required"),
            QuantityError::NotPositive => {
                f.write_str("quantity must be greater than zero if it is a numeric value")
            }
        }
    }
}

impl std::error::Error for QuantityError {}

impl Quantity {
    /// Parses user input. The input is trimmed; numeric values must be
    /// strictly positive.
    pub fn parse(input: &str) -> Result<Self, QuantityError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        match classify(trimmed) {
            Quantity::Numeric(value) if value <= 0.0 => Err(QuantityError::NotPositive),
            quantity => Ok(quantity),
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Quantity::Numeric(_))
    }
}

fn classify(trimmed: &str) -> Quantity {
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Quantity::Numeric(value),
        _ => Quantity::Label(trimmed.to_string()),
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Numeric(value) => write!(f, "{value}"),
            Quantity::Label(label) => f.write_str(label),
        }
    }
}

impl From<Quantity> for String {
    fn from(quantity: Quantity) -> Self {
        quantity.to_string()
    }
}

/// Stored quantities were validated on the way in, so reading them back
/// only re-classifies the text.
impl From<String> for Quantity {
    fn from(text: String) -> Self {
        classify(text.trim())
    }
}

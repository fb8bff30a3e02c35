//! Expense record types and the create-expense draft.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Expense categories known to the API.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Category {
    Food,
    Bills,
    Fuel,
    Entertainment,
    Other,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Food,
        Category::Bills,
        Category::Fuel,
        Category::Entertainment,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "Food",
            Category::Bills => "Bills",
            Category::Fuel => "Fuel",
            Category::Entertainment => "Entertainment",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Server-assigned identifier. Integer keys are the norm, but opaque string
/// keys are accepted too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum ExpenseId {
    Int(i64),
    Text(String),
}

impl fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpenseId::Int(n) => write!(f, "{n}"),
            ExpenseId::Text(s) => f.write_str(s),
        }
    }
}

/// A persisted expense, as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseRecord {
    pub id: ExpenseId,
    pub description: String,
    #[serde(deserialize_with = "decimal::deserialize")]
    pub amount: f64,
    pub category: Category,
    /// Calendar date (YYYY-MM-DD)
    pub date: NaiveDate,
}

/// In-progress form state for a new expense.
///
/// `amount` holds the raw text the user typed; it is only parsed when the
/// draft is turned into a [`NewExpense`].
#[derive(Debug, Clone, PartialEq)]
pub struct DraftExpense {
    pub description: String,
    pub amount: String,
    pub category: Category,
    pub date: NaiveDate,
}

impl DraftExpense {
    /// Empty draft dated `today`, defaulting to Food.
    pub fn new(today: NaiveDate) -> Self {
        Self {
            description: String::new(),
            amount: String::new(),
            category: Category::Food,
            date: today,
        }
    }

    /// Validate and convert into the request body.
    pub fn to_request(&self) -> Result<NewExpense, ValidationError> {
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingDescription);
        }
        if self.amount.trim().is_empty() {
            return Err(ValidationError::MissingAmount);
        }
        Ok(NewExpense {
            description: self.description.clone(),
            amount: normalize_amount(&self.amount)?,
            category: self.category,
            date: self.date,
        })
    }

    /// Reset after a successful submit. Category and date stay for the next entry.
    pub fn clear_entry(&mut self) {
        self.description.clear();
        self.amount.clear();
    }
}

/// Body of `POST /api/expenses/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewExpense {
    pub description: String,
    /// Fixed two-decimal representation, e.g. "12.50"
    pub amount: String,
    pub category: Category,
    pub date: NaiveDate,
}

/// Normalize a user-entered amount to two decimals: "12.5" -> "12.50".
pub fn normalize_amount(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ValidationError::InvalidAmount(trimmed.to_string()))?;
    if !value.is_finite() {
        return Err(ValidationError::InvalidAmount(trimmed.to_string()));
    }
    Ok(two_decimals(value))
}

/// `{:.2}` rounds exact midpoints to even ("0.125" -> "0.12"); amounts round
/// them away from zero instead. Only odd multiples of 1/8 sit exactly halfway
/// between two cents, and for those `value * 100.0` is exact.
fn two_decimals(value: f64) -> String {
    let eighths = value * 8.0;
    if eighths.fract() == 0.0 && eighths % 2.0 != 0.0 {
        let cents = (value * 100.0).round();
        return format!("{:.2}", cents / 100.0);
    }
    format!("{value:.2}")
}

/// Decimal fields arrive as JSON strings ("45.00") or plain numbers.
pub(crate) mod decimal {
    use super::*;
    use serde::de::Error;
    use serde::Deserializer;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    fn parse<E: Error>(raw: Raw) -> Result<f64, E> {
        match raw {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| E::custom(format!("invalid decimal '{s}': {e}"))),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        parse(Raw::deserialize(d)?)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Option::<Raw>::deserialize(d)?.map(parse).transpose()
    }
}

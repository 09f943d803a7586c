use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete classifier output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Long,
    Short,
    Wait,
}

impl Decision {
    /// +1 for long, -1 for short, 0 for wait.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
            Self::Wait => 0,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Self::Long => Some(Side::Long),
            Self::Short => Some(Side::Short),
            Self::Wait => None,
        }
    }

    /// Combine raw long/short conditions. Both true resolves to wait.
    pub fn from_conditions(long: bool, short: bool) -> Self {
        match (long, short) {
            (true, false) => Self::Long,
            (false, true) => Self::Short,
            _ => Self::Wait,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Wait => "wait",
        })
    }
}

/// Direction of an actionable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1.0 for long, -1.0 for short.
    pub fn direction(&self) -> f64 {
        match self {
            Self::Long => 1.0,
            Self::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Long => "long",
            Self::Short => "short",
        })
    }
}

/// One evaluation result for one symbol. Superseded by the next cycle's signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub decision: Decision,
    /// Latest fast-series close; NaN when the series was empty.
    pub reference_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Signal {
    pub fn wait(symbol: impl Into<String>, reference_price: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            decision: Decision::Wait,
            reference_price,
            timestamp,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.decision != Decision::Wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_conditions_resolve_to_wait() {
        assert_eq!(Decision::from_conditions(true, true), Decision::Wait);
        assert_eq!(Decision::from_conditions(false, false), Decision::Wait);
        assert_eq!(Decision::from_conditions(true, false), Decision::Long);
        assert_eq!(Decision::from_conditions(false, true), Decision::Short);
    }

    #[test]
    fn decision_sign_matches_side() {
        assert_eq!(Decision::Long.sign(), 1);
        assert_eq!(Decision::Short.sign(), -1);
        assert_eq!(Decision::Wait.sign(), 0);
        assert_eq!(Decision::Wait.side(), None);
        assert_eq!(Decision::Short.side(), Some(Side::Short));
    }

    #[test]
    fn decision_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Decision::Long).unwrap(), "\"long\"");
    }
}

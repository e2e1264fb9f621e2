//! Scoring enums shared by the blackboard's analysis-result side-table
//! (`crate::blackboard::analysis_result`) and the aggregate-score table
//! (`crate::scoring`).

use serde::{Deserialize, Serialize};

/// Severity of an analysis result's conclusion. Ordered so that
/// `Significance::max` picks the most severe of two values, which is the
/// whole of the aggregation rule in §3/§4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum Significance {
    Unknown = 0,
    None = 1,
    LikelyNone = 2,
    LikelyNotable = 3,
    Notable = 4,
}

impl Significance {
    pub fn from_db(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Unknown,
            1 => Self::None,
            2 => Self::LikelyNone,
            3 => Self::LikelyNotable,
            4 => Self::Notable,
            _ => return None,
        })
    }
}

/// Whether an analyst has overridden the computed significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum Priority {
    Normal = 0,
    Override = 1,
}

impl Priority {
    pub fn from_db(v: i32) -> Option<Self> {
        Some(match v {
            0 => Self::Normal,
            1 => Self::Override,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn significance_orders_by_severity() {
        assert!(Significance::Notable > Significance::LikelyNotable);
        assert!(Significance::LikelyNotable > Significance::LikelyNone);
        assert!(Significance::LikelyNone > Significance::None);
        assert!(Significance::None > Significance::Unknown);
    }

    #[test]
    fn priority_override_outranks_normal_when_compared() {
        assert!(Priority::Override > Priority::Normal);
    }
}

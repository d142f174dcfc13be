//! Priority classes for queued mutations.

use serde::{Deserialize, Serialize};

/// Priority class governing queue drain order.
///
/// Variants are ordered so that `Critical > High > Medium > Low`,
/// letting the queue sort entries directly on this type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background housekeeping; drained last.
    Low,
    /// Default priority for routine mutations.
    Medium,
    /// User-visible changes that should sync promptly.
    High,
    /// Drained first; also triggers an immediate sync pass while online.
    Critical,
}

impl Priority {
    /// All priority classes, highest first.
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    /// Returns the lowercase name of this priority class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn all_is_highest_first() {
        for pair in Priority::ALL.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(Priority::Critical.to_string(), "critical");
        assert_eq!(Priority::Low.to_string(), "low");
    }
}

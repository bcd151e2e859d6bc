// src/health/order.rs
//
// Ranking and response-code tables used by the resolver.

use super::status::HealthStatus;
use std::collections::HashMap;

/// Response code for any status missing from a [`StatusMapping`].
pub const FALLBACK_STATUS_CODE: u16 = 503;

/// Priority of each status; lower values are worse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusOrder {
    priorities: HashMap<HealthStatus, i64>,
}

impl StatusOrder {
    /// Builds the table from a sequence ordered worst first.
    ///
    /// Element `i` of `n` gets priority `i - n`, so the worst status is the
    /// most negative. A status listed twice keeps its later position.
    pub fn from_worst_first<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        let statuses: Vec<HealthStatus> = statuses.into_iter().collect();
        let len = statuses.len() as i64;
        let priorities = statuses
            .into_iter()
            .enumerate()
            .map(|(position, status)| (status, position as i64 - len))
            .collect();

        Self { priorities }
    }

    /// Priority of `status`.
    ///
    /// An unlisted status gets `len - 1`, which ranks it as good as or better
    /// than every listed status (and `-1` for an empty table). Paired with the
    /// 503 fallback in [`StatusMapping::code_for`], unknown statuses never win
    /// the ranking but still fail the response code.
    pub fn priority(&self, status: &HealthStatus) -> i64 {
        match self.priorities.get(status) {
            Some(priority) => *priority,
            None => self.priorities.len() as i64 - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }
}

impl Default for StatusOrder {
    fn default() -> Self {
        Self::from_worst_first([
            HealthStatus::PROBLEM,
            HealthStatus::WARNING,
            HealthStatus::UP,
        ])
    }
}

/// Response code for each status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMapping {
    codes: HashMap<HealthStatus, u16>,
}

impl StatusMapping {
    /// An empty mapping; every status falls back to 503.
    pub fn new() -> Self {
        Self {
            codes: HashMap::new(),
        }
    }

    pub fn with(mut self, status: impl Into<HealthStatus>, code: u16) -> Self {
        self.codes.insert(status.into(), code);
        self
    }

    pub fn code_for(&self, status: &HealthStatus) -> u16 {
        self.codes
            .get(status)
            .copied()
            .unwrap_or(FALLBACK_STATUS_CODE)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl Default for StatusMapping {
    fn default() -> Self {
        Self::new()
            .with(HealthStatus::UP, 200)
            .with(HealthStatus::WARNING, 200)
            .with(HealthStatus::PROBLEM, 503)
    }
}

impl FromIterator<(HealthStatus, u16)> for StatusMapping {
    fn from_iter<I: IntoIterator<Item = (HealthStatus, u16)>>(iter: I) -> Self {
        Self {
            codes: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_ranks_problem_worst() {
        let order = StatusOrder::default();
        assert_eq!(order.priority(&HealthStatus::PROBLEM), -3);
        assert_eq!(order.priority(&HealthStatus::WARNING), -2);
        assert_eq!(order.priority(&HealthStatus::UP), -1);
    }

    #[test]
    fn test_unknown_status_ranks_above_best_known() {
        let order = StatusOrder::default();
        let unknown = HealthStatus::new("MAINTENANCE");
        assert_eq!(order.priority(&unknown), 2);
        assert!(order.priority(&unknown) > order.priority(&HealthStatus::UP));
    }

    #[test]
    fn test_empty_order_treats_everything_equally() {
        let order = StatusOrder::from_worst_first(Vec::new());
        assert!(order.is_empty());
        assert_eq!(order.priority(&HealthStatus::PROBLEM), -1);
        assert_eq!(order.priority(&HealthStatus::UP), -1);
    }

    #[test]
    fn test_duplicate_entries_keep_later_position() {
        let order = StatusOrder::from_worst_first([
            HealthStatus::PROBLEM,
            HealthStatus::UP,
            HealthStatus::PROBLEM,
        ]);
        assert_eq!(order.len(), 2);
        assert_eq!(order.priority(&HealthStatus::PROBLEM), -1);
        assert_eq!(order.priority(&HealthStatus::UP), -2);
    }

    #[test]
    fn test_default_mapping() {
        let mapping = StatusMapping::default();
        assert_eq!(mapping.code_for(&HealthStatus::UP), 200);
        assert_eq!(mapping.code_for(&HealthStatus::WARNING), 200);
        assert_eq!(mapping.code_for(&HealthStatus::PROBLEM), 503);
    }

    #[test]
    fn test_unmapped_status_fails_closed() {
        let mapping = StatusMapping::new().with(HealthStatus::UP, 204);
        assert_eq!(mapping.code_for(&HealthStatus::UP), 204);
        assert_eq!(mapping.code_for(&HealthStatus::WARNING), FALLBACK_STATUS_CODE);
        assert_eq!(mapping.code_for(&HealthStatus::new("MAINTENANCE")), 503);
    }
}

//! Aggregated incident statistics for the analytics dashboard.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{IncidentCategory, Severity};

/// Number of incidents reported on one UTC day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DailyCount {
    /// `YYYY-MM-DD`
    pub date: String,
    pub count: i64,
}

/// Incident statistics over a time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentStats {
    /// Start of the window (RFC 3339)
    pub since: String,
    pub total: i64,
    pub total_upvotes: i64,
    pub by_category: BTreeMap<IncidentCategory, i64>,
    pub by_severity: BTreeMap<Severity, i64>,
    pub daily: Vec<DailyCount>,
}

impl IncidentStats {
    /// The category with the most incidents, ties broken by category order.
    pub fn top_category(&self) -> Option<IncidentCategory> {
        self.by_category
            .iter()
            .filter(|(_, count)| **count > 0)
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(category, _)| *category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_category() {
        let mut by_category = BTreeMap::new();
        by_category.insert(IncidentCategory::Flooding, 3);
        by_category.insert(IncidentCategory::Fire, 3);
        by_category.insert(IncidentCategory::Other, 1);

        let stats = IncidentStats {
            since: "2026-01-01T00:00:00.000Z".to_string(),
            total: 7,
            total_upvotes: 0,
            by_category,
            by_severity: BTreeMap::new(),
            daily: Vec::new(),
        };

        // Flooding sorts before Fire, so it wins the tie.
        assert_eq!(stats.top_category(), Some(IncidentCategory::Flooding));
    }
}

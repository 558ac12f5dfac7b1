use crate::errors::AppError;
use crate::models::{Incident, IncidentStats, TrendSummary};
use crate::services::gemini::GenerateRequest;
use crate::services::GeminiClient;

/// How many recent incidents are quoted verbatim in the prompt.
const RECENT_SAMPLE: usize = 15;

fn build_prompt(stats: &IncidentStats, recent: &[Incident]) -> String {
    let mut prompt = format!(
        "Incident statistics since {}: {} incidents, {} upvotes in total.\n\nBy category:\n",
        stats.since, stats.total, stats.total_upvotes
    );
    for (category, count) in &stats.by_category {
        prompt.push_str(&format!("- {}: {}\n", category.as_str(), count));
    }
    prompt.push_str("\nBy severity:\n");
    for (severity, count) in &stats.by_severity {
        prompt.push_str(&format!("- {}: {}\n", severity.as_str(), count));
    }
    prompt.push_str("\nPer day:\n");
    for day in &stats.daily {
        prompt.push_str(&format!("- {}: {}\n", day.date, day.count));
    }
    if !recent.is_empty() {
        prompt.push_str("\nMost recent reports:\n");
        for incident in recent.iter().take(RECENT_SAMPLE) {
            prompt.push_str(&format!(
                "- [{} / {}] {}\n",
                incident.category.as_str(),
                incident.severity.as_str(),
                incident.summary
            ));
        }
    }
    prompt.push_str(
        "\nSummarize the trends for city residents as a JSON object with fields \
         \"summary\" (one paragraph) and \"highlights\" (up to 4 short bullet strings).",
    );
    prompt
}

/// Narrative summary of incident statistics.
pub async fn summarize_trends(
    gemini: &GeminiClient,
    stats: &IncidentStats,
    recent: &[Incident],
) -> Result<TrendSummary, AppError> {
    if stats.total == 0 {
        return Ok(TrendSummary {
            summary: "No incidents were reported in this period.".to_string(),
            highlights: Vec::new(),
        });
    }

    let request = GenerateRequest::new(build_prompt(stats, recent))
        .system("You are a civic data analyst writing for the general public.")
        .json()
        .temperature(0.5);
    let mut summary: TrendSummary = gemini.generate_json(request).await?;

    if summary.summary.trim().is_empty() {
        return Err(AppError::Upstream(
            "The model returned an empty trend summary".to_string(),
        ));
    }
    summary.highlights.retain(|h| !h.trim().is_empty());
    summary.highlights.truncate(4);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyCount, IncidentCategory, Severity};
    use std::collections::BTreeMap;

    #[test]
    fn test_prompt_contains_breakdowns() {
        let stats = IncidentStats {
            since: "2026-10-11T00:00:00.000Z".to_string(),
            total: 3,
            total_upvotes: 5,
            by_category: BTreeMap::from([(IncidentCategory::Flooding, 3)]),
            by_severity: BTreeMap::from([(Severity::High, 3)]),
            daily: vec![DailyCount {
                date: "2026-10-17".to_string(),
                count: 3,
            }],
        };
        let prompt = build_prompt(&stats, &[]);
        assert!(prompt.contains("3 incidents, 5 upvotes"));
        assert!(prompt.contains("- flooding: 3"));
        assert!(prompt.contains("- high: 3"));
        assert!(prompt.contains("- 2026-10-17: 3"));
        assert!(!prompt.contains("Most recent reports"));
    }
}

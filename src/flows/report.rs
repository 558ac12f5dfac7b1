use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{IncidentAnalysis, IncidentCategory, Severity};
use crate::services::gemini::{GenerateRequest, InlineData};
use crate::services::GeminiClient;

const SYSTEM_PROMPT: &str = "You are a civic incident triage assistant for a city operations \
centre. You look at citizen-submitted photos and videos and classify what they show.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default = "default_true")]
    is_incident: bool,
    #[serde(default)]
    category: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    summary: String,
}

fn default_true() -> bool {
    true
}

fn build_prompt(description: Option<&str>) -> String {
    let categories: Vec<&str> = IncidentCategory::ALL.iter().map(|c| c.as_str()).collect();
    let severities: Vec<&str> = Severity::ALL.iter().map(|s| s.as_str()).collect();

    let mut prompt = format!(
        "Analyze the attached media of a reported civic incident.\n\
         Respond with a JSON object with these fields:\n\
         - \"isIncident\": false if the media does not show a civic incident\n\
         - \"category\": one of {}\n\
         - \"severity\": one of {}\n\
         - \"summary\": one or two sentences describing what happened, for other residents\n",
        categories.join(", "),
        severities.join(", ")
    );
    if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
        prompt.push_str(&format!("\nThe reporter wrote: \"{}\"\n", description));
    }
    prompt
}

/// Classify and summarize incident media.
pub async fn analyze_incident_report(
    gemini: &GeminiClient,
    media: InlineData,
    description: Option<&str>,
) -> Result<IncidentAnalysis, AppError> {
    let request = GenerateRequest::new(build_prompt(description))
        .system(SYSTEM_PROMPT)
        .media(media)
        .json()
        .temperature(0.2);

    let raw: RawAnalysis = gemini.generate_json(request).await?;
    let summary = raw.summary.trim().to_string();
    if raw.is_incident && summary.is_empty() {
        return Err(AppError::Upstream(
            "The model returned an analysis without a summary".to_string(),
        ));
    }

    tracing::info!(
        category = %raw.category,
        severity = %raw.severity,
        is_incident = raw.is_incident,
        "Incident media analyzed"
    );

    Ok(IncidentAnalysis {
        is_incident: raw.is_incident,
        category: IncidentCategory::from_label(&raw.category),
        severity: Severity::from_label(&raw.severity),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_categories_and_description() {
        let prompt = build_prompt(Some("  Car flipped near the bridge "));
        assert!(prompt.contains("traffic_accident"));
        assert!(prompt.contains("critical"));
        assert!(prompt.contains("\"Car flipped near the bridge\""));

        assert!(!build_prompt(Some("   ")).contains("The reporter wrote"));
    }

    #[test]
    fn test_raw_analysis_defaults() {
        let raw: RawAnalysis =
            serde_json::from_str(r#"{"category": "Flooding", "summary": "Street under water"}"#)
                .unwrap();
        assert!(raw.is_incident);
        assert_eq!(raw.severity, "");
    }
}

use crate::llm::types::InsightSummary;
use crate::ratios::RatioCategory;

pub const SYSTEM_PROMPT_ANALYST: &str = r#"
You are a financial analysis expert specializing in financial statements.

## YOUR MISSION
Turn a structured analysis summary into a short, practical narrative for a business reader.

## RULES
- Use ONLY the figures in the summary. Never invent numbers, periods or accounts.
- Ratios marked "unavailable" were not computable; say so instead of guessing.
- Margins, ROA and ROE are percentages. Turnover ratios are multiples. Day counts are days.
- When the data quality score is below 70, open with a caveat about reliability.

## OUTPUT FORMAT
Markdown with these sections:
1. **Overview**: two or three sentences on overall financial health
2. **Strengths**: bullet list
3. **Concerns**: bullet list
4. **Recommendations**: numbered list of concrete next steps
"#;

/// Renders the user prompt: a short brief followed by the summary as JSON.
pub fn build_user_prompt(summary: &InsightSummary) -> String {
    let mut brief = format!(
        "Statement: {} (classification confidence {:.0}%)\nIndustry benchmark set: {}\nPeriods: {}\nData quality score: {:.1}/100\n",
        summary.statement_type,
        summary.classification_confidence * 100.0,
        summary.industry,
        if summary.periods.is_empty() {
            "none".to_string()
        } else {
            summary.periods.join(", ")
        },
        summary.quality_score
    );

    for category in RatioCategory::ALL {
        if let Some(score) = summary.category_strength.get(&category) {
            brief.push_str(&format!("{} strength: {:.0}/100\n", category, score));
        }
    }

    let json = serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string());
    format!(
        "{}\n## ANALYSIS SUMMARY (JSON)\n```json\n{}\n```\n\nWrite the narrative now.",
        brief, json
    )
}

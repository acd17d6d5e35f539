//! Structured report model.
//!
//! Models are asked to answer with JSON matching [`report_schema`]; the
//! answer is parsed with [`StructuredReport::parse`], which tolerates a
//! surrounding markdown code fence and the legacy `section_title` /
//! `section_content` field names.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

/// Name under which the schema is sent to providers.
pub const REPORT_SCHEMA_NAME: &str = "structured_report";

/// One section of a report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Section heading.
    #[serde(alias = "section_title")]
    pub title: String,
    /// Section body text.
    #[serde(alias = "section_content")]
    pub content: String,
}

/// A complete report as returned by a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredReport {
    /// Report title. Never empty.
    pub title: String,
    /// Short overview.
    #[serde(default)]
    pub introduction: String,
    /// Body sections, possibly empty.
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Closing summary. Never empty.
    pub conclusion: String,
}

/// Reasons a model answer is not a usable report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The answer is not JSON of the expected shape.
    #[error("Report is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is blank.
    #[error("Report field '{0}' must not be empty")]
    EmptyField(&'static str),
}

impl StructuredReport {
    /// Parses a model answer into a report and validates it.
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let report: Self = serde_json::from_str(strip_code_fence(raw))?;
        report.validate()?;
        Ok(report)
    }

    /// Checks the non-empty title and conclusion invariant.
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.title.trim().is_empty() {
            return Err(ReportError::EmptyField("title"));
        }
        if self.conclusion.trim().is_empty() {
            return Err(ReportError::EmptyField("conclusion"));
        }
        Ok(())
    }
}

/// JSON schema describing [`StructuredReport`].
pub fn report_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "title": {"type": "string", "description": "Main title of the report"},
            "introduction": {"type": "string", "description": "Brief overview of the report"},
            "sections": {
                "type": "array",
                "description": "Body of the report",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string", "description": "Section heading"},
                        "content": {"type": "string", "description": "Full section text"}
                    },
                    "required": ["title", "content"],
                    "additionalProperties": false
                }
            },
            "conclusion": {"type": "string", "description": "Closing summary"}
        },
        "required": ["title", "introduction", "sections", "conclusion"],
        "additionalProperties": false
    })
}

/// Removes a leading and trailing markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "title": "EV Market",
        "introduction": "Overview",
        "sections": [{"title": "Demand", "content": "Rising"}],
        "conclusion": "Growth continues"
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let report = StructuredReport::parse(VALID).unwrap();
        assert_eq!(report.title, "EV Market");
        assert_eq!(report.sections[0].title, "Demand");
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = format!("```json\n{VALID}\n```");
        assert_eq!(StructuredReport::parse(&fenced).unwrap().conclusion, "Growth continues");

        let bare_fence = format!("```\n{VALID}\n```\n");
        assert!(StructuredReport::parse(&bare_fence).is_ok());
    }

    #[test]
    fn test_parse_legacy_section_names() {
        let legacy = r#"{
            "title": "T",
            "introduction": "I",
            "sections": [{"section_title": "S", "section_content": "C"}],
            "conclusion": "End"
        }"#;
        let report = StructuredReport::parse(legacy).unwrap();
        assert_eq!(report.sections, vec![Section { title: "S".into(), content: "C".into() }]);
    }

    #[test]
    fn test_empty_sections_allowed() {
        let report =
            StructuredReport::parse(r#"{"title": "T", "sections": [], "conclusion": "C"}"#).unwrap();
        assert!(report.sections.is_empty());
        assert!(report.introduction.is_empty());
    }

    #[test]
    fn test_blank_title_or_conclusion_rejected() {
        let err = StructuredReport::parse(r#"{"title": " ", "conclusion": "C"}"#).unwrap_err();
        assert!(matches!(err, ReportError::EmptyField("title")));

        let err = StructuredReport::parse(r#"{"title": "T", "conclusion": ""}"#).unwrap_err();
        assert!(matches!(err, ReportError::EmptyField("conclusion")));
    }

    #[test]
    fn test_non_json_rejected() {
        assert!(matches!(
            StructuredReport::parse("Here is your report: ..."),
            Err(ReportError::Json(_))
        ));
    }

    #[test]
    fn test_schema_requires_all_fields() {
        let schema = report_schema();
        assert_eq!(schema["required"].as_array().unwrap().len(), 4);
        assert_eq!(schema["properties"]["sections"]["type"], "array");
    }
}

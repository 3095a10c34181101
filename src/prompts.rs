//! Prompts for schema-constrained report card extraction.
//!
//! The extraction prompt is a template with exactly one placeholder,
//! [`INPUT_PLACEHOLDER`], which is replaced by the document text. Deployments
//! can ship their own template out-of-band (see [`PromptTemplate::load`]);
//! without one the built-in [`DEFAULT_TEMPLATE`] is used.
//!
//! Rendering is pure: loading happens once when the pipeline is built, and
//! [`PromptTemplate::render`] only does string substitution.

use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// The single placeholder the template must contain.
pub const INPUT_PLACEHOLDER: &str = "{input_text}";

/// Environment variable naming a template override file.
pub const TEMPLATE_ENV_VAR: &str = "REPORT2JSON_PROMPT_TEMPLATE";

/// Built-in extraction template describing the ReportCard schema field by field.
pub const DEFAULT_TEMPLATE: &str = r#"You are a data normalizer. Given the input text or extracted fields from a report card, produce a JSON object that exactly matches the following schema (no extra fields):

Schema:
{
  "meta": { "source": "<string>", "raw_format": "<string>", "extraction_confidence": "<0-1>" },
  "student": {
    "student_id": "<string|null>",
    "first_name": "<string|null>",
    "last_name": "<string|null>",
    "date_of_birth": "<ISO date|null>",
    "grade_level": "<string|null>",
    "class_name": "<string|null>",
    "school_name": "<string|null>"
  },
  "summary": "<short human-readable summary|null>",
  "subjects": [
    {
      "subject": "<string>",
      "term": "<string|null>",
      "quarter_grades": { "Q1": <number|null>, "Q2": <number|null>, "Q3": <number|null>, "Q4": <number|null> },
      "numeric_grade": <number|null>,
      "letter_grade": "<string|null>",
      "teacher_comments": "<string|null>",
      "competencies": { "<competency_name>": "<level>" }
    }
  ],
  "attendance": { "days_present": <int|null>, "days_absent": <int|null>, "tardies": <int|null> },
  "behavior": [
    { "date": "<date|null>", "note": "<string>", "teacher": "<string|null>" }
  ],
  "overall_gpa": <number|null>,
  "recommendations": ["<string>"]
}

Rules:
1. Output must be valid JSON only (no explanations).
2. When a value is missing use null.
3. Use the numeric values in the raw text exactly as they appear for each subject and map them to Q1, Q2, Q3, Q4 in order of appearance.
4. If a subject has only one grade, place it in Q4 and set the other quarters to null.
5. Compute 'numeric_grade' as the average of all quarters that are present.
6. Compute 'letter_grade' from numeric_grade (A: 85-100, B: 70-84, C: 50-69, D: <50).
7. Put any free-text comments under 'teacher_comments'.
8. For 'recommendations', give detailed, actionable, analytics-based advice.

Input:
{input_text}

Return only the JSON."#;

/// System prompt for the vision recogniser: verbatim transcription of one page.
pub const TRANSCRIPTION_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of text visible in the image exactly as printed.

Rules:
1. Keep the reading order a human would use; read tables row by row.
2. Put each printed line on its own line and separate blocks with a blank line.
3. Keep headings in their original case, and keep numbers, grades and dates exactly as shown.
4. Do not summarise, translate, correct, or add commentary.
5. Output plain text only: no Markdown, no code fences.
6. If the image contains no text, output nothing."#;

/// System instruction for the optional translation step.
pub const TRANSLATION_INSTRUCTION: &str = "You are a concise translator. Translate the user's text into natural, fluent English. Return only the translated text with no extra commentary.";

/// Build the single-turn translation prompt.
pub fn translation_prompt(text: &str, source_language: Option<&str>) -> String {
    format!(
        "{TRANSLATION_INSTRUCTION}\n\nTranslate the following text to English. Source language hint: {}.\n\n{text}",
        source_language.unwrap_or("unknown")
    )
}

/// What the model is asked to normalise.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptInput {
    /// Free text (usually OCR `raw_text`).
    Text(String),
    /// Fields already extracted upstream; pretty-printed into the prompt.
    Structured(Map<String, Value>),
}

impl PromptInput {
    /// The text substituted into the template.
    pub fn as_prompt_text(&self) -> String {
        match self {
            PromptInput::Text(t) => t.clone(),
            PromptInput::Structured(map) => serde_json::to_string_pretty(map)
                .unwrap_or_else(|_| Value::Object(map.clone()).to_string()),
        }
    }
}

/// An extraction template, either built-in or loaded from a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    text: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            text: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Load an override from `path`, falling back to the default on any problem.
    ///
    /// Accepted file contents:
    /// * a JSON object with a `"prompt"` or `"template"` string
    /// * a JSON string
    /// * anything else that is not JSON is taken verbatim as the template
    ///
    /// A missing file, unreadable file, or JSON with neither key is logged and
    /// ignored.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match parse_template_file(&contents) {
                Some(text) => {
                    if !text.contains(INPUT_PLACEHOLDER) {
                        warn!(
                            "Prompt template {} has no {} placeholder; the input will only appear in the meta line",
                            path.display(),
                            INPUT_PLACEHOLDER
                        );
                    }
                    debug!("Loaded prompt template from {}", path.display());
                    Self { text }
                }
                None => {
                    warn!(
                        "Prompt template {} has no usable template; using built-in default",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed loading prompt template {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve the template from an explicit path, then [`TEMPLATE_ENV_VAR`], then the default.
    pub fn resolve(explicit: Option<&Path>) -> Self {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match std::env::var(TEMPLATE_ENV_VAR) {
            Ok(p) if !p.is_empty() => Self::load(Path::new(&p)),
            _ => Self::default(),
        }
    }

    /// Substitute the input and append the provenance line.
    pub fn render(&self, input: &PromptInput, source: &str, raw_format: &str) -> String {
        let mut prompt = self.text.replace(INPUT_PLACEHOLDER, &input.as_prompt_text());
        prompt.push_str(&format!(
            "\n\nMeta: source={source}, raw_format={raw_format}\n"
        ));
        prompt
    }
}

fn parse_template_file(contents: &str) -> Option<String> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(obj)) => ["prompt", "template"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        Ok(Value::String(s)) if !s.is_empty() => Some(s),
        Ok(_) => None,
        Err(_) if !contents.trim().is_empty() => Some(contents.to_string()),
        Err(_) => None,
    }
}

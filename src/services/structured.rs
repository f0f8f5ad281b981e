//! Validated JSON answers for the AI generators (quiz, fortune).
//!
//! Every answer is checked field by field before it reaches the UI; a bad
//! shape is reported to the user and never retried.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{CoreError, ValidationError};
use crate::services::ai::Completer;

/// Cuts the JSON object/array out of a model answer (code fences, prose).
pub fn extract_json_block(raw: &str) -> Result<&str, ValidationError> {
    let start = raw
        .find(|c: char| c == '{' || c == '[')
        .ok_or(ValidationError::NoJson)?;
    let close = if raw[start..].starts_with('{') { '}' } else { ']' };
    let end = raw.rfind(close).ok_or(ValidationError::NoJson)?;

    if end < start {
        return Err(ValidationError::NoJson);
    }
    Ok(&raw[start..=end])
}

pub trait Structured: Sized {
    fn from_value(value: &Value) -> Result<Self, ValidationError>;

    fn parse(raw: &str) -> Result<Self, ValidationError> {
        let block = extract_json_block(raw)?;
        let value: Value =
            serde_json::from_str(block).map_err(|e| ValidationError::Malformed(e.to_string()))?;
        Self::from_value(&value)
    }
}

fn object<'a>(value: &'a Value, field: &str) -> Result<&'a Map<String, Value>, ValidationError> {
    value.as_object().ok_or_else(|| ValidationError::InvalidField {
        field: field.to_string(),
        reason: "phải là object".into(),
    })
}

fn required_str(obj: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    let v = obj
        .get(field)
        .ok_or_else(|| ValidationError::MissingField(field.to_string()))?;
    let s = v.as_str().ok_or_else(|| ValidationError::InvalidField {
        field: field.to_string(),
        reason: "phải là chuỗi".into(),
    })?;
    if s.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: field.to_string(),
            reason: "không được để trống".into(),
        });
    }
    Ok(s.trim().to_string())
}

fn optional_str(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn required_array<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a Vec<Value>, ValidationError> {
    obj.get(field)
        .ok_or_else(|| ValidationError::MissingField(field.to_string()))?
        .as_array()
        .ok_or_else(|| ValidationError::InvalidField {
            field: field.to_string(),
            reason: "phải là mảng".into(),
        })
}

pub const QUIZ_OPTIONS: usize = 4;

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct QuizSet {
    pub questions: Vec<QuizQuestion>,
}

impl Structured for QuizSet {
    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        // Accept both `{"questions": [...]}` and a bare array.
        let items = match value {
            Value::Array(items) => items,
            other => required_array(object(other, "questions")?, "questions")?,
        };

        if items.is_empty() {
            return Err(ValidationError::InvalidField {
                field: "questions".into(),
                reason: "không có câu hỏi nào".into(),
            });
        }

        let mut questions = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let field = |name: &str| format!("questions[{i}].{name}");
            let obj = object(item, &format!("questions[{i}]"))?;

            let question = required_str(obj, "question").map_err(|_| {
                ValidationError::MissingField(field("question"))
            })?;

            let options: Vec<String> = required_array(obj, "options")
                .map_err(|_| ValidationError::MissingField(field("options")))?
                .iter()
                .filter_map(|o| o.as_str().map(|s| s.trim().to_string()))
                .filter(|s| !s.is_empty())
                .collect();
            if options.len() != QUIZ_OPTIONS {
                return Err(ValidationError::InvalidField {
                    field: field("options"),
                    reason: format!("cần đúng {QUIZ_OPTIONS} lựa chọn, nhận {}", options.len()),
                });
            }

            let answer = match obj.get("answer") {
                Some(Value::Number(n)) => n.as_u64().map(|n| n as usize),
                // Some models answer with the option text instead of the index.
                Some(Value::String(s)) => options.iter().position(|o| o == s.trim()),
                _ => return Err(ValidationError::MissingField(field("answer"))),
            };
            let answer = answer.filter(|a| *a < options.len()).ok_or_else(|| {
                ValidationError::InvalidField {
                    field: field("answer"),
                    reason: "không trỏ tới lựa chọn nào".into(),
                }
            })?;

            questions.push(QuizQuestion {
                question,
                options,
                answer,
                explanation: optional_str(obj, "explanation"),
            });
        }

        Ok(Self { questions })
    }
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct FortuneReading {
    pub summary: String,
    pub love: String,
    pub career: String,
    pub health: String,
    pub lucky_numbers: Vec<u32>,
}

impl Structured for FortuneReading {
    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = object(value, "fortune")?;

        let lucky_numbers = required_array(obj, "lucky_numbers")?
            .iter()
            .map(|n| {
                n.as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| ValidationError::InvalidField {
                        field: "lucky_numbers".into(),
                        reason: "phải là số nguyên dương".into(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            summary: required_str(obj, "summary")?,
            love: required_str(obj, "love")?,
            career: required_str(obj, "career")?,
            health: required_str(obj, "health")?,
            lucky_numbers,
        })
    }
}

pub fn quiz_prompt(topic: &str, count: usize, language: &str) -> String {
    format!(
        "Create {count} multiple-choice quiz questions about \"{topic}\" in {language}.\n\
Answer with JSON only, no prose, in this shape:\n\
{{\"questions\": [{{\"question\": \"...\", \"options\": [\"A\", \"B\", \"C\", \"D\"], \
\"answer\": 0, \"explanation\": \"...\"}}]}}\n\
Each question has exactly {QUIZ_OPTIONS} options; `answer` is the 0-based index of the correct one."
    )
}

pub fn fortune_prompt(name: &str, birth_date: &str, language: &str) -> String {
    format!(
        "Write a light-hearted fortune reading in {language} for {name}, born {birth_date}.\n\
Answer with JSON only, no prose, in this shape:\n\
{{\"summary\": \"...\", \"love\": \"...\", \"career\": \"...\", \"health\": \"...\", \
\"lucky_numbers\": [1, 2, 3]}}"
    )
}

/// One call, no retry: a failure or a bad shape goes straight back to the user.
pub fn generate<T: Structured>(completer: &mut dyn Completer, prompt: &str) -> Result<T, CoreError> {
    let raw = completer.complete(prompt)?;
    Ok(T::parse(&raw)?)
}

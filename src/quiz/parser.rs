use serde_json::{Map, Value};

use crate::quiz::{AnswerLabel, Question};

pub const REQUIRED_KEYS: [&str; 8] = [
    "Question",
    "A",
    "B",
    "C",
    "D",
    "Answer",
    "Explanation",
    "Category",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    #[error("reply is not a valid JSON object ({reason}): {text}")]
    MalformedJson { reason: String, text: String },
    #[error("missing keys in the reply: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("invalid answer label {0:?}, must be A, B, C or D")]
    InvalidAnswerLabel(String),
    #[error("field {0} is empty")]
    EmptyField(&'static str),
}

/// Turns a model reply into a [`Question`].
///
/// The reply may be wrapped in a "```json" fence or a plain "```" fence, and in
/// one layer of quotes. No other cleanup is attempted.
pub fn parse_question(raw: &str) -> Result<Question, ParseFailure> {
    let text = strip_quotes(unfence(raw).trim());

    let object = match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => object,
        Ok(other) => {
            return Err(ParseFailure::MalformedJson {
                reason: format!("expected an object, got {}", json_kind(&other)),
                text: text.to_string(),
            })
        }
        Err(e) => {
            return Err(ParseFailure::MalformedJson {
                reason: e.to_string(),
                text: text.to_string(),
            })
        }
    };

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .filter(|key| string_field(&object, key).is_none())
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ParseFailure::MissingFields(missing));
    }

    let field = |key: &str| string_field(&object, key).unwrap_or_default().trim();

    let answer = field("Answer").to_uppercase();
    let correct = match answer.as_str() {
        "A" => AnswerLabel::A,
        "B" => AnswerLabel::B,
        "C" => AnswerLabel::C,
        "D" => AnswerLabel::D,
        _ => return Err(ParseFailure::InvalidAnswerLabel(answer)),
    };

    let question = field("Question");
    let explanation = field("Explanation");
    let category = field("Category");
    let option_texts = AnswerLabel::ALL.map(|label| field(label.as_str()));

    if question.is_empty() {
        return Err(ParseFailure::EmptyField("Question"));
    }
    for (label, text) in AnswerLabel::ALL.iter().zip(option_texts.iter()) {
        if text.is_empty() {
            return Err(ParseFailure::EmptyField(label.as_str()));
        }
    }
    if explanation.is_empty() {
        return Err(ParseFailure::EmptyField("Explanation"));
    }
    if category.is_empty() {
        return Err(ParseFailure::EmptyField("Category"));
    }

    let options: [String; 4] =
        std::array::from_fn(|i| format!("{}) {}", AnswerLabel::ALL[i], option_texts[i]));

    Ok(Question {
        text: question.to_string(),
        options,
        correct,
        explanation: explanation.to_string(),
        category: category.to_string(),
    })
}

/// Takes the body of the first "```json" fence, else of the first plain fence.
/// An unterminated fence runs to the end of the text.
fn unfence(raw: &str) -> &str {
    let body = if let Some((_, rest)) = raw.split_once("```json") {
        rest
    } else if let Some((_, rest)) = raw.split_once("```") {
        rest
    } else {
        return raw;
    };
    match body.split_once("```") {
        Some((inner, _)) => inner,
        None => body,
    }
}

fn strip_quotes(text: &str) -> &str {
    let text = text.strip_prefix('"').unwrap_or(text);
    let text = text.strip_suffix('"').unwrap_or(text);
    let text = text.strip_prefix('\'').unwrap_or(text);
    text.strip_suffix('\'').unwrap_or(text)
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"{
        "Question": "Which planet is known as the Red Planet?",
        "A": "Venus",
        "B": "Mars",
        "C": "Jupiter",
        "D": "Mercury",
        "Answer": "B",
        "Explanation": "Iron oxide on its surface makes Mars look red.",
        "Category": "Space"
    }"#;

    #[test]
    fn parses_clean_json() {
        let question = parse_question(CLEAN).unwrap();
        assert_eq!(question.text, "Which planet is known as the Red Planet?");
        assert_eq!(question.correct, AnswerLabel::B);
        assert_eq!(
            question.options,
            ["A) Venus", "B) Mars", "C) Jupiter", "D) Mercury"].map(String::from)
        );
        assert_eq!(question.category, "Space");
        assert_eq!(question.correct_option(), "B) Mars");
    }

    #[test]
    fn json_fence_parses_like_bare_object() {
        let fenced = format!("```json\n{CLEAN}\n```");
        assert_eq!(parse_question(&fenced), parse_question(CLEAN));

        let chatty = format!("Here is your question:\n```json\n{CLEAN}\n```\nEnjoy!");
        assert_eq!(parse_question(&chatty), parse_question(CLEAN));
    }

    #[test]
    fn plain_fence_and_quotes_are_stripped() {
        let fenced = format!("```\n{CLEAN}\n```");
        assert_eq!(parse_question(&fenced), parse_question(CLEAN));

        let quoted = format!("  \"{CLEAN}\"  ");
        assert_eq!(parse_question(&quoted), parse_question(CLEAN));
    }

    #[test]
    fn fields_are_trimmed_and_answer_upper_cased() {
        let raw = r#"{"Question": "  What is 2 + 2? ", "A": " 3", "B": "4 ", "C": "5", "D": "6",
            "Answer": " b ", "Explanation": " Simple. ", "Category": " Math "}"#;
        let question = parse_question(raw).unwrap();
        assert_eq!(question.text, "What is 2 + 2?");
        assert_eq!(question.options[0], "A) 3");
        assert_eq!(question.options[1], "B) 4");
        assert_eq!(question.correct, AnswerLabel::B);
        assert_eq!(question.explanation, "Simple.");
        assert_eq!(question.category, "Math");
    }

    #[test]
    fn rejects_answer_outside_a_to_d() {
        let raw = CLEAN.replace(r#""Answer": "B""#, r#""Answer": "E""#);
        assert_eq!(
            parse_question(&raw),
            Err(ParseFailure::InvalidAnswerLabel("E".to_string()))
        );
    }

    #[test]
    fn reports_exactly_the_missing_key() {
        let raw = r#"{"Question": "Q?", "A": "1", "B": "2", "C": "3", "D": "4",
            "Answer": "A", "Category": "Math"}"#;
        assert_eq!(
            parse_question(raw),
            Err(ParseFailure::MissingFields(vec!["Explanation".to_string()]))
        );
    }

    #[test]
    fn non_string_values_count_as_missing() {
        let raw = r#"{"Question": "Q?", "A": 1, "B": "2", "C": "3", "D": "4",
            "Answer": "A", "Explanation": "E", "Category": "Math"}"#;
        assert_eq!(
            parse_question(raw),
            Err(ParseFailure::MissingFields(vec!["A".to_string()]))
        );
    }

    #[test]
    fn malformed_json_keeps_the_text() {
        match parse_question("Sorry, I can't help with that.") {
            Err(ParseFailure::MalformedJson { text, .. }) => {
                assert_eq!(text, "Sorry, I can't help with that.")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            parse_question("[1, 2, 3]"),
            Err(ParseFailure::MalformedJson { .. })
        ));
    }

    #[test]
    fn rejects_blank_fields() {
        let raw = CLEAN.replace(r#""C": "Jupiter""#, r#""C": "   ""#);
        assert_eq!(parse_question(&raw), Err(ParseFailure::EmptyField("C")));

        let raw = CLEAN.replace(r#""Category": "Space""#, r#""Category": """#);
        assert_eq!(parse_question(&raw), Err(ParseFailure::EmptyField("Category")));
    }
}

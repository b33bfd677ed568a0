//! Recovers structured quiz questions from free-form model output.
//!
//! Stages run strictly in order and a later stage only runs when every
//! earlier one produced no usable `questions` array.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use adducation_core::model::QuizQuestion;

use crate::error::LlmError;

static QUESTIONS_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)\{.*?"questions".*?\}\s*\}"#).expect("valid regex")
});
static FIRST_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*?\}").expect("valid regex"));
static GREEDY_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
static NUMBERING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\s").expect("valid regex"));
static OPTION_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-D]\)\s*([^\n]+)").expect("valid regex"));
static CORRECT_ANSWER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)correct\s*answer[^A-D]*([A-D])").expect("valid regex")
});
static EXPLANATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)explanation[^\n]*:\s*([^\n]+)").expect("valid regex")
});

const NO_EXPLANATION: &str = "No explanation provided";

/// Which recovery stage produced the questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Direct,
    PatternMatch,
    BalancedBraces,
    ManualExtraction,
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParseStage::Direct => "direct",
            ParseStage::PatternMatch => "pattern-match",
            ParseStage::BalancedBraces => "balanced-braces",
            ParseStage::ManualExtraction => "manual-extraction",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuiz {
    pub stage: ParseStage,
    pub questions: Vec<QuizQuestion>,
}

/// Run the recovery chain over a model reply.
///
/// # Errors
///
/// Returns `LlmError::Unparseable` when no stage yields a question.
pub fn parse_quiz_questions(content: &str) -> Result<ParsedQuiz, LlmError> {
    let stages: [(ParseStage, fn(&str) -> Option<Vec<QuizQuestion>>); 4] = [
        (ParseStage::Direct, parse_direct),
        (ParseStage::PatternMatch, parse_pattern_match),
        (ParseStage::BalancedBraces, parse_balanced_braces),
        (ParseStage::ManualExtraction, parse_manual),
    ];

    for (stage, run) in stages {
        match run(content) {
            Some(questions) => {
                debug!(%stage, count = questions.len(), "quiz questions recovered");
                return Ok(ParsedQuiz { stage, questions });
            }
            None => debug!(%stage, "quiz parse stage found nothing"),
        }
    }

    Err(LlmError::Unparseable(
        "Failed to parse quiz questions from response".into(),
    ))
}

/// First `{` through the last `}` of `content`, if any.
#[must_use]
pub fn greedy_json_object(content: &str) -> Option<&str> {
    GREEDY_OBJECT.find(content).map(|m| m.as_str())
}

fn parse_direct(content: &str) -> Option<Vec<QuizQuestion>> {
    questions_from_json(content.trim())
}

fn parse_pattern_match(content: &str) -> Option<Vec<QuizQuestion>> {
    let candidate = QUESTIONS_OBJECT
        .find(content)
        .or_else(|| FIRST_OBJECT.find(content))?;
    questions_from_json(candidate.as_str())
}

fn parse_balanced_braces(content: &str) -> Option<Vec<QuizQuestion>> {
    questions_from_json(balanced_object(content)?)
}

/// Substring from the first `{` to the brace that closes it.
fn balanced_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let mut depth = 0usize;
    for (offset, ch) in content[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&content[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_manual(content: &str) -> Option<Vec<QuizQuestion>> {
    let questions: Vec<QuizQuestion> = NUMBERING
        .split(content)
        .filter(|block| !block.trim().is_empty())
        .filter_map(question_from_block)
        .collect();
    (!questions.is_empty()).then_some(questions)
}

fn question_from_block(block: &str) -> Option<QuizQuestion> {
    let question = block.lines().next()?.trim().to_string();
    if question.is_empty() {
        return None;
    }

    let options: Vec<String> = OPTION_LINE
        .captures_iter(block)
        .map(|caps| caps[1].trim().to_string())
        .collect();
    if options.len() < 2 {
        return None;
    }

    let correct_answer = CORRECT_ANSWER
        .captures(block)
        .and_then(|caps| caps[1].chars().next())
        .map(|letter| usize::from(letter.to_ascii_uppercase() as u8 - b'A'))
        .filter(|idx| *idx < options.len())
        .unwrap_or(0);

    let explanation = EXPLANATION
        .captures(block)
        .map(|caps| caps[1].trim().to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_EXPLANATION.to_string());

    Some(QuizQuestion {
        question,
        options,
        correct_answer,
        explanation,
    })
}

/// Usable entries of a `questions` array, or `None` when there are none.
fn questions_from_json(raw: &str) -> Option<Vec<QuizQuestion>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let entries = value.get("questions")?.as_array()?;
    let questions: Vec<QuizQuestion> = entries
        .iter()
        .filter_map(|entry| serde_json::from_value::<QuizQuestion>(entry.clone()).ok())
        .filter(QuizQuestion::is_usable)
        .collect();
    (!questions.is_empty()).then_some(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = r#"{"questions":[{"question":"What is Rust?","options":["A language","A fungus","A colour","A metal"],"correct_answer":0,"explanation":"It is a language"}]}"#;

    #[test]
    fn string_and_float_answers_are_kept() {
        let raw = r#"{"questions":[
            {"question":"Q1","options":["a","b"],"correctAnswer":"1","explanation":"e"},
            {"question":"Q2","options":["a","b","c"],"correct_answer":2.0,"explanation":"e"}
        ]}"#;
        let parsed = parse_quiz_questions(raw).unwrap();
        assert_eq!(parsed.stage, ParseStage::Direct);
        assert_eq!(parsed.questions.len(), 2);
        assert_eq!(parsed.questions[0].correct_answer, 1);
        assert_eq!(parsed.questions[1].correct_answer, 2);
    }

    #[test]
    fn clean_json_parses_directly() {
        let parsed = parse_quiz_questions(CLEAN).unwrap();
        assert_eq!(parsed.stage, ParseStage::Direct);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].correct_option(), Some("A language"));
    }

    #[test]
    fn prose_wrapped_json_is_recovered_by_balanced_braces() {
        let content = format!("Here are your questions:\n\n{CLEAN}\n\nGood luck with your studies!");
        let parsed = parse_quiz_questions(&content).unwrap();
        assert_eq!(parsed.stage, ParseStage::BalancedBraces);
        assert_eq!(parsed.questions, parse_direct(CLEAN).unwrap());
    }

    #[test]
    fn pattern_match_takes_object_closing_on_nested_brace() {
        let content = r#"Here: {"questions":[{"question":"Q","options":["a","b"],"correct_answer":1}],"meta":{"source":"model"}} Enjoy."#;
        let parsed = parse_quiz_questions(content).unwrap();
        assert_eq!(parsed.stage, ParseStage::PatternMatch);
        assert_eq!(parsed.questions[0].correct_answer, 1);
    }

    #[test]
    fn braces_inside_strings_still_balance() {
        let content = "Here you go: {\"questions\":[{\"question\":\"2+2?\",\"options\":[\"3\",\"4\"],\"correct_answer\":1,\"explanation\":\"{math}\"}]}";
        assert_eq!(parse_pattern_match(content), None);
        let parsed = parse_quiz_questions(content).unwrap();
        assert_eq!(parsed.stage, ParseStage::BalancedBraces);
    }

    #[test]
    fn unusable_entries_are_dropped() {
        let content = r#"{"questions":[{"question":"","options":["a","b"],"correct_answer":0},{"question":"Q","options":["a","b"],"correct_answer":5},{"question":"Ok","options":["a","b"],"correct_answer":1}]}"#;
        let parsed = parse_quiz_questions(content).unwrap();
        assert_eq!(parsed.stage, ParseStage::Direct);
        assert_eq!(parsed.questions.len(), 1);
        assert_eq!(parsed.questions[0].question, "Ok");
    }

    #[test]
    fn manual_extraction_reads_numbered_blocks() {
        let content = "Here is a quiz.\n\
            1. Which keyword declares an immutable binding?\n\
            A) let\n\
            B) mut\n\
            C) var\n\
            D) const\n\
            Correct answer: A\n\
            Explanation: let bindings are immutable by default\n\
            2. Which type owns heap text?\n\
            A) &str\n\
            B) String\n\
            Correct Answer - B\n";
        let parsed = parse_quiz_questions(content).unwrap();
        assert_eq!(parsed.stage, ParseStage::ManualExtraction);
        assert_eq!(parsed.questions.len(), 2);

        let first = &parsed.questions[0];
        assert_eq!(first.question, "Which keyword declares an immutable binding?");
        assert_eq!(first.options, vec!["let", "mut", "var", "const"]);
        assert_eq!(first.correct_answer, 0);
        assert_eq!(first.explanation, "let bindings are immutable by default");

        let second = &parsed.questions[1];
        assert_eq!(second.correct_answer, 1);
        assert_eq!(second.explanation, NO_EXPLANATION);
    }

    #[test]
    fn manual_blocks_need_two_options() {
        let content = "1. Lonely question\nA) only one\n";
        assert!(parse_manual(content).is_none());
    }

    #[test]
    fn empty_questions_array_falls_through_to_failure() {
        let err = parse_quiz_questions(r#"{"questions": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "Failed to parse quiz questions from response");
    }

    #[test]
    fn balanced_object_handles_nesting_and_unclosed_input() {
        assert_eq!(balanced_object("x {a {b} c} y}"), Some("{a {b} c}"));
        assert_eq!(balanced_object("x {a {b}"), None);
        assert_eq!(balanced_object("no braces"), None);
    }

    #[test]
    fn greedy_object_spans_first_to_last_brace() {
        assert_eq!(
            greedy_json_object("pre {\"a\": {\"b\": 1}} post"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(greedy_json_object("nothing here"), None);
    }
}

use serde::{Deserialize, Serialize};

use crate::model::question::Question;

/// Numeric answers within this distance of the expected value count as correct.
pub const NUMERIC_TOLERANCE: f64 = 0.1;

/// Outcome of comparing a candidate answer with the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerVerdict {
    Correct,
    Incorrect,
    /// The question carries no expected answer (e.g. a fallback placeholder).
    Ungraded,
}

impl AnswerVerdict {
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, AnswerVerdict::Correct)
    }

    #[must_use]
    pub fn is_incorrect(self) -> bool {
        matches!(self, AnswerVerdict::Incorrect)
    }
}

/// Grade `candidate` against the question's expected answer.
///
/// When both sides parse as numbers the candidate is correct iff
/// `|candidate - expected| < NUMERIC_TOLERANCE`. Otherwise both sides are
/// trimmed and compared exactly.
#[must_use]
pub fn check_answer(question: &Question, candidate: &str) -> AnswerVerdict {
    let Some(expected) = question.answer() else {
        return AnswerVerdict::Ungraded;
    };
    if answers_match(expected, candidate) {
        AnswerVerdict::Correct
    } else {
        AnswerVerdict::Incorrect
    }
}

fn answers_match(expected: &str, candidate: &str) -> bool {
    let expected = expected.trim();
    let candidate = candidate.trim();

    match (parse_number(expected), parse_number(candidate)) {
        (Some(e), Some(c)) => (c - e).abs() < NUMERIC_TOLERANCE,
        _ => expected == candidate,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuestionSource;

    fn question(answer: &str) -> Question {
        Question::new("q", Some(answer.to_owned()), None, QuestionSource::Generated).unwrap()
    }

    #[test]
    fn numeric_answers_use_tolerance() {
        let q = question("3.5");
        assert_eq!(check_answer(&q, "3.5"), AnswerVerdict::Correct);
        assert_eq!(check_answer(&q, "3.55"), AnswerVerdict::Correct);
        assert_eq!(check_answer(&q, " 3.45 "), AnswerVerdict::Correct);
        assert_eq!(check_answer(&q, "3.7"), AnswerVerdict::Incorrect);
        assert_eq!(check_answer(&q, "3"), AnswerVerdict::Incorrect);
    }

    #[test]
    fn numeric_tolerance_is_strict() {
        let q = question("10");
        assert_eq!(check_answer(&q, "10.25"), AnswerVerdict::Incorrect);
        assert_eq!(check_answer(&q, "9.75"), AnswerVerdict::Incorrect);
    }

    #[test]
    fn numeric_property_over_grid() {
        let expected = 7.0_f64;
        let q = question("7");
        for step in -40..=40 {
            let a = expected + f64::from(step) * 0.0125;
            let verdict = check_answer(&q, &a.to_string());
            assert_eq!(
                verdict.is_correct(),
                (a - expected).abs() < NUMERIC_TOLERANCE,
                "candidate {a}"
            );
        }
    }

    #[test]
    fn text_answers_need_exact_trimmed_match() {
        let q = question("Triangle");
        assert_eq!(check_answer(&q, "  Triangle "), AnswerVerdict::Correct);
        assert_eq!(check_answer(&q, "triangle"), AnswerVerdict::Incorrect);
        assert_eq!(check_answer(&q, "Triangles"), AnswerVerdict::Incorrect);
    }

    #[test]
    fn mixed_numeric_and_text_falls_back_to_exact() {
        let q = question("12 apples");
        assert_eq!(check_answer(&q, "12"), AnswerVerdict::Incorrect);
        assert_eq!(check_answer(&q, "12 apples"), AnswerVerdict::Correct);
    }

    #[test]
    fn fallback_questions_are_ungraded() {
        let q = Question::fallback("busy");
        assert_eq!(check_answer(&q, "anything"), AnswerVerdict::Ungraded);
    }
}

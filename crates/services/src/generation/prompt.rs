use std::fmt::Write as _;

use quiz_core::model::{Question, Subject, Topic};

pub(crate) const SYSTEM_PROMPT: &str = "You write practice questions for primary-school \
students. Reply with JSON only: an array of objects with the fields \"question\", \
\"answer\", optional \"options\" (array of strings), optional \"explanation\" and, for \
geometry, an optional \"shape\" object such as {\"type\":\"rectangle\",\"width\":3,\"height\":4}. \
Numeric answers must be plain numbers without units.";

/// Build the user prompt for a batch of questions.
///
/// The seed question, when present, is the template the model varies; the
/// topic supplies grade and unit context.
pub(crate) fn build_generation_prompt(
    subject: Subject,
    topic: Option<&Topic>,
    seed: Option<&Question>,
    count: u32,
) -> String {
    let mut prompt = format!("Write {count} new {subject} practice question(s)");

    if let Some(topic) = topic {
        let _ = write!(
            prompt,
            " for grade {} students, unit \"{}\", topic \"{}\"",
            topic.grade, topic.unit, topic.name
        );
        if let Some(description) = topic.description.as_deref() {
            let _ = write!(prompt, " ({description})");
        }
    }
    prompt.push('.');

    if let Some(seed) = seed {
        let _ = write!(
            prompt,
            "\nUse this question as a template and change the numbers or wording:\n{}",
            seed.text()
        );
        if let Some(answer) = seed.answer() {
            let _ = write!(prompt, "\nTemplate answer: {answer}");
        }
        if let Some(options) = seed.options() {
            let _ = write!(prompt, "\nTemplate options: {}", options.join(" | "));
            prompt.push_str("\nKeep the multiple-choice format.");
        }
        if let Some(shape) = seed.shape() {
            let _ = write!(prompt, "\nThe template uses a {} shape.", shape.kind);
        }
    }

    prompt.push_str("\nReturn exactly the JSON array, no prose.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{QuestionSource, TopicDraft, TopicId};
    use quiz_core::time::fixed_now;

    #[test]
    fn prompt_mentions_topic_and_seed() {
        let topic = TopicDraft {
            subject: Subject::Math,
            grade: 3,
            unit: "Unit 4".into(),
            name: "Multiplication".into(),
            description: None,
        }
        .validate(fixed_now())
        .unwrap()
        .assign_id(TopicId::new(1));
        let seed = Question::new(
            "3 x 4 = ?",
            Some("12".into()),
            Some(vec!["7".into(), "12".into()]),
            QuestionSource::Seed,
        )
        .unwrap();

        let prompt = build_generation_prompt(Subject::Math, Some(&topic), Some(&seed), 3);
        assert!(prompt.starts_with("Write 3 new math"));
        assert!(prompt.contains("grade 3"));
        assert!(prompt.contains("3 x 4 = ?"));
        assert!(prompt.contains("7 | 12"));
    }

    #[test]
    fn prompt_without_context_is_still_usable() {
        let prompt = build_generation_prompt(Subject::English, None, None, 1);
        assert!(prompt.contains("english"));
        assert!(prompt.ends_with("no prose."));
    }
}

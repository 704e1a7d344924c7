//! Starter curriculum for a fresh database.

use quiz_core::model::{Subject, TopicDraft};
use services::{SeedQuestionDraft, TopicService, TopicServiceError};

struct StarterTopic {
    subject: Subject,
    grade: u8,
    unit: &'static str,
    name: &'static str,
    seeds: &'static [(&'static str, &'static str)],
}

const STARTER_TOPICS: &[StarterTopic] = &[
    StarterTopic {
        subject: Subject::Math,
        grade: 2,
        unit: "Numbers and operations",
        name: "Addition within 100",
        seeds: &[
            ("Tom has 23 stickers and gets 15 more. How many stickers does he have?", "38"),
            ("What is 47 + 36?", "83"),
        ],
    },
    StarterTopic {
        subject: Subject::Math,
        grade: 4,
        unit: "Measurement",
        name: "Area of rectangles",
        seeds: &[(
            "A rectangle is 6 cm wide and 4 cm tall. What is its area in square centimeters?",
            "24",
        )],
    },
    StarterTopic {
        subject: Subject::Math,
        grade: 5,
        unit: "Decimals",
        name: "Dividing with decimals",
        seeds: &[("Share 7.5 liters of juice equally among 3 cups. How many liters per cup?", "2.5")],
    },
    StarterTopic {
        subject: Subject::English,
        grade: 3,
        unit: "Grammar",
        name: "Past tense verbs",
        seeds: &[("What is the past tense of \"run\"?", "ran")],
    },
    StarterTopic {
        subject: Subject::Chinese,
        grade: 2,
        unit: "Characters",
        name: "Common characters",
        seeds: &[("\"大\" 的反义词是什么?", "小")],
    },
    StarterTopic {
        subject: Subject::Science,
        grade: 3,
        unit: "Living things",
        name: "Plants",
        seeds: &[("What gas do plants take in from the air to make food?", "carbon dioxide")],
    },
];

/// Insert the starter topics unless any topic already exists. Returns the
/// number of topics created.
///
/// # Errors
///
/// Returns `TopicServiceError` if a topic or seed cannot be stored.
pub async fn seed_curriculum(topics: &TopicService) -> Result<usize, TopicServiceError> {
    if !topics.list(None).await?.is_empty() {
        tracing::info!("topics already present, skipping seed");
        return Ok(0);
    }

    for starter in STARTER_TOPICS {
        let topic = topics
            .create(TopicDraft {
                subject: starter.subject,
                grade: starter.grade,
                unit: starter.unit.to_owned(),
                name: starter.name.to_owned(),
                description: None,
            })
            .await?;
        for (text, answer) in starter.seeds {
            topics
                .add_seed(
                    topic.id,
                    SeedQuestionDraft {
                        text: (*text).to_owned(),
                        answer: Some((*answer).to_owned()),
                        options: None,
                        explanation: None,
                        shape: None,
                    },
                )
                .await?;
        }
    }

    tracing::info!(count = STARTER_TOPICS.len(), "starter curriculum seeded");
    Ok(STARTER_TOPICS.len())
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quiz_core::model::{
    AbilityScore, DailyTask, MistakeId, MistakeRecord, NewMistake, Question, SeedQuestion,
    SeedQuestionId, Subject, Subscription, Topic, TopicId, UsageEvent, UsageKind, UserId,
    ValidatedTopic,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Curriculum topics (subject / grade / unit).
#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Persist a new topic and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the topic cannot be stored.
    async fn insert_topic(&self, topic: ValidatedTopic) -> Result<Topic, StorageError>;

    /// Fetch a topic by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// List topics ordered by subject, grade and id, optionally for one subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_topics(&self, subject: Option<Subject>) -> Result<Vec<Topic>, StorageError>;

    /// Overwrite an existing topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError>;

    /// Delete a topic together with its seed questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError>;
}

/// Template questions attached to topics.
#[async_trait]
pub trait SeedQuestionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn insert_seed(
        &self,
        topic_id: TopicId,
        question: &Question,
    ) -> Result<SeedQuestion, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn seeds_for_topics(
        &self,
        topic_ids: &[TopicId],
    ) -> Result<Vec<SeedQuestion>, StorageError>;
}

/// Per-user mistake book.
#[async_trait]
pub trait MistakeRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn append_mistake(&self, mistake: NewMistake) -> Result<MistakeRecord, StorageError>;

    /// Most recent mistakes first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_mistakes(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<MistakeRecord>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_mistakes(&self, user_id: &UserId) -> Result<u32, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no such mistake.
    async fn delete_mistake(&self, user_id: &UserId, id: MistakeId) -> Result<(), StorageError>;
}

/// Append-only usage telemetry.
#[async_trait]
pub trait UsageLogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the event cannot be stored.
    async fn append_usage(&self, event: &UsageEvent) -> Result<i64, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn count_since(
        &self,
        user_id: &UserId,
        kind: UsageKind,
        since: DateTime<Utc>,
    ) -> Result<u32, StorageError>;
}

/// Per-subject ability scores.
#[async_trait]
pub trait AbilityRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_ability(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<Option<AbilityScore>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the score cannot be stored.
    async fn upsert_ability(&self, score: &AbilityScore) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_abilities(&self, user_id: &UserId) -> Result<Vec<AbilityScore>, StorageError>;
}

/// Daily quota counters, one row per user and subject.
#[async_trait]
pub trait DailyTaskRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_task(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<Option<DailyTask>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the task cannot be stored.
    async fn save_task(&self, task: &DailyTask) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_tasks(&self, user_id: &UserId) -> Result<Vec<DailyTask>, StorageError>;
}

/// Billing state mirrored from the payment provider.
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn find_by_provider_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the subscription cannot be stored.
    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StorageError>;
}

//
// ─── IN-MEMORY ADAPTER ─────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    topics: BTreeMap<TopicId, Topic>,
    seeds: BTreeMap<SeedQuestionId, SeedQuestion>,
    mistakes: BTreeMap<MistakeId, MistakeRecord>,
    usage: Vec<UsageEvent>,
    abilities: HashMap<(UserId, Subject), AbilityScore>,
    tasks: HashMap<(UserId, Subject), DailyTask>,
    subscriptions: HashMap<UserId, Subscription>,
    next_topic_id: u64,
    next_seed_id: u64,
    next_mistake_id: u64,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn insert_topic(&self, topic: ValidatedTopic) -> Result<Topic, StorageError> {
        let mut guard = self.lock()?;
        guard.next_topic_id += 1;
        let topic = topic.assign_id(TopicId::new(guard.next_topic_id));
        guard.topics.insert(topic.id, topic.clone());
        Ok(topic)
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        Ok(self.lock()?.topics.get(&id).cloned())
    }

    async fn list_topics(&self, subject: Option<Subject>) -> Result<Vec<Topic>, StorageError> {
        let guard = self.lock()?;
        let mut topics: Vec<Topic> = guard
            .topics
            .values()
            .filter(|t| subject.is_none_or(|s| t.subject == s))
            .cloned()
            .collect();
        topics.sort_by_key(|t| (t.subject, t.grade, t.id));
        Ok(topics)
    }

    async fn update_topic(&self, topic: &Topic) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let slot = guard.topics.get_mut(&topic.id).ok_or(StorageError::NotFound)?;
        *slot = topic.clone();
        Ok(())
    }

    async fn delete_topic(&self, id: TopicId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.topics.remove(&id).ok_or(StorageError::NotFound)?;
        guard.seeds.retain(|_, seed| seed.topic_id != id);
        Ok(())
    }
}

#[async_trait]
impl SeedQuestionRepository for InMemoryRepository {
    async fn insert_seed(
        &self,
        topic_id: TopicId,
        question: &Question,
    ) -> Result<SeedQuestion, StorageError> {
        let mut guard = self.lock()?;
        if !guard.topics.contains_key(&topic_id) {
            return Err(StorageError::NotFound);
        }
        guard.next_seed_id += 1;
        let seed = SeedQuestion {
            id: SeedQuestionId::new(guard.next_seed_id),
            topic_id,
            question: question.clone(),
        };
        guard.seeds.insert(seed.id, seed.clone());
        Ok(seed)
    }

    async fn seeds_for_topics(
        &self,
        topic_ids: &[TopicId],
    ) -> Result<Vec<SeedQuestion>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .seeds
            .values()
            .filter(|seed| topic_ids.contains(&seed.topic_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MistakeRepository for InMemoryRepository {
    async fn append_mistake(&self, mistake: NewMistake) -> Result<MistakeRecord, StorageError> {
        let mut guard = self.lock()?;
        guard.next_mistake_id += 1;
        let record = mistake.assign_id(MistakeId::new(guard.next_mistake_id));
        guard.mistakes.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_mistakes(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<MistakeRecord>, StorageError> {
        let guard = self.lock()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(guard
            .mistakes
            .values()
            .rev()
            .filter(|m| &m.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_mistakes(&self, user_id: &UserId) -> Result<u32, StorageError> {
        let guard = self.lock()?;
        let count = guard
            .mistakes
            .values()
            .filter(|m| &m.user_id == user_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn delete_mistake(&self, user_id: &UserId, id: MistakeId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        match guard.mistakes.get(&id) {
            Some(record) if &record.user_id == user_id => {
                guard.mistakes.remove(&id);
                Ok(())
            }
            _ => Err(StorageError::NotFound),
        }
    }
}

#[async_trait]
impl UsageLogRepository for InMemoryRepository {
    async fn append_usage(&self, event: &UsageEvent) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        guard.usage.push(event.clone());
        Ok(i64::try_from(guard.usage.len()).unwrap_or(i64::MAX))
    }

    async fn count_since(
        &self,
        user_id: &UserId,
        kind: UsageKind,
        since: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let guard = self.lock()?;
        let count = guard
            .usage
            .iter()
            .filter(|e| &e.user_id == user_id && e.kind == kind && e.created_at >= since)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl AbilityRepository for InMemoryRepository {
    async fn get_ability(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<Option<AbilityScore>, StorageError> {
        Ok(self
            .lock()?
            .abilities
            .get(&(user_id.clone(), subject))
            .cloned())
    }

    async fn upsert_ability(&self, score: &AbilityScore) -> Result<(), StorageError> {
        self.lock()?
            .abilities
            .insert((score.user_id.clone(), score.subject), score.clone());
        Ok(())
    }

    async fn list_abilities(&self, user_id: &UserId) -> Result<Vec<AbilityScore>, StorageError> {
        let guard = self.lock()?;
        let mut scores: Vec<AbilityScore> = guard
            .abilities
            .values()
            .filter(|a| &a.user_id == user_id)
            .cloned()
            .collect();
        scores.sort_by_key(|a| a.subject);
        Ok(scores)
    }
}

#[async_trait]
impl DailyTaskRepository for InMemoryRepository {
    async fn get_task(
        &self,
        user_id: &UserId,
        subject: Subject,
    ) -> Result<Option<DailyTask>, StorageError> {
        Ok(self.lock()?.tasks.get(&(user_id.clone(), subject)).cloned())
    }

    async fn save_task(&self, task: &DailyTask) -> Result<(), StorageError> {
        self.lock()?
            .tasks
            .insert((task.user_id.clone(), task.subject), task.clone());
        Ok(())
    }

    async fn list_tasks(&self, user_id: &UserId) -> Result<Vec<DailyTask>, StorageError> {
        let guard = self.lock()?;
        let mut tasks: Vec<DailyTask> = guard
            .tasks
            .values()
            .filter(|t| &t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.subject);
        Ok(tasks)
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryRepository {
    async fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Subscription>, StorageError> {
        Ok(self.lock()?.subscriptions.get(user_id).cloned())
    }

    async fn find_by_provider_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .subscriptions
            .values()
            .find(|s| s.provider_subscription_id.as_deref() == Some(provider_subscription_id))
            .cloned())
    }

    async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), StorageError> {
        self.lock()?
            .subscriptions
            .insert(subscription.user_id.clone(), subscription.clone());
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub topics: Arc<dyn TopicRepository>,
    pub seeds: Arc<dyn SeedQuestionRepository>,
    pub mistakes: Arc<dyn MistakeRepository>,
    pub usage: Arc<dyn UsageLogRepository>,
    pub abilities: Arc<dyn AbilityRepository>,
    pub daily_tasks: Arc<dyn DailyTaskRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }

    /// Wire every repository slot to one backend.
    pub fn from_backend<R>(repo: R) -> Self
    where
        R: TopicRepository
            + SeedQuestionRepository
            + MistakeRepository
            + UsageLogRepository
            + AbilityRepository
            + DailyTaskRepository
            + SubscriptionRepository
            + Clone
            + 'static,
    {
        Self {
            topics: Arc::new(repo.clone()),
            seeds: Arc::new(repo.clone()),
            mistakes: Arc::new(repo.clone()),
            usage: Arc::new(repo.clone()),
            abilities: Arc::new(repo.clone()),
            daily_tasks: Arc::new(repo.clone()),
            subscriptions: Arc::new(repo),
        }
    }
}

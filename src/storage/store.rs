use std::collections::HashMap;
use std::sync::Mutex;

use indexmap::IndexMap;
use teloxide::types::{ChatId, UserId};
use thiserror::Error;

use super::test::Test;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("test '{0}' already exists")]
    DuplicateTest(String),
    #[error("test '{0}' not found or not owned by the requester")]
    NotOwned(String),
}

/// Process-wide in-memory state: the test repository, the score ledger and
/// the per-chat authentication cache. Everything is lost on restart.
///
/// Handlers for different chats may run concurrently, so each map sits
/// behind its own mutex; critical sections never await.
#[derive(Debug, Default)]
pub struct Storage {
    tests: Mutex<IndexMap<String, Test>>,
    scores: Mutex<IndexMap<String, IndexMap<String, u32>>>,
    roles: Mutex<HashMap<ChatId, String>>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tests(&self) -> std::sync::MutexGuard<'_, IndexMap<String, Test>> {
        self.tests.lock().expect("test repository mutex poisoned")
    }

    fn scores(&self) -> std::sync::MutexGuard<'_, IndexMap<String, IndexMap<String, u32>>> {
        self.scores.lock().expect("score ledger mutex poisoned")
    }

    fn roles(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, String>> {
        self.roles.lock().expect("auth cache mutex poisoned")
    }
}

pub(crate) trait CreateTest {
    async fn create_test(&self, test: Test) -> Result<String, StoreError>;
}

pub(crate) trait RetreiveTest {
    async fn retreive_test(&self, name: &str) -> Option<Test>;

    async fn test_exists(&self, name: &str) -> bool;

    /// Every test name paired with its question count, in creation order.
    async fn retreive_test_overview(&self) -> Vec<(String, usize)>;

    async fn tests_by_creator(&self, creator: UserId) -> Vec<String>;
}

pub(crate) trait DeleteTest {
    async fn delete_test(&self, name: &str, requester: UserId) -> Result<String, StoreError>;
}

pub(crate) trait RecordScore {
    async fn record_score(&self, user: &str, test_name: &str, score: u32);
}

pub(crate) trait RetreiveScores {
    async fn scores_for(&self, user: &str) -> Option<Vec<(String, u32)>>;

    /// Total score per user, best first. Ties keep ledger insertion order.
    async fn rankings(&self) -> Vec<(String, u32)>;
}

pub(crate) trait AuthCache {
    async fn role(&self, chat: ChatId) -> Option<String>;

    async fn set_role(&self, chat: ChatId, role: String);
}

impl CreateTest for Storage {
    async fn create_test(&self, test: Test) -> Result<String, StoreError> {
        let mut tests = self.tests();
        if tests.contains_key(test.name()) {
            return Err(StoreError::DuplicateTest(test.name().clone()));
        }

        let name = test.name().clone();
        log::debug!("Adding test '{}' to the repository", name);
        tests.insert(name.clone(), test);

        Ok(name)
    }
}

impl RetreiveTest for Storage {
    async fn retreive_test(&self, name: &str) -> Option<Test> {
        self.tests().get(name).cloned()
    }

    async fn test_exists(&self, name: &str) -> bool {
        self.tests().contains_key(name)
    }

    async fn retreive_test_overview(&self) -> Vec<(String, usize)> {
        self.tests()
            .iter()
            .map(|(name, test)| (name.clone(), test.questions().len()))
            .collect()
    }

    async fn tests_by_creator(&self, creator: UserId) -> Vec<String> {
        self.tests()
            .iter()
            .filter(|(_, test)| test.creator() == creator)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl DeleteTest for Storage {
    async fn delete_test(&self, name: &str, requester: UserId) -> Result<String, StoreError> {
        let mut tests = self.tests();
        match tests.get(name) {
            Some(test) if test.creator() == requester => {
                tests.shift_remove(name);
                Ok(name.to_owned())
            }
            _ => Err(StoreError::NotOwned(name.to_owned())),
        }
    }
}

impl RecordScore for Storage {
    async fn record_score(&self, user: &str, test_name: &str, score: u32) {
        // Retaking a test overwrites the previous score, last write wins.
        self.scores()
            .entry(user.to_owned())
            .or_default()
            .insert(test_name.to_owned(), score);
    }
}

impl RetreiveScores for Storage {
    async fn scores_for(&self, user: &str) -> Option<Vec<(String, u32)>> {
        self.scores()
            .get(user)
            .map(|entries| entries.iter().map(|(name, score)| (name.clone(), *score)).collect())
    }

    async fn rankings(&self) -> Vec<(String, u32)> {
        let mut totals: Vec<(String, u32)> = self
            .scores()
            .iter()
            .map(|(user, entries)| (user.clone(), entries.values().sum()))
            .collect();

        // Stable sort: tied totals stay in ledger insertion order.
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        totals
    }
}

impl AuthCache for Storage {
    async fn role(&self, chat: ChatId) -> Option<String> {
        self.roles().get(&chat).cloned()
    }

    async fn set_role(&self, chat: ChatId, role: String) {
        self.roles().insert(chat, role);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test::Question;

    fn test_named(name: &str, creator: u64) -> Test {
        let question = Question::new("2+2?".into(), vec!["3".into(), "4".into()], 1).unwrap();
        Test::new(name.into(), Some(5), vec![question], UserId(creator))
    }

    #[tokio::test]
    async fn duplicate_test_names_are_rejected() {
        let storage = Storage::new();
        storage.create_test(test_named("Math", 1)).await.unwrap();

        let err = storage.create_test(test_named("Math", 2)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTest(name) if name == "Math"));

        // The first copy is untouched.
        let kept = storage.retreive_test("Math").await.unwrap();
        assert_eq!(kept.creator(), UserId(1));
        assert_eq!(storage.retreive_test_overview().await.len(), 1);
    }

    #[tokio::test]
    async fn only_the_creator_can_delete_a_test() {
        let storage = Storage::new();
        storage.create_test(test_named("Math", 1)).await.unwrap();

        let err = storage.delete_test("Math", UserId(2)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotOwned(_)));
        assert!(storage.test_exists("Math").await);

        storage.delete_test("Math", UserId(1)).await.unwrap();
        assert!(!storage.test_exists("Math").await);
    }

    #[tokio::test]
    async fn deleting_an_unknown_test_reports_not_owned() {
        let storage = Storage::new();
        let err = storage.delete_test("ghost", UserId(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotOwned(_)));
    }

    #[tokio::test]
    async fn tests_by_creator_filters_the_repository() {
        let storage = Storage::new();
        storage.create_test(test_named("Math", 1)).await.unwrap();
        storage.create_test(test_named("History", 2)).await.unwrap();
        storage.create_test(test_named("Physics", 1)).await.unwrap();

        assert_eq!(
            storage.tests_by_creator(UserId(1)).await,
            vec!["Math".to_owned(), "Physics".to_owned()]
        );
        assert!(storage.tests_by_creator(UserId(3)).await.is_empty());
    }

    #[tokio::test]
    async fn retaking_a_test_overwrites_the_score() {
        let storage = Storage::new();
        storage.record_score("Alice", "Math", 1).await;
        storage.record_score("Alice", "Math", 3).await;

        assert_eq!(
            storage.scores_for("Alice").await,
            Some(vec![("Math".to_owned(), 3)])
        );
    }

    #[tokio::test]
    async fn rankings_sum_scores_and_sort_descending() {
        let storage = Storage::new();
        storage.record_score("A", "t1", 5).await;
        storage.record_score("A", "t2", 3).await;
        storage.record_score("B", "t1", 10).await;

        assert_eq!(
            storage.rankings().await,
            vec![("B".to_owned(), 10), ("A".to_owned(), 8)]
        );
    }

    #[tokio::test]
    async fn ranking_ties_keep_insertion_order() {
        let storage = Storage::new();
        storage.record_score("first", "t1", 4).await;
        storage.record_score("second", "t1", 4).await;

        assert_eq!(
            storage.rankings().await,
            vec![("first".to_owned(), 4), ("second".to_owned(), 4)]
        );
    }

    #[tokio::test]
    async fn ranking_queries_do_not_mutate_the_ledger() {
        let storage = Storage::new();
        storage.record_score("A", "t1", 2).await;

        let before = storage.scores_for("A").await;
        let _ = storage.rankings().await;
        let _ = storage.scores_for("A").await;
        assert_eq!(storage.scores_for("A").await, before);
        assert!(storage.scores_for("nobody").await.is_none());
    }

    /// /create "Math" -> "5" -> "2+2?" -> "3,4" -> pick index 1 -> finish,
    /// then a taker answers "4" on the only question.
    #[tokio::test]
    async fn authored_test_round_trips_into_a_score() {
        use crate::constructor::parse_answers;
        use crate::state::TestDraft;

        let storage = Storage::new();
        let mut draft = TestDraft::new("Math".into(), UserId(1));
        draft.time_limit_minutes = Some(5);
        draft
            .questions
            .push(Question::new("2+2?".into(), parse_answers("3,4"), 1).unwrap());
        storage.create_test(draft.publish()).await.unwrap();

        let test = storage.retreive_test("Math").await.unwrap();
        assert_eq!(test.time_limit_minutes(), Some(5));
        assert_eq!(test.questions()[0].correct_answer(), "4");

        let correct = u32::from(test.questions()[0].is_correct(1));
        storage.record_score("Taker", test.name(), correct).await;
        assert_eq!(
            storage.scores_for("Taker").await,
            Some(vec![("Math".to_owned(), 1)])
        );
    }

    #[tokio::test]
    async fn auth_cache_tracks_roles_per_chat() {
        let storage = Storage::new();
        assert_eq!(storage.role(ChatId(7)).await, None);

        storage.set_role(ChatId(7), "admin".into()).await;
        assert_eq!(storage.role(ChatId(7)).await, Some("admin".to_owned()));
        assert_eq!(storage.role(ChatId(8)).await, None);
    }
}

use std::time::{Duration, Instant};

use teloxide::types::UserId;

use crate::storage::test::{Question, Test};

/// Accumulating form of a test while its authoring dialogue is still
/// running. Lives inside the dialogue state only; the repository sees the
/// test no earlier than publication.
#[derive(Debug, Clone)]
pub struct TestDraft {
    pub(crate) name: String,
    pub(crate) creator: UserId,
    pub(crate) time_limit_minutes: Option<u32>,
    pub(crate) questions: Vec<Question>,
}

impl TestDraft {
    pub(crate) fn new(name: String, creator: UserId) -> Self {
        Self {
            name,
            creator,
            time_limit_minutes: None,
            questions: Vec::default(),
        }
    }

    pub(crate) fn publish(self) -> Test {
        Test::new(
            self.name,
            self.time_limit_minutes,
            self.questions,
            self.creator,
        )
    }
}

/// Wall-clock anchor for a running test. The limit is advisory: remaining
/// time is displayed after every answer but never enforced as a cutoff.
#[derive(Debug, Clone)]
pub struct TestTimer {
    started_at: Instant,
    limit: Duration,
}

impl TestTimer {
    pub(crate) fn start(limit_minutes: u32) -> Self {
        Self {
            started_at: Instant::now(),
            limit: Duration::from_secs(u64::from(limit_minutes) * 60),
        }
    }

    pub(crate) fn allotted(&self) -> Duration {
        self.limit
    }

    /// Saturates at zero once the limit has passed.
    pub(crate) fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.started_at.elapsed())
    }
}

#[derive(Debug, Clone, Default)]
pub enum TestState {
    #[default]
    Idle,

    // PART FOR --- CREATING A TEST ---
    ReceiveTestName,
    ReceiveTimeLimit {
        draft: TestDraft,
    },
    ReceiveQuestionText {
        draft: TestDraft,
    },
    ReceiveAnswers {
        draft: TestDraft,
        question_text: String,
    },
    ReceiveCorrectAnswer {
        draft: TestDraft,
        question_text: String,
        answers: Vec<String>,
    },
    ReceiveNextAction {
        draft: TestDraft,
    },

    // PART FOR --- TAKING A TEST ---
    SelectTest,
    Running {
        test: Test,
        curr_idx: usize,
        correct: u32,
        timer: Option<TestTimer>,
    },

    // PART FOR --- LOGGING IN ---
    ReceiveEmail,
    ReceivePassword {
        email: String,
    },

    // PART FOR --- DELETING A TEST ---
    ConfirmDelete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_publishes_into_a_test() {
        let mut draft = TestDraft::new("Math".into(), UserId(42));
        draft.time_limit_minutes = Some(5);
        draft
            .questions
            .push(Question::new("2+2?".into(), vec!["3".into(), "4".into()], 1).unwrap());

        let test = draft.publish();
        assert_eq!(test.name(), "Math");
        assert_eq!(test.time_limit_minutes(), Some(5));
        assert_eq!(test.creator(), UserId(42));
        assert_eq!(test.questions().len(), 1);
        assert_eq!(test.questions()[0].correct_answer(), "4");
    }

    #[test]
    fn timer_reports_the_allotted_duration() {
        let timer = TestTimer::start(5);
        assert_eq!(timer.allotted(), Duration::from_secs(300));
        // Freshly started, so nearly all of the limit remains.
        assert!(timer.remaining() <= Duration::from_secs(300));
        assert!(timer.remaining() > Duration::from_secs(299));
    }

    #[test]
    fn expired_timer_saturates_at_zero() {
        let timer = TestTimer {
            started_at: Instant::now() - Duration::from_secs(120),
            limit: Duration::from_secs(60),
        };
        assert_eq!(timer.remaining(), Duration::ZERO);
    }
}

use teloxide::types::UserId;

#[derive(Debug, Clone)]
pub struct Test {
    name: String,
    time_limit_minutes: Option<u32>,
    questions: Vec<Question>,
    creator: UserId,
}

#[derive(Debug, Clone)]
pub struct Question {
    text: String,
    answers: Vec<String>,
    correct_answer: String,
}

impl Test {
    pub fn new(
        name: String,
        time_limit_minutes: Option<u32>,
        questions: Vec<Question>,
        creator: UserId,
    ) -> Self {
        Self {
            name,
            time_limit_minutes,
            questions,
            creator,
        }
    }

    pub fn name(&self) -> &String {
        &self.name
    }

    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn creator(&self) -> UserId {
        self.creator
    }
}

impl Question {
    /// Builds a question whose correct answer is `answers[correct_index]`.
    /// Returns `None` when the index does not point into `answers`.
    pub fn new(text: String, answers: Vec<String>, correct_index: usize) -> Option<Self> {
        let correct_answer = answers.get(correct_index)?.clone();
        Some(Self {
            text,
            answers,
            correct_answer,
        })
    }

    pub fn text(&self) -> String {
        self.text.clone()
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    /// An answer is identified by its index in the keyboard, so questions
    /// with duplicate answer texts stay unambiguous.
    pub fn is_correct(&self, answer_index: usize) -> bool {
        self.answers
            .get(answer_index)
            .map(|answer| *answer == self.correct_answer)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_rejects_out_of_range_correct_index() {
        assert!(Question::new("2+2?".into(), vec!["3".into(), "4".into()], 2).is_none());
    }

    #[test]
    fn question_checks_answers_by_index() {
        let question = Question::new("2+2?".into(), vec!["3".into(), "4".into()], 1).unwrap();

        assert_eq!(question.correct_answer(), "4");
        assert!(question.is_correct(1));
        assert!(!question.is_correct(0));
        assert!(!question.is_correct(17));
    }

    #[test]
    fn duplicate_answer_texts_are_distinguished_by_index() {
        let question = Question::new(
            "pick the second 'same'".into(),
            vec!["same".into(), "same".into()],
            1,
        )
        .unwrap();

        // Both indices carry the same text, so both compare equal to the
        // stored correct answer.
        assert!(question.is_correct(0));
        assert!(question.is_correct(1));
    }
}

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

pub(crate) const TEST_PREFIX: &str = "test_";
pub(crate) const ANSWER_PREFIX: &str = "answer_";
pub(crate) const CORRECT_PREFIX: &str = "correct_";
pub(crate) const ADD_QUESTION: &str = "add_question";
pub(crate) const FINISH_CREATION: &str = "finish_creation";

/// One button per test, labelled with its question count. Callback data
/// carries the test name.
pub(crate) fn tests_keyboard(tests: &[(String, usize)]) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = tests
        .iter()
        .map(|(name, questions)| {
            vec![InlineKeyboardButton::callback(
                format!("{} ({} questions)", name, questions),
                format!("{}{}", TEST_PREFIX, name),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

/// Answer buttons carry the answer index, not its text, so duplicate answer
/// texts in one question cannot collide.
pub(crate) fn answers_keyboard(answers: &[String]) -> InlineKeyboardMarkup {
    indexed_keyboard(answers, ANSWER_PREFIX)
}

pub(crate) fn correct_answer_keyboard(answers: &[String]) -> InlineKeyboardMarkup {
    indexed_keyboard(answers, CORRECT_PREFIX)
}

pub(crate) fn next_action_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            "Add another question",
            ADD_QUESTION,
        )],
        vec![InlineKeyboardButton::callback(
            "Finish test creation",
            FINISH_CREATION,
        )],
    ])
}

fn indexed_keyboard(labels: &[String], prefix: &str) -> InlineKeyboardMarkup {
    let keyboard: Vec<Vec<InlineKeyboardButton>> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            vec![InlineKeyboardButton::callback(
                label,
                format!("{}{}", prefix, i),
            )]
        })
        .collect();

    InlineKeyboardMarkup::new(keyboard)
}

/// Parses an `{prefix}{index}` callback payload built by the keyboards
/// above. Forged or stale payloads yield `None`.
pub(crate) fn callback_index(data: &str, prefix: &str) -> Option<usize> {
    data.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_buttons_carry_indices() {
        let markup = answers_keyboard(&["3".into(), "4".into()]);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[0][0].text, "3");
        assert_eq!(markup.inline_keyboard[1][0].text, "4");
    }

    #[test]
    fn callback_index_round_trips() {
        assert_eq!(callback_index("answer_0", ANSWER_PREFIX), Some(0));
        assert_eq!(callback_index("correct_12", CORRECT_PREFIX), Some(12));
    }

    #[test]
    fn callback_index_rejects_forged_payloads() {
        assert_eq!(callback_index("answer_", ANSWER_PREFIX), None);
        assert_eq!(callback_index("answer_x", ANSWER_PREFIX), None);
        assert_eq!(callback_index("correct_1", ANSWER_PREFIX), None);
        assert_eq!(callback_index("finish_creation", CORRECT_PREFIX), None);
    }
}

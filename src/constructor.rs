use std::sync::Arc;

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{CallbackQuery, Message},
    Bot,
};
use tracing::instrument;

use crate::keyboard::{
    callback_index, correct_answer_keyboard, next_action_keyboard, ADD_QUESTION, CORRECT_PREFIX,
    FINISH_CREATION,
};
use crate::state::{TestDraft, TestState};
use crate::storage::store::{CreateTest, RetreiveTest, StoreError};
use crate::storage::test::Question;
use crate::{HandlerResult, UserDialogue};

pub(crate) async fn create(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Enter a name for the new test:")
        .await?;
    dialogue.update(TestState::ReceiveTestName).await?;
    Ok(())
}

#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn receive_test_name<S: RetreiveTest>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    match msg.text().map(str::trim) {
        Some(name) if !name.is_empty() => {
            if storage.test_exists(name).await {
                bot.send_message(
                    msg.chat.id,
                    format!(
                        "Test \"{}\" already exists. Please enter another name:",
                        name
                    ),
                )
                .await?;
                return Ok(());
            }

            log::info!("{} starts creating test '{}'", user.first_name, name);
            bot.send_message(
                msg.chat.id,
                format!(
                    "Test \"{}\" created. Set the time limit for taking it (in minutes):",
                    name
                ),
            )
            .await?;
            dialogue
                .update(TestState::ReceiveTimeLimit {
                    draft: TestDraft::new(name.to_owned(), user.id),
                })
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "The test name cannot be empty. Please enter a name:",
            )
            .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_time_limit(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    mut draft: TestDraft,
) -> HandlerResult {
    match msg.text().and_then(parse_time_limit) {
        Some(minutes) => {
            draft.time_limit_minutes = Some(minutes);
            bot.send_message(
                msg.chat.id,
                format!(
                    "Time limit set to {} minutes. Now enter the first question:",
                    minutes
                ),
            )
            .await?;
            dialogue
                .update(TestState::ReceiveQuestionText { draft })
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "The time limit must be a positive number. Enter it in minutes:",
            )
            .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_question_text(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    draft: TestDraft,
) -> HandlerResult {
    match msg.text().map(str::trim) {
        Some(question_text) if !question_text.is_empty() => {
            bot.send_message(msg.chat.id, "Enter the answer options separated by commas:")
                .await?;
            dialogue
                .update(TestState::ReceiveAnswers {
                    draft,
                    question_text: question_text.to_owned(),
                })
                .await?;
        }
        _ => {
            bot.send_message(
                msg.chat.id,
                "The question text cannot be empty. Please enter a question:",
            )
            .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_answers(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    (draft, question_text): (TestDraft, String),
) -> HandlerResult {
    let answers = msg.text().map(parse_answers).unwrap_or_default();
    if answers.len() < 2 {
        bot.send_message(
            msg.chat.id,
            "There must be at least two answer options. Enter them separated by commas:",
        )
        .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Choose the correct answer:")
        .reply_markup(correct_answer_keyboard(&answers))
        .await?;
    dialogue
        .update(TestState::ReceiveCorrectAnswer {
            draft,
            question_text,
            answers,
        })
        .await?;

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn select_correct_answer(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    (mut draft, question_text, answers): (TestDraft, String, Vec<String>),
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };
    let question = q
        .data
        .as_deref()
        .and_then(|data| callback_index(data, CORRECT_PREFIX))
        .and_then(|index| Question::new(question_text.clone(), answers.clone(), index));

    match question {
        Some(question) => {
            log::info!(
                "{} adds question '{}' to test '{}'",
                q.from.first_name,
                question.text(),
                &draft.name
            );
            draft.questions.push(question);
            bot.send_message(chat_id, "What do you want to do next?")
                .reply_markup(next_action_keyboard())
                .await?;
            dialogue
                .update(TestState::ReceiveNextAction { draft })
                .await?;
        }
        None => {
            log::error!(
                "{} sent an invalid correct-answer payload {:?}",
                q.from.first_name,
                q.data
            );
            bot.send_message(chat_id, "Please choose one of the offered answers.")
                .reply_markup(correct_answer_keyboard(&answers))
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn finish_creation<S: CreateTest>(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    draft: TestDraft,
    storage: Arc<S>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };

    match q.data.as_deref() {
        Some(ADD_QUESTION) => {
            bot.send_message(chat_id, "Enter the next question:").await?;
            dialogue
                .update(TestState::ReceiveQuestionText { draft })
                .await?;
        }
        Some(FINISH_CREATION) => {
            // The draft only becomes visible to /tests here.
            match storage.create_test(draft.publish()).await {
                Ok(name) => {
                    log::info!("{} published test '{}'", q.from.first_name, name);
                    bot.send_message(
                        chat_id,
                        format!(
                            "Test \"{}\" created! Use /tests to take a test, \
                             /view_results to view your results, \
                             /list_rankings to view the rankings.",
                            name
                        ),
                    )
                    .await?;
                }
                Err(StoreError::DuplicateTest(name)) => {
                    // Someone published the same name while this draft was
                    // still being edited.
                    bot.send_message(
                        chat_id,
                        format!(
                            "Test \"{}\" was created by someone else in the meantime. \
                             Your test was not saved.",
                            name
                        ),
                    )
                    .await?;
                }
                Err(e) => return Err(Box::new(e)),
            }
            dialogue.exit().await?;
        }
        other => {
            log::error!(
                "{} sent an invalid next-action payload {:?}",
                q.from.first_name,
                other
            );
        }
    }

    Ok(())
}

/// Parses the time-limit input: a positive whole number of minutes.
pub(crate) fn parse_time_limit(text: &str) -> Option<u32> {
    match text.trim().parse::<u32>() {
        Ok(minutes) if minutes > 0 => Some(minutes),
        _ => None,
    }
}

/// Splits a comma-separated answer list, trimming whitespace and dropping
/// empty items.
pub(crate) fn parse_answers(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|answer| !answer.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_are_split_and_trimmed() {
        assert_eq!(parse_answers("3,4"), vec!["3", "4"]);
        assert_eq!(parse_answers("  a , b ,c  "), vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_items_are_dropped() {
        assert_eq!(parse_answers(" a ,  , b ,"), vec!["a", "b"]);
        assert!(parse_answers(",,,").is_empty());
    }

    #[test]
    fn time_limit_must_be_a_positive_number() {
        assert_eq!(parse_time_limit("5"), Some(5));
        assert_eq!(parse_time_limit("  12 "), Some(12));
        assert_eq!(parse_time_limit("0"), None);
        assert_eq!(parse_time_limit("-3"), None);
        assert_eq!(parse_time_limit("2.5"), None);
        assert_eq!(parse_time_limit("five"), None);
        assert_eq!(parse_time_limit(""), None);
    }

    #[test]
    fn a_single_answer_is_not_enough() {
        // The handler re-prompts whenever fewer than two items survive.
        assert!(parse_answers("only one").len() < 2);
        assert!(parse_answers("one,").len() < 2);
    }
}

use std::sync::Arc;
use std::time::Duration;

use teloxide::{
    dispatching::dialogue::GetChatId,
    payloads::SendMessageSetters,
    prelude::Requester,
    types::{CallbackQuery, ChatId},
    Bot,
};
use tracing::instrument;

use crate::keyboard::{answers_keyboard, callback_index, ANSWER_PREFIX, TEST_PREFIX};
use crate::state::{TestState, TestTimer};
use crate::storage::store::{RecordScore, RetreiveTest};
use crate::storage::test::Test;
use crate::{HandlerResult, UserDialogue};

/// Entry of the taking flow: a button press on the `/tests` keyboard.
#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn select_test<S: RetreiveTest>(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    storage: Arc<S>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };
    let Some(test_name) = q.data.as_deref().and_then(|data| data.strip_prefix(TEST_PREFIX))
    else {
        return Ok(());
    };

    match storage.retreive_test(test_name).await {
        Some(test) => {
            log::info!("{} starts test '{}'", q.from.first_name, test.name());

            if test.questions().is_empty() {
                bot.send_message(chat_id, "Sorry, this test has no questions.")
                    .await?;
                dialogue.exit().await?;
                return Ok(());
            }

            let timer = test.time_limit_minutes().map(TestTimer::start);
            if let Some(timer) = &timer {
                let (minutes, seconds) = minutes_seconds(timer.allotted());
                bot.send_message(
                    chat_id,
                    format!(
                        "You have {} minutes and {} seconds to complete the test.",
                        minutes, seconds
                    ),
                )
                .await?;
            }

            send_question(&bot, chat_id, &test, 0).await?;
            dialogue
                .update(TestState::Running {
                    test,
                    curr_idx: 0,
                    correct: 0,
                    timer,
                })
                .await?;
        }
        None => {
            // The test was deleted between the keyboard render and the press.
            log::info!(
                "{} failed to start test '{}': not found",
                q.from.first_name,
                test_name
            );
            bot.send_message(chat_id, format!("Test \"{}\" not found.", test_name))
                .await?;
            dialogue.exit().await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn take_answer<S: RecordScore>(
    bot: Bot,
    dialogue: UserDialogue,
    q: CallbackQuery,
    (test, curr_idx, mut correct, timer): (Test, usize, u32, Option<TestTimer>),
    storage: Arc<S>,
) -> HandlerResult {
    bot.answer_callback_query(&q.id).await?;

    let Some(chat_id) = q.chat_id() else {
        return Ok(());
    };
    let Some(answer_index) = q
        .data
        .as_deref()
        .and_then(|data| callback_index(data, ANSWER_PREFIX))
    else {
        log::error!(
            "{} sent an invalid answer payload {:?}",
            q.from.first_name,
            q.data
        );
        return Ok(());
    };

    // Earlier questions' keyboards stay pressable; their payloads carry only
    // an index, so a press on an old keyboard is scored against the current
    // question. Out-of-range indices count as wrong.
    let question = &test.questions()[curr_idx];
    log::info!(
        "{} answers #{} to question '{}' of test '{}'. Correctness: {}",
        q.from.first_name,
        answer_index,
        question.text(),
        test.name(),
        question.is_correct(answer_index)
    );
    // No per-question feedback: the taker only learns the final score.
    if question.is_correct(answer_index) {
        correct += 1;
    }
    let curr_idx = curr_idx + 1;

    if curr_idx < test.questions().len() {
        if let Some(timer) = &timer {
            let (minutes, seconds) = minutes_seconds(timer.remaining());
            bot.send_message(
                chat_id,
                format!("{} minutes and {} seconds remaining.", minutes, seconds),
            )
            .await?;
        }
        send_question(&bot, chat_id, &test, curr_idx).await?;
        dialogue
            .update(TestState::Running {
                test,
                curr_idx,
                correct,
                timer,
            })
            .await?;
    } else {
        log::info!(
            "{} completed test '{}' with result {}/{}",
            q.from.first_name,
            test.name(),
            correct,
            test.questions().len()
        );
        bot.send_message(
            chat_id,
            format!(
                "You have completed the test! Correct answers: {}/{}",
                correct,
                test.questions().len()
            ),
        )
        .await?;
        storage
            .record_score(&q.from.first_name, test.name(), correct)
            .await;
        bot.send_message(
            chat_id,
            "Use /tests to take another test, /view_results to view your results, \
             /list_rankings to view the rankings.",
        )
        .await?;
        dialogue.exit().await?;
    }

    Ok(())
}

async fn send_question(bot: &Bot, chat_id: ChatId, test: &Test, idx: usize) -> HandlerResult {
    let question = &test.questions()[idx];
    bot.send_message(
        chat_id,
        format!("Question #{}\n{}", idx + 1, question.text()),
    )
    .reply_markup(answers_keyboard(question.answers()))
    .await?;
    Ok(())
}

pub(crate) fn minutes_seconds(duration: Duration) -> (u64, u64) {
    let secs = duration.as_secs();
    (secs / 60, secs % 60)
}

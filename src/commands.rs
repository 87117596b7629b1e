use std::sync::Arc;

use teloxide::{
    payloads::SendMessageSetters, prelude::Requester, types::Message, utils::command::BotCommands,
    Bot,
};
use tracing::instrument;

use crate::keyboard::tests_keyboard;
use crate::state::TestState;
use crate::storage::store::{DeleteTest, RetreiveScores, RetreiveTest};
use crate::{HandlerResult, UserDialogue};

#[derive(Debug, Clone, BotCommands)]
#[command(rename_rule = "snake_case")]
pub enum Command {
    #[command(description = "display help.")]
    Help,
    #[command(description = "start the bot.")]
    Start,
    #[command(description = "cancel the current dialogue.")]
    Cancel,
    #[command(description = "create your own test.")]
    Create,
    #[command(description = "choose an available test to take.")]
    Tests,
    #[command(description = "log in with your email and password.")]
    Login,
    #[command(description = "check admin access with a token.")]
    Admin(String),
    #[command(description = "delete one of your tests.")]
    Delete,
    #[command(description = "view your results.")]
    ViewResults,
    #[command(description = "view the participant rankings.")]
    ListRankings,
}

pub(crate) async fn help(bot: Bot, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, Command::descriptions().to_string())
        .await?;
    Ok(())
}

pub(crate) async fn start(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(
        msg.chat.id,
        "Hi! I am a bot for creating and taking tests. Use:\n\
         /create to create your own test\n\
         /tests to see the available tests\n\
         /view_results to view your results\n\
         /list_rankings to view the participant rankings\n\
         /delete to delete your own test.",
    )
    .await?;
    dialogue.update(TestState::Idle).await?;
    Ok(())
}

pub(crate) async fn cancel(bot: Bot, dialogue: UserDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, "Cancelling dialogue").await?;
    dialogue.update(TestState::Idle).await?;
    Ok(())
}

/// `/tests` doubles as the listing and the entry into the taking flow: one
/// button per test, or a report that the repository is empty.
#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn tests<S: RetreiveTest>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    let overview = storage.retreive_test_overview().await;
    if overview.is_empty() {
        bot.send_message(msg.chat.id, "No tests available.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Choose a test to take:")
        .reply_markup(tests_keyboard(&overview))
        .await?;
    dialogue.update(TestState::SelectTest).await?;
    Ok(())
}

#[instrument(level = "info", skip(storage, bot))]
pub(crate) async fn view_results<S: RetreiveScores>(
    bot: Bot,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    match storage.scores_for(&user.first_name).await {
        Some(scores) => {
            let results = scores
                .iter()
                .map(|(test_name, score)| {
                    format!("Test: {}, correct answers: {}", test_name, score)
                })
                .collect::<Vec<_>>()
                .join("\n");
            bot.send_message(
                msg.chat.id,
                format!("User: {}\nResults:\n{}", user.first_name, results),
            )
            .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "You have no results yet.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(storage, bot))]
pub(crate) async fn list_rankings<S: RetreiveScores>(
    bot: Bot,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    let rankings = storage.rankings().await;
    if rankings.is_empty() {
        bot.send_message(msg.chat.id, "No ranking data yet.").await?;
        return Ok(());
    }

    let ranking_list = rankings
        .iter()
        .map(|(user, total)| format!("{}: {} points", user, total))
        .collect::<Vec<_>>()
        .join("\n");
    bot.send_message(
        msg.chat.id,
        format!("Participant rankings:\n{}", ranking_list),
    )
    .await?;

    Ok(())
}

/// `/delete` lists the requester's own tests and arms the confirmation
/// state; exactly one following text message is consumed as the name of the
/// test to delete.
#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn delete<S: RetreiveTest>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let own_tests = storage.tests_by_creator(user.id).await;
    if own_tests.is_empty() {
        bot.send_message(msg.chat.id, "You have no tests to delete.")
            .await?;
        return Ok(());
    }

    bot.send_message(
        msg.chat.id,
        format!(
            "Your tests:\n{}\nEnter the name of the test you want to delete:",
            own_tests.join("\n")
        ),
    )
    .await?;
    dialogue.update(TestState::ConfirmDelete).await?;
    Ok(())
}

#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn confirm_delete<S: DeleteTest>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    match msg.text() {
        Some(test_name) => {
            match storage.delete_test(test_name.trim(), user.id).await {
                Ok(deleted) => {
                    log::info!("{} deleted test '{}'", user.first_name, deleted);
                    bot.send_message(
                        msg.chat.id,
                        format!("Test \"{}\" has been deleted.", deleted),
                    )
                    .await?;
                }
                Err(_) => {
                    bot.send_message(
                        msg.chat.id,
                        "Test not found or you are not its creator.",
                    )
                    .await?;
                }
            }
            // The confirmation consumes exactly one message either way.
            dialogue.exit().await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please send the name of the test to delete.")
                .await?;
        }
    }

    Ok(())
}

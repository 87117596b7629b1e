use std::error::Error;

use teloxide::{
    dispatching::{
        dialogue::{self, InMemStorage},
        DpHandlerDescription, UpdateFilterExt, UpdateHandler,
    },
    dptree::{self, Handler},
    prelude::{DependencyMap, Requester},
    types::{Message, Update},
    Bot,
};
use tracing::instrument;

use crate::{
    auth,
    commands::{self, Command},
    constructor, runner,
    state::TestState,
    storage::store::Storage,
    HandlerResult,
};

pub fn schema() -> UpdateHandler<Box<dyn Error + Send + Sync + 'static>> {
    use dptree::case;

    // Top-level commands stay routable no matter which state the dialogue
    // is in; each branches or resets the state itself.
    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Help].endpoint(commands::help))
        .branch(case![Command::Start].endpoint(commands::start))
        .branch(case![Command::Cancel].endpoint(commands::cancel))
        .branch(case![Command::Create].endpoint(constructor::create))
        .branch(case![Command::Tests].endpoint(commands::tests::<Storage>))
        .branch(case![Command::Login].endpoint(auth::login::<Storage>))
        .branch(case![Command::Admin(token)].endpoint(auth::admin::<Storage>))
        .branch(case![Command::Delete].endpoint(commands::delete::<Storage>))
        .branch(case![Command::ViewResults].endpoint(commands::view_results::<Storage>))
        .branch(case![Command::ListRankings].endpoint(commands::list_rankings::<Storage>));

    let handler = Update::filter_message()
        .branch(command_handler)
        .branch(constructor_scheme())
        .branch(auth_scheme())
        .branch(case![TestState::ConfirmDelete].endpoint(commands::confirm_delete::<Storage>))
        .endpoint(invalid_state);

    dialogue::enter::<Update, InMemStorage<TestState>, TestState, _>()
        .branch(handler)
        .branch(callback_query_scheme())
}

#[instrument(level = "debug")]
fn constructor_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    log::debug!("Building a dispatch tree for the constructor");
    Update::filter_message()
        .branch(case![TestState::ReceiveTestName].endpoint(constructor::receive_test_name::<Storage>))
        .branch(case![TestState::ReceiveTimeLimit { draft }].endpoint(constructor::receive_time_limit))
        .branch(
            case![TestState::ReceiveQuestionText { draft }]
                .endpoint(constructor::receive_question_text),
        )
        .branch(
            case![TestState::ReceiveAnswers {
                draft,
                question_text
            }]
            .endpoint(constructor::receive_answers),
        )
}

#[instrument(level = "debug")]
fn auth_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    log::debug!("Building a dispatch tree for the login flow");
    Update::filter_message()
        .branch(case![TestState::ReceiveEmail].endpoint(auth::receive_email))
        .branch(
            case![TestState::ReceivePassword { email }]
                .endpoint(auth::receive_password::<auth::AuthService, Storage>),
        )
}

#[instrument(level = "debug")]
fn callback_query_scheme() -> Handler<
    'static,
    DependencyMap,
    Result<(), Box<(dyn Error + Send + Sync + 'static)>>,
    DpHandlerDescription,
> {
    use dptree::case;
    log::debug!("Building a dispatch tree for callback queries");
    Update::filter_callback_query()
        .branch(
            case![TestState::ReceiveCorrectAnswer {
                draft,
                question_text,
                answers
            }]
            .endpoint(constructor::select_correct_answer),
        )
        .branch(
            case![TestState::ReceiveNextAction { draft }]
                .endpoint(constructor::finish_creation::<Storage>),
        )
        .branch(case![TestState::SelectTest].endpoint(runner::select_test::<Storage>))
        .branch(
            case![TestState::Running {
                test,
                curr_idx,
                correct,
                timer
            }]
            .endpoint(runner::take_answer::<Storage>),
        )
}

/// Anything nothing else matched is dropped with a hint; the dispatcher
/// never crashes over a stray update.
#[instrument(level = "info")]
async fn invalid_state(bot: Bot, msg: Message) -> HandlerResult {
    log::info!(
        "{}: invalid input '{:?}'",
        msg.chat.id,
        msg.text()
    );
    bot.send_message(
        msg.chat.id,
        "Unable to handle the message. Enter /help to see usages.",
    )
    .await?;
    Ok(())
}

use state::TestState;
use teloxide::{dispatching::dialogue::InMemStorage, prelude::Dialogue};

pub mod auth;
pub mod commands;
pub mod constructor;
pub mod keyboard;
pub mod runner;
pub mod schema;
pub mod state;
pub mod storage;

type UserDialogue = Dialogue<TestState, InMemStorage<TestState>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;

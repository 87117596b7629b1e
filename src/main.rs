use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use rustestbot::auth::{AdminToken, AuthService};
use rustestbot::schema::schema;
use rustestbot::state::TestState;
use rustestbot::storage::store::Storage;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::error_handlers::IgnoringErrorHandlerSafe;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::level_filters;
use tracing_subscriber::fmt::format::FmtSpan;
use url::Url;

#[tokio::main]
async fn main() {
    dotenv().ok();
    let rust_log = std::env::var("LOG_LEVEL").unwrap_or("error".into());
    tracing_subscriber::fmt()
        .with_max_level(level_filters::LevelFilter::from_level(
            rust_log.parse().expect("LOG_LEVEL can't be parsed."),
        ))
        .json()
        .with_span_events(FmtSpan::ENTER)
        .log_internal_errors(true)
        .with_ansi(true)
        .with_line_number(true)
        .with_target(false)
        .init();

    let teloxide_token = std::env::var("TELOXIDE_TOKEN").expect("TELOXIDE_TOKEN should be set.");
    let bot = Bot::new(teloxide_token);

    let auth_url = std::env::var("AUTH_SERVER_URL")
        .expect("AUTH_SERVER_URL should be set.")
        .parse::<Url>()
        .expect("AUTH_SERVER_URL can't be parsed.");
    let admin_token = AdminToken(std::env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN should be set."));

    let storage = Arc::new(Storage::new());
    let auth = Arc::new(AuthService::new(auth_url));

    log::info!("Starting bot...");

    let ngrok_url = std::env::var("NGROK_URL").map(|d| d.parse::<Url>().unwrap()).ok();
    let ngrok_addr = std::env::var("NGROK_ADDR")
        .map(|d| d.parse::<SocketAddr>().expect("NGROK_ADDR can't be parsed."))
        .ok();

    let mut dispatcher = Dispatcher::builder(bot.clone(), schema())
        .dependencies(dptree::deps![
            InMemStorage::<TestState>::new(),
            storage,
            auth,
            admin_token
        ])
        .enable_ctrlc_handler()
        .build();

    if let (Some(ngrok_url), Some(ngrok_addr)) = (ngrok_url, ngrok_addr) {
        let listener = webhooks::axum(bot, Options::new(ngrok_addr, ngrok_url))
            .await
            .expect("Failed to build a listener.");
        dispatcher
            .dispatch_with_listener(listener, Arc::new(IgnoringErrorHandlerSafe))
            .await
    } else {
        dispatcher.dispatch().await
    }
}

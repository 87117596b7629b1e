use std::sync::Arc;

use serde::{Deserialize, Serialize};
use teloxide::{prelude::Requester, types::Message, Bot};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::state::TestState;
use crate::storage::store::AuthCache;
use crate::{HandlerResult, UserDialogue};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authentication request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid credentials")]
    InvalidCredentials,
}

/// One blocking network call against the external authority, no retry.
pub(crate) trait Authenticate {
    async fn authenticate(&self, email: &str, password: &str) -> Result<String, AuthError>;
}

#[derive(Debug, Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    role: Option<String>,
}

#[derive(Debug)]
pub struct AuthService {
    client: reqwest::Client,
    server_url: Url,
}

impl AuthService {
    pub fn new(server_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            server_url,
        }
    }
}

impl Authenticate for AuthService {
    async fn authenticate(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(self.server_url.clone())
            .json(&Credentials { email, password })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidCredentials);
        }

        let body: AuthResponse = response.json().await?;
        Ok(body.role.unwrap_or_else(|| "user".to_owned()))
    }
}

/// The pre-shared admin secret, compared by plain equality.
#[derive(Debug, Clone)]
pub struct AdminToken(pub String);

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AdminAccess {
    Granted,
    NotAdmin,
    InvalidToken,
}

pub(crate) fn check_admin_access(
    role: Option<&str>,
    supplied_token: &str,
    admin_token: &AdminToken,
) -> AdminAccess {
    if role != Some("admin") {
        return AdminAccess::NotAdmin;
    }
    if supplied_token != admin_token.0 {
        return AdminAccess::InvalidToken;
    }
    AdminAccess::Granted
}

#[instrument(level = "info", skip(storage, bot, dialogue))]
pub(crate) async fn login<S: AuthCache>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    storage: Arc<S>,
) -> HandlerResult {
    match storage.role(msg.chat.id).await {
        Some(_) => {
            bot.send_message(msg.chat.id, "You are already authenticated.")
                .await?;
        }
        None => {
            bot.send_message(
                msg.chat.id,
                "You are not logged in. Available authentication methods:\n\
                 - email and password\n\
                 Enter your email:",
            )
            .await?;
            dialogue.update(TestState::ReceiveEmail).await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(bot, dialogue))]
pub(crate) async fn receive_email(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
) -> HandlerResult {
    match msg.text().map(str::trim) {
        Some(email) if !email.is_empty() => {
            bot.send_message(msg.chat.id, "Enter your password:").await?;
            dialogue
                .update(TestState::ReceivePassword {
                    email: email.to_owned(),
                })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please enter a valid email.")
                .await?;
        }
    }

    Ok(())
}

#[instrument(level = "info", skip(auth, storage, bot, dialogue, msg))]
pub(crate) async fn receive_password<A: Authenticate, S: AuthCache>(
    bot: Bot,
    dialogue: UserDialogue,
    msg: Message,
    email: String,
    auth: Arc<A>,
    storage: Arc<S>,
) -> HandlerResult {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let password = match msg.text().map(str::trim) {
        Some(password) if !password.is_empty() => password,
        _ => {
            bot.send_message(msg.chat.id, "Please enter a valid password.")
                .await?;
            return Ok(());
        }
    };

    // Any failure, network or rejection, reads as bad credentials.
    match auth.authenticate(&email, password).await {
        Ok(role) => {
            log::info!("{} authenticated with role '{}'", user.first_name, role);
            let greeting = if role == "admin" {
                format!("Hello, {}! You are an administrator.", user.first_name)
            } else {
                format!("Hello, {}! You are a regular user.", user.first_name)
            };
            storage.set_role(msg.chat.id, role).await;
            bot.send_message(msg.chat.id, greeting).await?;
        }
        Err(e) => {
            log::error!("Authentication failed for {}: {}", user.first_name, e);
            bot.send_message(msg.chat.id, "Invalid email or password. Please try again.")
                .await?;
        }
    }
    dialogue.exit().await?;

    Ok(())
}

#[instrument(level = "info", skip(storage, bot, admin_token, token))]
pub(crate) async fn admin<S: AuthCache>(
    bot: Bot,
    msg: Message,
    token: String,
    admin_token: AdminToken,
    storage: Arc<S>,
) -> HandlerResult {
    let role = storage.role(msg.chat.id).await;
    let reply = match check_admin_access(role.as_deref(), token.trim(), &admin_token) {
        AdminAccess::Granted => "Admin access granted.",
        AdminAccess::NotAdmin => {
            "You do not have access to this command because you are not an administrator."
        }
        AdminAccess::InvalidToken => {
            "Your token is invalid. You do not have access to admin functions."
        }
    };
    bot.send_message(msg.chat.id, reply).await?;

    Ok(())
}

//! Login, logout, and identity commands.

use shopdesk_client::ClientState;
use shopdesk_client::models::LoginCredentials;
use shopdesk_client::session::SessionState;
use shopdesk_core::{Audience, Email};

use super::CliError;

/// Sign in to `audience`.
///
/// # Errors
///
/// Returns `CliError::InvalidEmail` for a malformed address, or `CliError::Api`
/// when the server refuses the credentials.
#[allow(clippy::print_stdout)]
pub async fn login(
    state: &ClientState,
    audience: Audience,
    email: &str,
    password: String,
) -> Result<(), CliError> {
    let credentials = LoginCredentials::new(Email::parse(email)?, password);
    match audience {
        Audience::Admin => {
            let user = state.admin().login(&credentials).await?;
            println!("Signed in to the back office as {} <{}>", user.name, user.email);
        }
        Audience::Customer => {
            let customer = state.customer().login(&credentials).await?;
            println!("Signed in as {} <{}>", customer.display_name(), customer.email);
        }
    }
    Ok(())
}

#[allow(clippy::print_stdout)]
pub async fn logout(state: &ClientState, audience: Audience) {
    match audience {
        Audience::Admin => state.admin().logout().await,
        Audience::Customer => state.customer().logout().await,
    }
    println!("Signed out of {audience}");
}

#[allow(clippy::print_stdout)]
pub fn whoami(state: &ClientState, audience: Audience) {
    let (session_state, label) = match audience {
        Audience::Admin => (
            state.admin().state(),
            state
                .admin()
                .identity()
                .map(|user| format!("{} <{}>", user.name, user.email)),
        ),
        Audience::Customer => (
            state.customer().state(),
            state
                .customer()
                .identity()
                .map(|customer| format!("{} <{}>", customer.display_name(), customer.email)),
        ),
    };
    match (session_state, label) {
        (SessionState::Authenticated, Some(label)) => println!("{audience}: {label}"),
        (SessionState::Unverified, _) => println!("{audience}: signed in, identity unavailable"),
        _ => println!("{audience}: not signed in"),
    }
}

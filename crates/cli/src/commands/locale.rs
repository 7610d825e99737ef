//! Locale preference commands.

use shopdesk_client::ClientState;

use super::CliError;

#[allow(clippy::print_stdout)]
pub fn show(state: &ClientState) {
    match state.locale().get() {
        Some(locale) => println!("{locale}"),
        None => println!("No locale preference stored"),
    }
}

/// Store `locale`, optionally recording it on the customer account.
///
/// # Errors
///
/// Returns `ApiError::InvalidTarget` for an implausible tag, or the server
/// error when `remote` is set.
pub async fn set(state: &ClientState, locale: &str, remote: bool) -> Result<(), CliError> {
    if remote {
        state
            .locale()
            .update_remote(state.dispatcher(), locale)
            .await?;
    } else {
        state.locale().set(locale)?;
    }
    tracing::info!(locale, remote, "Locale preference stored");
    Ok(())
}

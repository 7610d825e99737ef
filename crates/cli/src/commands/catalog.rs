//! Category listing.

use shopdesk_client::ClientState;

use super::CliError;

/// Print the active categories.
///
/// # Errors
///
/// Returns the server error, or `ApiError::MissingCredential` without an
/// admin session.
#[allow(clippy::print_stdout)]
pub async fn list(state: &ClientState) -> Result<(), CliError> {
    for (name, id) in state.categories().options().await? {
        println!("{id:>6}  {name}");
    }
    Ok(())
}

//! Session authentication and role checks for the API.
//!
//! A successful login stores [`SessionData`] in the server-side session; the
//! extractors reload the user on every request so role changes and
//! deactivation take effect immediately.

pub mod extractors;
#[cfg(test)]
pub mod test_helpers;

pub use extractors::{AuthenticatedUser, RequireAdmin, RequireOfficer};

use tm_core::SessionData;
use tower_sessions::Session;

/// Session key for storing user data.
pub const SESSION_USER_KEY: &str = "user";

/// Gets the session data from the session.
pub async fn get_session_data(session: &Session) -> Option<SessionData> {
    session
        .get::<SessionData>(SESSION_USER_KEY)
        .await
        .ok()
        .flatten()
}

/// Stores session data in the session.
pub async fn set_session_data(
    session: &Session,
    data: SessionData,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(SESSION_USER_KEY, data).await
}

/// Clears the session (logout).
pub async fn clear_session(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

use chrono::{Duration, Utc};
use newsai_core::{Result, SessionData, Settings, Storage};
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

const SID_LENGTH: usize = 32;

fn new_sid() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SID_LENGTH)
        .map(char::from)
        .collect()
}

/// Create and store a session for `user_id`, carrying its current role names.
pub async fn issue_session(
    storage: &dyn Storage,
    settings: &Settings,
    user_id: Uuid,
) -> Result<(String, SessionData)> {
    let roles = storage
        .roles_of(user_id)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    let session = SessionData {
        user_id,
        roles,
        expires_at: Utc::now() + Duration::seconds(settings.session_ttl_seconds()),
    };
    let sid = new_sid();
    storage.put_session(&sid, &session).await?;
    tracing::info!(user_id = %user_id, expires_at = %session.expires_at, "Session issued");
    Ok((sid, session))
}

/// `Set-Cookie` value for a session id.
pub fn session_cookie(settings: &Settings, sid: &str) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        settings.session_cookie_name,
        sid,
        settings.session_ttl_seconds()
    )
}

use newsai_core::{Storage, User, UserProfile};

use crate::ApiError;

pub async fn profile(storage: &dyn Storage, user: User) -> Result<UserProfile, ApiError> {
    let roles = storage.roles_of(user.id).await?;
    Ok(UserProfile::new(user, &roles))
}

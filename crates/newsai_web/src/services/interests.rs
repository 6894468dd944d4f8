use newsai_core::{nest_interests, Error, FieldNode, Storage};
use uuid::Uuid;

use crate::envelope::MessageData;
use crate::ApiError;

async fn ensure_user(storage: &dyn Storage, user_id: Uuid) -> Result<(), ApiError> {
    match storage.user_by_id(user_id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::UserDoesNotExist("user_id does not exist".to_string())),
    }
}

pub async fn list_interests(
    storage: &dyn Storage,
    user_id: Uuid,
) -> Result<Vec<FieldNode>, ApiError> {
    ensure_user(storage, user_id).await?;
    let rows = storage.list_interests(user_id).await?;
    Ok(nest_interests(&rows))
}

pub async fn add_interest(
    storage: &dyn Storage,
    user_id: Uuid,
    field_id: Uuid,
) -> Result<MessageData, ApiError> {
    ensure_user(storage, user_id).await?;
    let interest = storage
        .add_interest(user_id, field_id)
        .await
        .map_err(|e| match e {
            Error::Duplicate(_) => {
                ApiError::DuplicateInterest("Interest already added".to_string())
            }
            Error::InvalidReference(_) => {
                ApiError::BadRequest("Invalid user_id or field_id".to_string())
            }
            other => ApiError::Internal(other),
        })?;

    tracing::info!(user_id = %user_id, field_id = %field_id, "Interest added");
    Ok(MessageData {
        message: format!(
            "Successfully added interest for field {} and user {}",
            interest.field_id, interest.user_id
        ),
    })
}

pub async fn remove_interest(
    storage: &dyn Storage,
    user_id: Uuid,
    field_id: Uuid,
) -> Result<MessageData, ApiError> {
    ensure_user(storage, user_id).await?;
    if !storage.remove_interest(user_id, field_id).await? {
        return Err(ApiError::BadRequest("Interest not found".to_string()));
    }

    tracing::info!(user_id = %user_id, field_id = %field_id, "Interest removed");
    Ok(MessageData {
        message: format!("Successfully removed field {} from user's interest", field_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsai_core::{FieldStore, NewField, NewUser, UserStore};
    use newsai_storage::InMemoryStorage;

    #[tokio::test]
    async fn test_unknown_user_is_rejected() {
        let storage = InMemoryStorage::new();
        let err = list_interests(&storage, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.title(), "UserDoesNotExist");
        assert_eq!(err.message(), "user_id does not exist");
    }

    #[tokio::test]
    async fn test_unknown_field_is_bad_request() {
        let storage = InMemoryStorage::new();
        let user = storage
            .insert_user(&NewUser::with_email("reader@example.com"), &[])
            .await
            .unwrap();
        let err = add_interest(&storage, user.id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.title(), "APIError");
        assert_eq!(err.message(), "Invalid user_id or field_id");
    }

    #[tokio::test]
    async fn test_add_then_duplicate() {
        let storage = InMemoryStorage::new();
        let user = storage
            .insert_user(&NewUser::with_email("reader@example.com"), &[])
            .await
            .unwrap();
        let cs = storage
            .insert_field(&NewField::top_level("cs", "Computer Science", Some(1)))
            .await
            .unwrap();

        let added = add_interest(&storage, user.id, cs.id).await.unwrap();
        assert_eq!(
            added.message,
            format!("Successfully added interest for field {} and user {}", cs.id, user.id)
        );
        let err = add_interest(&storage, user.id, cs.id).await.unwrap_err();
        assert_eq!(err.title(), "DuplicateInterestError");
        assert_eq!(err.message(), "Interest already added");
    }
}

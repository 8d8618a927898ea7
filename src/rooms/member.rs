use axum::extract::State;
use axum::{Json, debug_handler};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::authorizer::RoomAuthorizer;
use crate::envelope::ApiResponse;
use crate::error::{ChatError, ChatResult};
use crate::models::{MemberRole, RoomMembership, UserId, validate_user_id};
use crate::store;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddMemberBody {
    pub room_id: String,
    pub user_id: UserId,
    pub new_member_id: UserId,
    #[serde(default)]
    pub role: MemberRole,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn add_member(
    State(db_pool): State<SqlitePool>,
    State(authorizer): State<RoomAuthorizer>,
    Json(body): Json<AddMemberBody>,
) -> ChatResult<ApiResponse> {
    let membership = add_member_impl(
        &db_pool,
        &authorizer,
        &body.room_id,
        body.user_id,
        body.new_member_id,
        body.role,
    )
    .await?;
    Ok(ApiResponse::ok("Member added successfully", &membership))
}

/// Add (or re-add) a member. Adding someone who already holds an active
/// membership fails with `AlreadyMember`; a soft-deleted row is revived
/// with the requested role.
pub(crate) async fn add_member_impl(
    db_pool: &SqlitePool,
    authorizer: &RoomAuthorizer,
    room_id: &str,
    actor_id: UserId,
    new_member_id: UserId,
    role: MemberRole,
) -> ChatResult<RoomMembership> {
    validate_user_id(actor_id)?;
    validate_user_id(new_member_id)?;
    authorizer.check_manage_permission(actor_id, room_id).await?;

    let membership = match store::find_membership(db_pool, new_member_id, room_id).await? {
        Some(existing) if existing.is_active => {
            return Err(ChatError::already_member(
                "User is already a member of this room",
            ));
        }
        Some(existing) => store::reactivate_membership(db_pool, &existing.id, role).await?,
        None => store::create_membership(db_pool, new_member_id, room_id, role).await?,
    };

    info!(room_id, actor_id, new_member_id, "member added");
    Ok(membership)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RemoveMemberBody {
    pub room_id: String,
    pub user_id: UserId,
    pub member_id_to_remove: UserId,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn remove_member(
    State(db_pool): State<SqlitePool>,
    State(authorizer): State<RoomAuthorizer>,
    Json(body): Json<RemoveMemberBody>,
) -> ChatResult<ApiResponse> {
    remove_member_impl(
        &db_pool,
        &authorizer,
        &body.room_id,
        body.user_id,
        body.member_id_to_remove,
    )
    .await?;
    Ok(ApiResponse::ok_empty("Member removed successfully"))
}

/// Soft-delete a membership. Only admins and moderators may remove, and
/// only an admin may remove another admin.
pub(crate) async fn remove_member_impl(
    db_pool: &SqlitePool,
    authorizer: &RoomAuthorizer,
    room_id: &str,
    actor_id: UserId,
    target_id: UserId,
) -> ChatResult<()> {
    validate_user_id(actor_id)?;
    validate_user_id(target_id)?;
    let actor_role = authorizer.check_manage_permission(actor_id, room_id).await?;

    let target = store::find_membership(db_pool, target_id, room_id)
        .await?
        .ok_or_else(|| ChatError::not_a_member("Member not found in this room"))?;
    RoomAuthorizer::check_remove_permission(actor_role, target.role)?;

    store::deactivate_membership(db_pool, &target.id).await?;
    info!(room_id, actor_id, target_id, "member removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{memory_pool, seed_room_with_admin, seed_user};

    async fn setup() -> (SqlitePool, RoomAuthorizer, crate::models::ChatRoom, UserId, UserId) {
        let pool = memory_pool().await;
        let admin = seed_user(&pool, "alice").await;
        let other = seed_user(&pool, "bob").await;
        let room = seed_room_with_admin(&pool, "general", admin.id).await;
        let authorizer = RoomAuthorizer::new(pool.clone());
        (pool, authorizer, room, admin.id, other.id)
    }

    #[tokio::test]
    async fn members_cannot_manage_the_roster() {
        let (pool, authorizer, room, admin, bob) = setup().await;
        add_member_impl(&pool, &authorizer, &room.id, admin, bob, MemberRole::Member)
            .await
            .expect("admin adds bob");

        let carol = seed_user(&pool, "carol").await;
        let err = add_member_impl(&pool, &authorizer, &room.id, bob, carol.id, MemberRole::Member)
            .await
            .expect_err("bob is a plain member");
        assert!(matches!(err, ChatError::Forbidden(_)));

        let err = remove_member_impl(&pool, &authorizer, &room.id, bob, admin)
            .await
            .expect_err("bob cannot remove anyone");
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[tokio::test]
    async fn duplicate_active_membership_is_rejected() {
        let (pool, authorizer, room, admin, bob) = setup().await;
        add_member_impl(&pool, &authorizer, &room.id, admin, bob, MemberRole::Member)
            .await
            .expect("first add");

        let err = add_member_impl(&pool, &authorizer, &room.id, admin, bob, MemberRole::Member)
            .await
            .expect_err("bob is already active");
        assert!(matches!(err, ChatError::AlreadyMember(_)));
    }

    #[tokio::test]
    async fn removed_member_can_be_added_again() {
        let (pool, authorizer, room, admin, bob) = setup().await;
        add_member_impl(&pool, &authorizer, &room.id, admin, bob, MemberRole::Member)
            .await
            .expect("add");
        remove_member_impl(&pool, &authorizer, &room.id, admin, bob)
            .await
            .expect("remove");

        let revived =
            add_member_impl(&pool, &authorizer, &room.id, admin, bob, MemberRole::Moderator)
                .await
                .expect("re-add after soft delete");
        assert!(revived.is_active);
        assert_eq!(revived.role, MemberRole::Moderator);
    }

    #[tokio::test]
    async fn admin_removal_is_reserved_for_admins() {
        let (pool, authorizer, room, admin, bob) = setup().await;
        add_member_impl(&pool, &authorizer, &room.id, admin, bob, MemberRole::Moderator)
            .await
            .expect("add moderator");

        // A moderator cannot remove the admin.
        let err = remove_member_impl(&pool, &authorizer, &room.id, bob, admin)
            .await
            .expect_err("target is an admin");
        assert!(matches!(err, ChatError::Forbidden(_)));

        // The admin can remove the moderator.
        remove_member_impl(&pool, &authorizer, &room.id, admin, bob)
            .await
            .expect("admin removes moderator");
    }

    #[tokio::test]
    async fn removing_an_unknown_member_reports_not_a_member() {
        let (pool, authorizer, room, admin, bob) = setup().await;
        let err = remove_member_impl(&pool, &authorizer, &room.id, admin, bob)
            .await
            .expect_err("bob never joined");
        assert!(matches!(err, ChatError::NotAMember(_)));
    }
}

//! RoomAuthorizer: the single source of truth for "may this user do X in
//! this room right now".
//!
//! Membership can change between actions, so every check re-reads the
//! durable store; nothing here is cached.

use sqlx::SqlitePool;

use crate::error::{ChatError, ChatResult};
use crate::models::{MemberRole, RoomMembership, UserId};
use crate::store;

#[derive(Clone)]
pub struct RoomAuthorizer {
    db_pool: SqlitePool,
}

impl RoomAuthorizer {
    pub fn new(db_pool: SqlitePool) -> Self {
        RoomAuthorizer { db_pool }
    }

    /// The user's active membership in the room, or `NotAMember`.
    pub async fn check_membership(
        &self,
        user_id: UserId,
        room_id: &str,
    ) -> ChatResult<RoomMembership> {
        store::find_active_membership(&self.db_pool, user_id, room_id)
            .await?
            .ok_or_else(|| ChatError::not_a_member("You are not a member of this room"))
    }

    /// The actor's role, if it permits managing members.
    pub async fn check_manage_permission(
        &self,
        actor_id: UserId,
        room_id: &str,
    ) -> ChatResult<MemberRole> {
        let membership = store::find_active_membership(&self.db_pool, actor_id, room_id).await?;
        match membership {
            Some(m) if m.role.can_manage_members() => Ok(m.role),
            _ => Err(ChatError::forbidden(
                "You don't have permission to manage members",
            )),
        }
    }

    /// Gate on removals: only an admin may remove another admin.
    pub fn check_remove_permission(actor: MemberRole, target: MemberRole) -> ChatResult<()> {
        if !actor.can_remove(target) {
            return Err(ChatError::forbidden("Only admins can remove other admins"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::{memory_pool, seed_room_with_admin, seed_user};

    #[tokio::test]
    async fn membership_check_requires_an_active_row() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;
        let authorizer = RoomAuthorizer::new(pool.clone());

        assert!(authorizer.check_membership(alice.id, &room.id).await.is_ok());
        let err = authorizer
            .check_membership(bob.id, &room.id)
            .await
            .expect_err("bob was never added");
        assert!(matches!(err, ChatError::NotAMember(_)));

        // An inactive membership does not count.
        let membership = store::create_membership(&pool, bob.id, &room.id, MemberRole::Member)
            .await
            .expect("create");
        store::deactivate_membership(&pool, &membership.id)
            .await
            .expect("deactivate");
        let err = authorizer
            .check_membership(bob.id, &room.id)
            .await
            .expect_err("membership was soft-deleted");
        assert!(matches!(err, ChatError::NotAMember(_)));
    }

    #[tokio::test]
    async fn checks_are_not_cached_across_actions() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;
        let authorizer = RoomAuthorizer::new(pool.clone());

        let membership = store::create_membership(&pool, bob.id, &room.id, MemberRole::Member)
            .await
            .expect("create");
        assert!(authorizer.check_membership(bob.id, &room.id).await.is_ok());

        store::deactivate_membership(&pool, &membership.id)
            .await
            .expect("deactivate");
        assert!(authorizer.check_membership(bob.id, &room.id).await.is_err());

        store::reactivate_membership(&pool, &membership.id, MemberRole::Member)
            .await
            .expect("reactivate");
        assert!(authorizer.check_membership(bob.id, &room.id).await.is_ok());
    }

    #[tokio::test]
    async fn manage_permission_rejects_plain_members() {
        let pool = memory_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;
        let carol = seed_user(&pool, "carol").await;
        let room = seed_room_with_admin(&pool, "general", alice.id).await;
        store::create_membership(&pool, bob.id, &room.id, MemberRole::Member)
            .await
            .expect("member");
        store::create_membership(&pool, carol.id, &room.id, MemberRole::Moderator)
            .await
            .expect("moderator");
        let authorizer = RoomAuthorizer::new(pool.clone());

        assert_eq!(
            authorizer
                .check_manage_permission(alice.id, &room.id)
                .await
                .expect("admin"),
            MemberRole::Admin
        );
        assert_eq!(
            authorizer
                .check_manage_permission(carol.id, &room.id)
                .await
                .expect("moderator"),
            MemberRole::Moderator
        );
        let err = authorizer
            .check_manage_permission(bob.id, &room.id)
            .await
            .expect_err("member role cannot manage");
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[test]
    fn remove_permission_protects_admins() {
        assert!(
            RoomAuthorizer::check_remove_permission(MemberRole::Admin, MemberRole::Moderator)
                .is_ok()
        );
        assert!(
            RoomAuthorizer::check_remove_permission(MemberRole::Admin, MemberRole::Admin).is_ok()
        );
        let err =
            RoomAuthorizer::check_remove_permission(MemberRole::Moderator, MemberRole::Admin)
                .expect_err("moderator cannot remove admin");
        assert!(matches!(err, ChatError::Forbidden(_)));
    }
}

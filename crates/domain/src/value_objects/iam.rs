use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActorRole {
    Learner,
    Admin,
}

/// The authenticated principal a lifecycle operation runs on behalf of.
/// Webhook-driven transitions run with no actor and skip ownership checks.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn learner(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: ActorRole::Learner,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: ActorRole::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    pub fn owns(&self, user_id: Uuid) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}

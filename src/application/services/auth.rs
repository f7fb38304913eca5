use std::collections::HashSet;

use crate::application::errors::BotError;
use crate::domain::entities::{AccessTier, UserId};

/// Classifies users into access tiers from the configured id lists
#[derive(Debug, Clone)]
pub struct Authorization {
    admins: Vec<UserId>,
    admin_set: HashSet<UserId>,
    authorized: HashSet<UserId>,
}

impl Authorization {
    /// Fails when `admins` is empty: nobody could ever reach the admin tier.
    pub fn new(admins: Vec<UserId>, authorized_users: Vec<UserId>) -> Result<Self, BotError> {
        if admins.is_empty() {
            return Err(BotError::Configuration(
                "Administrators list may not be empty".to_string(),
            ));
        }
        Ok(Self {
            admin_set: admins.iter().copied().collect(),
            admins,
            authorized: authorized_users.into_iter().collect(),
        })
    }

    pub fn access_tier(&self, user_id: UserId) -> AccessTier {
        if self.is_admin(user_id) {
            AccessTier::ADMIN
        } else if self.authorized.contains(&user_id) {
            AccessTier::AUTHORIZED
        } else {
            AccessTier::GUEST
        }
    }

    pub fn is_authorized(&self, user_id: UserId) -> bool {
        self.access_tier(user_id) > AccessTier::GUEST
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_set.contains(&user_id)
    }

    /// Admins in configured order; default broadcast recipients
    pub fn admins(&self) -> &[UserId] {
        &self.admins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> Authorization {
        Authorization::new(vec![1, 2], vec![2, 10, 11]).unwrap()
    }

    #[test]
    fn test_empty_admins_rejected() {
        let err = Authorization::new(vec![], vec![5]).unwrap_err();
        assert!(matches!(err, BotError::Configuration(_)));
    }

    #[test]
    fn test_unknown_users_are_guests() {
        let auth = auth();
        for id in [0, 3, 12, -1, i64::MAX] {
            assert_eq!(auth.access_tier(id), AccessTier::GUEST);
            assert!(!auth.is_authorized(id));
        }
    }

    #[test]
    fn test_admin_wins_over_authorized() {
        let auth = auth();
        assert_eq!(auth.access_tier(1), AccessTier::ADMIN);
        assert_eq!(auth.access_tier(2), AccessTier::ADMIN);
        assert!(auth.is_admin(2));
        assert!(auth.is_authorized(2));
    }

    #[test]
    fn test_authorized_users() {
        let auth = auth();
        assert_eq!(auth.access_tier(10), AccessTier::AUTHORIZED);
        assert!(auth.is_authorized(11));
        assert!(!auth.is_admin(11));
    }

    #[test]
    fn test_admins_keep_order() {
        let auth = Authorization::new(vec![9, 3, 5], vec![]).unwrap();
        assert_eq!(auth.admins(), &[9, 3, 5]);
    }
}

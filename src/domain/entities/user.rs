use std::fmt;

/// Numeric user identifier as delivered by the transport
pub type UserId = i64;

/// Numeric chat identifier as delivered by the transport
pub type ChatId = i64;

/// Access level on an ordered integer scale. Higher values unlock more commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccessTier(pub u32);

impl AccessTier {
    pub const GUEST: AccessTier = AccessTier(0);
    pub const AUTHORIZED: AccessTier = AccessTier(1);
    pub const ADMIN: AccessTier = AccessTier(100);

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_guest(self) -> bool {
        self == Self::GUEST
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::GUEST => write!(f, "guest"),
            Self::AUTHORIZED => write!(f, "authorized"),
            Self::ADMIN => write!(f, "admin"),
            AccessTier(level) => write!(f, "level {}", level),
        }
    }
}

/// Represents a user in the system
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl User {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_first_name(mut self, first: impl Into<String>) -> Self {
        self.first_name = Some(first.into());
        self
    }

    pub fn display_name(&self) -> String {
        if let Some(ref username) = self.username {
            username.clone()
        } else if let Some(ref first) = self.first_name {
            first.clone()
        } else {
            self.id.to_string()
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

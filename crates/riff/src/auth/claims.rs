//! JWT claims and roles.

use serde::{Deserialize, Serialize};

/// Role carried by a token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Dashboard user. May only listen to its own status group.
    #[default]
    User,
    /// Agent-execution backend. May publish status events for any user.
    Service,
    /// Administrator. Implies `Service`.
    Admin,
}

impl Role {
    /// Whether this role may publish status events.
    pub fn can_publish(self) -> bool {
        matches!(self, Role::Service | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Service => write!(f, "service"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "service" => Ok(Role::Service),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user identity). Group membership is keyed on this.
    pub sub: String,

    /// Issuer.
    #[serde(default)]
    pub iss: Option<String>,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,

    /// Issued at (as Unix timestamp).
    #[serde(default)]
    pub iat: Option<i64>,

    /// User's name.
    #[serde(default)]
    pub name: Option<String>,

    /// User's roles.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Custom role claim (alternative to roles array).
    #[serde(default)]
    pub role: Option<String>,
}

impl Claims {
    /// Highest role granted by either the `role` claim or the `roles` array.
    pub fn effective_role(&self) -> Role {
        self.role
            .iter()
            .chain(self.roles.iter())
            .filter_map(|r| r.parse::<Role>().ok())
            .max_by_key(|r| match r {
                Role::User => 0,
                Role::Service => 1,
                Role::Admin => 2,
            })
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.sub)
    }
}

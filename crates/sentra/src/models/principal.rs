use serde::{Deserialize, Serialize};

/// Closed set of roles known to the gateway.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    User,
    Guest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::User => "user",
            Role::Guest => "guest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "user" => Some(Role::User),
            "guest" => Some(Role::Guest),
            _ => None,
        }
    }
}

/// Closed set of permissions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    #[serde(rename = "create:users")]
    CreateUsers,
    #[serde(rename = "read:users")]
    ReadUsers,
    #[serde(rename = "update:users")]
    UpdateUsers,
    #[serde(rename = "delete:users")]
    DeleteUsers,
    #[serde(rename = "configure:routes")]
    ConfigureRoutes,
    #[serde(rename = "view:metrics")]
    ViewMetrics,
    #[serde(rename = "manage:rate_limits")]
    ManageRateLimits,
    #[serde(rename = "view:logs")]
    ViewLogs,
    #[serde(rename = "manage:system")]
    ManageSystem,
    #[serde(rename = "access:admin")]
    AccessAdmin,
}

impl Permission {
    pub const ALL: &'static [Permission] = &[
        Permission::CreateUsers,
        Permission::ReadUsers,
        Permission::UpdateUsers,
        Permission::DeleteUsers,
        Permission::ConfigureRoutes,
        Permission::ViewMetrics,
        Permission::ManageRateLimits,
        Permission::ViewLogs,
        Permission::ManageSystem,
        Permission::AccessAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::CreateUsers => "create:users",
            Permission::ReadUsers => "read:users",
            Permission::UpdateUsers => "update:users",
            Permission::DeleteUsers => "delete:users",
            Permission::ConfigureRoutes => "configure:routes",
            Permission::ViewMetrics => "view:metrics",
            Permission::ManageRateLimits => "manage:rate_limits",
            Permission::ViewLogs => "view:logs",
            Permission::ManageSystem => "manage:system",
            Permission::AccessAdmin => "access:admin",
        }
    }
}

/// Static role-to-permission assignment. Admin holds everything, guest
/// nothing; moderators get the read-mostly operational subset.
pub fn permissions_for(role: Role) -> &'static [Permission] {
    match role {
        Role::Admin => Permission::ALL,
        Role::Moderator => &[
            Permission::ReadUsers,
            Permission::UpdateUsers,
            Permission::ViewMetrics,
            Permission::ViewLogs,
            Permission::AccessAdmin,
        ],
        Role::User => &[Permission::ReadUsers],
        Role::Guest => &[],
    }
}

/// Authenticated identity carried on every non-public request.
///
/// Constructed by the token verifier from validated claims and consumed by
/// the authorizer; also used as a rate-limit scope.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Principal {
    pub id: String,
    pub username: String,
    pub email: String,
    pub roles: Vec<Role>,
    /// Directly granted permissions, on top of whatever the roles imply.
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

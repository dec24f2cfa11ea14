//! Permission scopes as a small immutable bitset with an OAuth2 string codec.

use super::types::AuthError;

/// Named permission bits of the membership service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Basic signed-in user.
    User,
    /// Club member data access.
    Member,
    /// Privacy-restricted member fields.
    Privacy,
    /// Club and officer management.
    Management,
    /// Self-service profile updates.
    Update,
}

impl Permission {
    /// All permissions in canonical table order. The order determines the
    /// output of `Scope::encode` and nothing else.
    pub const ALL: [Permission; 5] = [
        Permission::User,
        Permission::Member,
        Permission::Privacy,
        Permission::Management,
        Permission::Update,
    ];

    fn mask(self) -> u8 {
        match self {
            Permission::User => 1 << 0,
            Permission::Member => 1 << 1,
            Permission::Privacy => 1 << 2,
            Permission::Management => 1 << 3,
            Permission::Update => 1 << 4,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Permission::User => "user",
            Permission::Member => "member",
            Permission::Privacy => "privacy",
            Permission::Management => "management",
            Permission::Update => "update",
        }
    }
}

/// Immutable set of granted permissions.
///
/// Construction always starts from `Scope::empty()`; `set` returns a new
/// value instead of mutating, so scopes can be shared freely across tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Scope(u8);

impl Scope {
    /// The scope granting nothing.
    pub fn empty() -> Scope {
        Scope(0)
    }

    /// Returns a copy of this scope with `permission` granted.
    #[must_use]
    pub fn set(self, permission: Permission) -> Scope {
        Scope(self.0 | permission.mask())
    }

    /// Whether `permission` is granted.
    pub fn is_set(self, permission: Permission) -> bool {
        self.0 & permission.mask() != 0
    }

    /// Whether any permission of `other` is also granted here.
    pub fn is_set_any(self, other: Scope) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every permission of `required` is granted here.
    pub fn contains(self, required: Scope) -> bool {
        self.0 & required.0 == required.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Space-separated canonical names of all set bits, in table order.
    /// The empty scope encodes to the empty string.
    pub fn encode(self) -> String {
        let names: Vec<&str> = Permission::ALL
            .into_iter()
            .filter(|p| self.is_set(*p))
            .map(Permission::name)
            .collect();
        names.join(" ")
    }

    /// Parses an OAuth2 scope string. The empty string decodes to the empty
    /// scope; any token missing from the table is a hard error naming the
    /// offender, never a partial decode.
    pub fn decode(encoded: &str) -> Result<Scope, AuthError> {
        if encoded.is_empty() {
            return Ok(Scope::empty());
        }
        let mut scope = Scope::empty();
        for token in encoded.split(' ') {
            let permission = Permission::ALL
                .into_iter()
                .find(|p| p.name() == token)
                .ok_or_else(|| AuthError::UnknownScope(token.to_string()))?;
            scope = scope.set(permission);
        }
        Ok(scope)
    }
}

//! Registry of scopes that clients may request

use super::service::Service;
use super::types::{Action, Scope, ScopeError, ScopeResult, ALIASES};

/// Permissions registered per service, in registration order
const REGISTERED_PERMISSIONS: &[(Service, &[&str])] = &[
    (Service::CodyGateway, &["flaggedprompts"]),
    (
        Service::Sams,
        &[
            "user",
            "user.profile",
            "user.roles",
            "user.metadata",
            "user.metadata.cody",
            "user.metadata.dotcom",
            "session",
        ],
    ),
    (Service::TelemetryGateway, &["events"]),
    (
        Service::EnterprisePortal,
        &["subscription", "permission.subscription", "codyaccess"],
    ),
    (
        Service::Workspaces,
        &["workspace", "instance", "permission.workspace"],
    ),
];

/// The full list of allowed scopes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedScopes(Vec<Scope>);

impl AllowedScopes {
    /// Exact membership; no hierarchy traversal
    pub fn contains(&self, scope: &str) -> bool {
        self.0.iter().any(|allowed| allowed.as_str() == scope)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scope> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Scope] {
        &self.0
    }
}

/// Returns every scope a client may be granted: the aliases, followed by
/// each registered permission with every action.
pub fn allowed() -> AllowedScopes {
    let mut scopes: Vec<Scope> = ALIASES.iter().map(|alias| Scope::new(*alias)).collect();

    for (service, permissions) in REGISTERED_PERMISSIONS {
        for permission in *permissions {
            for action in Action::ALL {
                scopes.push(Scope::structured(service.as_str(), permission, action));
            }
        }
    }

    AllowedScopes(scopes)
}

/// Validates a scope for registration and checks that it is allowed
pub fn validate_registered(scope: &Scope) -> ScopeResult<()> {
    scope.validate()?;
    if !allowed().contains(scope.as_str()) {
        return Err(ScopeError::NotAllowed(scope.to_string()));
    }
    Ok(())
}

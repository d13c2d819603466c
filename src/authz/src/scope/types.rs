/// Scope type definitions and validation
///
/// A scope is either structured (`service::permission::action`) or one of a
/// fixed set of flat alias literals inherited from OAuth/OIDC and legacy
/// clients. Parsing is structural and allocation-free; validation against the
/// identifier patterns happens separately, at registration time.

use std::fmt;
use std::str::FromStr;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the three parts of a structured scope
pub const SEPARATOR: &str = "::";

/// Separator between permission segments
pub const PERMISSION_SEPARATOR: char = '.';

/// Scopes longer than this are rejected at validation time
pub const MAX_SCOPE_LEN: usize = 255;

/// OIDC: request an ID token
pub const OPENID: &str = "openid";
/// OIDC: basic profile; also grants `sams::user.profile::read`
pub const PROFILE: &str = "profile";
/// OIDC: email address
pub const EMAIL: &str = "email";
/// OAuth: refresh tokens
pub const OFFLINE_ACCESS: &str = "offline_access";
/// Legacy client scope for Self Serve Cody
pub const CLIENT_SSC: &str = "client.ssc";
/// Legacy client scope for Sourcegraph.com
pub const CLIENT_DOTCOM: &str = "client.dotcom";

/// Every alias literal, in registration order
pub const ALIASES: [&str; 6] = [
    OPENID,
    PROFILE,
    EMAIL,
    OFFLINE_ACCESS,
    CLIENT_SSC,
    CLIENT_DOTCOM,
];

pub(crate) static SERVICE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("service pattern compiles"));

pub(crate) static PERMISSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_]+(\.[a-z0-9_]+)*$").expect("permission pattern compiles")
});

pub(crate) static ACTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(read|write|delete)$").expect("action pattern compiles"));

/// Result type for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors raised when validating a scope for registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// Empty scope string provided
    #[error("scope cannot be empty")]
    EmptyScope,

    /// Scope exceeds `MAX_SCOPE_LEN`
    #[error("scope is {0} characters long, maximum is {max}", max = MAX_SCOPE_LEN)]
    TooLong(usize),

    /// Neither a structured scope nor a known alias
    #[error("malformed scope: {0:?}")]
    Malformed(String),

    /// Service part does not match the identifier pattern
    #[error("invalid service {0:?}")]
    InvalidService(String),

    /// Permission part does not match the identifier pattern
    #[error("invalid permission {0:?}")]
    InvalidPermission(String),

    /// Action is outside the closed vocabulary
    #[error("invalid action {0:?}")]
    InvalidAction(String),

    /// Well-formed but not in the allowed registry
    #[error("scope {0:?} is not allowed")]
    NotAllowed(String),

    /// Permission is not under `user.metadata`
    #[error("permission {0:?} is not a metadata permission")]
    NotMetadataPermission(String),
}

/// Closed vocabulary of scope actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl Action {
    /// All actions, in registration order
    pub const ALL: [Action; 3] = [Action::Read, Action::Write, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
        }
    }
}

impl FromStr for Action {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Action::Read),
            "write" => Ok(Action::Write),
            "delete" => Ok(Action::Delete),
            other => Err(ScopeError::InvalidAction(other.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decomposition of a structured scope
///
/// Borrows from the raw string it was parsed from, so parsing never
/// allocates. The permission is kept as its dotted form; use
/// [`ParsedScope::segments`] for the ordered hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParsedScope<'a> {
    pub service: &'a str,
    pub permission: &'a str,
    pub action: &'a str,
}

impl<'a> ParsedScope<'a> {
    /// Ordered permission segments, broadest first
    pub fn segments(&self) -> impl Iterator<Item = &'a str> {
        self.permission.split(PERMISSION_SEPARATOR)
    }

    /// Number of permission segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Returns whether this scope's permission is a dot-boundary prefix of
    /// (or equal to) `other`'s permission. Service and action are not
    /// considered.
    ///
    /// `user` covers `user.metadata`, never the reverse, and `user` does not
    /// cover `username`.
    pub fn permission_covers(&self, other: &ParsedScope<'_>) -> bool {
        match other.permission.strip_prefix(self.permission) {
            Some("") => true,
            Some(rest) => rest.starts_with(PERMISSION_SEPARATOR),
            None => false,
        }
    }

    /// Validates every part against the registration patterns
    pub fn validate(&self) -> ScopeResult<()> {
        if !SERVICE_REGEX.is_match(self.service) {
            return Err(ScopeError::InvalidService(self.service.to_string()));
        }
        if !PERMISSION_REGEX.is_match(self.permission) {
            return Err(ScopeError::InvalidPermission(self.permission.to_string()));
        }
        if !ACTION_REGEX.is_match(self.action) {
            return Err(ScopeError::InvalidAction(self.action.to_string()));
        }
        Ok(())
    }
}

impl fmt::Display for ParsedScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.service, self.permission, self.action
        )
    }
}

/// Splits a structured scope into its three parts.
///
/// Fails when the separator count is wrong, any part is empty, or the
/// permission has an empty segment (leading, trailing or doubled dot).
pub fn parse(raw: &str) -> Option<ParsedScope<'_>> {
    let mut parts = raw.split(SEPARATOR);
    let service = parts.next()?;
    let permission = parts.next()?;
    let action = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    if service.is_empty() || permission.is_empty() || action.is_empty() {
        return None;
    }
    if permission.split(PERMISSION_SEPARATOR).any(str::is_empty) {
        return None;
    }

    Some(ParsedScope {
        service,
        permission,
        action,
    })
}

/// Returns whether `raw` is one of the fixed alias literals
pub fn is_alias(raw: &str) -> bool {
    ALIASES.contains(&raw)
}

/// Resolves an alias to the structured scope it grants, if any.
///
/// Only `profile` has a structured equivalent; the other aliases are
/// self-matching literals.
pub fn resolve_alias(raw: &str) -> Option<ParsedScope<'static>> {
    match raw {
        PROFILE => Some(ParsedScope {
            service: "sams",
            permission: "user.profile",
            action: "read",
        }),
        _ => None,
    }
}

/// Returns whether `raw` can never take part in a successful match
pub fn is_malformed(raw: &str) -> bool {
    !is_alias(raw) && parse(raw).is_none()
}

/// Extracts the metadata namespace from a `user.metadata` permission.
///
/// `user.metadata` yields `*`, `user.metadata.cody` yields `cody`.
pub fn permission_to_metadata_scope(permission: &str) -> ScopeResult<&str> {
    const PREFIX: &str = "user.metadata";
    match permission.strip_prefix(PREFIX) {
        Some("") => Ok("*"),
        Some(rest) => rest
            .strip_prefix(PERMISSION_SEPARATOR)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ScopeError::NotMetadataPermission(permission.to_string())),
        None => Err(ScopeError::NotMetadataPermission(permission.to_string())),
    }
}

/// A scope as it appears on the wire
///
/// Holds the raw string without validating it: tokens may carry scopes this
/// build does not know about, and malformed values must still round-trip
/// through logs and telemetry. Use [`Scope::parse`] or [`Scope::validate`]
/// to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(String);

impl Scope {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a structured scope from its parts
    pub fn structured(service: &str, permission: &str, action: Action) -> Self {
        Self(format!("{service}{SEPARATOR}{permission}{SEPARATOR}{action}"))
    }

    /// Returns the raw scope string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn parse(&self) -> Option<ParsedScope<'_>> {
        parse(&self.0)
    }

    pub fn is_alias(&self) -> bool {
        is_alias(&self.0)
    }

    pub fn is_malformed(&self) -> bool {
        is_malformed(&self.0)
    }

    /// Checks that this scope is fit for registration: a known alias, or a
    /// structured scope whose parts match the identifier patterns and whose
    /// total length is within `MAX_SCOPE_LEN`.
    pub fn validate(&self) -> ScopeResult<()> {
        if self.0.is_empty() {
            return Err(ScopeError::EmptyScope);
        }
        if self.0.len() > MAX_SCOPE_LEN {
            return Err(ScopeError::TooLong(self.0.len()));
        }
        if self.is_alias() {
            return Ok(());
        }
        self.parse()
            .ok_or_else(|| ScopeError::Malformed(self.0.clone()))?
            .validate()
    }
}

impl From<&str> for Scope {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Scope {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Scope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Converts scopes to their raw strings
pub fn to_strings(scopes: &[Scope]) -> Vec<String> {
    scopes.iter().map(|s| s.0.clone()).collect()
}

/// Converts raw strings to scopes without validating them
pub fn to_scopes<S: AsRef<str>>(raw: &[S]) -> Vec<Scope> {
    raw.iter().map(|s| Scope::new(s.as_ref())).collect()
}

/// Splits an OAuth `scope` claim (space separated) into scopes, dropping
/// empty entries
pub fn parse_scope_list(claim: &str) -> Vec<Scope> {
    claim.split_whitespace().map(Scope::new).collect()
}

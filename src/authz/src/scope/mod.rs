//! Permission scopes and the matching engine
//!
//! This module provides the scope data model (structured
//! `service::permission::action` scopes and the fixed alias literals), the
//! hierarchical matching predicate used on every authenticated request, and
//! the registry of allowed scopes.
//!
//! # Examples
//!
//! ```
//! use accounts_authz::scope::{strategy, PROFILE};
//!
//! // Broad permissions cover their specializations...
//! assert!(strategy(&["sams::user::read"], "sams::user.metadata.cody::read"));
//! // ...never the reverse.
//! assert!(!strategy(&["sams::user.metadata::read"], "sams::user::read"));
//! // `profile` grants read access to the user profile only.
//! assert!(strategy(&[PROFILE], "sams::user.profile::read"));
//! assert!(!strategy(&[PROFILE], "sams::user.profile::write"));
//! ```

mod allowed;
mod service;
mod strategy;
mod types;

#[cfg(test)]
mod tests;

pub use allowed::{allowed, validate_registered, AllowedScopes};
pub use service::Service;
pub use strategy::{strategy, Scopes};
pub use types::{
    is_alias, is_malformed, parse, parse_scope_list, permission_to_metadata_scope,
    resolve_alias, to_scopes, to_strings, Action, ParsedScope, Scope, ScopeError, ScopeResult,
    ALIASES, CLIENT_DOTCOM, CLIENT_SSC, EMAIL, MAX_SCOPE_LEN, OFFLINE_ACCESS, OPENID,
    PERMISSION_SEPARATOR, PROFILE, SEPARATOR,
};

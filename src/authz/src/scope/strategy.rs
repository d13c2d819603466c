/// Scope matching
///
/// Decides whether the scopes granted to a credential satisfy a scope that
/// an endpoint requires. Matching is pure and allocation-free, so it can run
/// on every request without synchronization.

use serde::{Deserialize, Serialize};

use super::types::{is_alias, parse, resolve_alias, ParsedScope, Scope};

/// Returns whether any of `matchers` satisfies `needle`.
///
/// - A malformed needle never matches.
/// - Malformed matchers are skipped.
/// - Identical strings match (both are then well-formed).
/// - An alias matcher with a structured equivalent matches that exact scope,
///   with no hierarchy traversal.
/// - Structured scopes match when service and action are equal and the
///   matcher's permission is a dot-boundary prefix of the needle's.
///
/// Broad permissions cover narrow ones, never the reverse:
/// `sams::user::read` satisfies `sams::user.metadata::read`, but
/// `sams::user.metadata::read` does not satisfy `sams::user::read`.
pub fn strategy<S: AsRef<str>>(matchers: &[S], needle: &str) -> bool {
    let needle_parsed = parse(needle);
    if needle_parsed.is_none() && !is_alias(needle) {
        return false;
    }

    matchers
        .iter()
        .any(|matcher| satisfies(matcher.as_ref(), needle, needle_parsed.as_ref()))
}

fn satisfies(
    matcher: &str,
    needle: &str,
    needle_parsed: Option<&ParsedScope<'_>>,
) -> bool {
    if matcher == needle {
        return true;
    }

    if is_alias(matcher) {
        return match (resolve_alias(matcher), needle_parsed) {
            (Some(resolved), Some(needle)) => resolved == *needle,
            _ => false,
        };
    }

    let (Some(matcher), Some(needle)) = (parse(matcher), needle_parsed) else {
        return false;
    };

    matcher.service == needle.service
        && matcher.action == needle.action
        && matcher.permission_covers(needle)
}

/// The set of scopes granted to a credential
///
/// Order is irrelevant and duplicates are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scopes(Vec<Scope>);

impl Scopes {
    pub fn new(scopes: Vec<Scope>) -> Self {
        Self(scopes)
    }

    /// Returns whether these scopes satisfy `required`
    pub fn matches(&self, required: &Scope) -> bool {
        strategy(&self.0, required.as_str())
    }

    /// Returns the first required scope these scopes do not satisfy
    pub fn first_unsatisfied<'r>(&self, required: &'r [Scope]) -> Option<&'r Scope> {
        required.iter().find(|scope| !self.matches(scope))
    }

    /// Returns whether every scope in `required` is satisfied
    pub fn matches_all(&self, required: &[Scope]) -> bool {
        self.first_unsatisfied(required).is_none()
    }

    pub fn as_slice(&self) -> &[Scope] {
        &self.0
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

    /// Raw scope strings, for logs and telemetry
    pub fn to_strings(&self) -> Vec<String> {
        super::types::to_strings(&self.0)
    }
}

impl From<Vec<Scope>> for Scopes {
    fn from(scopes: Vec<Scope>) -> Self {
        Self(scopes)
    }
}

impl<'a> FromIterator<&'a str> for Scopes {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(Scope::new).collect())
    }
}

impl FromIterator<Scope> for Scopes {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Scopes {
    type Item = &'a Scope;
    type IntoIter = std::slice::Iter<'a, Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Comprehensive test suite for the matching engine
///
/// Tests cover:
/// - Exact matching
/// - Hierarchical prefix matching and its asymmetry
/// - Alias and legacy scopes
/// - Malformed matchers and needles
/// - Property checks over generated scopes

use super::*;
use proptest::prelude::*;

struct Case {
    name: &'static str,
    matchers: &'static [&'static str],
    needle: &'static str,
    expected: bool,
}

const DEFAULT_OIDC: &[&str] = &[OPENID, PROFILE, EMAIL, OFFLINE_ACCESS];
const MALFORMED: &[&str] = &["", "sams::user", "sams::::read", "user::", "::user::read"];

const CASES: &[Case] = &[
    Case {
        name: "exact match",
        matchers: &["sams::user::read"],
        needle: "sams::user::read",
        expected: true,
    },
    Case {
        name: "permission prefix matching",
        matchers: &["sams::user::read"],
        needle: "sams::user.metadata::read",
        expected: true,
    },
    Case {
        name: "alias matching",
        matchers: &[PROFILE],
        needle: "sams::user.profile::read",
        expected: true,
    },
    Case {
        name: "complex alias matching",
        matchers: &["sams::user::read", PROFILE, "sams::user.roles::read"],
        needle: "sams::user.profile::read",
        expected: true,
    },
    Case {
        name: "default scopes matching - profile",
        matchers: DEFAULT_OIDC,
        needle: PROFILE,
        expected: true,
    },
    Case {
        name: "default scopes matching - openid",
        matchers: DEFAULT_OIDC,
        needle: OPENID,
        expected: true,
    },
    Case {
        name: "default scopes matching - email",
        matchers: DEFAULT_OIDC,
        needle: EMAIL,
        expected: true,
    },
    Case {
        name: "default scopes matching - offline_access",
        matchers: DEFAULT_OIDC,
        needle: OFFLINE_ACCESS,
        expected: true,
    },
    Case {
        name: "legacy scopes - client.dotcom",
        matchers: &[CLIENT_DOTCOM, CLIENT_SSC],
        needle: CLIENT_DOTCOM,
        expected: true,
    },
    Case {
        name: "legacy scopes - client.ssc",
        matchers: &[CLIENT_DOTCOM, CLIENT_SSC],
        needle: CLIENT_SSC,
        expected: true,
    },
    Case {
        name: "service mismatch but rest matching",
        matchers: &["ssc::user::read"],
        needle: "sams::user::read",
        expected: false,
    },
    Case {
        name: "service mismatch but rest matching with prefix",
        matchers: &["ssc::user::read"],
        needle: "sams::user.roles::read",
        expected: false,
    },
    Case {
        name: "permission mismatch but rest matching",
        matchers: &["ssc::user::read"],
        needle: "ssc::cody::read",
        expected: false,
    },
    Case {
        name: "permission mismatch with prefix",
        matchers: &["ssc::user::read"],
        needle: "ssc::cody.subscriptions::read",
        expected: false,
    },
    Case {
        name: "action mismatch but rest matching",
        matchers: &["sams::user::read"],
        needle: "sams::user::write",
        expected: false,
    },
    Case {
        name: "action mismatch but rest matching with prefix",
        matchers: &["sams::user::read"],
        needle: "sams::user.roles::write",
        expected: false,
    },
    Case {
        name: "narrower permission cannot match broader permission",
        matchers: &["sams::user.metadata::read"],
        needle: "sams::user::read",
        expected: false,
    },
    Case {
        name: "prefix must end on a segment boundary",
        matchers: &["sams::user::read"],
        needle: "sams::username::read",
        expected: false,
    },
    Case {
        name: "alias and action mismatch",
        matchers: &[PROFILE],
        needle: "sams::user.profile::write",
        expected: false,
    },
    Case {
        name: "alias does not traverse the hierarchy",
        matchers: &[PROFILE],
        needle: "sams::user.profile.avatar::read",
        expected: false,
    },
    Case {
        name: "structured scope does not satisfy an alias needle",
        matchers: &["sams::user.profile::read"],
        needle: PROFILE,
        expected: false,
    },
    Case {
        name: "malformed matcher",
        matchers: MALFORMED,
        needle: "sams::user::read",
        expected: false,
    },
    Case {
        name: "malformed needle",
        matchers: &[PROFILE],
        needle: "sams::user.profile",
        expected: false,
    },
    Case {
        name: "malformed matcher and needle but matching literals",
        matchers: MALFORMED,
        needle: "sams::user",
        expected: false,
    },
    Case {
        name: "empty matchers",
        matchers: &[],
        needle: "sams::user::read",
        expected: false,
    },
];

// ============================================================================
// Strategy Table Tests
// ============================================================================

#[test]
fn test_strategy_table() {
    for case in CASES {
        assert_eq!(
            strategy(case.matchers, case.needle),
            case.expected,
            "case {:?}",
            case.name
        );
    }
}

#[test]
fn test_strategy_accepts_owned_scopes() {
    let granted = vec![Scope::new("sams::user.metadata::read")];
    assert!(strategy(&granted, "sams::user.metadata.cody::read"));
    assert!(!strategy(&granted, "sams::user::read"));
}

#[test]
fn test_strategy_is_order_and_duplicate_insensitive() {
    let needle = "sams::user.roles::read";
    let a = ["profile", "sams::user::read", "sams::user::read"];
    let b = ["sams::user::read", "profile"];
    assert_eq!(strategy(&a, needle), strategy(&b, needle));
    assert!(strategy(&a, needle));
}

// ============================================================================
// Malformed Input Tests
// ============================================================================

#[test]
fn test_identical_malformed_strings_never_match() {
    for raw in MALFORMED {
        assert!(is_malformed(raw));
        assert!(!strategy(&[*raw], raw), "{raw:?}");
    }
}

#[test]
fn test_every_alias_matches_itself() {
    for alias in ALIASES {
        assert!(strategy(&[alias], alias), "{alias}");
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn permission() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..4)
}

fn structured(service: &str, permission: &[String], action: Action) -> String {
    Scope::structured(service, &permission.join("."), action).to_string()
}

proptest! {
    #[test]
    fn prop_prefix_rule_is_asymmetric(
        a in permission(),
        b in permission(),
        action in prop::sample::select(Action::ALL.to_vec()),
    ) {
        let scope_a = structured("sams", &a, action);
        let scope_b = structured("sams", &b, action);
        let a_covers_b = b.starts_with(&a);
        let b_covers_a = a.starts_with(&b);

        prop_assert_eq!(strategy(&[&scope_a], &scope_b), a_covers_b);
        prop_assert_eq!(strategy(&[&scope_b], &scope_a), b_covers_a);
        if a_covers_b && b_covers_a {
            prop_assert_eq!(&a, &b);
        }
    }

    #[test]
    fn prop_extending_a_permission_is_covered(
        base in permission(),
        extra in permission(),
    ) {
        let broad = structured("sams", &base, Action::Read);
        let narrow_path: Vec<String> = base.iter().chain(extra.iter()).cloned().collect();
        let narrow = structured("sams", &narrow_path, Action::Read);

        prop_assert!(strategy(&[&broad], &narrow));
        prop_assert!(!strategy(&[&narrow], &broad));
    }

    #[test]
    fn prop_service_or_action_mismatch_never_matches(
        a in permission(),
        extra in prop::collection::vec(segment(), 0..3),
    ) {
        let narrow: Vec<String> = a.iter().chain(extra.iter()).cloned().collect();

        let other_service = structured("ssc", &a, Action::Read);
        prop_assert!(!strategy(&[&other_service], &structured("sams", &narrow, Action::Read)));

        let other_action = structured("sams", &a, Action::Write);
        prop_assert!(!strategy(&[&other_action], &structured("sams", &narrow, Action::Read)));
    }

    #[test]
    fn prop_empty_matchers_never_match(needle in ".*") {
        let empty: [&str; 0] = [];
        prop_assert!(!strategy(&empty, &needle));
    }
}

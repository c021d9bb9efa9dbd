//! Property-based tests for token issuance and verification

use std::collections::HashMap;
use std::time::Duration;

use proptest::prelude::*;
use turbosession::{Claims, TokenError, TokenIssuer, TokenKind};

/// Strategy for claim sets with arbitrary printable attributes
fn claims_strategy() -> impl Strategy<Value = Claims> {
    (
        "[a-zA-Z0-9_@.-]{1,32}",
        "[a-f0-9-]{8,36}",
        prop::collection::hash_map("[a-z_]{1,12}", "\\PC{0,24}", 0..6),
    )
        .prop_map(|(subject, session_id, data)| Claims::new(subject, session_id, data))
}

/// Strategy for (access, refresh) lifetimes in seconds with access < refresh
fn ttl_strategy() -> impl Strategy<Value = (u64, u64)> {
    (1u64..=86_400).prop_flat_map(|access| (Just(access), (access + 1)..=access * 30 + 1))
}

fn issuer(secret: &str, (access, refresh): (u64, u64)) -> TokenIssuer {
    TokenIssuer::new(
        secret,
        Duration::from_secs(access),
        Duration::from_secs(refresh),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: Both tokens of a pair carry the original identity and their own lifetime
    #[test]
    fn prop_pair_round_trips(claims in claims_strategy(), ttls in ttl_strategy()) {
        let issuer = issuer("property-secret", ttls);
        let pair = issuer.issue_pair(&claims).unwrap();

        let access = issuer.verify_access(&pair.access_token).unwrap();
        prop_assert!(access.same_identity(&claims));
        prop_assert_eq!(access.kind, TokenKind::Access);
        prop_assert_eq!(access.exp - access.iat, ttls.0);

        let refresh = issuer.verify_refresh(&pair.refresh_token).unwrap();
        prop_assert!(refresh.same_identity(&claims));
        prop_assert_eq!(refresh.kind, TokenKind::Refresh);
        prop_assert_eq!(refresh.exp - refresh.iat, ttls.1);

        prop_assert_ne!(access.jti, refresh.jti);
    }

    /// Property: A token never verifies under a different secret
    #[test]
    fn prop_foreign_secret_rejected(
        claims in claims_strategy(),
        secret in "[a-z0-9]{8,32}",
        other in "[A-Z0-9]{8,32}",
    ) {
        let signer = issuer(&secret, (60, 3600));
        let verifier = issuer(&other, (60, 3600));
        let token = signer.issue_access(&claims).unwrap();

        prop_assert_eq!(verifier.verify(&token), Err(TokenError::InvalidSignature));
    }

    /// Property: Grafting one token's signature onto another's payload is detected
    #[test]
    fn prop_spliced_token_rejected(first in claims_strategy(), second in claims_strategy()) {
        let issuer = issuer("property-secret", (60, 3600));
        let a = issuer.issue_access(&first).unwrap();
        let b = issuer.issue_access(&second).unwrap();

        let (b_signed_part, _) = b.rsplit_once('.').unwrap();
        let (_, a_signature) = a.rsplit_once('.').unwrap();
        let spliced = format!("{b_signed_part}.{a_signature}");

        prop_assert_eq!(issuer.verify(&spliced), Err(TokenError::InvalidSignature));
    }

    /// Property: Arbitrary text is never accepted as a token
    #[test]
    fn prop_garbage_rejected(input in "\\PC{0,200}") {
        let issuer = issuer("property-secret", (60, 3600));
        prop_assert!(issuer.verify(&input).is_err());
    }
}

#[test]
fn test_kinds_are_not_interchangeable() {
    let issuer = issuer("property-secret", (60, 3600));
    let pair = issuer
        .issue_pair(&Claims::new("u1", "s1", HashMap::new()))
        .unwrap();

    assert!(matches!(
        issuer.verify_access(&pair.refresh_token),
        Err(TokenError::WrongKind { .. })
    ));
    assert!(matches!(
        issuer.verify_refresh(&pair.access_token),
        Err(TokenError::WrongKind { .. })
    ));
}

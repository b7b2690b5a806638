//! End-to-end decision tests through the public API

use incremental_authz::authz::{
    Contribution, Expression, PipelineStep, ResolveRequestStep, StepStatus,
};
use incremental_authz::{
    Attribute, Attributes, AuthContext, AuthRequest, Authorization, Authorizer, AuthzError,
    Effect, PolicyDocument, RequestTarget, Statement, StaticContributor, StringExpression,
    TargetSpec, WildcardMatcher,
};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn policy(statements: Vec<Statement>) -> PolicyDocument {
    let mut policy = PolicyDocument::new();
    for statement in statements {
        policy.add_statement(statement);
    }
    policy
}

#[test]
fn test_first_conclusive_deny() {
    let policy = policy(vec![
        Statement::new("deny-blacklist", Effect::Deny)
            .with_resources(["resources/*"])
            .with_principals(["blacklist"])
            .with_actions(["actions/*"]),
        Statement::new("allow-resource1", Effect::Allow)
            .with_resources(["resources/${r}"])
            .with_principals(["*"])
            .with_actions(["actions/action1"]),
    ]);

    let ctx = AuthContext::builder()
        .statement_source(policy)
        .principal("blacklist")
        .target(RequestTarget::new("resources/resource1", "actions/action1"))
        .profile_contributor(StaticContributor::from_pairs("ids", [("r", "resource1")]))
        .build();

    let decision = Authorizer::new_default().decide(ctx).unwrap();
    assert_eq!(decision.status, StepStatus::Stop);
    assert_eq!(decision.statement_id.as_deref(), Some("deny-blacklist"));
}

#[test]
fn test_exact_match_with_contributor() {
    let policy = policy(vec![Statement::new("stmt1", Effect::Allow)
        .with_resources(["resources/${r1}"])
        .with_principals(["principals/p1"])
        .with_actions(["actions/action1"])]);

    let ctx = AuthContext::builder()
        .statement_source(policy)
        .principal("principals/p1")
        .target(RequestTarget::new("resources/resource1", "actions/action1"))
        .profile_contributor(StaticContributor::from_pairs("id1", [("r1", "resource1")]))
        .build();

    let decision = Authorizer::new_default().decide(ctx).unwrap();
    assert!(decision.is_authorized());
    assert_eq!(decision.statement_id.as_deref(), Some("stmt1"));
}

#[test]
fn test_contributors_stop_after_decision() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let expensive = move |_: &AuthContext| -> anyhow::Result<Contribution> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Contribution::new(
            "directory",
            Attributes::from_pairs([("team", "core")]),
        ))
    };

    let policy = policy(vec![Statement::new("static", Effect::Allow)
        .with_resources(["docs/*"])
        .with_principals(["users/alice"])
        .with_actions(["read"])]);

    let ctx = AuthContext::builder()
        .statement_source(policy)
        .principal("users/alice")
        .target(RequestTarget::new("docs/a", "read"))
        .profile_contributor(expensive)
        .build();

    let decision = Authorizer::new_default().decide(ctx).unwrap();
    assert!(decision.is_authorized());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_contributor_failure_propagates() {
    let failing = |_: &AuthContext| -> anyhow::Result<Contribution> {
        Err(anyhow::anyhow!("directory timeout"))
    };
    let ctx = AuthContext::builder()
        .principal("users/alice")
        .target(RequestTarget::new("docs/${doc}", "read"))
        .request_contributor(failing)
        .build();

    let err = Authorizer::new_default().decide(ctx).unwrap_err();
    match err {
        AuthzError::Contributor { contributor, source } => {
            assert_eq!(contributor, 0);
            assert!(source.to_string().contains("timeout"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_fan_out_across_rounds() {
    let ctx = AuthContext::builder()
        .target(RequestTarget::new("resources/${a}", "read"))
        .request_contributor(StaticContributor::from_pairs("first", [("a", "x")]))
        .request_contributor(StaticContributor::from_pairs("second", [("a", "y")]))
        .build();

    let result = ResolveRequestStep::new().execute(ctx).unwrap();
    let resources: Vec<&str> = result.context.request().resources().into_iter().collect();
    assert_eq!(resources, vec!["resources/x", "resources/y"]);
}

#[test]
fn test_target_with_three_keys_from_one_contributor() {
    let ctx = AuthContext::builder()
        .target(RequestTarget::new("${a}/${b}/${c}", "read"))
        .request_contributor(StaticContributor::from_pairs(
            "path",
            [("a", "1"), ("b", "2"), ("c", "3")],
        ))
        .build();

    let result = ResolveRequestStep::new().execute(ctx).unwrap();
    assert_eq!(result.status, StepStatus::Continue);
    assert_eq!(result.context.request(), &AuthRequest::single("1/2/3", "read"));
}

#[test]
fn test_dropped_unresolved_target() {
    let ctx = AuthContext::builder()
        .target(RequestTarget::new("resources/${never}", "read"))
        .target(RequestTarget::new("resources/static", "read"))
        .request_contributor(StaticContributor::from_pairs("ids", [("other", "1")]))
        .build();

    let result = ResolveRequestStep::new().execute(ctx).unwrap();
    assert_eq!(result.status, StepStatus::Continue);
    assert_eq!(
        result.context.request(),
        &AuthRequest::single("resources/static", "read")
    );
}

#[test]
fn test_handler_metadata_drives_decision() {
    let auth = Authorization::new([TargetSpec::new(
        ["documents/${documentId}"],
        ["documents:read"],
    )]);
    let policy = policy(vec![Statement::new("own", Effect::Allow)
        .with_resources(["documents/*"])
        .with_principals(["users/${user}"])
        .with_actions(["documents:read"])]);

    let decision = Authorizer::new_default()
        .authorize(
            BTreeSet::from(["users/alice".to_string()]),
            auth.to_request(),
            Arc::new(policy),
            vec![Arc::new(StaticContributor::from_pairs(
                "path",
                [("documentId", "42")],
            ))],
            vec![Arc::new(StaticContributor::from_pairs(
                "session",
                [("user", "alice")],
            ))],
        )
        .unwrap();

    assert!(decision.is_authorized());
    assert_eq!(decision.statement_id.as_deref(), Some("own"));
}

#[test]
fn test_concurrent_decisions_share_cache() {
    let authorizer = Arc::new(Authorizer::new_default());
    let policy = Arc::new(policy(vec![Statement::new("users", Effect::Allow)
        .with_resources(["users/*/profile"])
        .with_actions(["read"])]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let authorizer = Arc::clone(&authorizer);
            let policy = Arc::clone(&policy);
            std::thread::spawn(move || {
                for j in 0..50 {
                    let ctx = AuthContext::default()
                        .with_principals(BTreeSet::from([format!("users/{}", i)]))
                        .with_request(AuthRequest::single(
                            format!("users/{}/profile", j),
                            "read",
                        ))
                        .with_statement_source(policy.clone());
                    assert!(authorizer.decide(ctx).unwrap().is_authorized());
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(authorizer.cache_size(), 2);
}

#[test]
fn test_separator_respecting_wildcard() {
    let matcher = WildcardMatcher::new("Hello, *!");
    assert!(matcher.matches("Hello, world!").unwrap());
    assert!(matcher.matches("Hello, a:b!").unwrap());
    assert!(!matcher.matches("Hello, a/b!").unwrap());
    assert!(!matcher.matches("Hello, !").unwrap());
}

proptest! {
    #[test]
    fn prop_resolved_is_terminal(
        text in "[a-z/]{1,12}",
        key in "[a-z]{1,3}",
        value in "[a-z${}]{0,6}",
    ) {
        let expr = StringExpression::new(text);
        prop_assert_eq!(expr.enhance(&Attribute::new(key, value)), expr.clone());
    }

    #[test]
    fn prop_absent_key_is_noop(
        key in "[a-f]{1,3}",
        other in "[g-m]{1,3}",
        value in "[a-z]{1,4}",
    ) {
        let expr = StringExpression::new(format!("resources/${{{}}}", key));
        let enhanced = expr.enhance(&Attribute::new(other, value));
        prop_assert_eq!(enhanced.value(), expr.value());
    }

    #[test]
    fn prop_default_deny_without_statements(
        principal in "[a-z]{1,8}",
        resource in "[a-z/]{1,12}",
    ) {
        let ctx = AuthContext::builder()
            .principal(principal)
            .target(RequestTarget::new(resource, "read"))
            .build();
        let decision = Authorizer::new_default().decide(ctx).unwrap();
        prop_assert_eq!(decision.status, StepStatus::Stop);
        prop_assert!(decision.statement_id.is_none());
    }
}

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use incremental_authz::{
    AuthContext, Authorizer, Effect, PolicyDocument, RequestTarget, Statement, StaticContributor,
    WildcardMatcher,
};

/// Create a policy with a mix of static and templated statements
fn create_complex_policy(extra: usize) -> PolicyDocument {
    let mut policy = PolicyDocument::new();

    policy.add_statement(
        Statement::new("public-read", Effect::Allow)
            .with_resources(["public/*"])
            .with_actions(["read"]),
    );

    policy.add_statement(
        Statement::new("own-documents", Effect::Allow)
            .with_resources(["users/${user}/documents/*"])
            .with_principals(["users/${user}"])
            .with_actions(["read", "write"]),
    );

    policy.add_statement(
        Statement::new("system-deny", Effect::Deny)
            .with_resources(["system/*"])
            .with_actions(["write"]),
    );

    for i in 0..extra {
        policy.add_statement(
            Statement::new(format!("project-{}", i), Effect::Allow)
                .with_resources([format!("projects/{}/${{team}}/*", i)])
                .with_principals(["groups/${team}"])
                .with_actions(["read"]),
        );
    }

    policy
}

fn context(policy: &PolicyDocument, resource: String) -> AuthContext {
    AuthContext::builder()
        .statement_source(policy.clone())
        .principal("users/alice")
        .target(RequestTarget::new(resource, "write"))
        .profile_contributor(StaticContributor::from_pairs("session", [("user", "alice")]))
        .build()
}

/// Benchmark decisions with a warm matcher cache
fn bench_decision_cached(c: &mut Criterion) {
    let eval_counts = vec![10, 100, 1_000];

    let mut group = c.benchmark_group("decision_cached");

    for count in eval_counts {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let policy = create_complex_policy(0);
            let authorizer = Authorizer::new_default();

            b.iter(|| {
                for _ in 0..count {
                    let ctx = context(&policy, "users/alice/documents/report.txt".to_string());
                    let decision = authorizer.decide(ctx).unwrap();
                    black_box(decision.is_authorized());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark decisions with a fresh authorizer each time (cold cache)
fn bench_decision_uncached(c: &mut Criterion) {
    let eval_counts = vec![10, 100, 500];

    let mut group = c.benchmark_group("decision_uncached");

    for count in eval_counts {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let policy = create_complex_policy(0);

            b.iter(|| {
                let authorizer = Authorizer::new_default();
                for i in 0..count {
                    let ctx = context(&policy, format!("users/alice/documents/file_{}.txt", i));
                    let decision = authorizer.decide(ctx).unwrap();
                    black_box(decision.is_authorized());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark wildcard matching
fn bench_wildcard_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("wildcard_matching");

    group.bench_function("literal", |b| {
        let matcher = WildcardMatcher::new("users/alice/documents");
        b.iter(|| {
            for i in 0..100 {
                let path = format!("users/user{}/documents", i);
                black_box(matcher.matches(&path).unwrap());
            }
        });
    });

    group.bench_function("single_segment", |b| {
        let matcher = WildcardMatcher::new("users/*/documents");
        b.iter(|| {
            for i in 0..100 {
                let path = format!("users/user{}/documents", i);
                black_box(matcher.matches(&path).unwrap());
            }
        });
    });

    group.bench_function("multiple_segments", |b| {
        let matcher = WildcardMatcher::new("projects/*/code/*/*.rs");
        b.iter(|| {
            for i in 0..100 {
                let path = format!("projects/project{}/code/src/main.rs", i);
                black_box(matcher.matches(&path).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark policies with many templated statements that never match
fn bench_policy_complexity(c: &mut Criterion) {
    let statement_counts = vec![5, 25, 100];

    let mut group = c.benchmark_group("policy_complexity");

    for count in statement_counts {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let policy = create_complex_policy(count);
            let authorizer = Authorizer::new_default();

            b.iter(|| {
                let ctx = context(&policy, "system/config".to_string());
                let decision = authorizer.decide(ctx).unwrap();
                black_box(decision.status);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_decision_cached,
    bench_decision_uncached,
    bench_wildcard_matching,
    bench_policy_complexity
);
criterion_main!(benches);

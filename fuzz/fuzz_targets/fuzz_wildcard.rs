#![no_main]
use incremental_authz::WildcardMatcher;
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};

#[derive(Debug, Arbitrary)]
struct MatchInput {
    pattern: String,
    target: String,
    separator: char,
}

// A literal matches itself, and `*` never spans a separator
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);
    let input: MatchInput = match u.arbitrary() {
        Ok(input) => input,
        Err(_) => return,
    };
    if input.separator == '*' {
        return;
    }

    let matcher = WildcardMatcher::with_separator(input.pattern.as_str(), input.separator);
    // Oversized patterns may hit the regex size limit
    let Ok(matched) = matcher.matches(&input.target) else {
        return;
    };

    if !matcher.is_patterned() {
        assert_eq!(matched, input.pattern == input.target);
    }

    if input.pattern == "*" && input.target.contains(input.separator) {
        assert!(!matched, "wildcard crossed separator in {:?}", input.target);
    }
});

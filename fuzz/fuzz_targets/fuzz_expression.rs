#![no_main]
use incremental_authz::{Attribute, Expression, StringExpression};
use libfuzzer_sys::{fuzz_target, arbitrary::{Arbitrary, Unstructured}};

#[derive(Debug, Arbitrary)]
struct EnhanceInput {
    template: String,
    attributes: Vec<(String, String)>,
}

// Enhancement never panics, and resolved expressions stay put
fuzz_target!(|input: &[u8]| {
    let mut u = Unstructured::new(input);
    let input: EnhanceInput = match u.arbitrary() {
        Ok(input) => input,
        Err(_) => return,
    };

    let mut expr = StringExpression::new(input.template);
    for (key, value) in input.attributes {
        let attribute = Attribute::new(key, value);
        let next = expr.enhance(&attribute);
        if expr.is_fully_resolved() {
            assert_eq!(next, expr);
        }
        expr = next;
    }
});

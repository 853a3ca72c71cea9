//! Tests for the pattern module.
//!
//! Covers:
//! - generation as the inverse of matching, across every variant
//! - closed vs open objects
//! - bounded combinatorial generation and example-row substitution
//! - recursive types
//! - the subtyping relation
//! - negative generation

use super::*;
use crate::resolver::Resolver;
use serde_json::json;
use std::collections::HashMap;

fn pattern(doc: serde_json::Value) -> Pattern {
    parse_pattern(&doc).unwrap()
}

fn resolver_with(bindings: &[(&str, serde_json::Value)]) -> Resolver {
    let patterns: HashMap<String, Pattern> = bindings
        .iter()
        .map(|(name, doc)| (name.to_string(), pattern(doc.clone())))
        .collect();
    Resolver::with_patterns(patterns)
}

fn object_value(doc: serde_json::Value) -> Value {
    Value::from_json(doc)
}

// ============================================================================
// generate / matches
// ============================================================================

#[test]
fn test_generated_values_match() {
    let resolver = resolver_with(&[
        (
            "Address",
            json!({"street": "(string)", "zip?": {"type": "string", "minLength": 5, "maxLength": 5}}),
        ),
        ("Cat", json!({"petType": "(string)", "meows": "(boolean)"})),
        ("Dog", json!({"petType": "(string)", "barks": "(boolean)"})),
    ]);
    let patterns = vec![
        pattern(json!("(string)")),
        pattern(json!("(number)")),
        pattern(json!("(integer)")),
        pattern(json!("(boolean)")),
        pattern(json!("(null)")),
        pattern(json!("(date)")),
        pattern(json!("(datetime)")),
        pattern(json!("(uuid)")),
        pattern(json!("(email)")),
        pattern(json!("(url)")),
        pattern(json!("(binary)")),
        pattern(json!("(anything)")),
        pattern(json!("(number?)")),
        pattern(json!("(string*)")),
        pattern(json!(["(number)", "(string)"])),
        pattern(json!("literal")),
        pattern(json!({
            "id": "(integer)",
            "name": "(string)",
            "address?": "(Address)",
            "tags?": "(string*)",
            "...": ""
        })),
        pattern(json!({"dictionary": ["(string)", "(number)"]})),
        pattern(json!({"oneOf": ["(number)", "(Address)"]})),
        pattern(json!({
            "oneOf": ["(Cat)", "(Dog)"],
            "discriminator": {"propertyName": "petType", "mapping": {"cat": "(Cat)", "dog": "(Dog)"}}
        })),
        pattern(json!({"anyOf": ["(number)", "(boolean)"]})),
        pattern(json!({"allOf": ["(Address)", {"country": "(string)"}]})),
        pattern(json!({"type": "number", "minimum": 1, "maximum": 3})),
        pattern(json!({"type": "string", "enum": ["red", "green"]})),
        pattern(json!({"xml": {
            "name": "user",
            "attributes": {"id": "(number)"},
            "children": [
                {"xml": {"name": "name", "text": "(string)"}},
                {"multiple": {"xml": {"name": "role", "text": "(string)"}}}
            ]
        }})),
    ];

    for p in &patterns {
        for _ in 0..20 {
            let value = p.generate(&resolver);
            let result = p.matches(&value, &resolver);
            assert!(result.is_success(), "{p:?} generated {value:?}: {}", result.report());
        }
    }
}

#[test]
fn test_xml_text_with_entities_matches() {
    let resolver = Resolver::new();
    let item = pattern(json!({"xml": {"name": "item", "text": "x < y"}}));
    let payload = crate::value::XmlNode::parse("<item>x &lt; y</item>").unwrap();
    let result = item.matches(&Value::Xml(payload), &resolver);
    assert!(result.is_success(), "{}", result.report());
}

#[test]
fn test_exact_number_is_lenient_about_representation() {
    let resolver = Resolver::new();
    let ten = Pattern::exact(Value::integer(10));
    assert!(ten.matches(&Value::float(10.0), &resolver).is_success());
    assert!(ten.matches(&Value::integer(11), &resolver).is_failure());
}

#[test]
fn test_nullable_reports_the_non_null_failure() {
    let resolver = Resolver::new();
    let result = pattern(json!("(number?)")).matches(&Value::string("ten"), &resolver);
    assert_eq!(
        result.report(),
        "   Contract expected number but request contained \"ten\""
    );
}

// ============================================================================
// Closed and open objects
// ============================================================================

#[test]
fn test_closed_object_rejects_undeclared_key() {
    let resolver = Resolver::new();
    let closed = pattern(json!({"number": "(number)"}));
    let result = closed.matches(&object_value(json!({"number": 10, "unexpected": "data"})), &resolver);

    let failures = result.failures().expect("should fail");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures.first().path(), "unexpected");
    assert!(failures
        .first()
        .messages()
        .iter()
        .any(|m| m.ends_with("was not in the specification")));
}

#[test]
fn test_open_object_accepts_extra_keys_and_never_generates_them() {
    let resolver = Resolver::new();
    let open = pattern(json!({"number": "(number)", "...": ""}));
    assert!(open
        .matches(&object_value(json!({"number": 10, "unexpected": "data"})), &resolver)
        .is_success());

    for _ in 0..10 {
        let generated = open.generate(&resolver);
        let keys: Vec<&String> = generated.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["number"]);
    }
}

#[test]
fn test_missing_key_and_nested_breadcrumbs() {
    let resolver = Resolver::new();
    let p = pattern(json!({"user": {"age": "(number)", "name": "(string)"}}));
    let result = p.matches(&object_value(json!({"user": {"age": "old"}})), &resolver);
    let paths: Vec<String> = result.failures().unwrap().iter().map(|f| f.path()).collect();
    assert_eq!(paths, vec!["user.name", "user.age"]);
    assert!(result.report().contains(">> user.age"));
    assert!(result
        .report()
        .contains("Expected key named \"name\" was missing from the request"));
}

#[test]
fn test_list_breadcrumbs_use_index() {
    let resolver = Resolver::new();
    let p = pattern(json!({"items": "(number*)"}));
    let result = p.matches(&object_value(json!({"items": [1, "two", 3]})), &resolver);
    assert_eq!(result.failures().unwrap().first().path(), "items[1]");
}

// ============================================================================
// newBasedOn
// ============================================================================

#[test]
fn test_new_based_on_enumerates_optional_fields() {
    let resolver = Resolver::new();
    let p = pattern(json!({"a?": "(number)", "b?": "(number)", "c?": "(number)"}));
    let variants = p.new_based_on(&Row::default(), &resolver).unwrap();
    assert_eq!(variants.len(), 8);

    let field_counts: Vec<usize> = variants
        .iter()
        .map(|v| match v {
            Pattern::Object(o) => o.fields.len(),
            other => panic!("unexpected variant {other:?}"),
        })
        .collect();
    assert_eq!(field_counts.first(), Some(&3));
    assert_eq!(field_counts.last(), Some(&0));
}

#[test]
fn test_new_based_on_is_capped() {
    let resolver = Resolver::new().with_max_combinations(5);
    let doc: serde_json::Map<String, serde_json::Value> = (0..10)
        .map(|i| (format!("f{i}?"), json!("(number)")))
        .collect();
    let variants = pattern(serde_json::Value::Object(doc))
        .new_based_on(&Row::default(), &resolver)
        .unwrap();
    assert!(!variants.is_empty());
    assert!(variants.len() <= 5);
}

#[test]
fn test_new_based_on_substitutes_row_values() {
    let resolver = Resolver::new();
    let p = pattern(json!({"a?": "(string)", "b?": "(number)"}));
    let row = Row::from_pairs([("b", "5")]);
    let variants = p.new_based_on(&row, &resolver).unwrap();
    assert_eq!(variants.len(), 2);
    for variant in variants {
        let Pattern::Object(object) = variant else {
            panic!("expected an object variant");
        };
        assert_eq!(object.fields["b"].pattern, Pattern::Exact(Value::integer(5)));
    }
}

#[test]
fn test_new_based_on_rejects_invalid_row_value() {
    let resolver = Resolver::new();
    let p = pattern(json!({"b": "(number)"}));
    let err = p
        .new_based_on(&Row::from_pairs([("b", "five")]), &resolver)
        .unwrap_err();
    assert!(matches!(err, ContractError::InvalidExampleValue { ref name, .. } if name == "b"));
}

#[test]
fn test_compatibility_variants_cover_both_extremes() {
    let resolver = Resolver::new();
    let p = pattern(json!({"id": "(number)", "name?": "(string)"}));
    let variants = p.compatibility_variants(&resolver);
    assert_eq!(variants.len(), 2);
    let sizes: Vec<usize> = variants
        .iter()
        .map(|v| match v {
            Pattern::Object(o) => o.fields.len(),
            _ => 0,
        })
        .collect();
    assert_eq!(sizes, vec![2, 1]);
}

// ============================================================================
// Recursive types
// ============================================================================

#[test]
fn test_recursive_type_generation_terminates() {
    let resolver = resolver_with(&[
        ("Node", json!({"value": "(number)", "next?": "(Node)"})),
        ("Tree", json!({"label": "(string)", "children": "(Tree*)", "parent": "(Tree?)"})),
    ]);

    for name in ["Node", "Tree"] {
        let p = Pattern::deferred(name);
        let value = p.generate(&resolver);
        assert!(p.matches(&value, &resolver).is_success(), "{name}: {value:?}");
        let variants = p.new_based_on(&Row::default(), &resolver).unwrap();
        assert!(!variants.is_empty());
    }
}

#[test]
fn test_self_referential_alias_is_malformed() {
    let resolver = resolver_with(&[("Loop", json!("(Loop)"))]);
    let err = Pattern::deferred("(Loop)").resolve(&resolver).unwrap_err();
    assert!(matches!(err, ContractError::MalformedSpecification(_)));
}

// ============================================================================
// encompasses
// ============================================================================

#[test]
fn test_scalar_encompasses() {
    let r = Resolver::new();
    assert!(Pattern::number().encompasses(&Pattern::integer(), &r, &r).is_success());
    assert!(Pattern::integer().encompasses(&Pattern::number(), &r, &r).is_failure());
    assert!(Pattern::string()
        .encompasses(&Pattern::Scalar(ScalarPattern::Date), &r, &r)
        .is_success());
    assert!(Pattern::number()
        .encompasses(&Pattern::exact(Value::integer(3)), &r, &r)
        .is_success());
    assert!(Pattern::nullable(Pattern::number())
        .encompasses(&Pattern::null(), &r, &r)
        .is_success());
    assert!(Pattern::number()
        .encompasses(&Pattern::nullable(Pattern::number()), &r, &r)
        .is_failure());
}

#[test]
fn test_object_encompasses() {
    let r = Resolver::new();
    let older = pattern(json!({"id": "(number)", "name?": "(string)"}));
    let newer = pattern(json!({"id": "(number)", "name": "(string)"}));
    // Making an optional key mandatory narrows the type
    assert!(older.encompasses(&newer, &r, &r).is_success());
    let result = newer.encompasses(&older, &r, &r);
    assert_eq!(result.failures().unwrap().first().path(), "name");

    let open = pattern(json!({"id": "(number)", "...": ""}));
    let closed = pattern(json!({"id": "(number)"}));
    assert!(open.encompasses(&closed, &r, &r).is_success());
    assert!(closed.encompasses(&open, &r, &r).is_failure());
}

#[test]
fn test_recursive_types_encompass_themselves() {
    let r = resolver_with(&[("Node", json!({"value": "(number)", "next": "(Node?)"}))]);
    let node = Pattern::deferred("Node");
    assert!(node.encompasses(&node, &r, &r).is_success());
}

// ============================================================================
// Mock mode, parse and generalize
// ============================================================================

#[test]
fn test_mock_mode_accepts_type_tokens() {
    let mock = Resolver::new().with_mock_mode(true);
    let p = pattern(json!({"id": "(number)"}));
    assert!(p.matches(&object_value(json!({"id": "(number)"})), &mock).is_success());
    assert!(p.matches(&object_value(json!({"id": "(string)"})), &mock).is_failure());
    assert!(p
        .matches(&object_value(json!({"id": "(number)"})), &Resolver::new())
        .is_failure());
}

#[test]
fn test_parse_wire_text() {
    let r = Resolver::new();
    assert_eq!(Pattern::number().parse("10", &r).unwrap(), Value::integer(10));
    assert!(Pattern::number().parse("ten", &r).is_err());
    assert_eq!(
        pattern(json!({"id": "(number)"})).parse(r#"{"id": 1}"#, &r).unwrap(),
        object_value(json!({"id": 1}))
    );
    assert_eq!(
        pattern(json!("(boolean?)")).parse("true", &r).unwrap(),
        Value::Boolean(true)
    );
}

#[test]
fn test_generalize_keeps_shape_not_literals() {
    let r = Resolver::new();
    let contract = pattern(json!({"id": "(number)", "name?": "(string)", "kind": "(string)"}));
    let example = object_value(json!({"id": 42, "kind": "(string)"}));
    let general = contract.generalize(&example, &r);

    assert!(general.matches(&object_value(json!({"id": 7, "kind": "x"})), &r).is_success());
    // The example left `name` out, so the generalized pattern does too
    assert!(general
        .matches(&object_value(json!({"id": 7, "kind": "x", "name": "n"})), &r)
        .is_failure());
}

// ============================================================================
// Combinators
// ============================================================================

#[test]
fn test_discriminator_selects_option() {
    let r = resolver_with(&[
        ("Cat", json!({"petType": "cat", "meows": "(boolean)"})),
        ("Dog", json!({"petType": "dog", "barks": "(boolean)"})),
    ]);
    let pet = pattern(json!({
        "oneOf": ["(Cat)", "(Dog)"],
        "discriminator": {"propertyName": "petType", "mapping": {"cat": "(Cat)", "dog": "(Dog)"}}
    }));

    assert!(pet
        .matches(&object_value(json!({"petType": "cat", "meows": true})), &r)
        .is_success());
    let result = pet.matches(&object_value(json!({"petType": "dog", "meows": true})), &r);
    assert!(result.is_failure());
    let result = pet.matches(&object_value(json!({"petType": "fish"})), &r);
    assert_eq!(result.failures().unwrap().first().path(), "petType");
}

#[test]
fn test_discriminated_variants_pin_the_tag() {
    let r = resolver_with(&[
        ("Cat", json!({"petType": "(string)", "meows": "(boolean)"})),
        ("Dog", json!({"petType": "(string)", "barks": "(boolean)"})),
    ]);
    let pet = pattern(json!({
        "oneOf": ["(Cat)", "(Dog)"],
        "discriminator": {"propertyName": "petType", "mapping": {"cat": "(Cat)", "dog": "(Dog)"}}
    }));

    let variants = pet.new_based_on(&Row::default(), &r).unwrap();
    assert_eq!(variants.len(), 2);
    for variant in &variants {
        let value = variant.generate(&r);
        assert!(pet.matches(&value, &r).is_success(), "{value:?}");
    }
}

#[test]
fn test_any_of_allows_combined_keys() {
    let r = Resolver::new();
    let p = pattern(json!({"anyOf": [{"a": "(number)"}, {"b": "(string)"}]}));
    assert!(p.matches(&object_value(json!({"a": 1})), &r).is_success());
    assert!(p.matches(&object_value(json!({"a": 1, "b": "x"})), &r).is_success());
    assert!(p.matches(&object_value(json!({"a": 1, "c": true})), &r).is_failure());
}

#[test]
fn test_all_of_merges_objects() {
    let r = Resolver::new();
    let p = pattern(json!({"allOf": [{"id": "(number)"}, {"name": "(string)"}]}));
    assert!(p.matches(&object_value(json!({"id": 1, "name": "x"})), &r).is_success());
    assert!(p.matches(&object_value(json!({"id": 1})), &r).is_failure());
}

// ============================================================================
// Negative generation
// ============================================================================

#[test]
fn test_negative_variants_are_rejected() {
    let r = Resolver::new();
    let p = pattern(json!({"id": "(number)", "name?": "(string)", "size": {"type": "integer", "maximum": 10}}));
    let negatives = p.negative_based_on(&Row::default(), &r).unwrap();
    assert!(!negatives.is_empty());
    for negative in negatives {
        let value = negative.generate(&r);
        assert!(p.matches(&value, &r).is_failure(), "{value:?} should be rejected");
    }
}

#[test]
fn test_grammar_errors() {
    assert!(parse_pattern(&json!({"oneOf": []})).is_err());
    assert!(parse_pattern(&json!({"dictionary": ["(string)"]})).is_err());
    assert!(parse_pattern(&json!({"type": "string", "minLength": 5, "maxLength": 2})).is_err());
    // `type` alongside unrelated keys is an ordinary field
    assert!(matches!(
        parse_pattern(&json!({"type": "string", "id": "(number)"})).unwrap(),
        Pattern::Object(_)
    ));
}

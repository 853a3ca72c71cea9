//! The subtyping relation between patterns.
//!
//! `this` encompasses `other` iff every value matching `other` also matches
//! `this`. Used for backward-compatibility checks between contract versions
//! and for checking a stub's generalized pattern against a request pattern.

use super::{NumberConstraints, ObjectPattern, Pattern, ScalarPattern, StringConstraints};
use super::{XmlOccurrence, XmlPattern};
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;

pub(super) fn encompasses(
    this: &Pattern,
    other: &Pattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
) -> MatchResult {
    // Recursive types: once an alias has been unfolded twice on a side the
    // remaining comparison repeats one already in progress, so it is assumed
    // to hold
    for (pattern, resolver) in [(this, this_resolver), (other, other_resolver)] {
        if let Pattern::Deferred(name) = pattern {
            if resolver.expansion_count(name) >= 2 {
                return MatchResult::Success;
            }
        }
    }
    if let Pattern::Deferred(name) = this {
        return match this_resolver.pattern(name) {
            Ok(resolved) => encompasses(resolved, other, &this_resolver.entering(name), other_resolver),
            Err(e) => MatchResult::failure(e.to_string()),
        };
    }
    if let Pattern::Deferred(name) = other {
        return match other_resolver.pattern(name) {
            Ok(resolved) => encompasses(this, resolved, this_resolver, &other_resolver.entering(name)),
            Err(e) => MatchResult::failure(e.to_string()),
        };
    }

    let mismatch = || this_resolver.mismatch_text(&this.type_name(), &other.type_name());

    match (this, other) {
        (Pattern::Anything, _) => MatchResult::Success,

        // Every option of a union must be covered
        (_, Pattern::Any(any)) => MatchResult::all(
            any.patterns
                .iter()
                .map(|option| encompasses(this, option, this_resolver, other_resolver)),
        ),
        (_, Pattern::AnyOf(any_of)) => MatchResult::all(
            any_of
                .patterns
                .iter()
                .map(|option| encompasses(this, option, this_resolver, other_resolver)),
        ),
        (Pattern::Any(any), _) => covered_by_one(&any.patterns, other, this_resolver, other_resolver)
            .unwrap_or_else(mismatch),
        (Pattern::AnyOf(any_of), _) => {
            covered_by_one(&any_of.patterns, other, this_resolver, other_resolver)
                .unwrap_or_else(mismatch)
        }

        (Pattern::AllOf(all_of), _) => match all_of.merged_object(this_resolver) {
            Some(merged) => encompasses(&merged, other, this_resolver, other_resolver),
            None => MatchResult::all(
                all_of
                    .patterns
                    .iter()
                    .map(|part| encompasses(part, other, this_resolver, other_resolver)),
            ),
        },
        (_, Pattern::AllOf(all_of)) => match all_of.merged_object(other_resolver) {
            Some(merged) => encompasses(this, &merged, this_resolver, other_resolver),
            None => covered_by_one_of_parts(this, &all_of.patterns, this_resolver, other_resolver)
                .unwrap_or_else(mismatch),
        },

        // A literal is covered by any pattern it matches
        (_, Pattern::Exact(value)) => this.matches(value, this_resolver),
        (Pattern::Exact(_), _) => mismatch(),

        (Pattern::NoBody, Pattern::NoBody) => MatchResult::Success,
        (Pattern::Scalar(a), Pattern::Scalar(b)) => {
            if scalar_encompasses(a, b) {
                MatchResult::Success
            } else {
                mismatch()
            }
        }

        (Pattern::Object(a), Pattern::Object(b)) => {
            object_encompasses(a, b, this_resolver, other_resolver)
        }
        (Pattern::Dictionary(dict), Pattern::Object(object)) => {
            if object.open {
                return mismatch();
            }
            MatchResult::all(object.fields.iter().map(|(key, field)| {
                let key_ok = match dict.key.parse(key, this_resolver) {
                    Ok(_) => MatchResult::Success,
                    Err(e) => MatchResult::failure(e.to_string()),
                };
                key_ok
                    .and_then(|| encompasses(&dict.value, &field.pattern, this_resolver, other_resolver))
                    .breadcrumb(key.as_str())
            }))
        }
        (Pattern::Dictionary(a), Pattern::Dictionary(b)) => {
            encompasses(&a.key, &b.key, this_resolver, other_resolver)
                .and_then(|| encompasses(&a.value, &b.value, this_resolver, other_resolver))
        }

        (Pattern::List(a), Pattern::List(b)) => {
            encompasses(&a.element, &b.element, this_resolver, other_resolver)
        }
        (Pattern::List(list), Pattern::Tuple(items)) => MatchResult::all(
            items.iter().enumerate().map(|(i, item)| {
                encompasses(&list.element, item, this_resolver, other_resolver)
                    .breadcrumb(format!("[{i}]"))
            }),
        ),
        (Pattern::Tuple(a), Pattern::Tuple(b)) if a.len() == b.len() => MatchResult::all(
            a.iter().zip(b).enumerate().map(|(i, (x, y))| {
                encompasses(x, y, this_resolver, other_resolver).breadcrumb(format!("[{i}]"))
            }),
        ),

        (Pattern::Xml(a), Pattern::Xml(b)) => xml_encompasses(a, b, this_resolver, other_resolver),

        _ => mismatch(),
    }
}

/// Success if some option covers `other`, `None` when none does
fn covered_by_one(
    options: &[Pattern],
    other: &Pattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
) -> Option<MatchResult> {
    options
        .iter()
        .map(|option| encompasses(option, other, this_resolver, other_resolver))
        .find(MatchResult::is_success)
}

fn covered_by_one_of_parts(
    this: &Pattern,
    parts: &[Pattern],
    this_resolver: &Resolver,
    other_resolver: &Resolver,
) -> Option<MatchResult> {
    parts
        .iter()
        .map(|part| encompasses(this, part, this_resolver, other_resolver))
        .find(MatchResult::is_success)
}

fn scalar_encompasses(this: &ScalarPattern, other: &ScalarPattern) -> bool {
    use ScalarPattern::*;
    match (this, other) {
        (String(a), String(b)) => string_bounds_cover(a, b),
        // Formatted strings are strings on the wire
        (String(a), Date | DateTime | Uuid | Email | Url | Binary) => {
            a.min_length.is_none() && a.max_length.is_none()
        }
        (Number(a), Number(b)) => number_bounds_cover(a, b),
        (Boolean, Boolean) | (Null, Null) | (Date, Date) | (DateTime, DateTime) | (Uuid, Uuid) => true,
        (Email, Email) | (Url, Url) | (Binary, Binary) => true,
        _ => false,
    }
}

fn string_bounds_cover(this: &StringConstraints, other: &StringConstraints) -> bool {
    let min_ok = match (this.min_length, other.min_length) {
        (None, _) => true,
        (Some(a), Some(b)) => a <= b,
        (Some(a), None) => a == 0,
    };
    let max_ok = match (this.max_length, other.max_length) {
        (None, _) => true,
        (Some(a), Some(b)) => a >= b,
        (Some(_), None) => false,
    };
    min_ok && max_ok
}

fn number_bounds_cover(this: &NumberConstraints, other: &NumberConstraints) -> bool {
    if this.integer && !other.integer {
        return false;
    }
    let min_ok = match (this.minimum, other.minimum) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a < b || (a == b && (!this.exclusive_minimum || other.exclusive_minimum)),
    };
    let max_ok = match (this.maximum, other.maximum) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(a), Some(b)) => a > b || (a == b && (!this.exclusive_maximum || other.exclusive_maximum)),
    };
    min_ok && max_ok
}

fn object_encompasses(
    this: &ObjectPattern,
    other: &ObjectPattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
) -> MatchResult {
    let messages = this_resolver.messages();
    let mut results = Vec::new();

    for (key, field) in &this.fields {
        match other.fields.get(key) {
            None if !field.optional => results.push(
                MatchResult::failure(messages.expected_key_missing("key", key)).breadcrumb(key.as_str()),
            ),
            None => {}
            Some(theirs) => {
                if !field.optional && theirs.optional {
                    results.push(
                        MatchResult::failure(format!(
                            "Key named \"{key}\" is mandatory in the contract but optional in the other"
                        ))
                        .breadcrumb(key.as_str()),
                    );
                }
                results.push(
                    encompasses(&field.pattern, &theirs.pattern, this_resolver, other_resolver)
                        .breadcrumb(key.as_str()),
                );
            }
        }
    }

    if !this.open {
        for key in other.fields.keys() {
            if !this.fields.contains_key(key) {
                results.push(
                    MatchResult::failure(messages.unexpected_key("key", key)).breadcrumb(key.as_str()),
                );
            }
        }
        if other.open {
            results.push(MatchResult::failure(
                "Contract expected a closed json object but the other allows any extra key",
            ));
        }
    }

    MatchResult::all(results)
}

fn xml_encompasses(
    this: &XmlPattern,
    other: &XmlPattern,
    this_resolver: &Resolver,
    other_resolver: &Resolver,
) -> MatchResult {
    if this.name != other.name {
        return this_resolver.mismatch_text(
            &format!("xml node <{}>", this.name),
            &format!("xml node <{}>", other.name),
        );
    }

    let attributes = ObjectPattern {
        fields: this.attributes.clone(),
        ..Default::default()
    };
    let other_attributes = ObjectPattern {
        fields: other.attributes.clone(),
        ..Default::default()
    };
    let mut results = vec![object_encompasses(&attributes, &other_attributes, this_resolver, other_resolver)];

    match (&this.text, &other.text) {
        (Some(a), Some(b)) => results.push(encompasses(a, b, this_resolver, other_resolver)),
        (None, None) => {}
        (Some(a), None) => {
            let empty = Pattern::Exact(Value::string(""));
            results.push(encompasses(a, &empty, this_resolver, other_resolver));
        }
        (None, Some(_)) => results.push(MatchResult::failure(format!(
            "Node <{}> carries no text in the contract",
            this.name
        ))),
    }

    if this.children.len() != other.children.len() {
        results.push(this_resolver.mismatch_text(
            &format!("{} child nodes", this.children.len()),
            &format!("{} child nodes", other.children.len()),
        ));
    } else {
        for (i, (a, b)) in this.children.iter().zip(&other.children).enumerate() {
            let occurrence_ok = match (a.occurrence, b.occurrence) {
                (x, y) if x == y => true,
                (XmlOccurrence::Multiple, _) => true,
                (XmlOccurrence::Optional, XmlOccurrence::Once) => true,
                _ => false,
            };
            let result = if occurrence_ok {
                encompasses(&a.pattern, &b.pattern, this_resolver, other_resolver)
            } else {
                MatchResult::failure("Child node occurs more often than the contract allows")
            };
            results.push(result.breadcrumb(format!("[{i}]")));
        }
    }

    MatchResult::all(results)
}

//! Scalar leaf patterns: strings, numbers, booleans, null and the
//! formatted string types (date, date-time, uuid, email, url, binary).

use super::random_word;
use crate::resolver::Resolver;
use crate::result::MatchResult;
use crate::value::Value;
use base64::Engine;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("url pattern is valid"));

/// Length constraints and example for string patterns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StringConstraints {
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub example: Option<String>,
}

impl StringConstraints {
    fn allows(&self, text: &str) -> bool {
        let len = text.chars().count();
        self.min_length.map_or(true, |min| len >= min) && self.max_length.map_or(true, |max| len <= max)
    }

    fn describe(&self) -> String {
        match (self.min_length, self.max_length) {
            (None, None) => "string".to_string(),
            (Some(min), None) => format!("string with minLength {min}"),
            (None, Some(max)) => format!("string with maxLength {max}"),
            (Some(min), Some(max)) => format!("string with minLength {min} and maxLength {max}"),
        }
    }
}

/// Bounds, integer-ness and example for number patterns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NumberConstraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: bool,
    pub exclusive_maximum: bool,
    pub integer: bool,
    pub example: Option<f64>,
}

impl NumberConstraints {
    fn allows(&self, n: f64) -> bool {
        if self.integer && n.fract() != 0.0 {
            return false;
        }
        let above = match self.minimum {
            Some(min) if self.exclusive_minimum => n > min,
            Some(min) => n >= min,
            None => true,
        };
        let below = match self.maximum {
            Some(max) if self.exclusive_maximum => n < max,
            Some(max) => n <= max,
            None => true,
        };
        above && below
    }

    fn describe(&self) -> String {
        let base = if self.integer { "integer" } else { "number" };
        let lower = self.minimum.map(|m| {
            if self.exclusive_minimum {
                format!("> {m}")
            } else {
                format!(">= {m}")
            }
        });
        let upper = self.maximum.map(|m| {
            if self.exclusive_maximum {
                format!("< {m}")
            } else {
                format!("<= {m}")
            }
        });
        match (lower, upper) {
            (None, None) => base.to_string(),
            (Some(l), None) => format!("{base} {l}"),
            (None, Some(u)) => format!("{base} {u}"),
            (Some(l), Some(u)) => format!("{base} {l} and {u}"),
        }
    }

    /// Smallest and largest integers inside the bounds
    fn integer_bounds(&self) -> (i64, i64) {
        let lo = self.minimum.map(|m| {
            let c = m.ceil();
            if self.exclusive_minimum && c == m {
                clamp_to_i64(c).saturating_add(1)
            } else {
                clamp_to_i64(c)
            }
        });
        let hi = self.maximum.map(|m| {
            let f = m.floor();
            if self.exclusive_maximum && f == m {
                clamp_to_i64(f).saturating_sub(1)
            } else {
                clamp_to_i64(f)
            }
        });
        match (lo, hi) {
            (Some(lo), Some(hi)) => (lo, hi),
            (Some(lo), None) => (lo, lo.saturating_add(1000)),
            (None, Some(hi)) if hi >= 1 => (1, hi),
            (None, Some(hi)) => (hi.saturating_sub(1000), hi),
            (None, None) => (1, 1000),
        }
    }
}

fn clamp_to_i64(n: f64) -> i64 {
    n.clamp(i64::MIN as f64, i64::MAX as f64) as i64
}

/// Scalar leaf patterns
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarPattern {
    String(StringConstraints),
    Number(NumberConstraints),
    Boolean,
    Null,
    Date,
    DateTime,
    Uuid,
    Email,
    Url,
    Binary,
}

impl ScalarPattern {
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarPattern::String(_) => "string",
            ScalarPattern::Number(c) if c.integer => "integer",
            ScalarPattern::Number(_) => "number",
            ScalarPattern::Boolean => "boolean",
            ScalarPattern::Null => "null",
            ScalarPattern::Date => "date",
            ScalarPattern::DateTime => "datetime",
            ScalarPattern::Uuid => "uuid",
            ScalarPattern::Email => "email",
            ScalarPattern::Url => "url",
            ScalarPattern::Binary => "binary",
        }
    }

    /// Whether values of this pattern are strings on the wire
    pub fn is_string_kind(&self) -> bool {
        !matches!(
            self,
            ScalarPattern::Number(_) | ScalarPattern::Boolean | ScalarPattern::Null
        )
    }

    pub fn matches(&self, value: &Value, resolver: &Resolver) -> MatchResult {
        let ok = match (self, value) {
            (ScalarPattern::String(c), Value::String(s)) => {
                if c.allows(s) {
                    true
                } else {
                    return resolver.mismatch(&c.describe(), value);
                }
            }
            (ScalarPattern::Number(c), Value::Number(n)) => {
                let f = n.as_f64().unwrap_or(0.0);
                if c.allows(f) {
                    true
                } else {
                    return resolver.mismatch(&c.describe(), value);
                }
            }
            (ScalarPattern::Boolean, Value::Boolean(_)) => true,
            (ScalarPattern::Null, Value::Null) => true,
            (ScalarPattern::Date, Value::String(s)) => {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            (ScalarPattern::DateTime, Value::String(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            (ScalarPattern::Uuid, Value::String(s)) => uuid::Uuid::parse_str(s).is_ok(),
            (ScalarPattern::Email, Value::String(s)) => EMAIL.is_match(s),
            (ScalarPattern::Url, Value::String(s)) => URL.is_match(s),
            (ScalarPattern::Binary, Value::String(_)) => true,
            _ => false,
        };

        if ok {
            MatchResult::Success
        } else {
            resolver.mismatch(self.type_name(), value)
        }
    }

    /// Typed value for a wire string; validation happens in the caller
    pub fn parse(&self, text: &str) -> Result<Value, String> {
        match self {
            ScalarPattern::Number(_) => {
                let trimmed = text.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Ok(Value::integer(i))
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(f) if f.is_finite() => Ok(Value::float(f)),
                        _ => Err(format!("\"{text}\" is not a number")),
                    }
                }
            }
            ScalarPattern::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(format!("\"{text}\" is not a boolean")),
            },
            ScalarPattern::Null => match text.trim() {
                "" | "null" => Ok(Value::Null),
                _ => Err(format!("\"{text}\" is not null")),
            },
            _ => Ok(Value::String(text.to_string())),
        }
    }

    pub fn generate(&self, resolver: &Resolver) -> Value {
        let mut rng = rand::thread_rng();
        match self {
            ScalarPattern::String(c) => {
                if resolver.is_negative() {
                    if let Some(violating) = violating_string(c) {
                        return Value::String(violating);
                    }
                }
                if let Some(example) = c.example.as_ref().filter(|e| c.allows(e)) {
                    return Value::String(example.clone());
                }
                let lo = c.min_length.unwrap_or(0);
                let hi = c.max_length.unwrap_or(lo.max(5) + 5).max(lo);
                let preferred = lo.max(5.min(hi));
                Value::String(random_word(rng.gen_range(preferred..=hi)))
            }
            ScalarPattern::Number(c) => {
                if resolver.is_negative() {
                    if let Some(violating) = violating_number(c) {
                        return Value::float(violating);
                    }
                }
                if let Some(example) = c.example.filter(|e| c.allows(*e)) {
                    return number_value(example);
                }
                let (lo, hi) = c.integer_bounds();
                if lo <= hi {
                    let candidate = rng.gen_range(lo..=hi);
                    if c.allows(candidate as f64) {
                        return Value::integer(candidate);
                    }
                }
                // No i64 fits (e.g. 0.1 < n < 0.9, or bounds beyond the i64 range)
                let (lo, hi) = match (c.minimum, c.maximum) {
                    (Some(lo), Some(hi)) => (lo, hi),
                    (Some(lo), None) => (lo, lo + lo.abs().max(1.0)),
                    (None, Some(hi)) => (hi - hi.abs().max(1.0), hi),
                    (None, None) => (0.0, 1.0),
                };
                Value::float(lo / 2.0 + hi / 2.0)
            }
            ScalarPattern::Boolean => Value::Boolean(rng.gen_bool(0.5)),
            ScalarPattern::Null => Value::Null,
            ScalarPattern::Date => {
                Value::String(chrono::Utc::now().date_naive().format("%Y-%m-%d").to_string())
            }
            ScalarPattern::DateTime => Value::String(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            ),
            ScalarPattern::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            ScalarPattern::Email => {
                Value::String(format!("{}@example.com", random_word(6).to_lowercase()))
            }
            ScalarPattern::Url => {
                Value::String(format!("https://example.com/{}", random_word(6).to_lowercase()))
            }
            ScalarPattern::Binary => {
                let bytes: Vec<u8> = (0..12).map(|_| rng.gen()).collect();
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
        }
    }

    /// Values of the wrong type or outside the constraints
    pub fn negative_values(&self, resolver: &Resolver) -> Vec<Value> {
        let mut values = match self {
            ScalarPattern::String(_) => vec![Value::Null, Value::integer(100), Value::Boolean(true)],
            ScalarPattern::Number(c) => {
                let mut v = vec![Value::Null, Value::string("not-a-number"), Value::Boolean(true)];
                if c.integer {
                    v.push(Value::float(1.5));
                }
                v
            }
            ScalarPattern::Boolean => vec![Value::Null, Value::string("not-a-boolean"), Value::integer(1)],
            ScalarPattern::Null => vec![Value::string("not-null")],
            ScalarPattern::Date => vec![Value::Null, Value::string("not-a-date")],
            ScalarPattern::DateTime => vec![Value::Null, Value::string("not-a-datetime")],
            ScalarPattern::Uuid => vec![Value::Null, Value::string("not-a-uuid")],
            ScalarPattern::Email => vec![Value::Null, Value::string("not-an-email")],
            ScalarPattern::Url => vec![Value::Null, Value::string("not a url")],
            ScalarPattern::Binary => vec![Value::Null],
        };
        let constrained = match self {
            ScalarPattern::String(c) => violating_string(c).is_some(),
            ScalarPattern::Number(c) => violating_number(c).is_some(),
            _ => false,
        };
        if constrained {
            values.push(self.generate(&resolver.with_negative(true)));
        }
        values
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::integer(n as i64)
    } else {
        Value::float(n)
    }
}

fn violating_string(c: &StringConstraints) -> Option<String> {
    if let Some(max) = c.max_length {
        return Some("x".repeat(max + 1));
    }
    match c.min_length {
        Some(min) if min > 0 => Some("x".repeat(min - 1)),
        _ => None,
    }
}

fn violating_number(c: &NumberConstraints) -> Option<f64> {
    if let Some(max) = c.maximum {
        return Some(if c.exclusive_maximum { max } else { max + 1.0 });
    }
    c.minimum
        .map(|min| if c.exclusive_minimum { min } else { min - 1.0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_length_constraints() {
        let resolver = Resolver::new();
        let pattern = ScalarPattern::String(StringConstraints {
            min_length: Some(2),
            max_length: Some(4),
            example: None,
        });
        assert!(pattern.matches(&Value::string("abc"), &resolver).is_success());
        let result = pattern.matches(&Value::string("abcdef"), &resolver);
        assert_eq!(
            result.report(),
            "   Contract expected string with minLength 2 and maxLength 4 but request contained \"abcdef\""
        );
    }

    #[test]
    fn test_number_bounds_and_integer() {
        let resolver = Resolver::new();
        let pattern = ScalarPattern::Number(NumberConstraints {
            minimum: Some(0.0),
            maximum: Some(10.0),
            exclusive_maximum: true,
            integer: true,
            ..Default::default()
        });
        assert!(pattern.matches(&Value::integer(9), &resolver).is_success());
        assert!(pattern.matches(&Value::integer(10), &resolver).is_failure());
        assert!(pattern.matches(&Value::float(2.5), &resolver).is_failure());
        for _ in 0..50 {
            let generated = pattern.generate(&resolver);
            assert!(pattern.matches(&generated, &resolver).is_success());
        }
    }

    #[test]
    fn test_bounds_beyond_i64_range() {
        let resolver = Resolver::new();
        let huge = ScalarPattern::Number(NumberConstraints {
            minimum: Some(1e30),
            exclusive_minimum: true,
            integer: true,
            ..Default::default()
        });
        let generated = huge.generate(&resolver);
        assert!(huge.matches(&generated, &resolver).is_success(), "{generated:?}");

        let tiny = ScalarPattern::Number(NumberConstraints {
            maximum: Some(-1e30),
            exclusive_maximum: true,
            integer: true,
            ..Default::default()
        });
        let generated = tiny.generate(&resolver);
        assert!(tiny.matches(&generated, &resolver).is_success(), "{generated:?}");
    }

    #[test]
    fn test_formats() {
        let resolver = Resolver::new();
        assert!(ScalarPattern::Date
            .matches(&Value::string("2024-02-29"), &resolver)
            .is_success());
        assert!(ScalarPattern::Date
            .matches(&Value::string("2024-13-01"), &resolver)
            .is_failure());
        assert!(ScalarPattern::Email
            .matches(&Value::string("jane@example.com"), &resolver)
            .is_success());
        assert!(ScalarPattern::Url
            .matches(&Value::string("ftp://nope"), &resolver)
            .is_failure());
        for pattern in [
            ScalarPattern::Date,
            ScalarPattern::DateTime,
            ScalarPattern::Uuid,
            ScalarPattern::Email,
            ScalarPattern::Url,
            ScalarPattern::Binary,
        ] {
            let value = pattern.generate(&resolver);
            assert!(pattern.matches(&value, &resolver).is_success(), "{pattern:?} generated {value:?}");
        }
    }

    #[test]
    fn test_parse_wire_strings() {
        let number = ScalarPattern::Number(NumberConstraints::default());
        assert_eq!(number.parse("42").unwrap(), Value::integer(42));
        assert_eq!(number.parse("4.5").unwrap(), Value::float(4.5));
        assert!(number.parse("forty").is_err());
        assert_eq!(ScalarPattern::Boolean.parse("TRUE").unwrap(), Value::Boolean(true));
    }

    #[test]
    fn test_negative_generation_violates_constraints() {
        let resolver = Resolver::new();
        let pattern = ScalarPattern::String(StringConstraints {
            max_length: Some(3),
            ..Default::default()
        });
        let negative = pattern.generate(&resolver.with_negative(true));
        assert!(pattern.matches(&negative, &resolver).is_failure());
        let negatives = pattern.negative_values(&resolver);
        assert!(negatives
            .iter()
            .all(|v| pattern.matches(v, &resolver).is_failure()));
    }
}

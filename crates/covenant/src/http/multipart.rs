//! `multipart/form-data` part patterns.

use super::{match_wire_text, MultipartPart};
use crate::error::ContractError;
use crate::examples::Row;
use crate::pattern::{example_pattern, Pattern};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchResult};

#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPattern {
    Content {
        name: String,
        content: Pattern,
        content_type: Option<String>,
        optional: bool,
    },
    File {
        name: String,
        filename: Pattern,
        content_type: Option<String>,
        optional: bool,
    },
}

impl MultipartPattern {
    pub fn content(name: impl Into<String>, content: Pattern) -> Self {
        MultipartPattern::Content {
            name: name.into(),
            content,
            content_type: None,
            optional: false,
        }
    }

    pub fn file(name: impl Into<String>, filename: Pattern) -> Self {
        MultipartPattern::File {
            name: name.into(),
            filename,
            content_type: None,
            optional: false,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            MultipartPattern::Content { name, .. } | MultipartPattern::File { name, .. } => name,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            MultipartPattern::Content { optional, .. } | MultipartPattern::File { optional, .. } => {
                *optional
            }
        }
    }

    fn with_optional(self, value: bool) -> Self {
        match self {
            MultipartPattern::Content {
                name,
                content,
                content_type,
                ..
            } => MultipartPattern::Content {
                name,
                content,
                content_type,
                optional: value,
            },
            MultipartPattern::File {
                name,
                filename,
                content_type,
                ..
            } => MultipartPattern::File {
                name,
                filename,
                content_type,
                optional: value,
            },
        }
    }

    pub fn optional(self) -> Self {
        self.with_optional(true)
    }

    /// Match one received part whose name already matched
    fn matches_part(&self, part: &MultipartPart, resolver: &Resolver) -> MatchResult {
        let declared_type = match self {
            MultipartPattern::Content { content_type, .. } | MultipartPattern::File { content_type, .. } => {
                content_type.as_deref()
            }
        };
        let actual_type = match part {
            MultipartPart::Content { content_type, .. } | MultipartPart::File { content_type, .. } => {
                content_type.as_deref()
            }
        };
        let type_check = match (declared_type, actual_type) {
            (Some(expected), Some(actual)) if !expected.eq_ignore_ascii_case(actual) => resolver
                .mismatch_text(&format!("content type {expected}"), &format!("content type {actual}"))
                .with_reason(FailureReason::ContentTypeMismatch),
            _ => MatchResult::Success,
        };

        let body_check = match (self, part) {
            (MultipartPattern::Content { content, .. }, MultipartPart::Content { content: text, .. }) => {
                match_wire_text(content, text, resolver).breadcrumb("content")
            }
            (MultipartPattern::File { filename, .. }, MultipartPart::File { filename: actual, .. }) => {
                match_wire_text(filename, actual, resolver).breadcrumb("filename")
            }
            (MultipartPattern::Content { .. }, MultipartPart::File { .. }) => {
                resolver.mismatch_text("a content part", "a file part")
            }
            (MultipartPattern::File { .. }, MultipartPart::Content { .. }) => {
                resolver.mismatch_text("a file part", "a content part")
            }
        };

        MatchResult::all([type_check, body_check])
    }

    fn generate(&self, resolver: &Resolver) -> MultipartPart {
        match self {
            MultipartPattern::Content {
                name,
                content,
                content_type,
                ..
            } => MultipartPart::Content {
                name: name.clone(),
                content: content.generate(resolver).to_wire_string(),
                content_type: content_type.clone(),
            },
            MultipartPattern::File {
                name,
                filename,
                content_type,
                ..
            } => MultipartPart::File {
                name: name.clone(),
                filename: filename.generate(resolver).to_wire_string(),
                content_type: content_type.clone(),
                content: Vec::new(),
            },
        }
    }

    /// Variants for this part: a row value fixes the content, an optional
    /// part may also be left out (`None`)
    fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Option<Self>>, ContractError> {
        let mut options = match (self, row.field(self.name())) {
            (MultipartPattern::Content { name, content, .. }, Some(cell)) => {
                let exact = example_pattern(content, name, &cell, resolver)?;
                vec![Some(self.clone().replace_content(exact).with_optional(false))]
            }
            _ => vec![Some(self.clone().with_optional(false))],
        };
        if self.is_optional() && !row.contains_field(self.name()) {
            options.push(None);
        }
        Ok(options)
    }

    fn replace_content(self, pattern: Pattern) -> Self {
        match self {
            MultipartPattern::Content {
                name,
                content_type,
                optional,
                ..
            } => MultipartPattern::Content {
                name,
                content: pattern,
                content_type,
                optional,
            },
            file => file,
        }
    }
}

/// Match received parts against declared part patterns
pub(crate) fn match_parts(
    declared: &[MultipartPattern],
    actual: &[MultipartPart],
    resolver: &Resolver,
) -> MatchResult {
    let mut results = Vec::new();
    for pattern in declared {
        match actual.iter().find(|p| p.name() == pattern.name()) {
            Some(part) => results.push(pattern.matches_part(part, resolver).breadcrumb(pattern.name())),
            None if pattern.is_optional() || resolver.is_negative() => {}
            None => results.push(
                MatchResult::failure(
                    resolver
                        .messages()
                        .expected_key_missing("part", pattern.name()),
                )
                .breadcrumb(pattern.name())
                .with_reason(FailureReason::PartNameMismatch),
            ),
        }
    }
    for part in actual {
        if !declared.iter().any(|p| p.name() == part.name()) {
            results.push(
                MatchResult::failure(resolver.messages().unexpected_key("part", part.name()))
                    .breadcrumb(part.name())
                    .with_reason(FailureReason::PartNameMismatch),
            );
        }
    }
    MatchResult::all(results).breadcrumb("MULTIPART-FORMDATA")
}

pub(crate) fn generate_parts(declared: &[MultipartPattern], resolver: &Resolver) -> Vec<MultipartPart> {
    declared.iter().map(|p| p.generate(resolver)).collect()
}

pub(crate) fn parts_new_based_on(
    declared: &[MultipartPattern],
    row: &Row,
    resolver: &Resolver,
) -> Result<Vec<Vec<MultipartPattern>>, ContractError> {
    let slots = declared
        .iter()
        .map(|p| p.new_based_on(row, resolver))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(crate::pattern::capped_product(&slots, resolver.max_combinations())
        .into_iter()
        .map(|combo| combo.into_iter().flatten().collect())
        .collect())
}

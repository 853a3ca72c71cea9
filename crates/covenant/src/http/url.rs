//! URL path and query parameter patterns.
//!
//! Paths are written with typed parameters, e.g. `/orders/(id:number)`.
//! A literal segment mismatch is a pure shape mismatch; a parameter that
//! fails to parse while every literal matched is reported separately so the
//! lookup can rank it as more informative.

use super::{
    generate_string_map, match_string_map, match_wire_text, string_map_negative_based_on,
    string_map_new_based_on, wire_negatives, wire_value, HttpRequest,
};
use crate::error::ContractError;
use crate::examples::Row;
use crate::pattern::{capped_product, token_pattern, ObjectField, Pattern};
use crate::resolver::Resolver;
use crate::result::{FailureReason, MatchResult};
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Literal(String),
    Param { name: String, pattern: Pattern },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpPathPattern {
    pub segments: Vec<PathSegment>,
}

impl HttpPathPattern {
    /// Parse `/orders/(id:number)` style paths
    pub fn parse(path: &str) -> Result<Self, ContractError> {
        let segments = split_path(path)
            .into_iter()
            .map(|segment| {
                let Some(inner) = segment.strip_prefix('(').and_then(|s| s.strip_suffix(')')) else {
                    return Ok(PathSegment::Literal(segment.to_string()));
                };
                let (name, type_name) = inner.split_once(':').ok_or_else(|| {
                    ContractError::malformed(format!(
                        "path parameter {segment} in {path} must be written as (name:type)"
                    ))
                })?;
                let pattern = token_pattern(&format!("({})", type_name.trim())).ok_or_else(|| {
                    ContractError::malformed(format!("unknown type {type_name} in path {path}"))
                })?;
                Ok(PathSegment::Param {
                    name: name.trim().to_string(),
                    pattern,
                })
            })
            .collect::<Result<Vec<_>, ContractError>>()?;
        Ok(Self { segments })
    }

    /// The path as written in the contract
    pub fn describe(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|s| match s {
                PathSegment::Literal(text) => text.clone(),
                PathSegment::Param { name, pattern } => format!("({name}:{})", bare_type_name(pattern)),
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    pub fn matches(&self, path: &str, resolver: &Resolver) -> MatchResult {
        let actual = split_path(path);
        let shape_mismatch = || {
            resolver
                .mismatch_text(&format!("path {}", self.describe()), &format!("path {path}"))
                .with_reason(FailureReason::UrlPathMismatch)
        };
        if actual.len() != self.segments.len() {
            return shape_mismatch();
        }

        let literals_match = self.segments.iter().zip(&actual).all(|(segment, text)| match segment {
            PathSegment::Literal(expected) => expected == &decode(text),
            PathSegment::Param { .. } => true,
        });
        if !literals_match {
            return shape_mismatch();
        }

        MatchResult::all(self.segments.iter().zip(&actual).filter_map(|(segment, text)| {
            let PathSegment::Param { name, pattern } = segment else {
                return None;
            };
            Some(
                match_wire_text(pattern, &decode(text), resolver)
                    .breadcrumb(name.as_str())
                    .with_reason(FailureReason::UrlPathParamMismatchButSameStructure),
            )
        }))
    }

    pub fn generate(&self, resolver: &Resolver) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Literal(text) => text.clone(),
                PathSegment::Param { pattern, .. } => {
                    urlencoding::encode(&pattern.generate(resolver).to_wire_string()).into_owned()
                }
            })
            .collect();
        format!("/{}", parts.join("/"))
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let mut slots = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let options = match segment {
                PathSegment::Literal(_) => vec![segment.clone()],
                PathSegment::Param { name, pattern } => match row.field(name) {
                    Some(cell) => {
                        let value = pattern.parse(&cell, resolver).map_err(|e| {
                            ContractError::InvalidExampleValue {
                                name: name.clone(),
                                value: cell.clone(),
                                reason: e.to_string(),
                            }
                        })?;
                        vec![PathSegment::Param {
                            name: name.clone(),
                            pattern: Pattern::Exact(value),
                        }]
                    }
                    None => pattern
                        .new_based_on(row, resolver)?
                        .into_iter()
                        .map(|p| PathSegment::Param {
                            name: name.clone(),
                            pattern: p,
                        })
                        .collect(),
                },
            };
            slots.push(options);
        }
        Ok(capped_product(&slots, resolver.max_combinations())
            .into_iter()
            .map(|segments| Self { segments })
            .collect())
    }

    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let Some(base) = self.new_based_on(row, resolver)?.into_iter().next() else {
            return Ok(Vec::new());
        };
        let mut negatives = Vec::new();
        for (index, segment) in self.segments.iter().enumerate() {
            let PathSegment::Param { name, pattern } = segment else {
                continue;
            };
            for bad in wire_negatives(pattern, row, resolver)? {
                let mut mutated = base.clone();
                mutated.segments[index] = PathSegment::Param {
                    name: name.clone(),
                    pattern: bad,
                };
                negatives.push(mutated);
            }
        }
        Ok(negatives)
    }

    /// Pattern for the class of paths shaped like `path`
    pub fn generalize(&self, path: &str, resolver: &Resolver) -> Self {
        let actual = split_path(path);
        if actual.len() != self.segments.len() {
            return self.clone();
        }
        let segments = self
            .segments
            .iter()
            .zip(actual)
            .map(|(segment, text)| match segment {
                PathSegment::Literal(_) => segment.clone(),
                PathSegment::Param { name, pattern } => PathSegment::Param {
                    name: name.clone(),
                    pattern: pattern.generalize(&wire_value(pattern, &decode(text), resolver), resolver),
                },
            })
            .collect();
        Self { segments }
    }
}

/// Path plus query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct HttpUrlPattern {
    pub path: HttpPathPattern,
    pub query: IndexMap<String, ObjectField>,
}

impl HttpUrlPattern {
    pub fn new(path: HttpPathPattern) -> Self {
        Self {
            path,
            query: IndexMap::new(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, ContractError> {
        Ok(Self::new(HttpPathPattern::parse(path)?))
    }

    pub fn with_query(mut self, name: impl Into<String>, field: ObjectField) -> Self {
        self.query.insert(name.into(), field);
        self
    }

    /// Path first; the query is only checked once the path matched
    pub fn matches(&self, request: &HttpRequest, resolver: &Resolver) -> MatchResult {
        self.path
            .matches(&request.path, resolver)
            .breadcrumb("PATH")
            .and_then(|| {
                match_string_map(&self.query, &request.query, false, "query param", false, resolver)
                    .breadcrumb("QUERY")
            })
    }

    pub fn generate(&self, resolver: &Resolver) -> (String, IndexMap<String, String>) {
        (
            self.path.generate(resolver),
            generate_string_map(&self.query, resolver),
        )
    }

    pub fn new_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let paths = self.path.new_based_on(row, resolver)?;
        let queries = string_map_new_based_on(&self.query, row, resolver)?;
        let slots: Vec<Vec<usize>> = vec![(0..paths.len()).collect(), (0..queries.len()).collect()];
        Ok(capped_product(&slots, resolver.max_combinations())
            .into_iter()
            .map(|index| Self {
                path: paths[index[0]].clone(),
                query: queries[index[1]].clone(),
            })
            .collect())
    }

    pub fn negative_based_on(&self, row: &Row, resolver: &Resolver) -> Result<Vec<Self>, ContractError> {
        let Some(base) = self.new_based_on(row, resolver)?.into_iter().next() else {
            return Ok(Vec::new());
        };
        let mut negatives: Vec<Self> = self
            .path
            .negative_based_on(row, resolver)?
            .into_iter()
            .map(|path| Self {
                path,
                query: base.query.clone(),
            })
            .collect();
        negatives.extend(
            string_map_negative_based_on(&self.query, row, resolver)?
                .into_iter()
                .map(|query| Self {
                    path: base.path.clone(),
                    query,
                }),
        );
        Ok(negatives)
    }

    pub fn generalize(&self, request: &HttpRequest, resolver: &Resolver) -> Self {
        let query = request
            .query
            .iter()
            .filter_map(|(key, text)| {
                let field = self.query.get(key)?;
                let value = wire_value(&field.pattern, text, resolver);
                Some((
                    key.clone(),
                    ObjectField::mandatory(field.pattern.generalize(&value, resolver)),
                ))
            })
            .collect();
        Self {
            path: self.path.generalize(&request.path, resolver),
            query,
        }
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let path = path.split('?').next().unwrap_or_default();
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

fn decode(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

fn bare_type_name(pattern: &Pattern) -> String {
    let name = pattern.type_name();
    name.strip_prefix('(')
        .and_then(|n| n.strip_suffix(')'))
        .map(str::to_string)
        .unwrap_or(name)
}

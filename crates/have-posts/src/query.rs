//! Query construction
//!
//! Maps loop configuration onto the parameters of a WP REST collection request.
//! Bracketed keys such as `filter[orderby]` are kept as literal parameter names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LoopConfig;
use crate::error::{Error, Result};

pub const DEFAULT_PER_PAGE: u32 = 10;
pub const DEFAULT_OFFSET: u64 = 0;
/// Largest offset a request can carry; the API reads it as a signed 64-bit integer
pub const MAX_OFFSET: u64 = i64::MAX as u64;
pub const DEFAULT_ORDERBY: &str = "date";
pub const DEFAULT_ORDER: &str = "DESC";

// ============================================================================
// Scalar
// ============================================================================

/// A single filter value. Keeps its JSON type so `filter[cat]=123` stays an integer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    /// Interpret an attribute string: integers and booleans are recognised,
    /// everything else stays a string.
    pub fn parse_attr(raw: &str) -> Self {
        if let Ok(n) = raw.parse::<i64>() {
            Scalar::Int(n)
        } else if let Ok(b) = raw.parse::<bool>() {
            Scalar::Bool(b)
        } else {
            Scalar::Str(raw.to_string())
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Str(v) => f.write_str(v),
        }
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::Int(v as i64)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

// ============================================================================
// ListQuery
// ============================================================================

/// Parameters for one page of a collection listing
#[derive(Clone, Debug, PartialEq)]
pub struct ListQuery {
    pub endpoint: String,
    pub per_page: u32,
    pub offset: u64,
    /// `filter[<key>]` entries in insertion order, keys stored without the prefix
    filters: Vec<(String, Scalar)>,
    pub embed: bool,
}

impl ListQuery {
    /// A listing with the default `date DESC` ordering and `_embed` enabled
    pub fn new(endpoint: impl Into<String>, per_page: u32, offset: u64) -> Self {
        let mut query = Self {
            endpoint: endpoint.into(),
            per_page,
            offset,
            filters: Vec::new(),
            embed: true,
        };
        query.set_filter("orderby", DEFAULT_ORDERBY);
        query.set_filter("order", DEFAULT_ORDER);
        query
    }

    /// Set `filter[<key>]`, replacing an existing value for the same key
    pub fn set_filter(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.filters.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.filters.push((key, value)),
        }
    }

    pub fn filter(&self, key: &str) -> Option<&Scalar> {
        self.filters.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Move to the next page. Returns `false`, leaving the offset unchanged,
    /// when the next offset would pass [`MAX_OFFSET`].
    pub fn advance(&mut self) -> bool {
        match self.offset.checked_add(self.per_page as u64) {
            Some(next) if next <= MAX_OFFSET => {
                self.offset = next;
                true
            }
            _ => false,
        }
    }

    /// Every logical key with its value, `endpoint` first.
    pub fn entries(&self) -> Vec<(String, Scalar)> {
        let mut entries = vec![
            ("endpoint".to_string(), Scalar::Str(self.endpoint.clone())),
            ("per_page".to_string(), Scalar::from(self.per_page)),
            ("offset".to_string(), offset_scalar(self.offset)),
        ];
        entries.extend(
            self.filters
                .iter()
                .map(|(k, v)| (format!("filter[{}]", k), v.clone())),
        );
        entries.push(("_embed".to_string(), Scalar::Bool(self.embed)));
        entries
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries().into_iter().map(|(k, _)| k).collect()
    }

    /// Query-string pairs for the request (the endpoint goes in the path)
    pub fn params(&self) -> Vec<(String, String)> {
        self.entries()
            .into_iter()
            .skip(1)
            .map(|(k, v)| (k, v.to_string()))
            .collect()
    }
}

fn offset_scalar(offset: u64) -> Scalar {
    match i64::try_from(offset) {
        Ok(n) => Scalar::Int(n),
        Err(_) => Scalar::Str(offset.to_string()),
    }
}

// ============================================================================
// Query
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    /// Paginated listing
    List(ListQuery),
    /// Exactly one item fetched by id; never paginates
    Single { endpoint: String, id: String },
}

impl Query {
    /// Build the query described by a loop configuration.
    ///
    /// Fails when the endpoint is empty, `per_page` is zero, or the offset is
    /// above [`MAX_OFFSET`].
    pub fn from_config(config: &LoopConfig) -> Result<Self> {
        let endpoint = config.post_type.trim();
        if endpoint.is_empty() {
            return Err(Error::Configuration("post type (endpoint) is required".into()));
        }

        if let Some(id) = config.post_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(Query::Single {
                endpoint: endpoint.to_string(),
                id: id.to_string(),
            });
        }

        let per_page = config.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if per_page == 0 {
            return Err(Error::Configuration("per_page must be positive".into()));
        }

        let offset = config.offset.unwrap_or(DEFAULT_OFFSET);
        if offset > MAX_OFFSET {
            return Err(Error::Configuration(format!("offset {} exceeds {}", offset, MAX_OFFSET)));
        }

        let mut query = ListQuery::new(endpoint, per_page, offset);
        for (key, value) in &config.filter {
            query.set_filter(key.clone(), value.clone());
        }
        Ok(Query::List(query))
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Query::List(q) => &q.endpoint,
            Query::Single { endpoint, .. } => endpoint,
        }
    }

    pub fn as_list(&self) -> Option<&ListQuery> {
        match self {
            Query::List(q) => Some(q),
            Query::Single { .. } => None,
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, Query::Single { .. })
    }
}

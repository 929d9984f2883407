//! Loop configuration
//!
//! `LoopConfig` is what a `<have-posts>` element carries: the API root, the
//! collection to list, and the paging/filter knobs. It can be built in code,
//! deserialized from JSON, or parsed from the element's kebab-case attributes.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::query::Scalar;

/// Prefix for attributes that become `filter[<key>]` parameters
pub const FILTER_ATTR_PREFIX: &str = "filter-";

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LoopConfig {
    /// Root url of the API, e.g. `http://example.com/wp-json/wp/v2`
    pub api_root: String,
    /// `posts`, `pages`, `media` or a custom post type
    pub post_type: String,
    /// Show exactly this item instead of a paginated listing
    pub post_id: Option<String>,
    pub per_page: Option<u32>,
    /// Items to pass over before the first page
    pub offset: Option<u64>,
    /// Extra `filter[<key>]` parameters; `orderby`/`order` override the defaults
    pub filter: BTreeMap<String, Scalar>,
}

impl LoopConfig {
    pub fn new(api_root: impl Into<String>, post_type: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            post_type: post_type.into(),
            ..Default::default()
        }
    }

    pub fn post_id(mut self, id: impl Into<String>) -> Self {
        self.post_id = Some(id.into());
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    /// Parse the attributes of a loop element.
    ///
    /// Recognised: `api-root`, `post-type`, `post-id`, `per-page`, `offset` and
    /// `filter-<key>`. Empty values count as absent. Anything else is ignored.
    pub fn from_attributes<'a>(attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut config = Self::default();
        for (name, value) in attrs {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match name {
                "api-root" => config.api_root = value.to_string(),
                "post-type" => config.post_type = value.to_string(),
                "post-id" => config.post_id = Some(value.to_string()),
                "per-page" => config.per_page = Some(parse_number(name, value)?),
                "offset" => config.offset = Some(parse_number(name, value)?),
                _ => match name.strip_prefix(FILTER_ATTR_PREFIX) {
                    Some(key) if !key.is_empty() => {
                        config.filter.insert(key.to_string(), Scalar::parse_attr(value));
                    }
                    _ => tracing::debug!("ignoring loop attribute {}", name),
                },
            }
        }
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Configuration(format!("`{}` must be a non-negative integer, got {:?}", name, value)))
}

//! Post records as returned by the WP REST API
//!
//! Only the fields the template tags read are modelled. `_embedded` is kept as
//! raw JSON because its members (author, terms, media) have unrelated shapes.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::query::Scalar;

/// Link relation under which `_embed` places the featured image
pub const FEATURED_MEDIA_REL: &str = "https://api.w.org/featuredmedia";

/// Size used when the requested thumbnail size is not available
pub const FALLBACK_MEDIA_SIZE: &str = "full";

const DATE_GMT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A field the API returns pre-rendered as HTML
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
}

impl Rendered {
    pub fn new(html: impl Into<String>) -> Self {
        Self { rendered: html.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Numeric on WordPress; some fixtures and proxies send strings
    #[serde(deserialize_with = "id_from_number_or_string")]
    pub id: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    /// Publication time in UTC without an offset, e.g. `2016-02-16T13:54:13`
    #[serde(default)]
    pub date_gmt: Option<String>,
    #[serde(default, rename = "_embedded", skip_serializing_if = "Option::is_none")]
    pub embedded: Option<Value>,
}

impl Post {
    /// Source url of the featured image at `size`, falling back to the full size.
    pub fn thumbnail_url(&self, size: &str) -> Option<&str> {
        let media = self.embedded.as_ref()?.get(FEATURED_MEDIA_REL)?.get(0)?;
        let sizes = media.get("media_details")?.get("sizes")?;
        sizes
            .get(size)
            .or_else(|| sizes.get(FALLBACK_MEDIA_SIZE))?
            .get("source_url")?
            .as_str()
    }

    /// `date_gmt` as a UTC timestamp; `None` when the API omitted it.
    pub fn published_at(&self) -> Option<Result<DateTime<Utc>, chrono::ParseError>> {
        let raw = self.date_gmt.as_deref()?;
        Some(NaiveDateTime::parse_from_str(raw, DATE_GMT_FORMAT).map(|naive| naive.and_utc()))
    }
}

fn id_from_number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => Ok(n.to_string()),
        Scalar::Str(s) => Ok(s),
        other => Err(D::Error::custom(format!("unsupported post id: {}", other))),
    }
}

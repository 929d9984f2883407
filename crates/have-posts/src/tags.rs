//! Template tags
//!
//! Each tag turns the current [`Post`] into a small HTML fragment. The post is
//! always passed in explicitly; tags never look it up from an enclosing loop.
//! Rendered fields (`title`, `content`, `excerpt`) are trusted HTML from the
//! API and emitted as-is; values placed in attributes are escaped.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use askama_escape::{escape, Html};
use chrono::format::{Item, StrftimeItems};

use crate::error::{Error, Result};
use crate::post::Post;

/// Attributes written on a tag, e.g. `href` or `size`
pub type Attributes = BTreeMap<String, String>;

/// Thumbnail size used when `size` is not given
pub const DEFAULT_THUMBNAIL_SIZE: &str = "post-thumbnail";

/// `yyyy/MM/ddTH:mm:ssZ`
pub const DEFAULT_DATE_FORMAT: &str = "%Y/%m/%dT%-H:%M:%S%z";

pub trait TemplateTag: Send + Sync {
    fn render(&self, post: &Post, attrs: &Attributes) -> Result<String>;
}

impl<T> TemplateTag for T
where
    T: Fn(&Post, &Attributes) -> Result<String> + Send + Sync,
{
    fn render(&self, post: &Post, attrs: &Attributes) -> Result<String> {
        self(post, attrs)
    }
}

// ============================================================================
// Built-in tags
// ============================================================================

/// `<the-title>`; with `href`, the title links to it after `:id`/`:slug` substitution
pub struct TheTitle;

impl TemplateTag for TheTitle {
    fn render(&self, post: &Post, attrs: &Attributes) -> Result<String> {
        let title = &post.title.rendered;
        Ok(match attrs.get("href") {
            Some(href) => format!(
                "<div class=\"the-title\"><a href=\"{}\">{}</a></div>",
                escape(&permalink(href, post), Html),
                title
            ),
            None => format!("<div class=\"the-title\">{}</div>", title),
        })
    }
}

/// Fill the first `:id` and the first `:slug` in a link pattern
pub fn permalink(pattern: &str, post: &Post) -> String {
    pattern.replacen(":id", &post.id, 1).replacen(":slug", &post.slug, 1)
}

pub struct TheContent;

impl TemplateTag for TheContent {
    fn render(&self, post: &Post, _attrs: &Attributes) -> Result<String> {
        Ok(format!("<div class=\"the-content\">{}</div>", post.content.rendered))
    }
}

pub struct TheExcerpt;

impl TemplateTag for TheExcerpt {
    fn render(&self, post: &Post, _attrs: &Attributes) -> Result<String> {
        Ok(format!("<div class=\"the-excerpt\">{}</div>", post.excerpt.rendered))
    }
}

pub struct TheId;

impl TemplateTag for TheId {
    fn render(&self, post: &Post, _attrs: &Attributes) -> Result<String> {
        Ok(format!("<div class=\"the-id\">{}</div>", escape(&post.id, Html)))
    }
}

/// `<the-post-thumbnail size="...">`; an empty `<img>` when there is no featured image
pub struct ThePostThumbnail;

impl TemplateTag for ThePostThumbnail {
    fn render(&self, post: &Post, attrs: &Attributes) -> Result<String> {
        let size = attrs.get("size").map(String::as_str).unwrap_or(DEFAULT_THUMBNAIL_SIZE);
        Ok(match post.thumbnail_url(size) {
            Some(src) => format!(
                "<div class=\"the-post-thumbnail\"><img src=\"{}\"></div>",
                escape(src, Html)
            ),
            None => "<div class=\"the-post-thumbnail\"><img></div>".to_string(),
        })
    }
}

/// `<the-date format="...">`; `format` is a strftime string applied to `date_gmt`
pub struct TheDate;

impl TemplateTag for TheDate {
    fn render(&self, post: &Post, attrs: &Attributes) -> Result<String> {
        let format = attrs.get("format").map(String::as_str).unwrap_or(DEFAULT_DATE_FORMAT);
        let items = strftime_items(format)?;
        let date = match post.published_at() {
            Some(date) => date.map_err(|e| Error::Render(format!("post {} has an invalid date: {}", post.id, e)))?,
            None => return Ok("<div class=\"the-date\"></div>".to_string()),
        };
        let text = date.format_with_items(items.into_iter()).to_string();
        Ok(format!("<div class=\"the-date\">{}</div>", escape(&text, Html)))
    }
}

fn strftime_items(format: &str) -> Result<Vec<Item<'_>>> {
    let items: Vec<Item<'_>> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::Render(format!("invalid date format {:?}", format)));
    }
    Ok(items)
}

// ============================================================================
// TagRegistry
// ============================================================================

/// Tag name → implementation. Built once at startup and handed to the renderer.
#[derive(Default)]
pub struct TagRegistry {
    tags: HashMap<String, Box<dyn TemplateTag>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `the-title`, `the-content`, `the-excerpt`, `the-id`,
    /// `the-post-thumbnail` and `the-date`.
    pub fn with_builtin_tags() -> Self {
        let mut registry = Self::new();
        registry
            .register("the-title", TheTitle)
            .register("the-content", TheContent)
            .register("the-excerpt", TheExcerpt)
            .register("the-id", TheId)
            .register("the-post-thumbnail", ThePostThumbnail)
            .register("the-date", TheDate);
        registry
    }

    /// Add or replace a tag
    pub fn register(&mut self, name: impl Into<String>, tag: impl TemplateTag + 'static) -> &mut Self {
        self.tags.insert(name.into(), Box::new(tag));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn render(&self, name: &str, post: &Post, attrs: &Attributes) -> Result<String> {
        let tag = self
            .tags
            .get(name)
            .ok_or_else(|| Error::Render(format!("unknown tag <{}>", name)))?;
        tag.render(post, attrs)
    }
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.tags.keys().collect();
        names.sort();
        f.debug_struct("TagRegistry").field("tags", &names).finish()
    }
}

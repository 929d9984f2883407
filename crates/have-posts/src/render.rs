//! Loop container markup
//!
//! Renders a [`LoadedSet`] of posts as
//! `<div class="have-posts"><article class="{post_type} post-{id}">…</article>…</div>`,
//! filling each article with the loop's child fragments.

use std::fmt::Write;

use askama_escape::{escape, Html};

use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::post::Post;
use crate::tags::{Attributes, TagRegistry};
use crate::{LoadedSet, PostLoop};

/// One child of the loop element, repeated for every post
#[derive(Clone, Debug, PartialEq)]
pub enum Fragment {
    /// Markup emitted as written
    Text(String),
    /// A template tag resolved through the [`TagRegistry`]
    Tag { name: String, attrs: Attributes },
}

impl Fragment {
    pub fn text(markup: impl Into<String>) -> Self {
        Fragment::Text(markup.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Fragment::Tag {
            name: name.into(),
            attrs: Attributes::new(),
        }
    }

    /// Add an attribute; ignored on text fragments
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        if let Fragment::Tag { attrs, .. } = &mut self {
            attrs.insert(key.into(), value.into());
        }
        self
    }
}

/// Render the children of one `<article>` for `post`
pub fn render_item(post_type: &str, post: &Post, children: &[Fragment], registry: &TagRegistry) -> Result<String> {
    let mut out = String::new();
    write!(
        out,
        "<article class=\"{} post-{}\">",
        escape(post_type, Html),
        escape(&post.id, Html)
    )
    .map_err(fmt_error)?;
    for child in children {
        match child {
            Fragment::Text(markup) => out.push_str(markup),
            Fragment::Tag { name, attrs } => out.push_str(&registry.render(name, post, attrs)?),
        }
    }
    out.push_str("</article>");
    Ok(out)
}

/// Render the whole loop container
pub fn render_loop(
    post_type: &str,
    set: &LoadedSet<Post>,
    children: &[Fragment],
    registry: &TagRegistry,
) -> Result<String> {
    let mut out = String::from("<div class=\"have-posts\">");
    for post in &set.items {
        out.push_str(&render_item(post_type, post, children, registry)?);
    }
    out.push_str("</div>");
    Ok(out)
}

fn fmt_error(err: std::fmt::Error) -> Error {
    Error::Render(err.to_string())
}

impl<F: Fetcher<Item = Post>> PostLoop<F> {
    /// Render everything loaded so far
    pub fn render(&self, children: &[Fragment], registry: &TagRegistry) -> Result<String> {
        render_loop(self.post_type(), &self.snapshot(), children, registry)
    }
}

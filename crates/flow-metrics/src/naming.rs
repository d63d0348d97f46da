//! Name and tag resolution for metered publishers.
//!
//! A publisher is identified by its user-assigned name (or `reactor` when
//! anonymous) and its user-assigned tags. [`Named`] attaches both to any
//! publisher.

use crate::protocol::{Arity, Publisher, Subscriber};
use common::types::TagSet;
use std::sync::Arc;

/// Name used for publishers without a user-assigned name.
pub const DEFAULT_NAME: &str = "reactor";

/// Tag carrying the publisher arity (`Mono` / `Flux`).
pub const TAG_TYPE: &str = "type";

/// Tag carrying the resolved flow name.
pub const TAG_FLOW: &str = "flow";

/// Default tags for a publisher of the given arity.
#[must_use]
pub fn default_tags(arity: Arity) -> TagSet {
    TagSet::of(TAG_TYPE, arity.as_str())
}

/// The publisher's name, or [`DEFAULT_NAME`] if it has none.
pub fn resolve_name<P: Publisher + ?Sized>(publisher: &P) -> String {
    publisher
        .name()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_NAME)
        .to_string()
}

/// `default_tags` plus the flow name plus the publisher's own tags.
/// Publisher tags win over defaults on conflicting keys.
pub fn resolve_tags<P: Publisher + ?Sized>(
    publisher: &P,
    default_tags: &TagSet,
    name: &str,
) -> TagSet {
    default_tags
        .and(TAG_FLOW, name)
        .and_all(&publisher.tags())
}

/// Publisher carrying a user-assigned name and tags.
pub struct Named<P> {
    source: P,
    name: Option<String>,
    tags: TagSet,
}

impl<P: Publisher> Named<P> {
    /// Wrap `source` without name or tags.
    pub fn new(source: P) -> Self {
        Self {
            source,
            name: None,
            tags: TagSet::new(),
        }
    }

    /// Set the name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags = self.tags.and(key, value);
        self
    }
}

impl<P: Publisher> Publisher for Named<P> {
    type Item = P::Item;
    type Error = P::Error;

    fn subscribe(&self, subscriber: Arc<dyn Subscriber<Self::Item, Self::Error>>) {
        self.source.subscribe(subscriber);
    }

    fn arity(&self) -> Arity {
        self.source.arity()
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref().or_else(|| self.source.name())
    }

    fn tags(&self) -> TagSet {
        self.source.tags().and_all(&self.tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources;

    #[test]
    fn test_anonymous_publisher_uses_default_name() {
        let source = sources::just::<u32, std::io::Error>(1);
        assert_eq!(resolve_name(&source), DEFAULT_NAME);

        let blank = Named::new(sources::just::<u32, std::io::Error>(1)).named("  ");
        assert_eq!(resolve_name(&blank), DEFAULT_NAME);
    }

    #[test]
    fn test_named_publisher_resolves_name_and_tags() {
        let source = Named::new(sources::just::<u32, std::io::Error>(1))
            .named("checkout")
            .tag("region", "eu");

        let name = resolve_name(&source);
        let tags = resolve_tags(&source, &default_tags(source.arity()), &name);

        assert_eq!(name, "checkout");
        assert_eq!(tags.get(TAG_TYPE), Some("Mono"));
        assert_eq!(tags.get(TAG_FLOW), Some("checkout"));
        assert_eq!(tags.get("region"), Some("eu"));
    }

    #[test]
    fn test_nested_named_merges_tags_and_keeps_outer_name() {
        let inner = Named::new(sources::from_iter::<u32, std::io::Error>(vec![1, 2]))
            .named("inner")
            .tag("tier", "gold")
            .tag("region", "us");
        let outer = Named::new(inner).tag("region", "eu");

        assert_eq!(outer.name(), Some("inner"));
        assert_eq!(outer.tags().get("region"), Some("eu"));
        assert_eq!(outer.tags().get("tier"), Some("gold"));
        assert_eq!(outer.arity(), Arity::Flux);
    }
}

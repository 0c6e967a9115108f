//! Embedded resources with typed placeholders.
//!
//! Every resource sitemill ships (the XSL stylesheet, the developer page, the
//! starter config) is paired with a vars type that knows the resource's
//! placeholders, so a resource can only be rendered with the values it needs.

use std::marker::PhantomData;

/// Values substituted into one kind of embedded resource.
pub trait TemplateVars {
    /// Replace every placeholder in `content`.
    fn apply(&self, content: &str) -> String;
}

/// An embedded resource rendered with `V`.
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    source: &'static str,
    _vars: PhantomData<fn() -> V>,
}

impl<V> Template<V> {
    pub const fn new(source: &'static str) -> Self {
        Self {
            source,
            _vars: PhantomData,
        }
    }

    /// Unrendered source, placeholders included.
    #[cfg(test)]
    pub const fn content(&self) -> &'static str {
        self.source
    }
}

impl<V: TemplateVars> Template<V> {
    pub fn render(&self, vars: &V) -> String {
        vars.apply(self.source)
    }
}

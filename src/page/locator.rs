//! Locators
//!
//! A [`Locator`] is only a description of how to find elements. Nothing is
//! resolved until an operation runs, and every operation resolves again, so a
//! locator can be built before its elements exist and stays valid across
//! re-renders.

use std::fmt;

use super::dom::{SelectorStep, Target};
use super::Page;
use crate::{Error, Result};

/// Deferred reference to zero or more elements on a [`Page`]
#[derive(Clone)]
pub struct Locator<'p> {
    pub(crate) page: &'p Page,
    pub(crate) target: Target,
    description: String,
}

impl<'p> Locator<'p> {
    pub(crate) fn new(page: &'p Page, selector: &str) -> Self {
        Self {
            page,
            target: Target {
                steps: vec![parse_step(selector)],
            },
            description: selector.to_string(),
        }
    }

    /// Elements matching `selector` inside the elements of this locator
    pub fn locator(&self, selector: &str) -> Locator<'p> {
        let mut target = self.target.clone();
        target.steps.push(parse_step(selector));
        Locator {
            page: self.page,
            target,
            description: format!("{} >> {}", self.description, selector),
        }
    }

    pub fn first(&self) -> Locator<'p> {
        self.nth(0)
    }

    pub fn last(&self) -> Locator<'p> {
        self.nth(-1)
    }

    /// Narrow to the `index`-th match; negative indexes count from the end
    pub fn nth(&self, index: i64) -> Locator<'p> {
        let mut target = self.target.clone();
        if let Some(last) = target.steps.last_mut() {
            last.nth = Some(index);
        }
        Locator {
            page: self.page,
            target,
            description: format!("{} >> nth={}", self.description, index),
        }
    }

    pub fn page(&self) -> &'p Page {
        self.page
    }

    /// Human-readable selector chain, used in diagnostics
    pub fn selector(&self) -> &str {
        &self.description
    }

    pub(crate) fn not_found(&self) -> Error {
        Error::element_not_found(&self.description)
    }
}

impl fmt::Debug for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("selector", &self.description)
            .field("page", &self.page.id())
            .finish()
    }
}

impl fmt::Display for Locator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// Split a trailing `:has-text("...")` filter off a CSS selector
pub(crate) fn parse_step(selector: &str) -> SelectorStep {
    const MARKER: &str = ":has-text(";

    let trimmed = selector.trim();
    if let Some(start) = trimmed.rfind(MARKER) {
        if trimmed.ends_with(')') {
            let inner = trimmed[start + MARKER.len()..trimmed.len() - 1].trim();
            if let Some(text) = unquote(inner) {
                let css = trimmed[..start].trim();
                return SelectorStep {
                    css: if css.is_empty() { "*".to_string() } else { css.to_string() },
                    has_text: Some(text.to_string()),
                    nth: None,
                };
            }
        }
    }

    SelectorStep {
        css: trimmed.to_string(),
        has_text: None,
        nth: None,
    }
}

fn unquote(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_selector() {
        let step = parse_step("  .collapsible-commentary-header.jayamangala ");
        assert_eq!(step.css, ".collapsible-commentary-header.jayamangala");
        assert_eq!(step.has_text, None);
    }

    #[test]
    fn test_parse_has_text_filter() {
        let step = parse_step(r#"#mantra-section button:has-text("💾 Save")"#);
        assert_eq!(step.css, "#mantra-section button");
        assert_eq!(step.has_text.as_deref(), Some("💾 Save"));

        let step = parse_step(":has-text('Cancel')");
        assert_eq!(step.css, "*");
        assert_eq!(step.has_text.as_deref(), Some("Cancel"));
    }

    #[test]
    fn test_unquoted_has_text_is_left_to_css() {
        let step = parse_step("button:has-text(Save)");
        assert_eq!(step.css, "button:has-text(Save)");
        assert_eq!(step.has_text, None);
    }
}

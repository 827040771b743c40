//! Selector matcher over the open-element stack
//!
//! The matcher never builds a tree. It keeps one small record per open
//! element holding the tag name and whether the element, or any ancestor,
//! matched the selector.

use crate::domain::Selector;

use super::token::{Attribute, StartTagView};

/// Elements that never have content or an end tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    EntersMatchedScope,
    StaysUnmatched,
}

impl MatchDecision {
    pub fn is_matched(self) -> bool {
        matches!(self, Self::EntersMatchedScope)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElementContext {
    name: String,
    matched: bool,
}

#[derive(Debug)]
pub struct SelectorMatcher<'s> {
    selector: &'s Selector,
    stack: Vec<ElementContext>,
    max_depth: usize,
}

impl<'s> SelectorMatcher<'s> {
    pub fn new(selector: &'s Selector) -> Self {
        Self {
            selector,
            stack: Vec::new(),
            max_depth: 0,
        }
    }

    pub fn on_start_tag(&mut self, name: &str, attributes: &[Attribute], self_closing: bool) -> MatchDecision {
        let parent_matched = self.in_matched_scope();
        let self_match = self.selector.matches(&StartTagView { name, attributes });
        let matched = parent_matched || self_match;

        // self-closing and void elements open and close in the same step
        if !self_closing && !is_void_element(name) {
            self.stack.push(ElementContext {
                name: name.to_string(),
                matched,
            });
            self.max_depth = self.max_depth.max(self.stack.len());
        }

        if matched {
            MatchDecision::EntersMatchedScope
        } else {
            MatchDecision::StaysUnmatched
        }
    }

    /// Close the element named `name`.
    ///
    /// Mismatched nesting pops up to and including the nearest open element
    /// with that name; a close tag with no open counterpart pops exactly one
    /// entry. Void elements were never pushed, so their stray close tags
    /// are ignored.
    pub fn on_end_tag(&mut self, name: &str) {
        if is_void_element(name) {
            return;
        }
        match self.stack.iter().rposition(|ctx| ctx.name == name) {
            Some(index) => self.stack.truncate(index),
            None => {
                self.stack.pop();
            }
        }
    }

    /// Whether text at the current position belongs to a matched element
    pub fn in_matched_scope(&self) -> bool {
        self.stack.last().is_some_and(|ctx| ctx.matched)
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Deepest nesting observed during the scan
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

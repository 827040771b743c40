//! CSS selector model for the streaming extractor
//!
//! Only compound selectors are supported: an optional tag name (or `*`),
//! an optional id, class names and attribute constraints. Several compound
//! selectors may be grouped with commas (`h1, .title`); an element matches
//! the group when any member matches it.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while parsing a selector string
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Selector is empty")]
    Empty,

    #[error("Unsupported combinator '{combinator}' in selector: {selector}")]
    UnsupportedCombinator { selector: String, combinator: char },

    #[error("Unsupported pseudo-class in selector: {selector}")]
    UnsupportedPseudoClass { selector: String },

    #[error("Invalid CSS selector: {selector} - {reason}")]
    Malformed { selector: String, reason: String },
}

impl SelectorError {
    fn malformed(selector: &str, reason: impl Into<String>) -> Self {
        Self::Malformed {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read-only view of an element's start tag, as seen by the matcher
pub trait ElementView {
    /// Lowercase tag name
    fn tag_name(&self) -> &str;

    /// Value of the attribute with the given lowercase name
    fn attribute(&self, name: &str) -> Option<&str>;
}

/// Tag part of a compound selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagName {
    /// `*`
    Any,
    Named(String),
}

/// Attribute comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    /// `[attr]`
    Exists,
    /// `[attr=value]`
    Equals,
    /// `[attr~=value]`, whitespace separated word
    Includes,
    /// `[attr|=value]`, exact or followed by `-`
    DashMatch,
    /// `[attr^=value]`
    Prefix,
    /// `[attr$=value]`
    Suffix,
    /// `[attr*=value]`
    Substring,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeConstraint {
    pub name: String,
    pub operator: AttributeOperator,
    pub value: String,
}

impl AttributeConstraint {
    /// Check the constraint against the element's attribute value, if any
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let expected = self.value.as_str();

        match self.operator {
            AttributeOperator::Exists => true,
            AttributeOperator::Equals => actual == expected,
            AttributeOperator::Includes => actual.split_ascii_whitespace().any(|word| word == expected),
            AttributeOperator::DashMatch => {
                actual == expected
                    || actual
                        .strip_prefix(expected)
                        .is_some_and(|rest| rest.starts_with('-'))
            }
            AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
            AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
            AttributeOperator::Substring => !expected.is_empty() && actual.contains(expected),
        }
    }
}

/// One compound selector such as `div#main.card[data-kind=price]`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompoundSelector {
    pub tag: Option<TagName>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attributes: Vec<AttributeConstraint>,
}

impl CompoundSelector {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    pub fn matches<E: ElementView + ?Sized>(&self, element: &E) -> bool {
        if let Some(TagName::Named(name)) = &self.tag {
            if name != element.tag_name() {
                return false;
            }
        }

        if let Some(id) = &self.id {
            if element.attribute("id") != Some(id.as_str()) {
                return false;
            }
        }

        if !self.classes.is_empty() {
            let Some(class_attr) = element.attribute("class") else {
                return false;
            };
            let all_present = self
                .classes
                .iter()
                .all(|class| class_attr.split_ascii_whitespace().any(|c| c == class));
            if !all_present {
                return false;
            }
        }

        self.attributes
            .iter()
            .all(|constraint| constraint.matches(element.attribute(&constraint.name)))
    }
}

/// A parsed selector group. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<CompoundSelector>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut parser = SelectorParser::new(source);
        let alternatives = parser.parse_group()?;

        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// True if any selector of the group matches the element
    pub fn matches<E: ElementView + ?Sized>(&self, element: &E) -> bool {
        self.alternatives.iter().any(|compound| compound.matches(element))
    }

    pub fn alternatives(&self) -> &[CompoundSelector] {
        &self.alternatives
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct SelectorParser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn parse_group(&mut self) -> Result<Vec<CompoundSelector>, SelectorError> {
        let mut alternatives = Vec::new();

        loop {
            self.skip_whitespace();
            let compound = self.parse_compound()?;
            if compound.is_empty() {
                return Err(SelectorError::malformed(self.source, "empty selector in group"));
            }
            alternatives.push(compound);

            let had_space = self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(',') => {
                    self.pos += 1;
                }
                Some(c @ ('>' | '+' | '~')) => {
                    return Err(SelectorError::UnsupportedCombinator {
                        selector: self.source.to_string(),
                        combinator: c,
                    });
                }
                Some(_) if had_space => {
                    return Err(SelectorError::UnsupportedCombinator {
                        selector: self.source.to_string(),
                        combinator: ' ',
                    });
                }
                Some(c) => {
                    return Err(SelectorError::malformed(self.source, format!("unexpected character '{c}'")));
                }
            }
        }

        Ok(alternatives)
    }

    fn parse_compound(&mut self) -> Result<CompoundSelector, SelectorError> {
        let mut compound = CompoundSelector::default();

        match self.peek() {
            Some('*') => {
                self.pos += 1;
                compound.tag = Some(TagName::Any);
            }
            Some(c) if is_ident_char(c) => {
                let name = self.parse_ident("tag name")?;
                compound.tag = Some(TagName::Named(name.to_ascii_lowercase()));
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    if compound.id.is_some() {
                        return Err(SelectorError::malformed(self.source, "more than one id"));
                    }
                    compound.id = Some(self.parse_ident("id")?);
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self.parse_ident("class name")?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.pos += 1;
                    let constraint = self.parse_attribute()?;
                    compound.attributes.push(constraint);
                }
                Some(':') => {
                    return Err(SelectorError::UnsupportedPseudoClass {
                        selector: self.source.to_string(),
                    });
                }
                Some('\\') => {
                    return Err(SelectorError::malformed(self.source, "escape sequences are not supported"));
                }
                _ => break,
            }
        }

        Ok(compound)
    }

    fn parse_ident(&mut self, what: &str) -> Result<String, SelectorError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(SelectorError::malformed(self.source, format!("expected {what}")));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn parse_attribute(&mut self) -> Result<AttributeConstraint, SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident("attribute name")?.to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match self.bump() {
            Some(']') => {
                return Ok(AttributeConstraint {
                    name,
                    operator: AttributeOperator::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttributeOperator::Equals,
            Some(c @ ('~' | '|' | '^' | '$' | '*')) => {
                if self.bump() != Some('=') {
                    return Err(SelectorError::malformed(
                        self.source,
                        format!("expected '=' after '{c}' in attribute selector"),
                    ));
                }
                match c {
                    '~' => AttributeOperator::Includes,
                    '|' => AttributeOperator::DashMatch,
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    _ => AttributeOperator::Substring,
                }
            }
            _ => return Err(SelectorError::malformed(self.source, "unterminated attribute selector")),
        };

        self.skip_whitespace();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while self.peek().is_some_and(|c| c != quote) {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(SelectorError::malformed(self.source, "unterminated quoted attribute value"));
                }
                let value: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                value
            }
            _ => self.parse_ident("attribute value")?,
        };

        self.skip_whitespace();
        if self.bump() != Some(']') {
            return Err(SelectorError::malformed(self.source, "expected ']' to close attribute selector"));
        }

        Ok(AttributeConstraint { name, operator, value })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

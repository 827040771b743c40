//! Tokens emitted by the incremental tokenizer

use crate::domain::ElementView;

/// A start-tag attribute. Names are ASCII-lowercased, values kept raw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Raw bytes of a text run between two markup constructs
    Text(Vec<u8>),
}

/// Borrowed view of a start tag for selector evaluation
#[derive(Debug, Clone, Copy)]
pub struct StartTagView<'a> {
    pub name: &'a str,
    pub attributes: &'a [Attribute],
}

impl ElementView for StartTagView<'_> {
    fn tag_name(&self) -> &str {
        self.name
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }
}

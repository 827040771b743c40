//! Incremental HTML tokenizer
//!
//! The tokenizer is a byte-level state machine that can be suspended at any
//! byte and resumed with the next chunk. Partial constructs (a text run, a
//! half-read tag, an open comment) are carried across `feed` calls, so the
//! token sequence does not depend on where the chunk boundaries fall.
//!
//! It is lenient rather than validating:
//! - a `<` that cannot start markup is literal text
//! - a tag still open at end of stream, or larger than `max_tag_bytes`,
//!   is flushed back as literal text
//! - comments, doctypes and processing instructions are dropped

use std::mem;

use super::token::{Attribute, Token};

/// Default upper bound on the raw size of a single tag
pub const DEFAULT_MAX_TAG_BYTES: usize = 64 * 1024;

/// Elements whose content is raw text up to the matching close tag
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    TagOpen,
    EndTagOpen,
    TagName,
    EndTagName,
    AfterEndTagName,
    BeforeAttrName,
    AttrName,
    AfterAttrName,
    BeforeAttrValue,
    AttrValueQuoted(u8),
    AttrValueUnquoted,
    SelfClosingStartTag,
    MarkupDeclarationOpen,
    MarkupDeclarationDash,
    CommentStart,
    CommentStartDash,
    Comment { dashes: u8 },
    BogusComment,
    RawText { matched: usize },
}

impl State {
    /// States whose bytes may have to be replayed as text
    fn is_tag(self) -> bool {
        matches!(
            self,
            Self::TagOpen
                | Self::EndTagOpen
                | Self::TagName
                | Self::EndTagName
                | Self::AfterEndTagName
                | Self::BeforeAttrName
                | Self::AttrName
                | Self::AfterAttrName
                | Self::BeforeAttrValue
                | Self::AttrValueQuoted(_)
                | Self::AttrValueUnquoted
                | Self::SelfClosingStartTag
        )
    }
}

#[inline]
fn is_html_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Chunk-fed HTML tokenizer
#[derive(Debug)]
pub struct Tokenizer {
    state: State,
    max_tag_bytes: usize,

    /// Pending text run, emitted once the next markup construct is confirmed
    text: Vec<u8>,
    /// Raw bytes of the tag being read, starting at `<`
    raw: Vec<u8>,

    tag_name: Vec<u8>,
    is_end_tag: bool,
    self_closing: bool,
    attr_name: Vec<u8>,
    attr_value: Vec<u8>,
    attributes: Vec<Attribute>,

    /// `</name` of the raw text element currently open
    raw_text_close: Vec<u8>,
    /// Bytes as read of a partially matched `raw_text_close`
    raw_text_seen: Vec<u8>,

    output: Vec<Token>,
    bytes_fed: u64,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_max_tag_bytes(DEFAULT_MAX_TAG_BYTES)
    }

    pub fn with_max_tag_bytes(max_tag_bytes: usize) -> Self {
        Self {
            state: State::Data,
            max_tag_bytes: max_tag_bytes.max(1),
            text: Vec::new(),
            raw: Vec::new(),
            tag_name: Vec::new(),
            is_end_tag: false,
            self_closing: false,
            attr_name: Vec::new(),
            attr_value: Vec::new(),
            attributes: Vec::new(),
            raw_text_close: Vec::new(),
            raw_text_seen: Vec::new(),
            output: Vec::new(),
            bytes_fed: 0,
        }
    }

    /// Total bytes consumed so far
    pub fn bytes_fed(&self) -> u64 {
        self.bytes_fed
    }

    /// Consume one chunk and return the tokens it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Token> {
        self.bytes_fed += chunk.len() as u64;
        for &b in chunk {
            self.step(b);
        }
        mem::take(&mut self.output)
    }

    /// Flush whatever is pending at end of stream
    pub fn finish(&mut self) -> Vec<Token> {
        match self.state {
            State::RawText { .. } => {
                let seen = mem::take(&mut self.raw_text_seen);
                self.text.extend_from_slice(&seen);
            }
            state if state.is_tag() => {
                let raw = mem::take(&mut self.raw);
                self.text.extend_from_slice(&raw);
            }
            _ => {}
        }
        self.flush_text();
        self.reset_tag();
        self.state = State::Data;
        mem::take(&mut self.output)
    }

    fn step(&mut self, b: u8) {
        if self.state.is_tag() {
            self.raw.push(b);
        }

        match self.state {
            State::Data => {
                if b == b'<' {
                    self.raw.clear();
                    self.raw.push(b);
                    self.state = State::TagOpen;
                } else {
                    self.text.push(b);
                }
            }
            State::TagOpen => self.tag_open(b),
            State::EndTagOpen => self.end_tag_open(b),
            State::TagName => match b {
                b'/' => self.state = State::SelfClosingStartTag,
                b'>' => self.emit_tag(),
                b if is_html_whitespace(b) => self.state = State::BeforeAttrName,
                b => self.tag_name.push(b.to_ascii_lowercase()),
            },
            State::EndTagName => match b {
                b'>' => self.emit_tag(),
                b'/' => self.state = State::AfterEndTagName,
                b if is_html_whitespace(b) => self.state = State::AfterEndTagName,
                b => self.tag_name.push(b.to_ascii_lowercase()),
            },
            State::AfterEndTagName => {
                if b == b'>' {
                    self.emit_tag();
                }
            }
            State::BeforeAttrName => self.before_attr_name(b),
            State::AttrName => match b {
                b'=' => self.state = State::BeforeAttrValue,
                b'/' => {
                    self.commit_attribute();
                    self.state = State::SelfClosingStartTag;
                }
                b'>' => {
                    self.commit_attribute();
                    self.emit_tag();
                }
                b if is_html_whitespace(b) => self.state = State::AfterAttrName,
                b => self.attr_name.push(b.to_ascii_lowercase()),
            },
            State::AfterAttrName => match b {
                b'=' => self.state = State::BeforeAttrValue,
                b if is_html_whitespace(b) => {}
                b => {
                    self.commit_attribute();
                    self.before_attr_name(b);
                }
            },
            State::BeforeAttrValue => match b {
                b'"' | b'\'' => self.state = State::AttrValueQuoted(b),
                b'>' => {
                    self.commit_attribute();
                    self.emit_tag();
                }
                b if is_html_whitespace(b) => {}
                b => {
                    self.attr_value.push(b);
                    self.state = State::AttrValueUnquoted;
                }
            },
            State::AttrValueQuoted(quote) => {
                if b == quote {
                    self.commit_attribute();
                    self.state = State::BeforeAttrName;
                } else {
                    self.attr_value.push(b);
                }
            }
            State::AttrValueUnquoted => match b {
                b'>' => {
                    self.commit_attribute();
                    self.emit_tag();
                }
                b if is_html_whitespace(b) => {
                    self.commit_attribute();
                    self.state = State::BeforeAttrName;
                }
                b => self.attr_value.push(b),
            },
            State::SelfClosingStartTag => {
                if b == b'>' {
                    self.self_closing = true;
                    self.emit_tag();
                } else {
                    self.before_attr_name(b);
                }
            }
            State::MarkupDeclarationOpen => match b {
                b'-' => self.state = State::MarkupDeclarationDash,
                b'>' => self.state = State::Data,
                _ => self.state = State::BogusComment,
            },
            State::MarkupDeclarationDash => match b {
                b'-' => self.state = State::CommentStart,
                b'>' => self.state = State::Data,
                _ => self.state = State::BogusComment,
            },
            // `<!-->` and `<!--->` are complete empty comments
            State::CommentStart => match b {
                b'>' => self.state = State::Data,
                b'-' => self.state = State::CommentStartDash,
                _ => self.state = State::Comment { dashes: 0 },
            },
            State::CommentStartDash => match b {
                b'>' => self.state = State::Data,
                b'-' => self.state = State::Comment { dashes: 2 },
                _ => self.state = State::Comment { dashes: 0 },
            },
            State::Comment { dashes } => {
                self.state = match b {
                    b'-' => State::Comment {
                        dashes: dashes.saturating_add(1).min(2),
                    },
                    b'>' if dashes >= 2 => State::Data,
                    _ => State::Comment { dashes: 0 },
                };
            }
            State::BogusComment => {
                if b == b'>' {
                    self.state = State::Data;
                }
            }
            State::RawText { matched } => self.raw_text(b, matched),
        }

        if self.state.is_tag() && self.raw.len() > self.max_tag_bytes {
            self.abandon_tag();
        }
    }

    fn tag_open(&mut self, b: u8) {
        match b {
            b if b.is_ascii_alphabetic() => {
                self.flush_text();
                self.reset_tag();
                self.tag_name.push(b.to_ascii_lowercase());
                self.state = State::TagName;
            }
            b'/' => self.state = State::EndTagOpen,
            b'!' => {
                self.flush_text();
                self.raw.clear();
                self.state = State::MarkupDeclarationOpen;
            }
            b'?' => {
                self.flush_text();
                self.raw.clear();
                self.state = State::BogusComment;
            }
            b'<' => {
                // the first `<` was literal; this one may still open a tag
                self.text.push(b'<');
                self.raw.clear();
                self.raw.push(b'<');
            }
            _ => {
                let raw = mem::take(&mut self.raw);
                self.text.extend_from_slice(&raw);
                self.state = State::Data;
            }
        }
    }

    fn end_tag_open(&mut self, b: u8) {
        match b {
            b if b.is_ascii_alphabetic() => {
                self.flush_text();
                self.reset_tag();
                self.is_end_tag = true;
                self.tag_name.push(b.to_ascii_lowercase());
                self.state = State::EndTagName;
            }
            // `</>` is dropped without splitting the text run
            b'>' => {
                self.raw.clear();
                self.state = State::Data;
            }
            _ => {
                self.flush_text();
                self.raw.clear();
                self.state = State::BogusComment;
            }
        }
    }

    fn before_attr_name(&mut self, b: u8) {
        match b {
            b'/' => self.state = State::SelfClosingStartTag,
            b'>' => self.emit_tag(),
            b if is_html_whitespace(b) => self.state = State::BeforeAttrName,
            b => {
                self.attr_name.clear();
                self.attr_value.clear();
                self.attr_name.push(b.to_ascii_lowercase());
                self.state = State::AttrName;
            }
        }
    }

    fn raw_text(&mut self, b: u8, matched: usize) {
        let close_len = self.raw_text_close.len();

        if matched == close_len {
            if b == b'>' || b == b'/' || is_html_whitespace(b) {
                self.flush_text();
                self.reset_tag();
                self.is_end_tag = true;
                self.tag_name.extend_from_slice(&self.raw_text_close[2..]);
                self.raw = mem::take(&mut self.raw_text_seen);
                self.raw.push(b);
                if b == b'>' {
                    self.emit_tag();
                } else {
                    self.state = State::AfterEndTagName;
                }
                return;
            }
            let seen = mem::take(&mut self.raw_text_seen);
            self.text.extend_from_slice(&seen);
            self.raw_text(b, 0);
            return;
        }

        if b.to_ascii_lowercase() == self.raw_text_close[matched] {
            self.raw_text_seen.push(b);
            self.state = State::RawText { matched: matched + 1 };
            return;
        }

        let seen = mem::take(&mut self.raw_text_seen);
        self.text.extend_from_slice(&seen);
        if b == b'<' {
            self.raw_text_seen.push(b);
            self.state = State::RawText { matched: 1 };
        } else {
            self.text.push(b);
            self.state = State::RawText { matched: 0 };
        }
    }

    fn commit_attribute(&mut self) {
        if self.attr_name.is_empty() {
            return;
        }
        let name = lossy(&self.attr_name);
        if !self.attributes.iter().any(|attr| attr.name == name) {
            let value = lossy(&self.attr_value);
            self.attributes.push(Attribute { name, value });
        }
        self.attr_name.clear();
        self.attr_value.clear();
    }

    fn emit_tag(&mut self) {
        self.raw.clear();
        let name = lossy(&self.tag_name);

        if self.is_end_tag {
            self.output.push(Token::EndTag { name });
            self.state = State::Data;
        } else {
            let enters_raw_text = !self.self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str());
            if enters_raw_text {
                self.raw_text_close.clear();
                self.raw_text_close.extend_from_slice(b"</");
                self.raw_text_close.extend_from_slice(name.as_bytes());
                self.raw_text_seen.clear();
            }
            self.output.push(Token::StartTag {
                name,
                attributes: mem::take(&mut self.attributes),
                self_closing: self.self_closing,
            });
            self.state = if enters_raw_text {
                State::RawText { matched: 0 }
            } else {
                State::Data
            };
        }

        self.reset_tag();
    }

    /// Replay an oversized tag as literal text and resume in data state
    fn abandon_tag(&mut self) {
        let raw = mem::take(&mut self.raw);
        self.text.extend_from_slice(&raw);
        self.reset_tag();
        self.state = State::Data;
    }

    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.output.push(Token::Text(mem::take(&mut self.text)));
        }
    }

    fn reset_tag(&mut self) {
        self.tag_name.clear();
        self.is_end_tag = false;
        self.self_closing = false;
        self.attr_name.clear();
        self.attr_value.clear();
        self.attributes.clear();
    }
}

/// Tokenize a complete document in one call
pub fn tokenize(input: &[u8]) -> Vec<Token> {
    let mut tokenizer = Tokenizer::new();
    let mut tokens = tokenizer.feed(input);
    tokens.extend(tokenizer.finish());
    tokens
}

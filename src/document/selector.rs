//! Trigger selector language
//!
//! A jQuery-flavoured subset of CSS selectors, which is what tour triggers are
//! written in:
//!
//! - type, `*`, `#id`, `.class`
//! - `[attr]`, `[attr=v]`, `[attr*=v]`, `[attr^=v]`, `[attr$=v]`, `[attr~=v]`
//! - `:contains('text')`, `:not(sel)`, `:has(sel)`
//! - `:checked`, `:disabled`, `:enabled`, `:visible`
//! - descendant (whitespace) and child (`>`) combinators, `,` alternatives
//!
//! Matching is written against the [`ElementTree`] trait so any document
//! implementation can reuse it.

use std::fmt;

use serde::Deserialize;

use crate::common::{Error, Result};

/// Read-only view of an element tree, enough to evaluate selectors
pub trait ElementTree {
    /// Element handle
    type Id: Copy + PartialEq;

    fn parent(&self, id: Self::Id) -> Option<Self::Id>;
    fn children(&self, id: Self::Id) -> Vec<Self::Id>;
    fn tag(&self, id: Self::Id) -> &str;
    fn attr(&self, id: Self::Id, name: &str) -> Option<&str>;
    /// Concatenated text of the element and all its descendants
    fn text_content(&self, id: Self::Id) -> String;
    /// Whether the element and all its ancestors are displayed
    fn is_visible(&self, id: Self::Id) -> bool;
}

/// A parsed selector, keeping its source text for diagnostics
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Selector {
    source: String,
    alternatives: Vec<Complex>,
}

/// Compound selectors joined by combinators, e.g. `ul > li.active span`
#[derive(Debug, Clone, PartialEq)]
pub struct Complex {
    compounds: Vec<Compound>,
    /// `combinators[i]` sits between `compounds[i]` and `compounds[i + 1]`
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    Descendant,
    Child,
}

/// Type selector plus filters that must all hold on one element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Compound {
    tag: Option<String>,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Id(String),
    Class(String),
    Attr { name: String, op: AttrOp },
    Contains(String),
    Not(Selector),
    Has(Selector),
    Checked,
    Disabled,
    Enabled,
    Visible,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttrOp {
    Exists,
    Equals(String),
    Substring(String),
    Prefix(String),
    Suffix(String),
    Word(String),
}

impl AttrOp {
    fn test(&self, value: &str) -> bool {
        match self {
            AttrOp::Exists => true,
            AttrOp::Equals(v) => value == v,
            AttrOp::Substring(v) => value.contains(v.as_str()),
            AttrOp::Prefix(v) => value.starts_with(v.as_str()),
            AttrOp::Suffix(v) => value.ends_with(v.as_str()),
            AttrOp::Word(v) => value.split_whitespace().any(|w| w == v),
        }
    }
}

impl Selector {
    /// Parse a selector
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = Parser::new(source);
        let alternatives = parser.selector_list()?;
        parser.skip_ws();
        if let Some(c) = parser.peek() {
            return Err(parser.error(format!("unexpected '{}'", c)));
        }
        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    /// The selector text as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `el` matches any alternative
    pub fn matches<T: ElementTree>(&self, tree: &T, el: T::Id) -> bool {
        self.alternatives.iter().any(|c| c.matches(tree, el, None))
    }

    /// Whether some strict descendant of `scope` matches, with every
    /// compound of the chain located inside `scope`
    fn matches_within<T: ElementTree>(&self, tree: &T, scope: T::Id) -> bool {
        let mut stack = tree.children(scope);
        while let Some(el) = stack.pop() {
            if self
                .alternatives
                .iter()
                .any(|c| c.matches(tree, el, Some(scope)))
            {
                return true;
            }
            stack.extend(tree.children(el));
        }
        false
    }
}

impl TryFrom<String> for Selector {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Selector::parse(&value)
    }
}

impl std::str::FromStr for Selector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Complex {
    fn matches<T: ElementTree>(&self, tree: &T, el: T::Id, scope: Option<T::Id>) -> bool {
        self.matches_at(tree, el, self.compounds.len() - 1, scope)
    }

    fn matches_at<T: ElementTree>(
        &self,
        tree: &T,
        el: T::Id,
        index: usize,
        scope: Option<T::Id>,
    ) -> bool {
        if !self.compounds[index].matches(tree, el) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match self.combinators[index - 1] {
            Combinator::Child => match tree.parent(el) {
                Some(parent) if Some(parent) != scope => {
                    self.matches_at(tree, parent, index - 1, scope)
                }
                _ => false,
            },
            Combinator::Descendant => {
                let mut current = tree.parent(el);
                while let Some(ancestor) = current {
                    if Some(ancestor) == scope {
                        return false;
                    }
                    if self.matches_at(tree, ancestor, index - 1, scope) {
                        return true;
                    }
                    current = tree.parent(ancestor);
                }
                false
            }
        }
    }
}

impl Compound {
    fn matches<T: ElementTree>(&self, tree: &T, el: T::Id) -> bool {
        if let Some(tag) = &self.tag {
            if !tree.tag(el).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        self.filters.iter().all(|f| f.matches(tree, el))
    }
}

impl Filter {
    fn matches<T: ElementTree>(&self, tree: &T, el: T::Id) -> bool {
        match self {
            Filter::Id(id) => tree.attr(el, "id") == Some(id.as_str()),
            Filter::Class(class) => tree
                .attr(el, "class")
                .map(|c| c.split_whitespace().any(|c| c == class))
                .unwrap_or(false),
            Filter::Attr { name, op } => tree.attr(el, name).map(|v| op.test(v)).unwrap_or(false),
            Filter::Contains(text) => tree.text_content(el).contains(text.as_str()),
            Filter::Not(inner) => !inner.matches(tree, el),
            Filter::Has(inner) => inner.matches_within(tree, el),
            Filter::Checked => tree.attr(el, "checked").is_some(),
            Filter::Disabled => tree.attr(el, "disabled").is_some(),
            Filter::Enabled => tree.attr(el, "disabled").is_none(),
            Filter::Visible => tree.is_visible(el),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::invalid_selector(
            self.source,
            format!("{} at position {}", reason.into(), self.pos),
        )
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Skip whitespace, returning whether any was skipped
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn selector_list(&mut self) -> Result<Vec<Complex>> {
        let mut alternatives = vec![self.complex()?];
        loop {
            self.skip_ws();
            if self.peek() != Some(',') {
                break;
            }
            self.bump();
            alternatives.push(self.complex()?);
        }
        Ok(alternatives)
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_ws();
        let mut compounds = vec![self.compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_ws = self.skip_ws();
            let combinator = match self.peek() {
                None | Some(',') | Some(')') => break,
                Some('>') => {
                    self.bump();
                    self.skip_ws();
                    Combinator::Child
                }
                Some(_) if had_ws => Combinator::Descendant,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
            };
            combinators.push(combinator);
            compounds.push(self.compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;

        if self.peek() == Some('*') {
            self.bump();
        } else if matches!(self.peek(), Some(c) if is_ident_char(c)) {
            compound.tag = Some(self.ident()?);
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.filters.push(Filter::Id(self.ident()?));
                }
                Some('.') => {
                    self.bump();
                    compound.filters.push(Filter::Class(self.ident()?));
                }
                Some('[') => compound.filters.push(self.attribute()?),
                Some(':') => compound.filters.push(self.pseudo()?),
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some(c) => self.error(format!("expected a selector, found '{}'", c)),
                None => self.error("expected a selector, found end of input"),
            });
        }
        Ok(compound)
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected an identifier"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn attribute(&mut self) -> Result<Filter> {
        self.expect('[')?;
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();

        let op: fn(String) -> AttrOp = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(Filter::Attr {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => {
                self.bump();
                AttrOp::Equals
            }
            Some(c @ ('*' | '^' | '$' | '~')) => {
                self.bump();
                self.expect('=')?;
                match c {
                    '*' => AttrOp::Substring,
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Word,
                }
            }
            Some(c) => return Err(self.error(format!("unexpected '{}' in attribute", c))),
            None => return Err(self.error("unterminated attribute selector")),
        };

        self.skip_ws();
        let value = match self.peek() {
            Some('\'' | '"') => self.quoted()?,
            _ => self.ident()?,
        };
        self.skip_ws();
        self.expect(']')?;

        Ok(Filter::Attr {
            name,
            op: op(value),
        })
    }

    fn pseudo(&mut self) -> Result<Filter> {
        self.expect(':')?;
        let name = self.ident()?;
        match name.as_str() {
            "contains" => {
                self.expect('(')?;
                self.skip_ws();
                let text = match self.peek() {
                    Some('\'' | '"') => {
                        let text = self.quoted()?;
                        self.skip_ws();
                        text
                    }
                    _ => self.raw_until_paren()?,
                };
                self.expect(')')?;
                Ok(Filter::Contains(text))
            }
            "not" | "has" => {
                self.expect('(')?;
                let start = self.pos;
                let alternatives = self.selector_list()?;
                let source: String = self.chars[start..self.pos].iter().collect();
                self.skip_ws();
                self.expect(')')?;
                let inner = Selector {
                    source: source.trim().to_string(),
                    alternatives,
                };
                Ok(if name == "not" {
                    Filter::Not(inner)
                } else {
                    Filter::Has(inner)
                })
            }
            "checked" => Ok(Filter::Checked),
            "disabled" => Ok(Filter::Disabled),
            "enabled" => Ok(Filter::Enabled),
            "visible" => Ok(Filter::Visible),
            other => Err(self.error(format!("unsupported pseudo-class ':{}'", other))),
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted string")),
        };
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => value.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(value),
                Some(c) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn raw_until_paren(&mut self) -> Result<String> {
        let start = self.pos;
        while !matches!(self.peek(), Some(')') | None) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(self.error("unterminated ':contains('"));
        }
        let raw: String = self.chars[start..self.pos].iter().collect();
        Ok(raw.trim_end().to_string())
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

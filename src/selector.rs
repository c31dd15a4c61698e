//! Minimal CSS selector support for the in-memory document.
//!
//! Supports selector lists (`a, b`), the descendant combinator, and compound
//! selectors made of a tag or `*`, `#id`, `.class`, `[attr]`, `[attr=value]`
//! and `:not(...)` over those simple selectors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character {0:?} in selector")]
    Unexpected(char),
    #[error("unterminated {0} in selector")]
    Unterminated(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Simple {
    Universal,
    Type(String),
    Id(String),
    Class(String),
    HasAttr(String),
    AttrEquals(String, String),
    Not(Box<Simple>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub parts: Vec<Simple>,
}

/// Compounds joined by descendant combinators, leftmost ancestor first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Complex {
    pub compounds: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub alternatives: Vec<Complex>,
}

/// Read access the matcher needs from a tree.
pub trait ElementTree {
    type Node: Copy;

    fn tag(&self, node: Self::Node) -> &str;
    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut alternatives = Vec::new();
        for part in input.split(',') {
            alternatives.push(parse_complex(part)?);
        }
        Ok(Self { alternatives })
    }

    pub fn matches<T: ElementTree>(&self, tree: &T, node: T::Node) -> bool {
        self.alternatives
            .iter()
            .any(|complex| complex.matches(tree, node))
    }
}

impl Complex {
    fn matches<T: ElementTree>(&self, tree: &T, node: T::Node) -> bool {
        let Some((last, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !last.matches(tree, node) {
            return false;
        }
        // Descendant-only chains can be matched greedily from the right.
        let mut cursor = tree.parent(node);
        for compound in ancestors.iter().rev() {
            loop {
                let Some(candidate) = cursor else {
                    return false;
                };
                cursor = tree.parent(candidate);
                if compound.matches(tree, candidate) {
                    break;
                }
            }
        }
        true
    }
}

impl Compound {
    fn matches<T: ElementTree>(&self, tree: &T, node: T::Node) -> bool {
        self.parts.iter().all(|part| part.matches(tree, node))
    }
}

impl Simple {
    fn matches<T: ElementTree>(&self, tree: &T, node: T::Node) -> bool {
        match self {
            Simple::Universal => true,
            Simple::Type(name) => tree.tag(node).eq_ignore_ascii_case(name),
            Simple::Id(want) => tree.attr(node, "id") == Some(want.as_str()),
            Simple::Class(want) => tree
                .attr(node, "class")
                .map(|list| list.split_whitespace().any(|c| c == want))
                .unwrap_or(false),
            Simple::HasAttr(name) => tree.attr(node, name).is_some(),
            Simple::AttrEquals(name, value) => tree.attr(node, name) == Some(value.as_str()),
            Simple::Not(inner) => !inner.matches(tree, node),
        }
    }
}

fn parse_complex(input: &str) -> Result<Complex, SelectorError> {
    let compounds = input
        .split_whitespace()
        .map(parse_compound)
        .collect::<Result<Vec<_>, _>>()?;
    if compounds.is_empty() {
        return Err(SelectorError::Empty);
    }
    Ok(Complex { compounds })
}

fn parse_compound(input: &str) -> Result<Compound, SelectorError> {
    let mut parser = Parser {
        chars: input.chars().collect(),
        pos: 0,
    };
    let mut parts = Vec::new();
    if let Some(tag) = parser.tag()? {
        parts.push(tag);
    }
    while !parser.done() {
        parts.push(parser.simple()?);
    }
    if parts.is_empty() {
        return Err(SelectorError::Empty);
    }
    Ok(Compound { parts })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn done(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn tag(&mut self) -> Result<Option<Simple>, SelectorError> {
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                Ok(Some(Simple::Universal))
            }
            Some(c) if c.is_alphanumeric() => Ok(Some(Simple::Type(self.ident()))),
            _ => Ok(None),
        }
    }

    fn simple(&mut self) -> Result<Simple, SelectorError> {
        let Some(c) = self.peek() else {
            return Err(SelectorError::Empty);
        };
        self.pos += 1;
        match c {
            '#' => self.named(Simple::Id),
            '.' => self.named(Simple::Class),
            '[' => self.attribute(),
            ':' => self.negation(),
            other => Err(SelectorError::Unexpected(other)),
        }
    }

    fn named(&mut self, make: fn(String) -> Simple) -> Result<Simple, SelectorError> {
        let name = self.ident();
        if name.is_empty() {
            return Err(SelectorError::Empty);
        }
        Ok(make(name))
    }

    fn attribute(&mut self) -> Result<Simple, SelectorError> {
        let name = self.ident();
        if name.is_empty() {
            return Err(SelectorError::Empty);
        }
        match self.peek() {
            Some(']') => {
                self.pos += 1;
                Ok(Simple::HasAttr(name))
            }
            Some('=') => {
                self.pos += 1;
                let value = self.attribute_value()?;
                if self.peek() != Some(']') {
                    return Err(SelectorError::Unterminated("attribute"));
                }
                self.pos += 1;
                Ok(Simple::AttrEquals(name, value))
            }
            Some(other) => Err(SelectorError::Unexpected(other)),
            None => Err(SelectorError::Unterminated("attribute")),
        }
    }

    fn attribute_value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        let value = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(value);
                    }
                    self.pos += 1;
                }
                Err(SelectorError::Unterminated("string"))
            }
            _ => Ok(self.ident()),
        }
    }

    fn negation(&mut self) -> Result<Simple, SelectorError> {
        let name = self.ident();
        if name != "not" || self.peek() != Some('(') {
            return Err(SelectorError::Unexpected(':'));
        }
        self.pos += 1;
        let inner = match self.tag()? {
            Some(tag) => tag,
            None => self.simple()?,
        };
        if self.peek() != Some(')') {
            return Err(SelectorError::Unterminated(":not"));
        }
        self.pos += 1;
        Ok(Simple::Not(Box::new(inner)))
    }
}

//! Structural type tags such as `"Number"`, `"[String]"` or `"Null | Object"`.
//!
//! ```text
//! tag   := term ('|' term)*
//! term  := '*' | '[' tag ']' | NAME
//! NAME  := Number | String | Boolean | Object | Array | Null | Undefined
//! ```

use crate::errors::{RippleError, RippleResult};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    Any,
    Number,
    String,
    Boolean,
    Object,
    Array,
    /// `Null` and `Undefined` both land here.
    Null,
    /// Array whose every element matches the inner tag.
    ArrayOf(Box<TypeTag>),
    Union(Vec<TypeTag>),
}

impl TypeTag {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            TypeTag::Any => true,
            TypeTag::Number => value.is_number(),
            TypeTag::String => value.is_string(),
            TypeTag::Boolean => value.is_boolean(),
            TypeTag::Object => value.is_object(),
            TypeTag::Array => value.is_array(),
            TypeTag::Null => value.is_null(),
            TypeTag::ArrayOf(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| inner.matches(item))),
            TypeTag::Union(tags) => tags.iter().any(|tag| tag.matches(value)),
        }
    }
}

impl FromStr for TypeTag {
    type Err = RippleError;

    fn from_str(source: &str) -> RippleResult<Self> {
        let mut parser = Parser { source, pos: 0 };
        let tag = parser.union()?;
        parser.skip_whitespace();
        if parser.pos != source.len() {
            return Err(parser.error(format!(
                "unexpected trailing input '{}'",
                &source[parser.pos..]
            )));
        }
        Ok(tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Any => write!(f, "*"),
            TypeTag::Number => write!(f, "Number"),
            TypeTag::String => write!(f, "String"),
            TypeTag::Boolean => write!(f, "Boolean"),
            TypeTag::Object => write!(f, "Object"),
            TypeTag::Array => write!(f, "Array"),
            TypeTag::Null => write!(f, "Null"),
            TypeTag::ArrayOf(inner) => write!(f, "[{}]", inner),
            TypeTag::Union(tags) => {
                let parts: Vec<String> = tags.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" | "))
            }
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn union(&mut self) -> RippleResult<TypeTag> {
        let mut tags = vec![self.term()?];
        loop {
            self.skip_whitespace();
            if !self.eat('|') {
                break;
            }
            tags.push(self.term()?);
        }
        Ok(if tags.len() == 1 {
            tags.remove(0)
        } else {
            TypeTag::Union(tags)
        })
    }

    fn term(&mut self) -> RippleResult<TypeTag> {
        self.skip_whitespace();
        if self.eat('*') {
            return Ok(TypeTag::Any);
        }
        if self.eat('[') {
            let inner = self.union()?;
            self.skip_whitespace();
            if !self.eat(']') {
                return Err(self.error("unclosed '['".into()));
            }
            return Ok(TypeTag::ArrayOf(Box::new(inner)));
        }

        let rest = &self.source[self.pos..];
        let len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let name = &rest[..len];
        let tag = match name {
            "Number" => TypeTag::Number,
            "String" => TypeTag::String,
            "Boolean" => TypeTag::Boolean,
            "Object" => TypeTag::Object,
            "Array" => TypeTag::Array,
            "Null" | "Undefined" => TypeTag::Null,
            "" => return Err(self.error("expected a type name".into())),
            other => return Err(self.error(format!("unknown type name '{}'", other))),
        };
        self.pos += len;
        Ok(tag)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.source[self.pos..].starts_with(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.source[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn error(&self, reason: String) -> RippleError {
        RippleError::TypeTag {
            tag: self.source.to_string(),
            reason,
        }
    }
}

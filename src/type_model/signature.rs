//! Type signatures - the language-neutral representation of a type use.
//!
//! Metadata dumps spell types as strings (`List<com.example.User>`, `long`,
//! `? extends T`, `Map<String, Optional<int>>`). [`TypeRef`] parses and prints
//! that grammar; the printed form is canonical and is what node identities use.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primitive and canonical portable types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    String,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    I128,
    U8,
    U16,
    U32,
    U64,
    U128,
    F32,
    F64,
    /// Calendar date, produced by transfer-type substitution
    Date,
    /// Date with time, produced by transfer-type substitution
    DateTime,
    /// Time of day, produced by transfer-type substitution
    Time,
    Uuid,
    /// Binary upload content
    Binary,
}

/// A type use, possibly generic
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    #[default]
    Void,
    /// The unbounded top type
    Any,
    Primitive(PrimitiveType),
    /// A nullable reference wrapping a primitive (`Integer`, `java.lang.Long`)
    Boxed(PrimitiveType),
    Class {
        name: String,
        args: Vec<TypeRef>,
    },
    Array(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
    Optional(Box<TypeRef>),
    /// A type variable
    Var(String),
    Wildcard {
        upper: Option<Box<TypeRef>>,
        lower: Option<Box<TypeRef>>,
    },
}

const ARRAY_CONTAINERS: &[&str] = &[
    "List",
    "ArrayList",
    "LinkedList",
    "Collection",
    "Iterable",
    "Set",
    "HashSet",
    "LinkedHashSet",
    "TreeSet",
    "SortedSet",
    "Vec",
    "VecDeque",
    "BTreeSet",
    "IndexSet",
];

const MAP_CONTAINERS: &[&str] = &[
    "Map",
    "HashMap",
    "LinkedHashMap",
    "TreeMap",
    "SortedMap",
    "BTreeMap",
    "IndexMap",
];

const OPTIONAL_WRAPPERS: &[&str] = &["Optional", "Option"];

/// Single-argument wrappers that are transparent for schema purposes
const TRANSPARENT_WRAPPERS: &[&str] = &["Box", "Arc", "Rc"];

impl PrimitiveType {
    /// Resolve a primitive from any of its spellings
    pub fn from_name(name: &str) -> Option<Self> {
        use PrimitiveType::*;
        let primitive = match name {
            "string" | "String" | "str" | "java.lang.String" | "CharSequence" => String,
            "bool" | "boolean" => Bool,
            "char" => Char,
            "i8" | "byte" => I8,
            "i16" | "short" => I16,
            "i32" | "int" => I32,
            "i64" | "long" | "isize" => I64,
            "i128" => I128,
            "u8" => U8,
            "u16" => U16,
            "u32" => U32,
            "u64" | "usize" => U64,
            "u128" => U128,
            "f32" | "float" => F32,
            "f64" | "double" => F64,
            "date" => Date,
            "datetime" => DateTime,
            "time" => Time,
            "uuid" => Uuid,
            "binary" => Binary,
            _ => return None,
        };
        Some(primitive)
    }

    /// Resolve a boxed (reference) spelling of a primitive
    pub fn from_boxed_name(name: &str) -> Option<Self> {
        use PrimitiveType::*;
        let primitive = match name {
            "Boolean" | "java.lang.Boolean" => Bool,
            "Character" | "java.lang.Character" => Char,
            "Byte" | "java.lang.Byte" => I8,
            "Short" | "java.lang.Short" => I16,
            "Integer" | "java.lang.Integer" => I32,
            "Long" | "java.lang.Long" => I64,
            "BigInteger" | "java.math.BigInteger" => I128,
            "Float" | "java.lang.Float" => F32,
            "Double" | "java.lang.Double" | "BigDecimal" | "java.math.BigDecimal" => F64,
            _ => return None,
        };
        Some(primitive)
    }

    /// Canonical spelling, accepted back by [`PrimitiveType::from_name`]
    pub fn name(self) -> &'static str {
        use PrimitiveType::*;
        match self {
            String => "string",
            Bool => "bool",
            Char => "char",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            I128 => "i128",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            U128 => "u128",
            F32 => "f32",
            F64 => "f64",
            Date => "date",
            DateTime => "datetime",
            Time => "time",
            Uuid => "uuid",
            Binary => "binary",
        }
    }

    /// Canonical boxed spelling, accepted back by [`PrimitiveType::from_boxed_name`]
    pub fn boxed_name(self) -> Option<&'static str> {
        use PrimitiveType::*;
        let name = match self {
            Bool => "java.lang.Boolean",
            Char => "java.lang.Character",
            I8 => "java.lang.Byte",
            I16 => "java.lang.Short",
            I32 => "java.lang.Integer",
            I64 => "java.lang.Long",
            I128 => "java.math.BigInteger",
            F32 => "java.lang.Float",
            F64 => "java.lang.Double",
            _ => return None,
        };
        Some(name)
    }

    /// Value types can never hold a null
    pub fn is_value_type(self) -> bool {
        use PrimitiveType::*;
        !matches!(self, String | Date | DateTime | Time | Uuid | Binary)
    }
}

impl TypeRef {
    /// Parse a type signature
    pub fn parse(signature: &str) -> Result<Self> {
        let tokens = tokenize(signature)?;
        let mut parser = SignatureParser {
            signature,
            tokens,
            pos: 0,
        };
        let ty = parser.parse_type()?;
        if parser.pos != parser.tokens.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }

    /// A non-generic class reference
    pub fn class(name: impl Into<String>) -> Self {
        TypeRef::Class {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeRef::Optional(_))
    }

    /// Whether the type is a primitive value type (never null)
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeRef::Primitive(p) if p.is_value_type())
    }

    /// Rewrite class references whose names are in `vars` into type variables
    pub fn bind_vars(&mut self, vars: &[String]) {
        match self {
            TypeRef::Class { name, args } => {
                if args.is_empty() && vars.iter().any(|v| v == name) {
                    *self = TypeRef::Var(name.clone());
                } else {
                    args.iter_mut().for_each(|a| a.bind_vars(vars));
                }
            }
            TypeRef::Array(inner) | TypeRef::Optional(inner) => inner.bind_vars(vars),
            TypeRef::Map(key, value) => {
                key.bind_vars(vars);
                value.bind_vars(vars);
            }
            TypeRef::Wildcard { upper, lower } => {
                if let Some(upper) = upper {
                    upper.bind_vars(vars);
                }
                if let Some(lower) = lower {
                    lower.bind_vars(vars);
                }
            }
            _ => {}
        }
    }

    /// Rename class references; `rename` returns the new name or `None` to keep it
    pub fn rename_classes(&mut self, rename: &dyn Fn(&str) -> Option<String>) {
        match self {
            TypeRef::Class { name, args } => {
                if let Some(new_name) = rename(name) {
                    *name = new_name;
                }
                args.iter_mut().for_each(|a| a.rename_classes(rename));
            }
            TypeRef::Array(inner) | TypeRef::Optional(inner) => inner.rename_classes(rename),
            TypeRef::Map(key, value) => {
                key.rename_classes(rename);
                value.rename_classes(rename);
            }
            TypeRef::Wildcard { upper, lower } => {
                if let Some(upper) = upper {
                    upper.rename_classes(rename);
                }
                if let Some(lower) = lower {
                    lower.rename_classes(rename);
                }
            }
            _ => {}
        }
    }

    /// Build a type from a name and its arguments, folding well-known containers
    pub(crate) fn from_parts(name: String, mut args: Vec<TypeRef>) -> TypeRef {
        if args.is_empty() {
            if let Some(primitive) = PrimitiveType::from_name(&name) {
                return TypeRef::Primitive(primitive);
            }
            if let Some(primitive) = PrimitiveType::from_boxed_name(&name) {
                return TypeRef::Boxed(primitive);
            }
            match name.as_str() {
                "void" | "Void" | "java.lang.Void" | "unit" => return TypeRef::Void,
                "any" | "Object" | "java.lang.Object" => return TypeRef::Any,
                _ => {}
            }
        }

        let simple = name
            .rsplit(|c: char| c == '.' || c == ':')
            .next()
            .unwrap_or(&name);
        let first = |args: &mut Vec<TypeRef>| {
            if args.is_empty() {
                TypeRef::Any
            } else {
                args.remove(0)
            }
        };

        if ARRAY_CONTAINERS.contains(&simple) {
            TypeRef::Array(Box::new(first(&mut args)))
        } else if MAP_CONTAINERS.contains(&simple) {
            let key = if args.is_empty() {
                TypeRef::Primitive(PrimitiveType::String)
            } else {
                args.remove(0)
            };
            TypeRef::Map(Box::new(key), Box::new(first(&mut args)))
        } else if OPTIONAL_WRAPPERS.contains(&simple) {
            TypeRef::Optional(Box::new(first(&mut args)))
        } else if TRANSPARENT_WRAPPERS.contains(&simple) && args.len() == 1 {
            first(&mut args)
        } else {
            TypeRef::Class { name, args }
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => write!(f, "void"),
            TypeRef::Any => write!(f, "any"),
            TypeRef::Primitive(p) => write!(f, "{}", p.name()),
            TypeRef::Boxed(p) => write!(f, "{}", p.boxed_name().unwrap_or(p.name())),
            TypeRef::Class { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", rendered.join(", "))?;
                }
                Ok(())
            }
            TypeRef::Array(inner) => write!(f, "List<{}>", inner),
            TypeRef::Map(key, value) => write!(f, "Map<{}, {}>", key, value),
            TypeRef::Optional(inner) => write!(f, "Optional<{}>", inner),
            TypeRef::Var(name) => write!(f, "{}", name),
            TypeRef::Wildcard { upper, lower } => match (upper, lower) {
                (Some(upper), _) => write!(f, "? extends {}", upper),
                (None, Some(lower)) => write!(f, "? super {}", lower),
                (None, None) => write!(f, "?"),
            },
        }
    }
}

impl FromStr for TypeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TypeRef::parse(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TypeRef::parse(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Lt,
    Gt,
    Comma,
    LBracket,
    RBracket,
    Question,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | ':')
}

fn tokenize(signature: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = signature.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '<' => Token::Lt,
            '>' => Token::Gt,
            ',' => Token::Comma,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '?' => Token::Question,
            c if is_ident_char(c) => {
                let mut end = start + c.len_utf8();
                while let Some(&(pos, next)) = chars.peek() {
                    if !is_ident_char(next) {
                        break;
                    }
                    end = pos + next.len_utf8();
                    chars.next();
                }
                Token::Ident(signature[start..end].to_string())
            }
            other => {
                return Err(Error::Parse {
                    file: "<signature>".into(),
                    message: format!("unexpected character '{}' in type `{}`", other, signature),
                })
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct SignatureParser<'s> {
    signature: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl SignatureParser<'_> {
    fn error(&self, message: &str) -> Error {
        Error::Parse {
            file: "<signature>".into(),
            message: format!("{} in type `{}`", message, self.signature),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Ident(ident)) if ident == keyword => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_type(&mut self) -> Result<TypeRef> {
        let mut ty = if self.eat(&Token::Question) {
            if self.eat_keyword("extends") {
                TypeRef::Wildcard {
                    upper: Some(Box::new(self.parse_type()?)),
                    lower: None,
                }
            } else if self.eat_keyword("super") {
                TypeRef::Wildcard {
                    upper: None,
                    lower: Some(Box::new(self.parse_type()?)),
                }
            } else {
                TypeRef::Wildcard {
                    upper: None,
                    lower: None,
                }
            }
        } else {
            let name = match self.tokens.get(self.pos) {
                Some(Token::Ident(name)) => name.clone(),
                _ => return Err(self.error("expected a type name")),
            };
            self.pos += 1;

            let mut args = Vec::new();
            if self.eat(&Token::Lt) {
                loop {
                    args.push(self.parse_type()?);
                    if self.eat(&Token::Comma) {
                        continue;
                    }
                    if !self.eat(&Token::Gt) {
                        return Err(self.error("expected '>'"));
                    }
                    break;
                }
            }
            TypeRef::from_parts(name, args)
        };

        while self.eat(&Token::LBracket) {
            if !self.eat(&Token::RBracket) {
                return Err(self.error("expected ']'"));
            }
            ty = TypeRef::Array(Box::new(ty));
        }
        if self.eat(&Token::Question) {
            ty = TypeRef::Optional(Box::new(ty));
        }

        Ok(ty)
    }
}

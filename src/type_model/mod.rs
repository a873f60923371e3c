//! Type Model Adapter - a uniform, read-only view of class metadata.
//!
//! The traversal engine never reflects over a live program. Everything it knows about
//! classes, members, annotations and generic bindings comes through the
//! [`MetadataProvider`] trait, which is implemented once per metadata source:
//!
//! - [`registry::ClassRegistry`] - an in-memory provider, loadable from YAML/JSON metadata dumps
//! - [`source::SourceLoader`] - builds a registry from Rust source files using `syn`
//!
//! [`TypeModel`] wraps a provider for one generation run, adding the canonical
//! [`mapped`] classes, simple-name lookup and generic binding resolution over
//! supertype chains (see [`generics`]).

pub mod generics;
pub mod mapped;
pub mod registry;
pub mod signature;
pub mod source;

pub use generics::{BoundClass, Bindings, Variance};
pub use registry::{ClassRegistry, MetadataDump};
pub use signature::{PrimitiveType, TypeRef};

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Read-only access to reflected class metadata.
///
/// Implementations must be safe to share between threads: independent generation
/// runs may read the same provider concurrently.
pub trait MetadataProvider: Sync {
    /// Look up a class by its fully qualified name
    fn find_class(&self, name: &str) -> Option<&ClassInfo>;

    /// All classes known to this provider
    fn classes(&self) -> Vec<&ClassInfo>;

    /// Annotations declared on a package (module), used for scope-level defaults
    fn package_annotations(&self, package: &str) -> &[Annotation];
}

/// The kind of a reflected class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    Record,
}

/// A reflected class, interface, enum or record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Fully qualified name
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    /// Declared type parameter names, in order
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<TypeRef>,
    #[serde(default)]
    pub interfaces: Vec<TypeRef>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
    /// Enum constants, in declaration order
    #[serde(default)]
    pub constants: Vec<String>,
    /// Anonymous classes have no name usable as a schema reference
    #[serde(default)]
    pub anonymous: bool,
}

/// A declared field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// A declared method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterInfo>,
    #[serde(default, rename = "returns")]
    pub return_type: TypeRef,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    #[serde(default)]
    pub type_params: Vec<String>,
    #[serde(default = "default_public", rename = "public")]
    pub is_public: bool,
    #[serde(default, rename = "static")]
    pub is_static: bool,
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

/// An annotation (or attribute) with its attribute values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<String, AnnotationValue>,
}

/// An annotation attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<AnnotationValue>),
    Nested(Annotation),
}

fn default_public() -> bool {
    true
}

/// Normalize an annotation name for matching: simple name, lowercase, no underscores.
///
/// `jakarta.validation.constraints.NotBlank`, `NotBlank` and `not_blank` all
/// normalize to `notblank`.
pub fn normalize_name(name: &str) -> String {
    let simple = name
        .rsplit(|c: char| c == '.' || c == ':')
        .next()
        .unwrap_or(name);
    simple
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Find the first annotation matching any of the given names
pub fn find_annotation<'a>(annotations: &'a [Annotation], names: &[String]) -> Option<&'a Annotation> {
    annotations.iter().find(|a| a.is_any(names))
}

/// Split a qualified name into its package and simple name
fn split_qualified(name: &str) -> (&str, &str) {
    if let Some(pos) = name.rfind("::") {
        (&name[..pos], &name[pos + 2..])
    } else if let Some(pos) = name.rfind('.') {
        (&name[..pos], &name[pos + 1..])
    } else {
        ("", name)
    }
}

impl ClassInfo {
    /// Create an empty class of the given kind
    pub fn new(name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            name: name.into(),
            kind,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constants: Vec::new(),
            anonymous: false,
        }
    }

    pub fn simple_name(&self) -> &str {
        split_qualified(&self.name).1
    }

    pub fn package(&self) -> &str {
        split_qualified(&self.name).0
    }

    pub fn is_enum(&self) -> bool {
        self.kind == ClassKind::Enum
    }

    pub fn annotation(&self, names: &[String]) -> Option<&Annotation> {
        find_annotation(&self.annotations, names)
    }

    pub fn has_annotation(&self, names: &[String]) -> bool {
        self.annotation(names).is_some()
    }

    /// Turn references to declared type parameters into type variables.
    ///
    /// Metadata sources spell type variables like class names (`T`); this pass
    /// rewrites them using the class and method type parameter scopes.
    pub fn normalize(&mut self) {
        let class_vars = self.type_params.clone();
        if let Some(superclass) = &mut self.superclass {
            superclass.bind_vars(&class_vars);
        }
        for interface in &mut self.interfaces {
            interface.bind_vars(&class_vars);
        }
        for field in &mut self.fields {
            field.ty.bind_vars(&class_vars);
        }
        for method in &mut self.methods {
            let mut vars = class_vars.clone();
            vars.extend(method.type_params.iter().cloned());
            method.return_type.bind_vars(&vars);
            for param in &mut method.parameters {
                param.ty.bind_vars(&vars);
            }
        }
    }
}

impl FieldInfo {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            annotations: Vec::new(),
            is_static: false,
        }
    }
}

impl MethodInfo {
    /// A stable signature: `name(paramType, ...)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameters.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl Annotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AnnotationValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn simple_name(&self) -> &str {
        split_qualified(&self.name).1
    }

    /// Whether this annotation has the given (normalized) name
    pub fn is(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub fn is_any(&self, names: &[String]) -> bool {
        names.iter().any(|n| self.is(n))
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.values.get(key)
    }

    /// The first present attribute among `keys`
    pub fn first_of(&self, keys: &[&str]) -> Option<&AnnotationValue> {
        keys.iter().find_map(|k| self.values.get(*k))
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.simple_name())?;
        if self.values.is_empty() {
            return Ok(());
        }
        let rendered: Vec<String> = if self.values.len() == 1 && self.values.contains_key("value") {
            vec![self.values["value"].to_string()]
        } else {
            self.values.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
        };
        write!(f, "({})", rendered.join(", "))
    }
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view; text is parsed, floats are accepted only when integral
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AnnotationValue::Int(i) => Some(*i),
            AnnotationValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            AnnotationValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AnnotationValue::Int(i) => Some(*i as f64),
            AnnotationValue::Float(f) => Some(*f),
            AnnotationValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// List view; a single value is treated as a one-element list
    pub fn as_list(&self) -> &[AnnotationValue] {
        match self {
            AnnotationValue::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Bool(b) => write!(f, "{}", b),
            AnnotationValue::Int(i) => write!(f, "{}", i),
            AnnotationValue::Float(x) => write!(f, "{}", x),
            AnnotationValue::Text(s) => write!(f, "{}", s),
            AnnotationValue::List(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", rendered.join(", "))
            }
            AnnotationValue::Nested(annotation) => write!(f, "{}", annotation),
        }
    }
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        AnnotationValue::Text(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        AnnotationValue::Text(value)
    }
}

impl From<i64> for AnnotationValue {
    fn from(value: i64) -> Self {
        AnnotationValue::Int(value)
    }
}

impl From<f64> for AnnotationValue {
    fn from(value: f64) -> Self {
        AnnotationValue::Float(value)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        AnnotationValue::Bool(value)
    }
}

impl From<Annotation> for AnnotationValue {
    fn from(value: Annotation) -> Self {
        AnnotationValue::Nested(value)
    }
}

/// The view of a metadata provider used during one generation run
#[derive(Clone, Copy)]
pub struct TypeModel<'a> {
    provider: &'a dyn MetadataProvider,
    mapped: &'static ClassRegistry,
}

impl<'a> TypeModel<'a> {
    pub fn new(provider: &'a dyn MetadataProvider) -> Self {
        Self {
            provider,
            mapped: mapped::mapped_classes(),
        }
    }

    /// Look up a class by qualified name, including the canonical mapped classes
    pub fn class(&self, name: &str) -> Option<&'a ClassInfo> {
        self.provider
            .find_class(name)
            .or_else(|| self.mapped.find_class(name))
    }

    pub fn require_class(&self, name: &str) -> Result<&'a ClassInfo> {
        self.class(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Look up a class by qualified name, falling back to a unique simple-name match
    pub fn lookup(&self, name: &str) -> Option<&'a ClassInfo> {
        if let Some(class) = self.class(name) {
            return Some(class);
        }
        let simple = split_qualified(name).1;
        let mut matches = self
            .provider
            .classes()
            .into_iter()
            .filter(|c| c.simple_name() == simple);
        match (matches.next(), matches.next()) {
            (Some(class), None) => Some(class),
            _ => None,
        }
    }

    pub fn package_annotations(&self, package: &str) -> &'a [Annotation] {
        self.provider.package_annotations(package)
    }

    /// Classes carrying one of the endpoint annotations, sorted by name
    pub fn endpoint_classes(&self, annotations: &[String]) -> Vec<&'a ClassInfo> {
        let mut endpoints: Vec<&'a ClassInfo> = self
            .provider
            .classes()
            .into_iter()
            .filter(|c| c.has_annotation(annotations))
            .collect();
        endpoints.sort_by(|a, b| a.name.cmp(&b.name));
        endpoints
    }

    /// The class itself followed by all of its supertypes, each with its type
    /// parameters bound to the arguments established along the inheritance chain.
    ///
    /// Superclasses are visited before interfaces; a supertype reached twice
    /// (diamond interfaces) appears once. Supertypes missing from the model
    /// (e.g. a platform root class) are skipped.
    pub fn supertype_chain(&self, class: &'a ClassInfo, args: &[TypeRef]) -> Vec<BoundClass<'a>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        self.collect_chain(
            class,
            generics::bind(&class.type_params, args),
            &mut chain,
            &mut seen,
        );
        chain
    }

    fn collect_chain(
        &self,
        class: &'a ClassInfo,
        bindings: Bindings,
        chain: &mut Vec<BoundClass<'a>>,
        seen: &mut HashSet<String>,
    ) {
        if !seen.insert(class.name.clone()) {
            return;
        }

        let supertypes: Vec<TypeRef> = class
            .superclass
            .iter()
            .chain(class.interfaces.iter())
            .map(|s| s.apply(&bindings))
            .collect();
        chain.push(BoundClass { class, bindings });

        for supertype in supertypes {
            if let TypeRef::Class { name, args } = &supertype {
                match self.class(name) {
                    Some(super_class) => self.collect_chain(
                        super_class,
                        generics::bind(&super_class.type_params, args),
                        chain,
                        seen,
                    ),
                    None => debug!("Supertype {} of {} is not in the type model", name, class.name),
                }
            }
        }
    }
}

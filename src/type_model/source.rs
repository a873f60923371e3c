//! Rust source adapter.
//!
//! Builds a [`ClassRegistry`] from Rust source files parsed with `syn`:
//!
//! - `struct` items become classes, named fields become fields
//! - `enum` items become enums whose variants are the constants
//! - `trait` items become interfaces with their receiver methods
//! - inherent `impl` blocks contribute receiver methods, `impl Trait<..> for Type`
//!   adds the trait to the type's interfaces
//! - attributes become annotations, inner file attributes annotate the module
//!
//! Type names written without a module path are resolved against the loaded
//! classes by simple name once every file has been read.

use super::{
    split_qualified, Annotation, AnnotationValue, ClassInfo, ClassKind, ClassRegistry, FieldInfo,
    MethodInfo, ParameterInfo, PrimitiveType, TypeRef,
};
use crate::error::{Error, Result};
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path};
use syn::meta::ParseNestedMeta;
use syn::punctuated::Punctuated;
use syn::{Expr, Lit, Token};

/// Attributes that never carry schema metadata
const IGNORED_ATTRIBUTES: &[&str] = &["doc", "derive", "cfg", "cfg_attr", "allow", "warn", "deny"];

/// An `impl` block waiting for its target type to be known
struct PendingImpl {
    module: String,
    target: String,
    interface: Option<TypeRef>,
    methods: Vec<MethodInfo>,
}

/// Accumulates classes from Rust source files
#[derive(Default)]
pub struct SourceLoader {
    classes: Vec<ClassInfo>,
    packages: BTreeMap<String, Vec<Annotation>>,
    pending: Vec<PendingImpl>,
}

/// Derive the module path of a source file relative to the crate root directory.
///
/// `src/lib.rs` maps to `crate`, `src/api/users.rs` and `src/api/users/mod.rs`
/// to `crate::api::users`.
pub fn module_path(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = relative
        .with_extension("")
        .components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if segments.first().map(|s| s == "src").unwrap_or(false) {
        segments.remove(0);
    }
    if let Some(last) = segments.last() {
        if matches!(last.as_str(), "lib" | "main" | "mod") {
            segments.pop();
        }
    }

    std::iter::once("crate".to_string())
        .chain(segments)
        .collect::<Vec<_>>()
        .join("::")
}

impl SourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one file; its module path is derived relative to `root`
    pub fn load_file(&mut self, path: &Path, root: &Path) -> Result<()> {
        debug!("Parsing source file: {}", path.display());
        let content = fs::read_to_string(path)?;
        let module = module_path(root, path);
        self.load_str(&module, &content).map_err(|e| match e {
            Error::Parse { message, .. } => Error::Parse {
                file: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Parse source text as the contents of `module`
    pub fn load_str(&mut self, module: &str, content: &str) -> Result<()> {
        let file = syn::parse_file(content)?;

        let package_annotations = convert_attributes(&file.attrs);
        if !package_annotations.is_empty() {
            self.packages
                .entry(module.to_string())
                .or_default()
                .extend(package_annotations);
        }

        self.load_items(module, &file.items);
        Ok(())
    }

    fn load_items(&mut self, module: &str, items: &[syn::Item]) {
        for item in items {
            match item {
                syn::Item::Struct(item) => self.classes.push(convert_struct(module, item)),
                syn::Item::Enum(item) => self.classes.push(convert_enum(module, item)),
                syn::Item::Trait(item) => self.classes.push(convert_trait(module, item)),
                syn::Item::Impl(item) => self.queue_impl(module, item),
                syn::Item::Mod(item) => {
                    let nested = format!("{}::{}", module, item.ident);
                    let annotations = convert_attributes(&item.attrs);
                    if !annotations.is_empty() {
                        self.packages.entry(nested.clone()).or_default().extend(annotations);
                    }
                    if let Some((_, items)) = &item.content {
                        self.load_items(&nested, items);
                    }
                }
                _ => {}
            }
        }
    }

    fn queue_impl(&mut self, module: &str, item: &syn::ItemImpl) {
        let target = match item.self_ty.as_ref() {
            syn::Type::Path(type_path) => path_name(&type_path.path),
            _ => return,
        };

        let interface = item.trait_.as_ref().map(|(_, path, _)| convert_path(path));
        let methods = if interface.is_some() {
            Vec::new()
        } else {
            item.items
                .iter()
                .filter_map(|impl_item| match impl_item {
                    syn::ImplItem::Fn(f) => {
                        convert_method(&f.sig, &f.attrs, matches!(f.vis, syn::Visibility::Public(_)))
                    }
                    _ => None,
                })
                .collect()
        };

        self.pending.push(PendingImpl {
            module: module.to_string(),
            target,
            interface,
            methods,
        });
    }

    /// Apply pending impls, resolve unqualified type names, and build the registry
    pub fn finish(mut self) -> ClassRegistry {
        let index = SimpleNameIndex::new(&self.classes);

        for pending in std::mem::take(&mut self.pending) {
            let Some(position) = index.resolve(&pending.module, &pending.target) else {
                warn!("Skipping impl for unknown type {}", pending.target);
                continue;
            };
            let class = &mut self.classes[position];
            class.methods.extend(pending.methods);
            if let Some(interface) = pending.interface {
                class.interfaces.push(interface);
            }
        }

        for class in &mut self.classes {
            class.normalize();
            let module = class.package().to_string();
            let rename = |name: &str| {
                index
                    .resolve(&module, name)
                    .map(|position| index.names[position].clone())
                    .filter(|resolved| resolved != name)
            };

            if let Some(superclass) = &mut class.superclass {
                superclass.rename_classes(&rename);
            }
            for interface in &mut class.interfaces {
                interface.rename_classes(&rename);
            }
            for field in &mut class.fields {
                field.ty.rename_classes(&rename);
            }
            for method in &mut class.methods {
                method.return_type.rename_classes(&rename);
                for param in &mut method.parameters {
                    param.ty.rename_classes(&rename);
                }
            }
        }

        let mut registry = ClassRegistry::new();
        for (package, annotations) in self.packages {
            registry.annotate_package(package, annotations);
        }
        for class in self.classes {
            registry.insert(class);
        }
        registry
    }
}

/// Qualified class names with a lookup by simple name
struct SimpleNameIndex {
    names: Vec<String>,
    by_simple: HashMap<String, Vec<usize>>,
}

impl SimpleNameIndex {
    fn new(classes: &[ClassInfo]) -> Self {
        let names: Vec<String> = classes.iter().map(|c| c.name.clone()).collect();
        let mut by_simple: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, name) in names.iter().enumerate() {
            by_simple
                .entry(split_qualified(name).1.to_string())
                .or_default()
                .push(position);
        }
        Self { names, by_simple }
    }

    /// Resolve a type name written in `module`: an exact name, a name in the same
    /// module, or a unique simple-name match.
    fn resolve(&self, module: &str, name: &str) -> Option<usize> {
        let simple = split_qualified(name).1;
        let candidates = self.by_simple.get(simple)?;

        let exact = candidates.iter().find(|&&p| self.names[p] == name);
        let local = format!("{}::{}", module, simple);
        let same_module = candidates.iter().find(|&&p| self.names[p] == local);
        let relative = name
            .strip_prefix("crate::")
            .is_none()
            .then(|| format!("crate::{}", name));
        let crate_relative = relative
            .as_ref()
            .and_then(|r| candidates.iter().find(|&&p| &self.names[p] == r));

        exact
            .or(same_module)
            .or(crate_relative)
            .or_else(|| (candidates.len() == 1 && !name.contains("::")).then_some(&candidates[0]))
            .copied()
    }
}

fn path_name(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

fn type_params(generics: &syn::Generics) -> Vec<String> {
    generics.type_params().map(|p| p.ident.to_string()).collect()
}

fn convert_struct(module: &str, item: &syn::ItemStruct) -> ClassInfo {
    let mut class = ClassInfo::new(format!("{}::{}", module, item.ident), ClassKind::Class);
    debug!("Found struct {}", class.name);
    class.type_params = type_params(&item.generics);
    class.annotations = convert_attributes(&item.attrs);

    if let syn::Fields::Named(named) = &item.fields {
        class.fields = named
            .named
            .iter()
            .filter_map(|field| {
                let name = field.ident.as_ref()?.to_string();
                let mut info = FieldInfo::new(name, convert_type(&field.ty));
                info.annotations = convert_attributes(&field.attrs);
                Some(info)
            })
            .collect();
    }
    class
}

fn convert_enum(module: &str, item: &syn::ItemEnum) -> ClassInfo {
    let mut class = ClassInfo::new(format!("{}::{}", module, item.ident), ClassKind::Enum);
    debug!("Found enum {}", class.name);
    class.annotations = convert_attributes(&item.attrs);
    class.constants = item
        .variants
        .iter()
        .map(|variant| {
            convert_attributes(&variant.attrs)
                .iter()
                .filter(|a| a.is("serde"))
                .find_map(|a| a.get("rename").and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| variant.ident.to_string())
        })
        .collect();
    class
}

fn convert_trait(module: &str, item: &syn::ItemTrait) -> ClassInfo {
    let mut class = ClassInfo::new(format!("{}::{}", module, item.ident), ClassKind::Interface);
    debug!("Found trait {}", class.name);
    class.type_params = type_params(&item.generics);
    class.annotations = convert_attributes(&item.attrs);
    class.interfaces = item
        .supertraits
        .iter()
        .filter_map(|bound| match bound {
            syn::TypeParamBound::Trait(t) => Some(convert_path(&t.path)),
            _ => None,
        })
        .filter(|ty| matches!(ty, TypeRef::Class { .. }))
        .collect();
    class.methods = item
        .items
        .iter()
        .filter_map(|trait_item| match trait_item {
            syn::TraitItem::Fn(f) => convert_method(&f.sig, &f.attrs, true),
            _ => None,
        })
        .collect();
    class
}

/// Methods without a receiver are associated functions, not operations
fn convert_method(sig: &syn::Signature, attrs: &[syn::Attribute], is_public: bool) -> Option<MethodInfo> {
    sig.receiver()?;

    let parameters = sig
        .inputs
        .iter()
        .filter_map(|input| match input {
            syn::FnArg::Typed(pat_type) => {
                let name = match pat_type.pat.as_ref() {
                    syn::Pat::Ident(ident) => ident.ident.to_string(),
                    _ => "arg".to_string(),
                };
                Some(ParameterInfo {
                    name,
                    ty: convert_type(&pat_type.ty),
                    annotations: convert_attributes(&pat_type.attrs),
                })
            }
            syn::FnArg::Receiver(_) => None,
        })
        .collect();

    let return_type = match &sig.output {
        syn::ReturnType::Default => TypeRef::Void,
        syn::ReturnType::Type(_, ty) => convert_type(ty),
    };

    Some(MethodInfo {
        name: sig.ident.to_string(),
        parameters,
        return_type,
        annotations: convert_attributes(attrs),
        type_params: type_params(&sig.generics),
        is_public,
        is_static: false,
    })
}

/// Convert a `syn` type into a type signature
pub fn convert_type(ty: &syn::Type) -> TypeRef {
    match ty {
        syn::Type::Path(type_path) => convert_path(&type_path.path),
        syn::Type::Reference(reference) => convert_type(&reference.elem),
        syn::Type::Slice(slice) => TypeRef::Array(Box::new(convert_type(&slice.elem))),
        syn::Type::Array(array) => TypeRef::Array(Box::new(convert_type(&array.elem))),
        syn::Type::Paren(paren) => convert_type(&paren.elem),
        syn::Type::Group(group) => convert_type(&group.elem),
        syn::Type::Tuple(tuple) if tuple.elems.is_empty() => TypeRef::Void,
        _ => TypeRef::Any,
    }
}

fn convert_path(path: &syn::Path) -> TypeRef {
    let Some(last) = path.segments.last() else {
        return TypeRef::Any;
    };
    let ident = last.ident.to_string();

    let args: Vec<TypeRef> = match &last.arguments {
        syn::PathArguments::AngleBracketed(bracketed) => bracketed
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(convert_type(ty)),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };

    if args.is_empty() {
        if let Some(primitive) = PrimitiveType::from_name(&ident) {
            return TypeRef::Primitive(primitive);
        }
    }
    if ident == "Result" {
        return args.into_iter().next().unwrap_or(TypeRef::Void);
    }

    TypeRef::from_parts(path_name(path), args)
}

/// Convert attributes into annotations
pub fn convert_attributes(attrs: &[syn::Attribute]) -> Vec<Annotation> {
    attrs
        .iter()
        .filter(|attr| {
            let name = path_name(attr.path());
            !IGNORED_ATTRIBUTES.contains(&name.as_str())
        })
        .map(convert_attribute)
        .collect()
}

fn convert_attribute(attr: &syn::Attribute) -> Annotation {
    let mut annotation = Annotation::new(path_name(attr.path()));

    match &attr.meta {
        syn::Meta::Path(_) => {}
        syn::Meta::NameValue(name_value) => {
            if let Some(value) = expr_value(&name_value.value) {
                annotation.values.insert("value".to_string(), value);
            }
        }
        syn::Meta::List(_) => {
            let mut values = BTreeMap::new();
            let nested = attr.parse_nested_meta(|meta| read_nested(&meta, &mut values));
            if nested.is_ok() {
                annotation.values = values;
            } else if let Ok(positional) =
                attr.parse_args_with(Punctuated::<Expr, Token![,]>::parse_terminated)
            {
                let mut items: Vec<AnnotationValue> = positional.iter().filter_map(expr_value).collect();
                let value = if items.len() == 1 {
                    items.remove(0)
                } else {
                    AnnotationValue::List(items)
                };
                annotation.values.insert("value".to_string(), value);
            } else {
                warn!("Could not read arguments of attribute #[{}]", annotation.name);
            }
        }
    }

    annotation
}

fn read_nested(meta: &ParseNestedMeta, values: &mut BTreeMap<String, AnnotationValue>) -> syn::Result<()> {
    let key = path_name(&meta.path);
    if meta.input.peek(Token![=]) {
        let expr: Expr = meta.value()?.parse()?;
        match expr_value(&expr) {
            Some(value) => {
                values.insert(key, value);
            }
            None => return Err(meta.error("unsupported attribute value")),
        }
    } else if meta.input.peek(syn::token::Paren) {
        let mut nested = Annotation::new(key.clone());
        meta.parse_nested_meta(|inner| read_nested(&inner, &mut nested.values))?;
        values.insert(key, AnnotationValue::Nested(nested));
    } else {
        values.insert(key, AnnotationValue::Bool(true));
    }
    Ok(())
}

fn expr_value(expr: &Expr) -> Option<AnnotationValue> {
    match expr {
        Expr::Lit(lit) => lit_value(&lit.lit),
        Expr::Unary(unary) if matches!(unary.op, syn::UnOp::Neg(_)) => {
            match expr_value(&unary.expr)? {
                AnnotationValue::Int(i) => Some(AnnotationValue::Int(-i)),
                AnnotationValue::Float(f) => Some(AnnotationValue::Float(-f)),
                _ => None,
            }
        }
        Expr::Array(array) => Some(AnnotationValue::List(
            array.elems.iter().filter_map(expr_value).collect(),
        )),
        Expr::Path(path) => Some(AnnotationValue::Text(path_name(&path.path))),
        Expr::Paren(paren) => expr_value(&paren.expr),
        Expr::Group(group) => expr_value(&group.expr),
        _ => None,
    }
}

fn lit_value(lit: &Lit) -> Option<AnnotationValue> {
    match lit {
        Lit::Str(s) => Some(AnnotationValue::Text(s.value())),
        Lit::Char(c) => Some(AnnotationValue::Text(c.value().to_string())),
        Lit::Bool(b) => Some(AnnotationValue::Bool(b.value)),
        Lit::Int(i) => i.base10_parse::<i64>().ok().map(AnnotationValue::Int),
        Lit::Float(f) => f.base10_parse::<f64>().ok().map(AnnotationValue::Float),
        _ => None,
    }
}

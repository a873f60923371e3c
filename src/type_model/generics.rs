//! Generic binding resolution.
//!
//! A generic class reached with concrete arguments gets a [`Bindings`] map from
//! its type parameter names to those arguments. Member types are resolved in two
//! steps: [`TypeRef::apply`] replaces type variables with their bindings, and
//! [`TypeRef::resolve`] eliminates wildcards according to the position's variance.

use super::{ClassInfo, FieldInfo, MethodInfo, ParameterInfo, TypeRef};
use std::collections::HashMap;

/// Type parameter name to bound argument
pub type Bindings = HashMap<String, TypeRef>;

/// Whether a type position produces values (covariant) or consumes them (contravariant)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variance {
    /// Fields and return types
    Covariant,
    /// Method parameters
    Contravariant,
}

/// Bind declared type parameters to arguments; missing arguments bind to `any`
pub fn bind(params: &[String], args: &[TypeRef]) -> Bindings {
    params
        .iter()
        .enumerate()
        .map(|(i, param)| (param.clone(), args.get(i).cloned().unwrap_or(TypeRef::Any)))
        .collect()
}

impl TypeRef {
    /// Replace type variables with their bindings. Unbound variables become `any`;
    /// wildcards are kept for [`TypeRef::resolve`].
    pub fn apply(&self, bindings: &Bindings) -> TypeRef {
        match self {
            TypeRef::Var(name) => bindings.get(name).cloned().unwrap_or(TypeRef::Any),
            TypeRef::Class { name, args } => TypeRef::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.apply(bindings)).collect(),
            },
            TypeRef::Array(inner) => TypeRef::Array(Box::new(inner.apply(bindings))),
            TypeRef::Optional(inner) => TypeRef::Optional(Box::new(inner.apply(bindings))),
            TypeRef::Map(key, value) => TypeRef::Map(
                Box::new(key.apply(bindings)),
                Box::new(value.apply(bindings)),
            ),
            TypeRef::Wildcard { upper, lower } => TypeRef::Wildcard {
                upper: upper.as_ref().map(|u| Box::new(u.apply(bindings))),
                lower: lower.as_ref().map(|l| Box::new(l.apply(bindings))),
            },
            other => other.clone(),
        }
    }

    /// Eliminate wildcards: the upper bound in covariant positions, the lower
    /// bound in contravariant positions, `any` when the bound is absent.
    pub fn resolve(&self, variance: Variance) -> TypeRef {
        match self {
            TypeRef::Wildcard { upper, lower } => {
                let bound = match variance {
                    Variance::Covariant => upper,
                    Variance::Contravariant => lower,
                };
                bound
                    .as_deref()
                    .map(|b| b.resolve(variance))
                    .unwrap_or(TypeRef::Any)
            }
            TypeRef::Class { name, args } => TypeRef::Class {
                name: name.clone(),
                args: args.iter().map(|a| a.resolve(variance)).collect(),
            },
            TypeRef::Array(inner) => TypeRef::Array(Box::new(inner.resolve(variance))),
            TypeRef::Optional(inner) => TypeRef::Optional(Box::new(inner.resolve(variance))),
            TypeRef::Map(key, value) => TypeRef::Map(
                Box::new(key.resolve(variance)),
                Box::new(value.resolve(variance)),
            ),
            other => other.clone(),
        }
    }

    /// [`TypeRef::apply`] followed by [`TypeRef::resolve`]
    pub fn substitute(&self, bindings: &Bindings, variance: Variance) -> TypeRef {
        self.apply(bindings).resolve(variance)
    }
}

/// A class together with the bindings of its type parameters
#[derive(Debug, Clone)]
pub struct BoundClass<'a> {
    pub class: &'a ClassInfo,
    pub bindings: Bindings,
}

impl BoundClass<'_> {
    pub fn field_type(&self, field: &FieldInfo) -> TypeRef {
        field.ty.substitute(&self.bindings, Variance::Covariant)
    }

    pub fn return_type(&self, method: &MethodInfo) -> TypeRef {
        method.return_type.substitute(&self.bindings, Variance::Covariant)
    }

    pub fn parameter_type(&self, parameter: &ParameterInfo) -> TypeRef {
        parameter.ty.substitute(&self.bindings, Variance::Contravariant)
    }

    /// The method with parameter and return types resolved against the bindings
    pub fn resolve_method(&self, method: &MethodInfo) -> MethodInfo {
        let mut resolved = method.clone();
        resolved.return_type = self.return_type(method);
        for (param, original) in resolved.parameters.iter_mut().zip(&method.parameters) {
            param.ty = self.parameter_type(original);
        }
        resolved.type_params.clear();
        resolved
    }
}

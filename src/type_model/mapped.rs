//! Canonical classes that non-portable framework types are substituted with.
//!
//! They live in the `openapi.mapped` package and are always visible through
//! [`TypeModel`](super::TypeModel), whatever the metadata provider.

use super::{ClassInfo, ClassKind, ClassRegistry, FieldInfo, PrimitiveType, TypeRef};
use std::sync::OnceLock;

pub const MAPPED_PACKAGE: &str = "openapi.mapped";

pub const PAGEABLE: &str = "openapi.mapped.Pageable";
pub const SORT: &str = "openapi.mapped.Sort";
pub const ORDER: &str = "openapi.mapped.Order";
pub const DIRECTION: &str = "openapi.mapped.Direction";
pub const NULL_HANDLING: &str = "openapi.mapped.NullHandling";

static MAPPED: OnceLock<ClassRegistry> = OnceLock::new();

pub fn mapped_classes() -> &'static ClassRegistry {
    MAPPED.get_or_init(build)
}

fn build() -> ClassRegistry {
    let int = || TypeRef::Primitive(PrimitiveType::I32);

    let mut pageable = ClassInfo::new(PAGEABLE, ClassKind::Class);
    pageable.fields = vec![
        FieldInfo::new("pageNumber", int()),
        FieldInfo::new("pageSize", int()),
        FieldInfo::new("sort", TypeRef::class(SORT)),
    ];

    let mut sort = ClassInfo::new(SORT, ClassKind::Class);
    sort.fields = vec![FieldInfo::new(
        "orders",
        TypeRef::Array(Box::new(TypeRef::class(ORDER))),
    )];

    let mut order = ClassInfo::new(ORDER, ClassKind::Class);
    order.fields = vec![
        FieldInfo::new("direction", TypeRef::class(DIRECTION)),
        FieldInfo::new("property", TypeRef::Primitive(PrimitiveType::String)),
        FieldInfo::new("ignoreCase", TypeRef::Primitive(PrimitiveType::Bool)),
        FieldInfo::new("nullHandling", TypeRef::Optional(Box::new(TypeRef::class(NULL_HANDLING)))),
    ];

    let mut direction = ClassInfo::new(DIRECTION, ClassKind::Enum);
    direction.constants = vec!["ASC".into(), "DESC".into()];

    let mut null_handling = ClassInfo::new(NULL_HANDLING, ClassKind::Enum);
    null_handling.constants = vec!["NATIVE".into(), "NULLS_FIRST".into(), "NULLS_LAST".into()];

    let mut registry = ClassRegistry::new();
    for class in [pageable, sort, order, direction, null_handling] {
        registry.insert(class);
    }
    registry
}

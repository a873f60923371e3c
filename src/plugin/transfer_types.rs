//! Replaces platform and framework types with the types they are transferred as.
//!
//! Temporal types become date/time primitives, identifiers become UUIDs,
//! uploads become binary, paging types become the canonical mapped classes,
//! page-like containers become arrays of their element, and async or response
//! wrappers are unwrapped. Substitution runs on every type use before the node
//! is created, so it also applies to type uses nested in containers.

use super::{plugin_config, Plugin, PluginContext};
use crate::error::{Error, Result};
use crate::node::{NodeDraft, NodePath, SourceEntity};
use crate::type_model::{mapped, PrimitiveType, TypeRef};
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

pub const NAME: &str = "transfer-types";

/// Substitutions are applied repeatedly; this bounds mappings that feed into each other
const MAX_SUBSTITUTIONS: usize = 16;

#[derive(Debug, Clone, Copy)]
enum Transfer {
    Primitive(PrimitiveType),
    Class(&'static str),
    /// Array of the first type argument
    ArrayOfFirst,
    /// The first type argument itself
    First,
}

const BUILTIN_TRANSFERS: &[(&str, Transfer)] = &[
    ("java.util.Date", Transfer::Primitive(PrimitiveType::DateTime)),
    ("java.time.Instant", Transfer::Primitive(PrimitiveType::DateTime)),
    ("java.time.LocalDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("java.time.OffsetDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("java.time.ZonedDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("java.sql.Timestamp", Transfer::Primitive(PrimitiveType::DateTime)),
    ("chrono::DateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("chrono::NaiveDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("DateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("NaiveDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("std::time::SystemTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("SystemTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("time::OffsetDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("time::PrimitiveDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("OffsetDateTime", Transfer::Primitive(PrimitiveType::DateTime)),
    ("java.time.LocalDate", Transfer::Primitive(PrimitiveType::Date)),
    ("java.sql.Date", Transfer::Primitive(PrimitiveType::Date)),
    ("chrono::NaiveDate", Transfer::Primitive(PrimitiveType::Date)),
    ("time::Date", Transfer::Primitive(PrimitiveType::Date)),
    ("NaiveDate", Transfer::Primitive(PrimitiveType::Date)),
    ("java.time.LocalTime", Transfer::Primitive(PrimitiveType::Time)),
    ("chrono::NaiveTime", Transfer::Primitive(PrimitiveType::Time)),
    ("time::Time", Transfer::Primitive(PrimitiveType::Time)),
    ("NaiveTime", Transfer::Primitive(PrimitiveType::Time)),
    ("java.util.UUID", Transfer::Primitive(PrimitiveType::Uuid)),
    ("uuid::Uuid", Transfer::Primitive(PrimitiveType::Uuid)),
    ("Uuid", Transfer::Primitive(PrimitiveType::Uuid)),
    ("org.springframework.web.multipart.MultipartFile", Transfer::Primitive(PrimitiveType::Binary)),
    ("MultipartFile", Transfer::Primitive(PrimitiveType::Binary)),
    ("bytes::Bytes", Transfer::Primitive(PrimitiveType::Binary)),
    ("Bytes", Transfer::Primitive(PrimitiveType::Binary)),
    ("org.springframework.data.domain.Pageable", Transfer::Class(mapped::PAGEABLE)),
    ("Pageable", Transfer::Class(mapped::PAGEABLE)),
    ("org.springframework.data.domain.Sort", Transfer::Class(mapped::SORT)),
    ("Sort", Transfer::Class(mapped::SORT)),
    ("org.springframework.data.domain.Page", Transfer::ArrayOfFirst),
    ("org.springframework.data.domain.Slice", Transfer::ArrayOfFirst),
    ("reactor.core.publisher.Flux", Transfer::ArrayOfFirst),
    ("org.reactivestreams.Publisher", Transfer::ArrayOfFirst),
    ("reactor.core.publisher.Mono", Transfer::First),
    ("java.util.concurrent.CompletableFuture", Transfer::First),
    ("java.util.concurrent.Future", Transfer::First),
    ("axum::Json", Transfer::First),
    ("actix_web::web::Json", Transfer::First),
    ("Json", Transfer::First),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TransferTypesConfig {
    /// Extra substitutions, class name to type signature; checked before the built-ins
    pub mappings: BTreeMap<String, String>,
}

#[derive(Default)]
pub struct TransferTypesPlugin {
    mappings: HashMap<String, TypeRef>,
}

impl TransferTypesPlugin {
    pub fn new(config: TransferTypesConfig) -> Result<Self> {
        let mut mappings = HashMap::new();
        for (class, signature) in config.mappings {
            let ty = TypeRef::parse(&signature).map_err(|e| {
                Error::Configuration(format!(
                    "invalid transfer type `{}` for `{}`: {}",
                    signature, class, e
                ))
            })?;
            mappings.insert(class, ty);
        }
        Ok(Self { mappings })
    }

    pub fn from_config(config: &serde_yaml::Value) -> Result<Self> {
        Self::new(plugin_config(NAME, config)?)
    }

    /// One substitution step for the outermost type, if any applies
    fn substitute_once(&self, ty: &TypeRef) -> Option<TypeRef> {
        let TypeRef::Class { name, args } = ty else {
            return None;
        };
        if let Some(mapped) = self.mappings.get(name) {
            return Some(mapped.clone());
        }

        let (_, transfer) = BUILTIN_TRANSFERS.iter().find(|(class, _)| *class == name.as_str())?;
        let first = || args.first().cloned().unwrap_or(TypeRef::Any);
        Some(match transfer {
            Transfer::Primitive(primitive) => TypeRef::Primitive(*primitive),
            Transfer::Class(class) => TypeRef::class(*class),
            Transfer::ArrayOfFirst => TypeRef::Array(Box::new(first())),
            Transfer::First => first(),
        })
    }

    /// Substitute the outermost type until no substitution applies
    pub fn transfer_type(&self, ty: &TypeRef) -> TypeRef {
        let mut current = ty.clone();
        for _ in 0..MAX_SUBSTITUTIONS {
            match self.substitute_once(&current) {
                Some(next) if next != current => current = next,
                _ => break,
            }
        }
        current
    }
}

impl Plugin for TransferTypesPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        -200
    }

    fn resolve(&self, draft: NodeDraft, _path: &NodePath, _ctx: &mut PluginContext) -> Result<NodeDraft> {
        let SourceEntity::TypeUse { owner, slot, ty } = &draft.source else {
            return Ok(draft);
        };
        let transferred = self.transfer_type(ty);
        if &transferred == ty {
            return Ok(draft);
        }
        debug!("Transferring {} as {}", ty, transferred);
        Ok(NodeDraft::new(SourceEntity::TypeUse {
            owner: owner.clone(),
            slot: *slot,
            ty: transferred,
        }))
    }
}

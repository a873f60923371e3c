//! Bean-validation and `validator` constraints as schema keywords.
//!
//! Constraints only fill keywords that are still unset. `NotNull`, `NotEmpty`
//! and `NotBlank` also make the member required.

use super::{backbone, plugin_config, Plugin, PluginContext};
use crate::error::{Error, Result};
use crate::node::{NodePath, PropertyFragment, SourceEntity};
use crate::openapi::Schema;
use crate::type_model::{Annotation, AnnotationValue};
use log::{debug, warn};
use serde::Deserialize;

pub const NAME: &str = "validation";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fail on malformed constraint values instead of skipping the constraint
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { strict: true }
    }
}

#[derive(Default)]
pub struct ValidationPlugin {
    config: ValidationConfig,
}

fn fill<T>(slot: &mut Option<T>, value: T) {
    if slot.is_none() {
        *slot = Some(value);
    }
}

/// Applies the constraints of one member
struct Constraints<'a> {
    entity: &'a str,
    property: &'a mut PropertyFragment,
}

impl Constraints<'_> {
    fn invalid(&self, annotation: &Annotation, message: impl Into<String>) -> Error {
        Error::InvalidAnnotationValue {
            entity: self.entity.to_string(),
            annotation: annotation.simple_name().to_string(),
            message: message.into(),
        }
    }

    fn missing(&self, annotation: &Annotation, field: &str) -> Error {
        Error::MissingRequiredField {
            entity: self.entity.to_string(),
            field: format!("{}.{}", annotation.simple_name(), field),
        }
    }

    fn schema(&mut self) -> &mut Schema {
        &mut self.property.schema
    }

    fn number(&self, annotation: &Annotation, key: &str) -> Result<Option<f64>> {
        match annotation.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(annotation, format!("`{}` is not a number: {}", key, value))),
        }
    }

    fn count(&self, annotation: &Annotation, key: &str) -> Result<Option<u64>> {
        match annotation.get(key) {
            None => Ok(None),
            Some(value) => match value.as_i64() {
                Some(count) if count >= 0 => Ok(Some(count as u64)),
                _ => Err(self.invalid(annotation, format!("`{}` is not a non-negative integer: {}", key, value))),
            },
        }
    }

    /// Length of strings, size of arrays
    fn size(&mut self, min: Option<u64>, max: Option<u64>) {
        let schema = self.schema();
        let is_array = schema.is_array();
        if let Some(min) = min.filter(|m| *m > 0) {
            if is_array {
                fill(&mut schema.min_items, min);
            } else {
                fill(&mut schema.min_length, min);
            }
        }
        if let Some(max) = max.filter(|m| *m < i32::MAX as u64) {
            if is_array {
                fill(&mut schema.max_items, max);
            } else {
                fill(&mut schema.max_length, max);
            }
        }
    }

    fn bounds(&mut self, annotation: &Annotation, min_key: &str, max_key: &str) -> Result<()> {
        let min = self.count(annotation, min_key)?;
        let max = self.count(annotation, max_key)?;
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(self.invalid(annotation, format!("{} {} is greater than {} {}", min_key, min, max_key, max)));
            }
        }
        self.size(min, max);
        Ok(())
    }

    fn minimum(&mut self, value: f64, exclusive: bool) {
        let schema = self.schema();
        if schema.minimum.is_none() {
            schema.minimum = Some(value);
            if exclusive {
                schema.exclusive_minimum = Some(true);
            }
        }
    }

    fn maximum(&mut self, value: f64, exclusive: bool) {
        let schema = self.schema();
        if schema.maximum.is_none() {
            schema.maximum = Some(value);
            if exclusive {
                schema.exclusive_maximum = Some(true);
            }
        }
    }

    fn apply(&mut self, annotation: &Annotation) -> Result<()> {
        match annotation.simple_name() {
            "Size" | "Length" => self.bounds(annotation, "min", "max")?,
            "Min" | "DecimalMin" | "Max" | "DecimalMax" => {
                let value = self
                    .number(annotation, "value")?
                    .ok_or_else(|| self.missing(annotation, "value"))?;
                let exclusive = !annotation
                    .get("inclusive")
                    .and_then(AnnotationValue::as_bool)
                    .unwrap_or(true);
                if annotation.simple_name().ends_with("Min") {
                    self.minimum(value, exclusive);
                } else {
                    self.maximum(value, exclusive);
                }
            }
            "Positive" => self.minimum(0.0, true),
            "PositiveOrZero" => self.minimum(0.0, false),
            "Negative" => self.maximum(0.0, true),
            "NegativeOrZero" => self.maximum(0.0, false),
            "Pattern" => {
                let regexp = annotation
                    .first_of(&["regexp", "value"])
                    .ok_or_else(|| self.missing(annotation, "regexp"))?;
                let regexp = regexp
                    .as_str()
                    .ok_or_else(|| self.invalid(annotation, "the pattern is not a string"))?
                    .to_string();
                fill(&mut self.schema().pattern, regexp);
            }
            "Email" => fill(&mut self.schema().format, "email".to_string()),
            "NotNull" => self.property.required = true,
            "NotEmpty" | "NotBlank" => {
                self.property.required = true;
                self.size(Some(1), None);
            }
            "validate" => self.validator(annotation)?,
            _ => {}
        }
        Ok(())
    }

    /// `#[validate(...)]` attributes of the `validator` crate
    fn validator(&mut self, annotation: &Annotation) -> Result<()> {
        for (rule, value) in &annotation.values {
            match (rule.as_str(), value) {
                ("length", AnnotationValue::Nested(length)) => {
                    let equal = self.count(length, "equal")?;
                    if equal.is_some() {
                        self.size(equal, equal);
                    } else {
                        self.bounds(length, "min", "max")?;
                    }
                }
                ("range", AnnotationValue::Nested(range)) => {
                    let min = self.number(range, "min")?;
                    let max = self.number(range, "max")?;
                    if let (Some(min), Some(max)) = (min, max) {
                        if min > max {
                            return Err(self.invalid(range, format!("min {} is greater than max {}", min, max)));
                        }
                    }
                    if let Some(min) = min {
                        self.minimum(min, false);
                    }
                    if let Some(max) = max {
                        self.maximum(max, false);
                    }
                }
                ("email", _) => fill(&mut self.schema().format, "email".to_string()),
                ("url", _) => fill(&mut self.schema().format, "uri".to_string()),
                ("required", _) => self.property.required = true,
                (other, _) => debug!("Ignoring validation rule `{}` on {}", other, self.entity),
            }
        }
        Ok(())
    }
}

impl ValidationPlugin {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    pub fn from_config(config: &serde_yaml::Value) -> Result<Self> {
        Ok(Self::new(plugin_config(NAME, config)?))
    }

    fn constrain(&self, entity: &str, annotations: &[Annotation], property: &mut PropertyFragment) -> Result<()> {
        let mut constraints = Constraints { entity, property };
        for annotation in annotations {
            match constraints.apply(annotation) {
                Ok(()) => {}
                Err(e) if !self.config.strict => warn!("Skipping constraint: {}", e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl Plugin for ValidationPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn order(&self) -> i32 {
        -70
    }

    fn required_plugins(&self) -> Vec<&'static str> {
        vec![backbone::NAME]
    }

    fn exit(&self, path: &NodePath, ctx: &mut PluginContext) -> Result<()> {
        let id = ctx.current_id(path)?;
        let node = ctx.graph.node(id);
        let annotations = match &node.source {
            SourceEntity::Property { field, .. } => field.annotations.clone(),
            SourceEntity::Parameter { parameter, .. } => parameter.annotations.clone(),
            _ => return Ok(()),
        };
        if annotations.is_empty() {
            return Ok(());
        }
        let entity = node.identity.to_string();

        if let Some(property) = ctx.graph.require_target_mut(id)?.property_mut() {
            self.constrain(&entity, &annotations, property)?;
        }
        Ok(())
    }
}

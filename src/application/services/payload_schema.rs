use crate::domain::value_objects::{EntityType, MutationPayload, MutationType, PayloadValue};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Date,
    Array,
    Object,
    Any,
}

impl FieldKind {
    fn accepts(&self, value: &PayloadValue) -> bool {
        match (self, value) {
            (FieldKind::Any, _) => true,
            // Optional fields may be cleared explicitly.
            (_, PayloadValue::Null) => true,
            (FieldKind::String, PayloadValue::String(_)) => true,
            (FieldKind::Number, PayloadValue::Number(_)) => true,
            (FieldKind::Bool, PayloadValue::Bool(_)) => true,
            (FieldKind::Date, PayloadValue::Date(_)) => true,
            (FieldKind::Array, PayloadValue::Array(_)) => true,
            (FieldKind::Object, PayloadValue::Object(_)) => true,
            _ => false,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Bool => "bool",
            FieldKind::Date => "date",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
            FieldKind::Any => "any",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FieldSpec {
    kind: FieldKind,
    required: bool,
}

/// Shape of one entity type's payload. Unknown fields pass through untouched.
#[derive(Debug, Clone, Default)]
pub struct PayloadSchema {
    fields: HashMap<String, FieldSpec>,
}

impl PayloadSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldSpec {
                kind,
                required: true,
            },
        );
        self
    }

    pub fn optional(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldSpec {
                kind,
                required: false,
            },
        );
        self
    }

    /// Required fields only bind creates; updates are partial patches.
    pub fn validate(
        &self,
        mutation_type: MutationType,
        payload: &MutationPayload,
    ) -> Result<(), String> {
        if mutation_type == MutationType::Create {
            let mut missing: Vec<&str> = self
                .fields
                .iter()
                .filter(|(name, spec)| {
                    spec.required
                        && matches!(payload.get(name), None | Some(PayloadValue::Null))
                })
                .map(|(name, _)| name.as_str())
                .collect();
            if !missing.is_empty() {
                missing.sort_unstable();
                return Err(format!("missing required field(s): {}", missing.join(", ")));
            }
        }

        for (name, value) in payload.fields() {
            if let Some(spec) = self.fields.get(name) {
                if !spec.kind.accepts(value) {
                    return Err(format!(
                        "field '{}' must be {}, got {}",
                        name,
                        spec.kind.as_str(),
                        value.kind()
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Payload schemas keyed by entity type, checked at enqueue time.
#[derive(Debug, Clone, Default)]
pub struct PayloadSchemaRegistry {
    schemas: HashMap<EntityType, PayloadSchema>,
    strict: bool,
}

impl PayloadSchemaRegistry {
    /// Rejects entity types that have no registered schema.
    pub fn strict() -> Self {
        Self {
            schemas: HashMap::new(),
            strict: true,
        }
    }

    /// Accepts any object payload for unregistered entity types.
    pub fn permissive() -> Self {
        Self::default()
    }

    pub fn register(mut self, entity_type: &str, schema: PayloadSchema) -> Self {
        if let Ok(entity_type) = EntityType::new(entity_type.to_string()) {
            self.schemas.insert(entity_type, schema);
        }
        self
    }

    pub fn farm_defaults() -> Self {
        Self::strict()
            .register(
                "batch",
                PayloadSchema::new()
                    .required("name", FieldKind::String)
                    .optional("breed", FieldKind::String)
                    .optional("quantity", FieldKind::Number)
                    .optional("startDate", FieldKind::Date)
                    .optional("updatedAt", FieldKind::Date),
            )
            .register(
                "sale",
                PayloadSchema::new()
                    .required("batchId", FieldKind::String)
                    .required("amount", FieldKind::Number)
                    .optional("quantity", FieldKind::Number)
                    .optional("soldAt", FieldKind::Date)
                    .optional("updatedAt", FieldKind::Date),
            )
            .register(
                "expense",
                PayloadSchema::new()
                    .required("category", FieldKind::String)
                    .required("amount", FieldKind::Number)
                    .optional("batchId", FieldKind::String)
                    .optional("spentAt", FieldKind::Date)
                    .optional("updatedAt", FieldKind::Date),
            )
            .register(
                "feed",
                PayloadSchema::new()
                    .required("batchId", FieldKind::String)
                    .required("quantityKg", FieldKind::Number)
                    .optional("feedType", FieldKind::String)
                    .optional("fedAt", FieldKind::Date)
                    .optional("updatedAt", FieldKind::Date),
            )
            .register(
                "invoice",
                PayloadSchema::new()
                    .required("customer", FieldKind::String)
                    .required("lines", FieldKind::Array)
                    .optional("dueDate", FieldKind::Date)
                    .optional("updatedAt", FieldKind::Date),
            )
    }

    pub fn validate(
        &self,
        entity_type: &EntityType,
        mutation_type: MutationType,
        payload: &MutationPayload,
    ) -> Result<(), String> {
        match self.schemas.get(entity_type) {
            Some(schema) => schema
                .validate(mutation_type, payload)
                .map_err(|err| format!("{entity_type} payload invalid: {err}")),
            None if self.strict => Err(format!("no payload schema registered for '{entity_type}'")),
            None => Ok(()),
        }
    }
}

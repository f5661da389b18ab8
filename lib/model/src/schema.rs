//! The declarative schema model and its materialization to Parquet's own
//! schema types.

use std::sync::Arc;

use parquet::basic::{LogicalType, Repetition, Type as PhysicalType};
use parquet::schema::types::{Type, TypePtr};

/// Errors raised while turning a [`SchemaDef`] into a `parquet::schema::types::Type`.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("fixed_byte_array field '{0}' is missing a byte_length")]
    MissingByteLength(String),
    #[error("the root of a schema must be a group")]
    RootMustBeGroup,
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Recognized metadata flags. `Generated` distinguishes a schema the crate
/// synthesized from a record's shape from one the caller wrote by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaFlag {
    Generated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(Vec<MetaFlag>);

impl Metadata {
    pub fn generated() -> Self {
        Metadata(vec![MetaFlag::Generated])
    }

    pub fn is_generated(&self) -> bool {
        self.0.contains(&MetaFlag::Generated)
    }

    #[must_use]
    pub fn with(mut self, flag: MetaFlag) -> Self {
        if !self.0.contains(&flag) {
            self.0.push(flag);
        }
        self
    }
}

/// A declarative, structurally-shareable description of a column or group of
/// columns. Physical types mirror Parquet's own vocabulary directly:
/// `int96`, `fixed_byte_array`, and explicit `required`/`optional`
/// repetition rather than a higher-level type system like Arrow's.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDef {
    Primitive {
        physical_type: PhysicalType,
        logical: Option<LogicalType>,
        required: bool,
        byte_length: Option<i32>,
        metadata: Metadata,
    },
    Group {
        fields: Vec<(String, SchemaDef)>,
        required: bool,
        metadata: Metadata,
    },
    List {
        element: Box<SchemaDef>,
        required: bool,
        metadata: Metadata,
    },
    Map {
        key: Box<SchemaDef>,
        value: Box<SchemaDef>,
        required: bool,
        metadata: Metadata,
    },
}

impl SchemaDef {
    pub fn primitive(physical_type: PhysicalType) -> Self {
        SchemaDef::Primitive {
            physical_type,
            logical: None,
            required: true,
            byte_length: None,
            metadata: Metadata::default(),
        }
    }

    pub fn group(fields: Vec<(String, SchemaDef)>) -> Self {
        SchemaDef::Group {
            fields,
            required: true,
            metadata: Metadata::default(),
        }
    }

    pub fn list(element: SchemaDef) -> Self {
        SchemaDef::List {
            element: Box::new(element),
            required: true,
            metadata: Metadata::default(),
        }
    }

    /// Builds a map schema. The key schema is always forced `required`,
    /// per the spec's invariant that map keys cannot be optional.
    pub fn map(key: SchemaDef, value: SchemaDef) -> Self {
        SchemaDef::Map {
            key: Box::new(key.required()),
            value: Box::new(value),
            required: true,
            metadata: Metadata::default(),
        }
    }

    #[must_use]
    pub fn required(self) -> Self {
        self.with_required(true)
    }

    #[must_use]
    pub fn optional(self) -> Self {
        self.with_required(false)
    }

    fn with_required(mut self, required: bool) -> Self {
        match &mut self {
            SchemaDef::Primitive { required: r, .. }
            | SchemaDef::Group { required: r, .. }
            | SchemaDef::List { required: r, .. }
            | SchemaDef::Map { required: r, .. } => *r = required,
        }
        self
    }

    pub fn is_required(&self) -> bool {
        match self {
            SchemaDef::Primitive { required, .. }
            | SchemaDef::Group { required, .. }
            | SchemaDef::List { required, .. }
            | SchemaDef::Map { required, .. } => *required,
        }
    }

    #[must_use]
    pub fn with_byte_length(mut self, len: i32) -> Self {
        if let SchemaDef::Primitive { byte_length, .. } = &mut self {
            *byte_length = Some(len);
        }
        self
    }

    #[must_use]
    pub fn with_logical(mut self, logical: LogicalType) -> Self {
        if let SchemaDef::Primitive { logical: l, .. } = &mut self {
            *l = Some(logical);
        }
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, flag: MetaFlag) -> Self {
        let meta = match &mut self {
            SchemaDef::Primitive { metadata, .. }
            | SchemaDef::Group { metadata, .. }
            | SchemaDef::List { metadata, .. }
            | SchemaDef::Map { metadata, .. } => metadata,
        };
        *meta = meta.clone().with(flag);
        self
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            SchemaDef::Primitive { metadata, .. }
            | SchemaDef::Group { metadata, .. }
            | SchemaDef::List { metadata, .. }
            | SchemaDef::Map { metadata, .. } => metadata,
        }
    }

    fn repetition(&self) -> Repetition {
        if self.is_required() {
            Repetition::REQUIRED
        } else {
            Repetition::OPTIONAL
        }
    }

    /// Materializes this schema node into a concrete, named
    /// `parquet::schema::types::Type`, recursively building children first.
    pub fn materialize(&self, name: &str) -> Result<Type, SchemaError> {
        match self {
            SchemaDef::Primitive {
                physical_type,
                logical,
                byte_length,
                ..
            } => {
                let mut builder =
                    Type::primitive_type_builder(name, *physical_type).with_repetition(self.repetition());
                if *physical_type == PhysicalType::FIXED_LEN_BYTE_ARRAY {
                    let len = byte_length
                        .ok_or_else(|| SchemaError::MissingByteLength(name.to_string()))?;
                    builder = builder.with_length(len);
                }
                if let Some(logical) = logical.clone() {
                    builder = builder.with_logical_type(Some(logical));
                }
                Ok(builder.build()?)
            }
            SchemaDef::Group { fields, .. } => {
                let children = fields
                    .iter()
                    .map(|(name, def)| def.materialize(name).map(|t| Arc::new(t) as TypePtr))
                    .collect::<Result<Vec<_>, SchemaError>>()?;
                Ok(Type::group_type_builder(name)
                    .with_repetition(self.repetition())
                    .with_fields(children)
                    .build()?)
            }
            SchemaDef::List { element, .. } => {
                let element_type = Arc::new(element.materialize("element")?);
                let list_group = Type::group_type_builder("list")
                    .with_repetition(Repetition::REPEATED)
                    .with_fields(vec![element_type])
                    .build()?;
                Ok(Type::group_type_builder(name)
                    .with_repetition(self.repetition())
                    .with_logical_type(Some(LogicalType::List))
                    .with_fields(vec![Arc::new(list_group)])
                    .build()?)
            }
            SchemaDef::Map { key, value, .. } => {
                let key_type = Arc::new(key.materialize("key")?);
                let value_type = Arc::new(value.materialize("value")?);
                let key_value_group = Type::group_type_builder("key_value")
                    .with_repetition(Repetition::REPEATED)
                    .with_fields(vec![key_type, value_type])
                    .build()?;
                Ok(Type::group_type_builder(name)
                    .with_repetition(self.repetition())
                    .with_logical_type(Some(LogicalType::Map))
                    .with_fields(vec![Arc::new(key_value_group)])
                    .build()?)
            }
        }
    }

    /// Materializes the root message type. The root of a Parquet schema has
    /// no repetition of its own, unlike every other group in the tree.
    pub fn to_message_type(&self, name: &str) -> Result<TypePtr, SchemaError> {
        match self {
            SchemaDef::Group { fields, .. } => {
                let children = fields
                    .iter()
                    .map(|(name, def)| def.materialize(name).map(|t| Arc::new(t) as TypePtr))
                    .collect::<Result<Vec<_>, SchemaError>>()?;
                Ok(Arc::new(
                    Type::group_type_builder(name).with_fields(children).build()?,
                ))
            }
            _ => Err(SchemaError::RootMustBeGroup),
        }
    }
}

/// Named-field helpers for building and merging message-level field lists.
pub struct Message;

impl Message {
    /// Deduplicates fields by name, keeping the first occurrence — used when
    /// a projection names the same column via more than one path.
    pub fn merge(fields: Vec<(String, SchemaDef)>) -> Vec<(String, SchemaDef)> {
        let mut seen = std::collections::HashSet::new();
        fields
            .into_iter()
            .filter(|(name, _)| seen.insert(name.clone()))
            .collect()
    }
}

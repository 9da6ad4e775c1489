//! Schema definitions for fact types.
//!
//! A fact type is a logical name plus a list of declared fields. Each field
//! knows how to read its value out of a fact payload; readers run once per
//! fact version, never during matching.

use std::fmt;
use std::sync::Arc;

use ember_foundation::{Error, Result, Type, Value};

/// Reads one field value out of a fact payload.
#[derive(Clone)]
pub struct FieldReader(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl FieldReader {
    /// Creates a reader from a function.
    pub fn new<F>(read: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(read))
    }

    /// Reader that looks the field name up in a map-valued fact.
    ///
    /// Missing entries and non-map payloads read as nil.
    #[must_use]
    pub fn map_entry(name: &str) -> Self {
        let name: Arc<str> = name.into();
        Self::new(move |fact| fact.get_field(&name).cloned().unwrap_or(Value::Nil))
    }

    /// Reads the field value from a fact payload.
    #[must_use]
    pub fn read(&self, fact: &Value) -> Value {
        (self.0)(fact)
    }
}

impl fmt::Debug for FieldReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldReader")
    }
}

/// Schema definition for a fact field.
#[derive(Clone, Debug)]
pub struct FieldSchema {
    /// Field name.
    pub name: Arc<str>,
    /// Declared field type.
    pub ty: Type,
    /// How to read the field from a payload.
    pub reader: FieldReader,
}

impl FieldSchema {
    /// Creates a field read from the map entry of the same name.
    #[must_use]
    pub fn new(name: &str, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            reader: FieldReader::map_entry(name),
        }
    }

    /// Creates a field with a custom reader.
    pub fn with_reader<F>(name: &str, ty: Type, read: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            ty,
            reader: FieldReader::new(read),
        }
    }

    /// Reads and type-checks this field's value.
    ///
    /// # Errors
    ///
    /// Returns a type mismatch if the read value is not accepted by the
    /// declared type.
    pub fn extract(&self, fact: &Value) -> Result<Value> {
        let value = self.reader.read(fact);
        let actual = value.value_type();
        if self.ty.accepts(&actual) {
            Ok(value)
        } else {
            Err(Error::type_mismatch(self.ty.clone(), actual))
        }
    }
}

/// Schema definition for a fact type.
#[derive(Clone, Debug)]
pub struct FactTypeSchema {
    /// Logical type name (e.g. `Person`).
    pub name: Arc<str>,
    /// Field definitions.
    pub fields: Vec<FieldSchema>,
}

impl FactTypeSchema {
    /// Creates a new fact type schema with no fields.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a map-entry field to the schema.
    #[must_use]
    pub fn with_field(mut self, name: &str, ty: Type) -> Self {
        self.fields.push(FieldSchema::new(name, ty));
        self
    }

    /// Adds a field with a custom reader to the schema.
    #[must_use]
    pub fn with_field_reader<F>(mut self, name: &str, ty: Type, read: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.fields.push(FieldSchema::with_reader(name, ty, read));
        self
    }

    /// Returns the position of a field by name.
    #[must_use]
    pub fn field_position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| &*f.name == name)
    }

    /// Returns the field schema by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| &*f.name == name)
    }
}

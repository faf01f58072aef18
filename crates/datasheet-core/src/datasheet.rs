//! Datasheet type - a field map plus its records

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::field::Field;
use crate::field_map::FieldMap;
use crate::record::{CellData, Record};

/// A datasheet: schema (field map) and rows
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Datasheet {
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    pub fields: FieldMap,
    #[cfg_attr(feature = "serde", serde(default))]
    pub records: Vec<Record>,
}

impl Datasheet {
    /// Create an empty datasheet
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: FieldMap::new(),
            records: Vec::new(),
        }
    }

    /// Add a field to the schema
    pub fn add_field(&mut self, field: Field) -> Result<()> {
        self.fields.insert(field)
    }

    /// Append a record
    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Get a record by id
    pub fn record(&self, id: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Write a cell, checking the data shape against the field type
    pub fn set_cell(
        &mut self,
        record_id: &str,
        field_id: &str,
        data: impl Into<CellData>,
    ) -> Result<()> {
        let data = data.into();
        let field = self.fields.require(field_id)?;
        if !field.accepts(&data) {
            return Err(Error::InvalidCellData {
                field: field.id.clone(),
                expected: field.field_type().as_str(),
                actual: data.shape(),
            });
        }

        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == record_id)
            .ok_or_else(|| Error::RecordNotFound(record_id.to_string()))?;
        record.set(field_id, data);
        Ok(())
    }
}

//! Evaluation inputs: field map, record, clock, options and cross-datasheet lookup

use std::collections::HashMap;

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use datasheet_core::{Datasheet, FieldMap, Record};

/// Host-supplied lookup from datasheet id to that datasheet's field map.
///
/// Used to bind Formula fields whose expression is written against another
/// datasheet's schema.
pub trait FieldMapSource {
    fn field_map(&self, datasheet_id: &str) -> Option<&FieldMap>;
}

/// A source that knows no datasheets
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSources;

impl FieldMapSource for NoSources {
    fn field_map(&self, _datasheet_id: &str) -> Option<&FieldMap> {
        None
    }
}

impl FieldMapSource for HashMap<String, FieldMap> {
    fn field_map(&self, datasheet_id: &str) -> Option<&FieldMap> {
        self.get(datasheet_id)
    }
}

impl FieldMapSource for AHashMap<String, FieldMap> {
    fn field_map(&self, datasheet_id: &str) -> Option<&FieldMap> {
        self.get(datasheet_id)
    }
}

impl FieldMapSource for [Datasheet] {
    fn field_map(&self, datasheet_id: &str) -> Option<&FieldMap> {
        self.iter()
            .find(|ds| ds.id == datasheet_id)
            .map(|ds| &ds.fields)
    }
}

impl FieldMapSource for Vec<Datasheet> {
    fn field_map(&self, datasheet_id: &str) -> Option<&FieldMap> {
        self.as_slice().field_map(datasheet_id)
    }
}

/// Evaluation options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvaluationOptions {
    /// Flatten rich-text cells into plain strings before evaluation
    pub transform: bool,
    /// Maximum nesting of bound nodes, including referenced Formula fields
    pub max_depth: usize,
    /// Maximum number of nodes evaluated in one call
    pub max_nodes: usize,
}

impl Default for EvaluationOptions {
    fn default() -> Self {
        Self {
            transform: true,
            max_depth: 256,
            max_nodes: 100_000,
        }
    }
}

static NO_SOURCES: NoSources = NoSources;

/// Immutable bundle of inputs to one evaluation
#[derive(Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Field map of the datasheet owning the record
    pub field_map: &'a FieldMap,
    /// Record being evaluated
    pub record: &'a Record,
    /// Clock value for `TODAY()`/`NOW()`
    pub now: DateTime<Utc>,
    pub options: EvaluationOptions,
    /// Field maps of other datasheets
    pub sources: &'a dyn FieldMapSource,
}

impl<'a> EvaluationContext<'a> {
    /// Create a context with default options and no other datasheets
    pub fn new(field_map: &'a FieldMap, record: &'a Record, now: DateTime<Utc>) -> Self {
        Self {
            field_map,
            record,
            now,
            options: EvaluationOptions::default(),
            sources: &NO_SOURCES,
        }
    }

    pub fn with_transform(mut self, transform: bool) -> Self {
        self.options.transform = transform;
        self
    }

    pub fn with_options(mut self, options: EvaluationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sources(mut self, sources: &'a dyn FieldMapSource) -> Self {
        self.sources = sources;
        self
    }

    pub fn transform(&self) -> bool {
        self.options.transform
    }
}

impl std::fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("record", &self.record.id)
            .field("fields", &self.field_map.len())
            .field("now", &self.now)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasheet_core::{Field, FieldKind};

    #[test]
    fn test_defaults() {
        let options = EvaluationOptions::default();
        assert!(options.transform);
        assert_eq!(options.max_depth, 256);
        assert_eq!(options.max_nodes, 100_000);
    }

    #[test]
    fn test_sources() {
        let mut ds = Datasheet::new("dst2", "Other");
        ds.add_field(Field::new("fldA", "A", FieldKind::Text)).unwrap();
        let sheets = vec![ds];

        assert!(sheets.field_map("dst2").is_some());
        assert!(sheets.field_map("dst9").is_none());

        let map = FieldMap::new();
        let record = Record::new("rec1");
        let ctx = EvaluationContext::new(&map, &record, Utc::now())
            .with_transform(false)
            .with_sources(&sheets);
        assert!(!ctx.transform());
        assert!(ctx.sources.field_map("dst2").is_some());
    }
}

//! Entity schema catalog
//!
//! Field-level schemas for QuickBooks entities (Bill, Customer, Invoice,
//! ...), loaded from a JSON file mapping entity name to schema. Agents query
//! these before building `query_quickbooks` statements or mutation payloads.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::info;

use crate::{Error, Result};

/// Read-only mapping from entity name to field schema
#[derive(Debug)]
pub struct SchemaCatalog {
    schemas: Map<String, Value>,
}

impl SchemaCatalog {
    /// Load the catalog from a JSON object file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read entity schema file {path:?}: {e}"))
        })?;

        let value: Value = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse entity schema file {path:?}: {e}"))
        })?;

        let Value::Object(schemas) = value else {
            return Err(Error::Config(format!(
                "Entity schema file {path:?} must be a JSON object keyed by entity name"
            )));
        };

        info!(count = schemas.len(), path = %path.display(), "Loaded entity schemas");
        Ok(Self { schemas })
    }

    /// Look up the schema for an entity by its exact name
    pub fn lookup(&self, entity: &str) -> Result<&Value> {
        self.schemas.get(entity).ok_or_else(|| Error::SchemaNotFound {
            entity: entity.to_string(),
            available: self.schemas.keys().cloned().collect(),
        })
    }

    /// Number of entities in the catalog
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Returns `true` if the catalog holds no schemas
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn catalog() -> SchemaCatalog {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"Account": {{"Name": "string", "AccountType": "string"}},
                "Invoice": {{"Line": "array"}}}}"#
        )
        .unwrap();
        SchemaCatalog::load(file.path()).unwrap()
    }

    #[test]
    fn test_lookup() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 2);
        let schema = catalog.lookup("Account").unwrap();
        assert_eq!(schema["AccountType"], "string");
    }

    #[test]
    fn test_lookup_unknown_lists_available() {
        let err = catalog().lookup("Widget").unwrap_err();
        match err {
            Error::SchemaNotFound { entity, available } => {
                assert_eq!(entity, "Widget");
                assert!(available.contains(&"Account".to_string()));
                assert!(available.contains(&"Invoice".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_catalog_is_debug_formattable() {
        assert!(format!("{:?}", catalog()).contains("Account"));
    }

    #[test]
    fn test_load_rejects_non_object() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[1, 2, 3]").unwrap();
        let err = SchemaCatalog::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

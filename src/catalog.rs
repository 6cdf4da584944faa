//! A JSON file standing in for the item lookup service.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use serde_json::Value;
use shelf_scan::Lookup;
use shelf_scan::lookup::{LookupErrorKind, LookupResult};
use std::collections::HashMap;
use std::path::Path;

/// Items keyed by their exact code, loaded once from a JSON object such as
/// `{"SKU0099": {"id": 42, "name": "Widget"}}`.
#[derive(Debug)]
pub struct CatalogLookup {
    items: HashMap<String, Value>,
}
impl CatalogLookup {
    pub async fn open(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await.or_raise(|| ErrorKind::Catalog(path.to_path_buf()))?;
        let items: HashMap<String, Value> =
            serde_json::from_slice(&bytes).or_raise(|| ErrorKind::InvalidCatalog(path.to_path_buf()))?;
        tracing::info!(path = %path.display(), items = items.len(), "Catalog loaded");
        Ok(Self { items })
    }
}

#[async_trait]
impl Lookup for CatalogLookup {
    async fn lookup(&self, code: &str) -> LookupResult<Value> {
        match self.items.get(code) {
            Some(payload) => Ok(payload.clone()),
            None => exn::bail!(LookupErrorKind::NotFound),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use shelf_scan::error::ErrorKind as ScanErrorKind;
    use shelf_scan::{Scanner, ScannerOptions};
    use std::sync::Arc;

    async fn catalog(contents: &str) -> (tempfile::TempDir, Result<CatalogLookup>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        tokio::fs::write(&path, contents).await.unwrap();
        let catalog = CatalogLookup::open(&path).await;
        (dir, catalog)
    }

    #[tokio::test]
    async fn test_lookup_by_exact_code() {
        let (_dir, catalog) = catalog(r#"{"SKU0099": {"id": 42, "name": "Widget"}, "ABC123": {"id": 1}}"#).await;
        let catalog = catalog.unwrap();
        assert_eq!(catalog.lookup("ABC123").await.unwrap(), serde_json::json!({"id": 1}));
        let err = catalog.lookup("abc123").await.unwrap_err();
        assert_eq!(*err, LookupErrorKind::NotFound);
    }

    #[rstest]
    #[case::not_json("SKU0099,42\n")]
    #[case::not_an_object(r#"[{"id": 42}]"#)]
    #[tokio::test]
    async fn test_invalid_catalog(#[case] contents: &str) {
        let (dir, catalog) = catalog(contents).await;
        let err = catalog.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidCatalog(dir.path().join("catalog.json")));
    }

    #[tokio::test]
    async fn test_missing_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = CatalogLookup::open(&path).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Catalog(path));
    }

    #[tokio::test]
    async fn test_scanner_over_catalog() {
        let (_dir, catalog) = catalog(r#"{"SKU0099": {"id": 42, "name": "Widget"}, "NOID": {"name": "?"}}"#).await;
        let scanner = Scanner::new(ScannerOptions::default(), Arc::new(catalog.unwrap())).unwrap();
        assert_eq!(scanner.resolve(" SKU0099 ").await.unwrap().name(), Some("Widget"));
        let err = scanner.resolve("ZZZ999").await.unwrap_err();
        assert_eq!(*err, ScanErrorKind::ItemNotFound("ZZZ999".into()));
        let err = scanner.resolve("NOID").await.unwrap_err();
        assert_eq!(*err, ScanErrorKind::ItemNotFound("NOID".into()));
    }
}

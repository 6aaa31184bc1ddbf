// Feature Map Read-Only Adapter
//
// Parses the `feature_map.csv` policy catalog into a normalized
// `PolicyCatalog`. Columns beyond the five we use are ignored.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::catalog::{CatalogError, PolicyCatalog, PolicyRecord};

/// Load the catalog from a CSV file on disk.
pub fn load_feature_map(path: impl AsRef<Path>) -> Result<PolicyCatalog, CatalogError> {
    let path = path.as_ref();
    let reader = csv::Reader::from_path(path).map_err(|source| CatalogError::Unavailable {
        path: path.to_path_buf(),
        source,
    })?;

    let catalog = collect(reader)?;
    debug!(path = %path.display(), "policy catalog loaded");
    Ok(catalog)
}

/// Parse a catalog from any CSV source with a header row.
pub fn read_feature_map<R: Read>(source: R) -> Result<PolicyCatalog, CatalogError> {
    collect(csv::Reader::from_reader(source))
}

fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<PolicyCatalog, CatalogError> {
    let policies = reader
        .deserialize::<PolicyRecord>()
        .map(|row| row.map(trimmed))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PolicyCatalog::new(policies))
}

fn trimmed(record: PolicyRecord) -> PolicyRecord {
    PolicyRecord {
        feature_id: record.feature_id.trim().to_owned(),
        os: record.os.trim().to_owned(),
        category: record.category.trim().to_owned(),
        rule: record.rule.trim().to_owned(),
        priority: record.priority.trim().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OsType;

    const FEATURE_MAP: &str = "\
Feature ID,OS,Category,Parameter/Rule,Priority,Notes
F-LNX-101,Linux,Filesystem,Ensure /tmp is a separate partition,High,
F-LNX-401,Linux,Network, Disable IP forwarding ,Medium,sysctl
F-WIN-201,Windows,Access Management,\"Enforce password history, 24 or more\",High,
";

    #[test]
    fn parse_feature_map_csv() {
        let catalog = read_feature_map(FEATURE_MAP.as_bytes()).unwrap();

        let forwarding = catalog.policy("F-LNX-401", OsType::Linux).unwrap();
        assert_eq!(forwarding.rule, "Disable IP forwarding");
        assert_eq!(forwarding.priority, "Medium");

        let history = catalog.policy("F-WIN-201", OsType::Windows).unwrap();
        assert_eq!(history.rule, "Enforce password history, 24 or more");
    }

    #[test]
    fn missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_feature_map(dir.path().join("feature_map.csv")).unwrap_err();

        assert!(matches!(err, CatalogError::Unavailable { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feature_map.csv");
        std::fs::write(&path, FEATURE_MAP).unwrap();

        let catalog = load_feature_map(&path).unwrap();
        assert_eq!(catalog.category_names().len(), 3);
    }
}

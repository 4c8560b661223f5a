//! Loads the scope document from disk. Independent of any command-line
//! front-end, which is out of scope for this crate.

use std::path::Path;

use crate::error::CrawlError;
use crate::scope::Scope;

/// Reads a scope file, choosing JSON or YAML by extension
/// (`.json` vs `.yml`/`.yaml`). A missing or unparseable file is a fatal
/// [`CrawlError::Config`], never a panic.
pub fn load_scope(path: impl AsRef<Path>) -> Result<Scope, CrawlError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|err| {
        CrawlError::Config(format!("failed to read scope file {}: {err}", path.display()))
    })?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yml") | Some("yaml") => serde_yaml::from_str(&contents).map_err(|err| {
            CrawlError::Config(format!(
                "failed to parse YAML scope file {}: {err}",
                path.display()
            ))
        }),
        _ => serde_json::from_str(&contents).map_err(|err| {
            CrawlError::Config(format!(
                "failed to parse JSON scope file {}: {err}",
                path.display()
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_json_scope_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, r#"{{"urls":{{"includes":["^https?://host/"]}}}}"#).unwrap();

        let scope = load_scope(file.path()).unwrap();
        assert!(scope.urls.is_some());
    }

    #[test]
    fn loads_yaml_scope_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "urls:\n  includes:\n    - \"^https?://host/\"").unwrap();

        let scope = load_scope(file.path()).unwrap();
        assert!(scope.urls.is_some());
    }

    #[test]
    fn missing_file_is_a_config_error_not_a_panic() {
        let err = load_scope("/nonexistent/path/to/scope.json").unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }
}

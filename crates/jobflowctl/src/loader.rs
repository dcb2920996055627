//! Job document loading.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use jobflow_engine::{Job, Properties};

/// Load a job definition from a YAML or JSON file.
pub fn load_job(path: &Path) -> Result<Job> {
    let content =
        fs::read_to_string(path).context(format!("Failed to read job file: {}", path.display()))?;

    let job: Job = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content).context("Failed to parse job JSON")?,
        _ => serde_yaml::from_str(&content).context("Failed to parse job YAML")?,
    };
    Ok(job)
}

/// Parse `key=value` job parameters.
pub fn parse_parameters(params: &[String]) -> Result<Properties> {
    let mut props = Properties::new();
    for param in params {
        let (key, value) = param
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid parameter format: {}. Expected key=value", param))?;
        props.insert(key.trim().to_string(), value.to_string());
    }
    Ok(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const JOB_YAML: &str = r#"
id: nightly
elements:
  - type: step
    id: extract
  - type: split
    id: load
    flows:
      - id: warehouse
        elements:
          - type: step
            id: load_warehouse
      - id: search
        elements:
          - type: step
            id: load_search
"#;

    #[test]
    fn test_load_yaml_job() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(JOB_YAML.as_bytes()).unwrap();

        let job = load_job(file.path()).unwrap();
        assert_eq!(job.id, "nightly");
        assert_eq!(job.elements.len(), 2);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_load_json_job() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(br#"{"id": "j", "elements": [{"type": "step", "id": "a"}]}"#)
            .unwrap();

        let job = load_job(file.path()).unwrap();
        assert_eq!(job.elements[0].id(), "a");
    }

    #[test]
    fn test_demo_job_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/nightly.yaml");
        let job = load_job(&path).unwrap();
        assert_eq!(job.listeners.len(), 1);
        assert!(job.validate().is_ok());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_job(Path::new("/nonexistent/job.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read job file"));
    }

    #[test]
    fn test_parse_parameters() {
        let params = parse_parameters(&["date=2026-01-31".to_string(), "q=a=b".to_string()]).unwrap();
        assert_eq!(params.get("date"), Some(&"2026-01-31".to_string()));
        assert_eq!(params.get("q"), Some(&"a=b".to_string()));

        assert!(parse_parameters(&["novalue".to_string()]).is_err());
    }
}

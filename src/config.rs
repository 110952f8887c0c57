use crate::aggregate::DEFAULT_COST_METRIC;
use crate::error::AppError;
use crate::models::WindowKind;
use crate::service::FailurePolicy;
use crate::window::ReferenceZone;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_ENV: &str = "COST_EXPORTER_CONFIG";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExporterConfig {
    pub region: String,
    pub port: u16,
    pub refresh_seconds: u64,
    pub cost_metric: String,
    pub windows: Vec<WindowKind>,
    pub time_zone: ReferenceZone,
    pub failure_policy: FailurePolicy,
    pub linked_accounts: Vec<String>,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            port: 8080,
            refresh_seconds: 6 * 60 * 60,
            cost_metric: DEFAULT_COST_METRIC.to_string(),
            windows: WindowKind::ALL.to_vec(),
            time_zone: ReferenceZone::Local,
            failure_policy: FailurePolicy::FailFast,
            linked_accounts: vec![],
        }
    }
}

impl ExporterConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub region: Option<String>,
    pub port: Option<u16>,
    pub refresh_seconds: Option<u64>,
}

pub fn load_config_file(path: &Path) -> Result<ExporterConfig, AppError> {
    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn apply_env<F>(config: &mut ExporterConfig, lookup: F) -> Result<(), AppError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(region) = lookup("AWS_REGION").filter(|v| !v.trim().is_empty()) {
        config.region = region.trim().to_string();
    }
    if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
        config.port = port
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("invalid PORT '{port}'")))?;
    }
    Ok(())
}

fn apply_overrides(config: &mut ExporterConfig, overrides: &ConfigOverrides) {
    if let Some(region) = &overrides.region {
        config.region = region.clone();
    }
    if let Some(port) = overrides.port {
        config.port = port;
    }
    if let Some(secs) = overrides.refresh_seconds {
        config.refresh_seconds = secs;
    }
}

// Duplicate windows keep their first position so refresh order stays as written.
fn normalize_config(config: &mut ExporterConfig) -> bool {
    let mut changed = false;

    let mut windows = Vec::with_capacity(config.windows.len());
    for kind in &config.windows {
        if windows.contains(kind) {
            changed = true;
        } else {
            windows.push(*kind);
        }
    }
    config.windows = windows;

    let mut accounts: Vec<String> = Vec::new();
    for account in &config.linked_accounts {
        let trimmed = account.trim();
        if trimmed != account.as_str() {
            changed = true;
        }
        if trimmed.is_empty() || accounts.iter().any(|a| a == trimmed) {
            changed = true;
            continue;
        }
        accounts.push(trimmed.to_string());
    }
    config.linked_accounts = accounts;

    let metric = config.cost_metric.trim();
    if metric != config.cost_metric {
        config.cost_metric = metric.to_string();
        changed = true;
    }

    changed
}

fn validate_config(config: &ExporterConfig) -> Result<(), AppError> {
    if config.windows.is_empty() {
        return Err(AppError::Config("at least one window must be configured".into()));
    }
    if config.refresh_seconds == 0 {
        return Err(AppError::Config("refresh_seconds must be greater than zero".into()));
    }
    if config.cost_metric.is_empty() {
        return Err(AppError::Config("cost_metric must not be empty".into()));
    }
    if config.region.trim().is_empty() {
        return Err(AppError::Config("region must not be empty".into()));
    }
    Ok(())
}

fn resolve<F>(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
    lookup: F,
) -> Result<ExporterConfig, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config_file(path)?,
        None => ExporterConfig::default(),
    };
    apply_env(&mut config, lookup)?;
    apply_overrides(&mut config, overrides);
    normalize_config(&mut config);
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ExporterConfig, AppError> {
    resolve(path, overrides, |name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("exporter.toml");
        fs::write(&path, body).expect("write config");
        path
    }

    #[test]
    fn defaults_cover_all_windows_in_fixed_order() {
        let cfg = resolve(None, &ConfigOverrides::default(), env(&[])).expect("config");
        assert_eq!(cfg.windows, WindowKind::ALL.to_vec());
        assert_eq!(cfg.region, DEFAULT_REGION);
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(21_600));
        assert_eq!(cfg.cost_metric, "UnblendedCost");
        assert_eq!(cfg.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn file_then_env_then_flags() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(
            &dir,
            r#"
            region = "eu-west-1"
            port = 9100
            refresh_seconds = 600
            windows = ["previous-month", "today"]
            failure_policy = "isolate"
            time_zone = "utc"
            "#,
        );

        let cfg = resolve(
            Some(&path),
            &ConfigOverrides::default(),
            env(&[("AWS_REGION", "ap-south-1")]),
        )
        .expect("config");
        assert_eq!(cfg.region, "ap-south-1");
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.windows, vec![WindowKind::PreviousMonth, WindowKind::Today]);
        assert_eq!(cfg.failure_policy, FailurePolicy::Isolate);
        assert_eq!(cfg.time_zone, ReferenceZone::Utc);

        let cfg = resolve(
            Some(&path),
            &ConfigOverrides {
                region: Some("us-west-2".into()),
                port: Some(9200),
                refresh_seconds: Some(60),
            },
            env(&[("AWS_REGION", "ap-south-1"), ("PORT", "9300")]),
        )
        .expect("config");
        assert_eq!(cfg.region, "us-west-2");
        assert_eq!(cfg.port, 9200);
        assert_eq!(cfg.refresh_seconds, 60);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let cfg = resolve(
            None,
            &ConfigOverrides::default(),
            env(&[("AWS_REGION", "  "), ("PORT", "")]),
        )
        .expect("config");
        assert_eq!(cfg.region, DEFAULT_REGION);
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn invalid_port_env_is_rejected() {
        let err = resolve(None, &ConfigOverrides::default(), env(&[("PORT", "http")]))
            .expect_err("expected port error");
        assert!(err.to_string().contains("invalid PORT"));
    }

    #[test]
    fn normalize_config_dedupes_windows_and_accounts() {
        let mut cfg = ExporterConfig {
            windows: vec![WindowKind::Today, WindowKind::PreviousDay, WindowKind::Today],
            linked_accounts: vec![" 123456789012 ".into(), "123456789012".into(), "".into()],
            cost_metric: " AmortizedCost ".into(),
            ..ExporterConfig::default()
        };

        assert!(normalize_config(&mut cfg));
        assert_eq!(cfg.windows, vec![WindowKind::Today, WindowKind::PreviousDay]);
        assert_eq!(cfg.linked_accounts, vec!["123456789012".to_string()]);
        assert_eq!(cfg.cost_metric, "AmortizedCost");

        assert!(!normalize_config(&mut cfg));
    }

    #[test]
    fn empty_window_list_is_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "windows = []\n");
        let err = resolve(Some(&path), &ConfigOverrides::default(), env(&[]))
            .expect_err("expected validation error");
        assert!(err.to_string().contains("at least one window"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = resolve(
            None,
            &ConfigOverrides {
                refresh_seconds: Some(0),
                ..ConfigOverrides::default()
            },
            env(&[]),
        )
        .expect_err("expected validation error");
        assert!(err.to_string().contains("refresh_seconds"));
    }

    #[test]
    fn unknown_window_name_fails_to_parse() {
        let dir = TempDir::new().expect("temp dir");
        let path = write_config(&dir, "windows = [\"yesterday\"]\n");
        assert!(matches!(
            resolve(Some(&path), &ConfigOverrides::default(), env(&[])),
            Err(AppError::TomlDe(_))
        ));
    }
}

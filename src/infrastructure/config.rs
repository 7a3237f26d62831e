use anyhow::{anyhow, bail};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub influx: InfluxSettings,
    pub dashboard: DashboardSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct InfluxSettings {
    pub host: String,
    pub token: String,
    pub database: String,
    pub retention_policy: String,
    #[serde(default = "default_influx_timeout_ms")]
    pub timeout_ms: u64,
    pub range_query: String,
    pub latest_query: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// One query per panel covering the whole day
    #[default]
    Range,
    /// One query per hour window, failures zero-fill their hour
    PerHour,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardSettings {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_total_phase")]
    pub total_phase: String,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default = "default_sub_query_timeout_ms")]
    pub sub_query_timeout_ms: u64,
    #[serde(default)]
    pub panels: Vec<PanelConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PanelConfig {
    pub id: String,
    /// Field name of this panel in combined power points
    pub series_key: String,
}

impl DashboardSettings {
    pub fn parse_timezone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid dashboard timezone {}: {}", self.timezone, e))
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_influx_timeout_ms() -> u64 {
    10_000
}

fn default_timezone() -> String {
    "Asia/Jakarta".to_string()
}

fn default_total_phase() -> String {
    "R".to_string()
}

fn default_sub_query_timeout_ms() -> u64 {
    5_000
}

pub fn load_config() -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/power"))
        .add_source(config::Environment::with_prefix("POWER").separator("__"))
        .build()?;

    let config: AppConfig = settings.try_deserialize()?;
    validate_panels(&config.dashboard.panels)?;

    Ok(config)
}

/// Field names combined power points already use for themselves
const RESERVED_SERIES_KEYS: [&str; 2] = ["time", "totalPower"];

/// Panels need unique ids and series keys that do not collide in combined points
pub fn validate_panels(panels: &[PanelConfig]) -> anyhow::Result<()> {
    if panels.is_empty() {
        bail!("dashboard.panels must list at least one panel");
    }

    let mut ids = HashSet::new();
    let mut keys = HashSet::new();
    for panel in panels {
        if !ids.insert(panel.id.as_str()) {
            bail!("duplicate panel id {}", panel.id);
        }
        if RESERVED_SERIES_KEYS.contains(&panel.series_key.as_str()) {
            bail!(
                "panel {} uses reserved series_key {}",
                panel.id,
                panel.series_key
            );
        }
        if !keys.insert(panel.series_key.as_str()) {
            bail!(
                "panel {} reuses series_key {}",
                panel.id,
                panel.series_key
            );
        }
    }

    Ok(())
}

/// Replace template variables in a query string
pub fn prepare_query(query: &str, vars: &HashMap<String, String>) -> String {
    let mut result = query.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_query() {
        let mut vars = HashMap::new();
        vars.insert("panel".to_string(), "33kva".to_string());
        vars.insert("start".to_string(), "2025-04-16T17:00:00Z".to_string());

        let query = "SELECT * FROM panel_readings WHERE panel = '${panel}' AND time >= '${start}'";
        let result = prepare_query(query, &vars);

        assert_eq!(
            result,
            "SELECT * FROM panel_readings WHERE panel = '33kva' AND time >= '2025-04-16T17:00:00Z'"
        );
    }

    #[test]
    fn test_dashboard_settings_defaults() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [[panels]]
                id = "33kva"
                series_key = "panelAPower"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let dashboard: DashboardSettings = settings.try_deserialize().unwrap();
        assert_eq!(dashboard.fetch_mode, FetchMode::Range);
        assert_eq!(dashboard.total_phase, "R");
        assert_eq!(dashboard.sub_query_timeout_ms, 5_000);
        assert_eq!(dashboard.parse_timezone().unwrap(), chrono_tz::Asia::Jakarta);
        assert_eq!(dashboard.panels.len(), 1);
    }

    fn panel(id: &str, series_key: &str) -> PanelConfig {
        PanelConfig {
            id: id.to_string(),
            series_key: series_key.to_string(),
        }
    }

    #[test]
    fn test_validate_panels() {
        assert!(validate_panels(&[
            panel("33kva", "panelAPower"),
            panel("66kva", "panelBPower"),
        ])
        .is_ok());

        assert!(validate_panels(&[]).is_err());

        let err = validate_panels(&[panel("33kva", "power"), panel("66kva", "power")])
            .unwrap_err()
            .to_string();
        assert!(err.contains("reuses series_key power"));

        let err = validate_panels(&[panel("33kva", "totalPower")])
            .unwrap_err()
            .to_string();
        assert!(err.contains("reserved series_key totalPower"));
        assert!(validate_panels(&[panel("33kva", "time")]).is_err());

        let err = validate_panels(&[panel("33kva", "a"), panel("33kva", "b")])
            .unwrap_err()
            .to_string();
        assert!(err.contains("duplicate panel id 33kva"));
    }

    #[test]
    fn test_fetch_mode_and_bad_timezone() {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                timezone = "Mars/Olympus"
                fetch_mode = "per_hour"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();

        let dashboard: DashboardSettings = settings.try_deserialize().unwrap();
        assert_eq!(dashboard.fetch_mode, FetchMode::PerHour);
        assert!(dashboard.parse_timezone().is_err());
    }
}

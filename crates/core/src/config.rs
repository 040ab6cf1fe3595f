use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::align::similarity::ToolSimilarityConfig;
use crate::error::{Result, SpanDiffError};
use crate::model::flow::LayoutDirection;
use crate::time::parse_duration_str;

/// Heuristics for turning a categorized tree into an execution flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowConfig {
    /// Overlap below this is treated as scheduling noise, not parallelism.
    pub parallel_jitter: Duration,
    /// Share of the children's time window a root must cover to be elided.
    pub container_coverage: f64,
    /// How late a covering root may start relative to its first child.
    pub container_start_tolerance: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            parallel_jitter: Duration::from_millis(10),
            container_coverage: 0.9,
            container_start_tolerance: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    pub direction: LayoutDirection,
    pub node_width: f64,
    pub node_height: f64,
    pub node_sep: f64,
    pub rank_sep: f64,
    /// Barycenter sweeps used for crossing reduction.
    pub sweeps: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::TopToBottom,
            node_width: 220.0,
            node_height: 64.0,
            node_sep: 40.0,
            rank_sep: 80.0,
            sweeps: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignConfig {
    pub match_threshold: f64,
    pub modified_threshold: f64,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.6,
            modified_threshold: 0.4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub flow: FlowConfig,
    pub layout: LayoutConfig,
    pub align: AlignConfig,
    pub tools: ToolSimilarityConfig,
}

impl Config {
    /// Defaults, then the config file (if present), then the environment.
    pub fn load() -> Result<Self> {
        let path = config_file_path();
        Self::layered(load_file_overrides(&path)?)
    }

    /// Like [`Config::load`] with an explicit file that must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpanDiffError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::layered(load_file_overrides(path)?)
    }

    pub fn from_env() -> Result<Self> {
        Self::layered(None)
    }

    fn layered(file: Option<ConfigOverrides>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(file_overrides) = file {
            apply_overrides(&mut cfg, file_overrides, "config file")?;
        }
        let env_overrides = load_env_overrides()?;
        apply_overrides(&mut cfg, env_overrides, "environment")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let align = &self.align;
        for (name, value) in [
            ("match_threshold", align.match_threshold),
            ("modified_threshold", align.modified_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SpanDiffError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if align.modified_threshold > align.match_threshold {
            return Err(SpanDiffError::Config(format!(
                "modified_threshold ({}) must not exceed match_threshold ({})",
                align.modified_threshold, align.match_threshold
            )));
        }
        let coverage = self.flow.container_coverage;
        if !(coverage > 0.0 && coverage <= 1.0) {
            return Err(SpanDiffError::Config(format!(
                "container_coverage must be within (0, 1], got {coverage}"
            )));
        }
        let layout = &self.layout;
        if layout.node_width <= 0.0 || layout.node_height <= 0.0 {
            return Err(SpanDiffError::Config(
                "node_width and node_height must be positive".to_string(),
            ));
        }
        self.tools.validate()
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigOverrides {
    flow: Option<FlowOverrides>,
    layout: Option<LayoutOverrides>,
    align: Option<AlignOverrides>,
    tools: Option<ToolSimilarityConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FlowOverrides {
    parallel_jitter: Option<String>,
    container_coverage: Option<f64>,
    container_start_tolerance: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutOverrides {
    direction: Option<String>,
    node_width: Option<f64>,
    node_height: Option<f64>,
    node_sep: Option<f64>,
    rank_sep: Option<f64>,
    sweeps: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct AlignOverrides {
    match_threshold: Option<f64>,
    modified_threshold: Option<f64>,
}

fn config_file_path() -> PathBuf {
    if let Ok(path) = env::var("SPANDIFF_CONFIG") {
        return PathBuf::from(path);
    }

    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let config_home = env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(home).join(".config"));
    config_home.join("spandiff/config.toml")
}

fn load_file_overrides(path: &Path) -> Result<Option<ConfigOverrides>> {
    if !path.exists() {
        return Ok(None);
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| SpanDiffError::Config(format!("failed reading {}: {e}", path.display())))?;
    let parsed: ConfigOverrides = toml::from_str(&raw)
        .map_err(|e| SpanDiffError::Config(format!("failed parsing {}: {e}", path.display())))?;
    Ok(Some(parsed))
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    match env::var(key) {
        Ok(v) => v.trim().parse::<f64>().map(Some).map_err(|e| {
            SpanDiffError::Config(format!("bad {key} in environment: {e} (value={v})"))
        }),
        Err(_) => Ok(None),
    }
}

fn load_env_overrides() -> Result<ConfigOverrides> {
    let flow = FlowOverrides {
        parallel_jitter: env::var("SPANDIFF_PARALLEL_JITTER").ok(),
        container_coverage: env_f64("SPANDIFF_CONTAINER_COVERAGE")?,
        container_start_tolerance: None,
    };
    let layout = LayoutOverrides {
        direction: env::var("SPANDIFF_LAYOUT_DIRECTION").ok(),
        ..LayoutOverrides::default()
    };
    let align = AlignOverrides {
        match_threshold: env_f64("SPANDIFF_MATCH_THRESHOLD")?,
        modified_threshold: env_f64("SPANDIFF_MODIFIED_THRESHOLD")?,
    };

    Ok(ConfigOverrides {
        flow: Some(flow),
        layout: Some(layout),
        align: Some(align),
        tools: None,
    })
}

fn parse_duration_field(value: &str, field: &str, source: &str) -> Result<Duration> {
    parse_duration_str(value)
        .map_err(|e| SpanDiffError::Config(format!("bad {field} in {source}: {e}")))
}

fn apply_overrides(cfg: &mut Config, overrides: ConfigOverrides, source: &str) -> Result<()> {
    if let Some(flow) = overrides.flow {
        if let Some(v) = flow.parallel_jitter {
            cfg.flow.parallel_jitter = parse_duration_field(&v, "parallel_jitter", source)?;
        }
        if let Some(v) = flow.container_coverage {
            cfg.flow.container_coverage = v;
        }
        if let Some(v) = flow.container_start_tolerance {
            cfg.flow.container_start_tolerance =
                parse_duration_field(&v, "container_start_tolerance", source)?;
        }
    }
    if let Some(layout) = overrides.layout {
        if let Some(v) = layout.direction {
            cfg.layout.direction = LayoutDirection::from_str(&v).map_err(|e| {
                SpanDiffError::Config(format!("bad layout direction in {source}: {e}"))
            })?;
        }
        if let Some(v) = layout.node_width {
            cfg.layout.node_width = v;
        }
        if let Some(v) = layout.node_height {
            cfg.layout.node_height = v;
        }
        if let Some(v) = layout.node_sep {
            cfg.layout.node_sep = v;
        }
        if let Some(v) = layout.rank_sep {
            cfg.layout.rank_sep = v;
        }
        if let Some(v) = layout.sweeps {
            cfg.layout.sweeps = v;
        }
    }
    if let Some(align) = overrides.align {
        if let Some(v) = align.match_threshold {
            cfg.align.match_threshold = v;
        }
        if let Some(v) = align.modified_threshold {
            cfg.align.modified_threshold = v;
        }
    }
    if let Some(tools) = overrides.tools {
        cfg.tools = tools;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.flow.parallel_jitter, Duration::from_millis(10));
        assert_eq!(cfg.flow.container_coverage, 0.9);
        assert_eq!(cfg.align.match_threshold, 0.6);
        assert_eq!(cfg.align.modified_threshold, 0.4);
        assert_eq!(cfg.layout.direction, LayoutDirection::TopToBottom);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn file_overrides_apply() {
        let raw = r#"
[flow]
parallel_jitter = "25ms"
container_coverage = 0.8

[layout]
direction = "LR"
rank_sep = 120.0

[align]
match_threshold = 0.7

[[tools.search_web]]
name = "query"
weight = 2.0
"#;
        let overrides: ConfigOverrides = toml::from_str(raw).unwrap();
        let mut cfg = Config::default();
        apply_overrides(&mut cfg, overrides, "config file").unwrap();

        assert_eq!(cfg.flow.parallel_jitter, Duration::from_millis(25));
        assert_eq!(cfg.flow.container_coverage, 0.8);
        assert_eq!(cfg.layout.direction, LayoutDirection::LeftToRight);
        assert_eq!(cfg.layout.rank_sep, 120.0);
        assert_eq!(cfg.align.match_threshold, 0.7);
        assert_eq!(cfg.align.modified_threshold, 0.4);
        assert_eq!(cfg.tools.key_arguments("search_web").len(), 1);
    }

    #[test]
    fn bad_duration_names_source() {
        let overrides = ConfigOverrides {
            flow: Some(FlowOverrides {
                parallel_jitter: Some("whenever".to_string()),
                ..FlowOverrides::default()
            }),
            ..ConfigOverrides::default()
        };
        let err = apply_overrides(&mut Config::default(), overrides, "config file").unwrap_err();
        assert!(err.to_string().contains("config file"));
    }

    #[test]
    fn validation_rejects_inverted_thresholds() {
        let mut cfg = Config::default();
        cfg.align.modified_threshold = 0.8;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.flow.container_coverage = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_apply() {
        unsafe {
            env::set_var("SPANDIFF_MATCH_THRESHOLD", "0.75");
            env::set_var("SPANDIFF_LAYOUT_DIRECTION", "lr");
        }
        let cfg = Config::from_env();
        unsafe {
            env::remove_var("SPANDIFF_MATCH_THRESHOLD");
            env::remove_var("SPANDIFF_LAYOUT_DIRECTION");
        }
        let cfg = cfg.unwrap();
        assert_eq!(cfg.align.match_threshold, 0.75);
        assert_eq!(cfg.layout.direction, LayoutDirection::LeftToRight);
    }

    #[test]
    #[serial]
    fn bad_env_value_is_config_error() {
        unsafe {
            env::set_var("SPANDIFF_MODIFIED_THRESHOLD", "lots");
        }
        let cfg = Config::from_env();
        unsafe {
            env::remove_var("SPANDIFF_MODIFIED_THRESHOLD");
        }
        assert!(matches!(cfg, Err(SpanDiffError::Config(_))));
    }

    #[test]
    #[serial]
    fn load_from_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[flow]\ncontainer_start_tolerance = \"250ms\"\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(
            cfg.flow.container_start_tolerance,
            Duration::from_millis(250)
        );
        assert!(Config::load_from(&dir.path().join("missing.toml")).is_err());
    }
}

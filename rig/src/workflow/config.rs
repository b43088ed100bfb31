use crate::generator::profile::SyntheticConfig;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vantagecore::control::PidGains;
use vantagecore::vision::{EnhanceConfig, ExtractionStrategy};

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Synthetic(SyntheticConfig),
    Sequence { directory: PathBuf },
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Synthetic(SyntheticConfig::default())
    }
}

/// Runtime settings for one rig session. Every field has a default, so an empty
/// YAML document is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub frame_tick_ms: u64,
    pub control_tick_ms: u64,
    pub gains: PidGains,
    /// Target height on the 0-100 scale.
    pub setpoint: f64,
    pub pid_active: bool,
    pub strategy: ExtractionStrategy,
    pub enhance: EnhanceConfig,
    pub alert_countdown_secs: u64,
    /// Acknowledge the critical alert automatically once the countdown allows it.
    pub auto_acknowledge: bool,
    pub audit_log: PathBuf,
    pub bridge_address: SocketAddr,
    pub board_id: u32,
    pub source: SourceConfig,
    pub simulate_zero_failure: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            frame_tick_ms: 30,
            control_tick_ms: 100,
            gains: PidGains::default(),
            setpoint: 50.0,
            pid_active: true,
            strategy: ExtractionStrategy::default(),
            enhance: EnhanceConfig::default(),
            alert_countdown_secs: 8,
            auto_acknowledge: false,
            audit_log: PathBuf::from("logs/magnet_control.log"),
            bridge_address: SocketAddr::from(([127, 0, 0, 1], 9000)),
            board_id: 0,
            source: SourceConfig::default(),
            simulate_zero_failure: false,
        }
    }
}

impl RigConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading rig config {}", path_ref.display()))?;
        let config: RigConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing rig config {}", path_ref.display()))?;
        config
            .validate()
            .with_context(|| format!("validating rig config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.frame_tick_ms > 0, "frame_tick_ms must be positive");
        ensure!(self.control_tick_ms > 0, "control_tick_ms must be positive");
        ensure!(
            (0.0..=100.0).contains(&self.setpoint),
            "setpoint {} is outside 0..=100",
            self.setpoint
        );
        Ok(())
    }

    pub fn frame_tick(&self) -> Duration {
        Duration::from_millis(self.frame_tick_ms)
    }

    pub fn control_tick(&self) -> Duration {
        Duration::from_millis(self.control_tick_ms)
    }

    /// Fixed PID time step in seconds.
    pub fn control_dt(&self) -> f64 {
        self.control_tick().as_secs_f64()
    }

    pub fn alert_countdown(&self) -> Duration {
        Duration::from_secs(self.alert_countdown_secs)
    }
}

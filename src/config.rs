use std::fs;
use std::path::Path;
use std::time::Duration;
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use crate::bpm::BpmList;
use crate::drivers::acquisition::AcquisitionConfig;
use crate::drivers::protocol::{DEFAULT_PORT, DEFAULT_SERVER, NOMINAL_SAMPLE_FREQUENCY};
use crate::types::DisplayMode;
/// Timebase choices offered by the viewer, in samples.
pub const TIMEBASES: [usize; 9] = [
    1000, 2500, 5000, 10_000, 25_000, 50_000, 100_000, 250_000, 500_000,
];
/// Viewer settings, read from an optional JSON file. Missing keys keep their
/// defaults.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub server: String,
    pub port: u16,
    pub buffer_size: usize,
    pub read_size: usize,
    pub recv_timeout_ms: u64,
    /// Used when the server cannot report its own sample rate.
    pub nominal_frequency: f64,
    /// Windows longer than this scroll instead of being redrawn whole.
    pub scroll_threshold: usize,
    pub timebases: Vec<usize>,
    pub channel: usize,
    pub timebase: usize,
    pub mode: DisplayMode,
    /// Name table used for status text.
    pub bpm_list: BpmList,
    /// Refit the y axis on every update.
    pub autoscale: bool,
}
impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_owned(),
            port: DEFAULT_PORT,
            buffer_size: 500_000,
            read_size: 1000,
            recv_timeout_ms: 200,
            nominal_frequency: NOMINAL_SAMPLE_FREQUENCY,
            scroll_threshold: 10_000,
            timebases: TIMEBASES.to_vec(),
            channel: 1,
            timebase: 10_000,
            mode: DisplayMode::Raw,
            bpm_list: BpmList::Storage,
            autoscale: false,
        }
    }
}
impl ViewerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_json(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ViewerConfig = serde_json::from_str(text).context("malformed JSON")?;
        config.validate()?;
        Ok(config)
    }
    pub fn validate(&self) -> Result<()> {
        ensure!(self.read_size > 0, "read_size must be positive");
        ensure!(
            self.read_size <= self.buffer_size,
            "read_size {} exceeds buffer_size {}",
            self.read_size,
            self.buffer_size
        );
        ensure!(self.scroll_threshold > 0, "scroll_threshold must be positive");
        ensure!(
            self.nominal_frequency > 0.0,
            "nominal_frequency must be positive"
        );
        ensure!(
            self.timebases.contains(&self.timebase),
            "timebase {} is not one of {:?}",
            self.timebase,
            self.timebases
        );
        if let Some(&largest) = self.timebases.iter().max() {
            ensure!(
                largest <= self.buffer_size,
                "timebase {largest} exceeds buffer_size {}",
                self.buffer_size
            );
        }
        ensure!(self.channel < 256, "channel {} is out of range", self.channel);
        Ok(())
    }
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }
    pub fn acquisition(&self) -> AcquisitionConfig {
        AcquisitionConfig {
            server: self.server.clone(),
            port: self.port,
            buffer_size: self.buffer_size,
            read_size: self.read_size,
            recv_timeout: self.recv_timeout(),
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_object_keeps_defaults() {
        let config = ViewerConfig::from_json("{}").unwrap();
        assert_eq!(config.server, "fa-archiver.cs.diamond.ac.uk");
        assert_eq!(config.port, 8888);
        assert_eq!(config.timebase, 10_000);
        assert_eq!(config.mode, DisplayMode::Raw);
        assert_eq!(config.acquisition().recv_timeout, Duration::from_millis(200));
    }
    #[test]
    fn partial_override() {
        let config = ViewerConfig::from_json(
            r#"{"server": "localhost", "channel": 4, "timebase": 2500, "mode": "Integrated",
                "bpm_list": "Booster", "autoscale": true}"#,
        )
        .unwrap();
        assert_eq!(config.server, "localhost");
        assert_eq!(config.channel, 4);
        assert_eq!(config.timebase, 2500);
        assert_eq!(config.mode, DisplayMode::Integrated);
        assert_eq!(config.buffer_size, 500_000);
        assert_eq!(config.bpm_list, BpmList::Booster);
        assert!(config.autoscale);
    }
    #[test]
    fn rejects_inconsistent_settings() {
        assert!(ViewerConfig::from_json(r#"{"timebase": 1234}"#).is_err());
        assert!(ViewerConfig::from_json(r#"{"read_size": 0}"#).is_err());
        assert!(ViewerConfig::from_json(r#"{"buffer_size": 1000}"#).is_err());
        assert!(ViewerConfig::from_json(r#"{"channel": 256}"#).is_err());
        assert!(ViewerConfig::from_json("[").is_err());
    }
    #[test]
    fn load_reports_the_path() {
        let err = ViewerConfig::load(Path::new("/nonexistent/fa-viewer.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/fa-viewer.json"));
    }
}

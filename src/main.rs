// src/main.rs
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use anyhow::{Context, Result};
use fa_viewer::drivers::protocol;
use fa_viewer::types::MonitorMessage;
use fa_viewer::{Viewer, ViewerConfig};
use log::{info, warn};
// 入口函数：fa-viewer [config.json]
fn main() -> Result<()> {
    env_logger::init();
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => ViewerConfig::load(&path)?,
        None => ViewerConfig::default(),
    };
    let frequency = match protocol::try_sample_frequency(
        &config.server,
        config.port,
        config.recv_timeout(),
    ) {
        Ok(frequency) => frequency,
        Err(err) => {
            warn!(
                "frequency query failed ({err}), using {} Hz",
                config.nominal_frequency
            );
            config.nominal_frequency
        }
    };
    info!(
        "{}:{} sampling at {frequency} Hz",
        config.server, config.port
    );
    let (tx, rx) = mpsc::channel();
    let mut viewer =
        Viewer::new(&config, frequency, Arc::new(tx)).context("failed to set up viewer")?;
    viewer
        .set_running(true)
        .with_context(|| format!("failed to monitor channel {}", config.channel))?;
    // 采集线程停止后会发送 Disconnected，然后退出
    for message in rx {
        let stopped = matches!(message, MonitorMessage::Disconnected(_));
        let latest = viewer.handle(message)?.map(|trace| {
            let last = trace.len().saturating_sub(1);
            (
                trace.len(),
                trace.x_axis.get(last).copied().unwrap_or(0.0),
                trace.values.get([last, 0]).copied().unwrap_or(f64::NAN),
                trace.values.get([last, 1]).copied().unwrap_or(f64::NAN),
            )
        });
        if let Some((points, f, x, y)) = latest {
            let axes = viewer.axes();
            info!(
                "{}: {points} points, {} = {f:.4} {}, X = {x:.4}, Y = {y:.4}",
                viewer.mode().name(),
                axes.x.short_name,
                axes.x.units,
            );
        }
        if stopped {
            break;
        }
    }
    viewer.set_running(false)?;
    Ok(())
}

// src/viewer.rs
use std::sync::Arc;
use log::{debug, info};
use ndarray::Array2;
use crate::bpm::BpmList;
use crate::config::ViewerConfig;
use crate::drivers::acquisition::{AcquisitionLoop, AcquisitionSink, LoopState};
use crate::drivers::transform::{check_timebase, Axes, Trace, Transform};
use crate::drivers::FaError;
use crate::types::{DisplayMode, MonitorMessage};

// 把采集循环和四种显示模式组合在一起，由消费者线程驱动
pub struct Viewer {
    monitor: AcquisitionLoop,
    transforms: Vec<Transform>,
    mode: DisplayMode,
    timebase: usize,
    scroll_threshold: usize,
    connected: bool,
    status: String,
    bpm_list: BpmList,
    autoscale: bool,
    show_x: bool,
    show_y: bool,
    last_trace: Option<Trace>,
}

impl Viewer {
    pub fn new(
        config: &ViewerConfig,
        sample_frequency: f64,
        sink: Arc<dyn AcquisitionSink>,
    ) -> Result<Self, FaError> {
        let monitor = AcquisitionLoop::new(config.acquisition(), config.channel, sink)?;
        let transforms = DisplayMode::ALL
            .iter()
            .map(|&mode| Transform::new(mode, sample_frequency))
            .collect();
        let mut viewer = Self {
            monitor,
            transforms,
            mode: config.mode,
            timebase: 0,
            scroll_threshold: config.scroll_threshold,
            connected: false,
            status: String::new(),
            bpm_list: config.bpm_list,
            autoscale: config.autoscale,
            show_x: true,
            show_y: true,
            last_trace: None,
        };
        viewer.set_timebase(config.timebase)?;
        Ok(viewer)
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }
    pub fn timebase(&self) -> usize {
        self.timebase
    }
    pub fn channel(&self) -> usize {
        self.monitor.channel()
    }
    pub fn is_connected(&self) -> bool {
        self.connected
    }
    pub fn is_running(&self) -> bool {
        self.monitor.state() == LoopState::Running
    }
    /// "BPM: <name> (id <n>)" while connected, the disconnect reason after.
    pub fn status(&self) -> &str {
        &self.status
    }
    pub fn bpm_label(&self) -> String {
        self.bpm_list.label(self.channel())
    }
    pub fn monitor(&self) -> &AcquisitionLoop {
        &self.monitor
    }
    pub fn transform(&self, mode: DisplayMode) -> &Transform {
        &self.transforms[mode as usize]
    }
    // 模式专属的设置 (抽取、滤波、背景等) 通过这里修改
    pub fn transform_mut(&mut self, mode: DisplayMode) -> &mut Transform {
        &mut self.transforms[mode as usize]
    }
    pub fn last_trace(&self) -> Option<&Trace> {
        self.last_trace.as_ref()
    }

    // 长时间窗口每次只推进 scroll_threshold 个新样本
    pub fn set_timebase(&mut self, timebase: usize) -> Result<(), FaError> {
        check_timebase(timebase)?;
        self.monitor
            .resize(timebase, timebase.min(self.scroll_threshold))?;
        for transform in &mut self.transforms {
            transform.set_timebase(timebase)?;
        }
        self.timebase = timebase;
        self.last_trace = None;
        debug!("timebase set to {timebase} samples");
        Ok(())
    }

    pub fn set_mode(&mut self, mode: DisplayMode) {
        if mode != self.mode {
            info!("display mode: {}", mode.name());
            self.mode = mode;
            self.last_trace = None;
        }
    }

    pub fn set_channel(&mut self, channel: usize) -> Result<(), FaError> {
        self.monitor.set_channel(channel)
    }

    pub fn set_running(&mut self, running: bool) -> Result<(), FaError> {
        match (running, self.monitor.state()) {
            (true, LoopState::Running) => Ok(()),
            (true, _) => self.monitor.start(),
            (false, _) => {
                self.monitor.stop();
                Ok(())
            }
        }
    }

    pub fn set_autoscale(&mut self, autoscale: bool) {
        self.autoscale = autoscale;
    }

    pub fn set_visible(&mut self, show_x: bool, show_y: bool) {
        self.show_x = show_x;
        self.show_y = show_y;
    }

    /// Recomputes the active mode over the current buffer contents.
    pub fn redraw(&mut self) -> Result<&Trace, FaError> {
        let window = self.monitor.read()?;
        self.update(window)
    }

    /// Applies one message from the acquisition loop. Returns the new trace
    /// for `Data` messages that match the current timebase.
    pub fn handle(&mut self, message: MonitorMessage) -> Result<Option<&Trace>, FaError> {
        match message {
            MonitorMessage::Connected => {
                self.status = self.bpm_label();
                info!("connected: {}", self.status);
                self.connected = true;
                Ok(None)
            }
            MonitorMessage::Disconnected(reason) => {
                info!("disconnected: {reason}");
                self.status = format!("FA server disconnected: {reason}");
                self.connected = false;
                Ok(None)
            }
            // 改变 timebase 之前排队的窗口直接丢弃
            MonitorMessage::Data(window) if window.nrows() != self.timebase => {
                debug!(
                    "dropping stale window of {} samples (timebase {})",
                    window.nrows(),
                    self.timebase
                );
                Ok(None)
            }
            MonitorMessage::Data(window) => {
                self.update(window)?;
                if self.autoscale {
                    self.rescale();
                }
                Ok(self.last_trace.as_ref())
            }
        }
    }

    /// Freezes the integrated view of the current window as its background.
    pub fn capture_background(&mut self) -> Result<(), FaError> {
        let window = self.monitor.read()?;
        match self.transform_mut(DisplayMode::Integrated) {
            Transform::Integrated(integrated) => integrated.capture_background(window.view()),
            _ => Ok(()),
        }
    }

    /// Fits the active mode's y axis to the last trace.
    pub fn rescale(&mut self) {
        let (show_x, show_y) = (self.show_x, self.show_y);
        if let Some(trace) = &self.last_trace {
            self.transforms[self.mode as usize].rescale(trace, show_x, show_y);
        }
    }

    pub fn axes(&self) -> Axes {
        self.transform(self.mode).axes()
    }

    fn update(&mut self, window: Array2<f64>) -> Result<&Trace, FaError> {
        let trace = self.transforms[self.mode as usize].compute(window.view())?;
        Ok(self.last_trace.insert(trace))
    }
}

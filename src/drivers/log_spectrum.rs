use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use crate::drivers::condense::{bin_frequencies, compute_gaps, condense};
use crate::drivers::fft::SpectrumBuilder;
use crate::drivers::transform::{
    check_timebase, check_window, visible_minmax, AxisInfo, AxisScale, Axes, Trace, MICROMETRE,
};
use crate::drivers::FaError;
/// Smoothing constants for the "1s", "10s" and "100s" filters.
pub const FILTERS: [f64; 3] = [1.0, 0.1, 0.01];
/// Bin-count hint for the log-frequency display.
pub const LOG_BINS: usize = 1000;
/// Exponential moving average of squared magnitude.
#[derive(Debug)]
pub struct FilterState {
    history: Array2<f64>,
    needs_reset: bool,
}
impl FilterState {
    pub fn new() -> Self {
        Self {
            history: Array2::zeros((0, 0)),
            needs_reset: true,
        }
    }
    /// Forces the next update to seed history from its input.
    pub fn reset(&mut self) {
        self.needs_reset = true;
    }
    pub fn needs_reset(&self) -> bool {
        self.needs_reset
    }
    /// Blends `current` into the history with weight `filter` and returns the
    /// smoothed amplitude. `filter == 1` bypasses the history altogether.
    pub fn update(&mut self, filter: f64, current: Array2<f64>) -> Array2<f64> {
        if filter >= 1.0 {
            return current;
        }
        if self.needs_reset || self.history.dim() != current.dim() {
            self.needs_reset = false;
            self.history = current.mapv(|v| v * v);
            return current;
        }
        self.history = current.mapv(|v| filter * v * v) + self.history.mapv(|h| (1.0 - filter) * h);
        self.history.mapv(f64::sqrt)
    }
}
impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}
/// Amplitude spectrum condensed onto logarithmically spaced bins, with
/// optional smoothing across successive updates.
pub struct LogSpectrumTransform {
    sample_frequency: f64,
    timebase: usize,
    builder: Option<SpectrumBuilder>,
    counts: Vec<usize>,
    x_axis: Array1<f64>,
    scale_by_frequency: bool,
    filter: f64,
    state: FilterState,
    y_range: (f64, f64),
}
impl LogSpectrumTransform {
    pub fn new(sample_frequency: f64) -> Self {
        Self {
            sample_frequency,
            timebase: 0,
            builder: None,
            counts: Vec::new(),
            x_axis: Array1::zeros(0),
            scale_by_frequency: false,
            filter: FILTERS[0],
            state: FilterState::new(),
            y_range: (1e-4, 1.0),
        }
    }
    pub fn timebase(&self) -> usize {
        self.timebase
    }
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
    pub fn filter(&self) -> f64 {
        self.filter
    }
    pub fn filter_state(&self) -> &FilterState {
        &self.state
    }
    pub fn set_timebase(&mut self, timebase: usize) -> Result<(), FaError> {
        check_timebase(timebase)?;
        self.timebase = timebase;
        self.counts = compute_gaps(timebase / 2 - 1, LOG_BINS);
        self.x_axis = bin_frequencies(&self.counts, timebase, self.sample_frequency);
        self.builder = Some(SpectrumBuilder::with_size(timebase));
        self.state.reset();
        Ok(())
    }
    pub fn set_filter(&mut self, filter: f64) -> Result<(), FaError> {
        if !(filter > 0.0 && filter <= 1.0) {
            return Err(FaError::InvalidFilter(filter));
        }
        self.filter = filter;
        self.state.reset();
        Ok(())
    }
    /// Selects the filter whose time constant is `seconds` display updates.
    pub fn set_time_constant(&mut self, seconds: u32) -> Result<(), FaError> {
        self.set_filter(1.0 / f64::from(seconds.max(1)))
    }
    pub fn set_scale_by_frequency(&mut self, scale_by_frequency: bool) {
        self.scale_by_frequency = scale_by_frequency;
        self.y_range = if scale_by_frequency {
            (1e-3, 100.0)
        } else {
            (1e-4, 1.0)
        };
    }
    pub fn compute(&mut self, window: ArrayView2<f64>) -> Result<Trace, FaError> {
        check_window(&window, self.timebase)?;
        let builder = self
            .builder
            .as_ref()
            .ok_or(FaError::InvalidTimebase(self.timebase))?;
        let spectrum = builder.scaled_abs_fft(window, self.sample_frequency);
        let power = spectrum.slice(s![1.., ..]).mapv(|a| a * a);
        let mut binned = condense(power.view(), &self.counts);
        for (mut row, &count) in binned.axis_iter_mut(Axis(0)).zip(&self.counts) {
            row.mapv_inplace(|p| (p / count as f64).sqrt());
        }
        if self.scale_by_frequency {
            for (mut row, &f) in binned.axis_iter_mut(Axis(0)).zip(self.x_axis.iter()) {
                row *= f;
            }
        }
        let values = self.state.update(self.filter, binned);
        Ok(Trace::new(self.x_axis.clone(), values))
    }
    pub fn axes(&self) -> Axes {
        let x_min = self
            .x_axis
            .get(0)
            .copied()
            .unwrap_or(self.sample_frequency / self.timebase.max(1) as f64);
        let y = if self.scale_by_frequency {
            AxisInfo::new(
                "Amplitude × freq",
                "f·Y",
                &format!("{MICROMETRE}·√Hz"),
                AxisScale::Log10,
            )
        } else {
            AxisInfo::new("Amplitude", "Y", &format!("{MICROMETRE}/√Hz"), AxisScale::Log10)
        };
        Axes {
            x: AxisInfo::new("Frequency", "f", "Hz", AxisScale::Log10)
                .with_range(x_min, self.sample_frequency / 2.0)
                .with_ticks(10),
            y: y.with_range(self.y_range.0, self.y_range.1),
        }
    }
    pub fn rescale(&mut self, trace: &Trace, show_x: bool, show_y: bool) {
        if let Some(range) = visible_minmax(&trace.values, show_x, show_y) {
            self.y_range = range;
        }
    }
}

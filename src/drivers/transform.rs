//! Display transforms: each turns a window of scaled (X, Y) samples into a
//! plottable trace plus the axis description a renderer needs.
use ndarray::{Array1, Array2, ArrayView2};
use crate::drivers::integrated::IntegratedTransform;
use crate::drivers::log_spectrum::LogSpectrumTransform;
use crate::drivers::raw::RawTransform;
use crate::drivers::spectrum::SpectrumTransform;
use crate::drivers::FaError;
use crate::types::DisplayMode;
pub const MICROMETRE: &str = "µm";
/// Shortest timebase any transform accepts.
pub const MIN_TIMEBASE: usize = 4;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisScale {
    Linear,
    Log10,
}
#[derive(Clone, Debug, PartialEq)]
pub struct AxisInfo {
    pub name: String,
    pub short_name: String,
    pub units: String,
    pub min: f64,
    pub max: f64,
    pub scale: AxisScale,
    /// Suggested number of minor ticks.
    pub ticks: usize,
}
impl AxisInfo {
    pub fn new(name: &str, short_name: &str, units: &str, scale: AxisScale) -> Self {
        Self {
            name: name.to_owned(),
            short_name: short_name.to_owned(),
            units: units.to_owned(),
            min: 0.0,
            max: 1.0,
            scale,
            ticks: 5,
        }
    }
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = min;
        self.max = max;
        self
    }
    pub fn with_ticks(mut self, ticks: usize) -> Self {
        self.ticks = ticks;
        self
    }
    /// "Name (units)" title for plot axes.
    pub fn title(&self) -> String {
        format!("{} ({})", self.name, self.units)
    }
}
#[derive(Clone, Debug, PartialEq)]
pub struct Axes {
    pub x: AxisInfo,
    pub y: AxisInfo,
}
/// Per-block extremes of a decimated time series.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub min: Array2<f64>,
    pub max: Array2<f64>,
}
/// Output of one transform: `values` has one row per `x_axis` point and one
/// column per axis (X, Y).
#[derive(Clone, Debug)]
pub struct Trace {
    pub x_axis: Array1<f64>,
    pub values: Array2<f64>,
    pub envelope: Option<Envelope>,
    pub background: Option<Array2<f64>>,
}
impl Trace {
    pub fn new(x_axis: Array1<f64>, values: Array2<f64>) -> Self {
        Self {
            x_axis,
            values,
            envelope: None,
            background: None,
        }
    }
    pub fn len(&self) -> usize {
        self.values.nrows()
    }
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }
}
/// One of the four display modes, dispatched by tag.
pub enum Transform {
    Raw(RawTransform),
    Fft(SpectrumTransform),
    FftLogF(LogSpectrumTransform),
    Integrated(IntegratedTransform),
}
impl Transform {
    pub fn new(mode: DisplayMode, sample_frequency: f64) -> Self {
        match mode {
            DisplayMode::Raw => Transform::Raw(RawTransform::new(sample_frequency)),
            DisplayMode::Fft => Transform::Fft(SpectrumTransform::new(sample_frequency)),
            DisplayMode::FftLogF => {
                Transform::FftLogF(LogSpectrumTransform::new(sample_frequency))
            }
            DisplayMode::Integrated => {
                Transform::Integrated(IntegratedTransform::new(sample_frequency))
            }
        }
    }
    pub fn mode(&self) -> DisplayMode {
        match self {
            Transform::Raw(_) => DisplayMode::Raw,
            Transform::Fft(_) => DisplayMode::Fft,
            Transform::FftLogF(_) => DisplayMode::FftLogF,
            Transform::Integrated(_) => DisplayMode::Integrated,
        }
    }
    pub fn set_timebase(&mut self, timebase: usize) -> Result<(), FaError> {
        match self {
            Transform::Raw(t) => t.set_timebase(timebase),
            Transform::Fft(t) => t.set_timebase(timebase),
            Transform::FftLogF(t) => t.set_timebase(timebase),
            Transform::Integrated(t) => t.set_timebase(timebase),
        }
    }
    pub fn timebase(&self) -> usize {
        match self {
            Transform::Raw(t) => t.timebase(),
            Transform::Fft(t) => t.timebase(),
            Transform::FftLogF(t) => t.timebase(),
            Transform::Integrated(t) => t.timebase(),
        }
    }
    /// Computes the trace for `window`, which must span the current timebase.
    pub fn compute(&mut self, window: ArrayView2<f64>) -> Result<Trace, FaError> {
        match self {
            Transform::Raw(t) => t.compute(window),
            Transform::Fft(t) => t.compute(window),
            Transform::FftLogF(t) => t.compute(window),
            Transform::Integrated(t) => t.compute(window),
        }
    }
    pub fn axes(&self) -> Axes {
        match self {
            Transform::Raw(t) => t.axes(),
            Transform::Fft(t) => t.axes(),
            Transform::FftLogF(t) => t.axes(),
            Transform::Integrated(t) => t.axes(),
        }
    }
    /// Fits the y axis to `trace` for the visible columns.
    pub fn rescale(&mut self, trace: &Trace, show_x: bool, show_y: bool) {
        match self {
            Transform::Raw(t) => t.rescale(trace, show_x, show_y),
            Transform::Fft(t) => t.rescale(trace, show_x, show_y),
            Transform::FftLogF(t) => t.rescale(trace, show_x, show_y),
            Transform::Integrated(t) => t.rescale(trace, show_x, show_y),
        }
    }
}
pub(crate) fn check_timebase(timebase: usize) -> Result<(), FaError> {
    if timebase < MIN_TIMEBASE {
        return Err(FaError::InvalidTimebase(timebase));
    }
    Ok(())
}
pub(crate) fn check_window(window: &ArrayView2<f64>, timebase: usize) -> Result<(), FaError> {
    if window.nrows() != timebase || window.ncols() != 2 {
        return Err(FaError::WindowMismatch {
            expected: timebase,
            actual: window.nrows(),
        });
    }
    Ok(())
}
/// NaN-ignoring extremes over the visible columns of `values`.
pub(crate) fn visible_minmax(values: &Array2<f64>, show_x: bool, show_y: bool) -> Option<(f64, f64)> {
    let columns: Vec<usize> = [show_x, show_y]
        .iter()
        .enumerate()
        .filter(|(_, shown)| **shown)
        .map(|(i, _)| i)
        .collect();
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    for &column in &columns {
        if column >= values.ncols() {
            continue;
        }
        for &v in values.column(column).iter().filter(|v| !v.is_nan()) {
            low = low.min(v);
            high = high.max(v);
        }
    }
    (low <= high).then_some((low, high))
}
/// Range padded by 20% of its span (at least 1e-3) for linear axes.
pub(crate) fn linear_range(low: f64, high: f64) -> (f64, f64) {
    let margin = (0.2 * (high - low)).max(1e-3);
    (low - margin, high + margin)
}

use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use crate::drivers::transform::{
    check_timebase, check_window, linear_range, visible_minmax, AxisInfo, AxisScale, Axes,
    Envelope, Trace, MICROMETRE,
};
use crate::drivers::FaError;
/// Decimation factors offered for the time-domain view.
pub const RAW_DECIMATIONS: [usize; 3] = [1, 100, 1000];
/// Timebases up to this many samples are labelled in milliseconds.
const MILLISECOND_LIMIT: usize = 10_000;
/// Time-domain view with optional first difference and min/mean/max
/// decimation.
pub struct RawTransform {
    sample_frequency: f64,
    timebase: usize,
    decimation: usize,
    diff: bool,
    time_scale: f64,
    x_axis: Array1<f64>,
    y_range: (f64, f64),
}
impl RawTransform {
    pub fn new(sample_frequency: f64) -> Self {
        Self {
            sample_frequency,
            timebase: 0,
            decimation: 1,
            diff: false,
            time_scale: 1e3,
            x_axis: Array1::zeros(0),
            y_range: (-10.0, 10.0),
        }
    }
    pub fn timebase(&self) -> usize {
        self.timebase
    }
    pub fn decimation(&self) -> usize {
        self.decimation
    }
    pub fn diff(&self) -> bool {
        self.diff
    }
    /// Factors that still leave a meaningful number of points on screen.
    pub fn available_decimations(&self) -> Vec<usize> {
        let valid: Vec<usize> = RAW_DECIMATIONS
            .iter()
            .copied()
            .filter(|&d| 50 * d < self.timebase)
            .collect();
        if valid.is_empty() {
            vec![1]
        } else {
            valid
        }
    }
    pub fn set_timebase(&mut self, timebase: usize) -> Result<(), FaError> {
        check_timebase(timebase)?;
        self.timebase = timebase;
        self.time_scale = if timebase <= MILLISECOND_LIMIT { 1e3 } else { 1.0 };
        let available = self.available_decimations();
        if !available.contains(&self.decimation) {
            self.decimation = available[available.len() - 1];
        }
        self.update_axis();
        Ok(())
    }
    pub fn set_decimation(&mut self, decimation: usize) -> Result<(), FaError> {
        if !self.available_decimations().contains(&decimation) {
            return Err(FaError::InvalidDecimation {
                len: self.timebase,
                decimation,
            });
        }
        self.decimation = decimation;
        if decimation != 1 {
            self.diff = false;
        }
        self.update_axis();
        Ok(())
    }
    /// Differencing only makes sense at full resolution.
    pub fn set_diff(&mut self, diff: bool) {
        self.diff = diff;
        if diff && self.decimation != 1 {
            self.decimation = 1;
            self.update_axis();
        }
    }
    pub fn compute(&mut self, window: ArrayView2<f64>) -> Result<Trace, FaError> {
        check_window(&window, self.timebase)?;
        let values = if self.diff {
            &window.slice(s![1.., ..]) - &window.slice(s![..-1, ..])
        } else {
            window.to_owned()
        };
        if self.decimation == 1 {
            let x_axis = self.x_axis.slice(s![..values.nrows()]).to_owned();
            return Ok(Trace::new(x_axis, values));
        }
        let (mean, envelope) = decimate(values.view(), self.decimation)?;
        let x_axis = self.x_axis.slice(s![..mean.nrows()]).to_owned();
        let mut trace = Trace::new(x_axis, mean);
        trace.envelope = Some(envelope);
        Ok(trace)
    }
    pub fn axes(&self) -> Axes {
        let units = if self.time_scale > 1.0 { "ms" } else { "s" };
        let x_max = self.time_scale / self.sample_frequency * self.timebase as f64;
        Axes {
            x: AxisInfo::new("Time", "t", units, AxisScale::Linear).with_range(0.0, x_max),
            y: AxisInfo::new("Position", "Y", MICROMETRE, AxisScale::Linear)
                .with_range(self.y_range.0, self.y_range.1),
        }
    }
    pub fn rescale(&mut self, trace: &Trace, show_x: bool, show_y: bool) {
        let bounds = match &trace.envelope {
            Some(envelope) => {
                let low = visible_minmax(&envelope.min, show_x, show_y);
                let high = visible_minmax(&envelope.max, show_x, show_y);
                low.zip(high).map(|((lo, _), (_, hi))| (lo, hi))
            }
            None => visible_minmax(&trace.values, show_x, show_y),
        };
        if let Some((low, high)) = bounds {
            self.y_range = linear_range(low, high);
        }
    }
    fn update_axis(&mut self) {
        let step = self.time_scale / self.sample_frequency * self.decimation as f64;
        let points = self.timebase / self.decimation;
        self.x_axis = Array1::from_iter((0..points).map(|i| step * i as f64));
    }
}
/// Splits `values` into consecutive blocks of `decimation` rows and returns
/// the per-block mean together with the per-block min and max.
pub fn decimate(
    values: ArrayView2<f64>,
    decimation: usize,
) -> Result<(Array2<f64>, Envelope), FaError> {
    let len = values.nrows();
    if decimation == 0 || len % decimation != 0 {
        return Err(FaError::InvalidDecimation { len, decimation });
    }
    let blocks = len / decimation;
    let columns = values.ncols();
    let mut mean = Array2::zeros((blocks, columns));
    let mut min = Array2::zeros((blocks, columns));
    let mut max = Array2::zeros((blocks, columns));
    for (b, block) in values.axis_chunks_iter(Axis(0), decimation).enumerate() {
        for (c, column) in block.axis_iter(Axis(1)).enumerate() {
            mean[[b, c]] = column.sum() / decimation as f64;
            min[[b, c]] = column.fold(f64::INFINITY, |acc, &v| acc.min(v));
            max[[b, c]] = column.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        }
    }
    Ok((mean, Envelope { min, max }))
}

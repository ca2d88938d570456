use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use crate::drivers::condense::{bin_frequencies, compute_gaps, condense};
use crate::drivers::fft::SpectrumBuilder;
use crate::drivers::transform::{
    check_timebase, check_window, linear_range, visible_minmax, AxisInfo, AxisScale, Axes, Trace,
    MICROMETRE,
};
use crate::drivers::FaError;
/// Bin-count hint for the cumulative display.
pub const INTEGRATED_BINS: usize = 5000;
const Y_RANGE: (f64, f64) = (1e-3, 10.0);
/// Cumulative amplitude: the RMS motion contributed by all frequencies up to
/// each bin, with an optional frozen background for comparison.
pub struct IntegratedTransform {
    sample_frequency: f64,
    timebase: usize,
    builder: Option<SpectrumBuilder>,
    counts: Vec<usize>,
    x_axis: Array1<f64>,
    linear: bool,
    background: Option<Array2<f64>>,
    y_range: (f64, f64),
}
impl IntegratedTransform {
    pub fn new(sample_frequency: f64) -> Self {
        Self {
            sample_frequency,
            timebase: 0,
            builder: None,
            counts: Vec::new(),
            x_axis: Array1::zeros(0),
            linear: false,
            background: None,
            y_range: Y_RANGE,
        }
    }
    pub fn timebase(&self) -> usize {
        self.timebase
    }
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
    pub fn linear(&self) -> bool {
        self.linear
    }
    /// A captured background only makes sense against the same bins, so it
    /// is dropped here.
    pub fn set_timebase(&mut self, timebase: usize) -> Result<(), FaError> {
        check_timebase(timebase)?;
        self.timebase = timebase;
        self.counts = compute_gaps(timebase / 2 - 1, INTEGRATED_BINS);
        self.x_axis = bin_frequencies(&self.counts, timebase, self.sample_frequency);
        self.builder = Some(SpectrumBuilder::with_size(timebase));
        self.background = None;
        Ok(())
    }
    /// Only changes the y axis description; values are unaffected.
    pub fn set_linear(&mut self, linear: bool) {
        self.linear = linear;
    }
    pub fn compute(&mut self, window: ArrayView2<f64>) -> Result<Trace, FaError> {
        let values = self.integrate(window)?;
        let mut trace = Trace::new(self.x_axis.clone(), values);
        trace.background = self.background.clone();
        Ok(trace)
    }
    /// Freezes the cumulative amplitude of `window` as the background trace.
    pub fn capture_background(&mut self, window: ArrayView2<f64>) -> Result<(), FaError> {
        let values = self.integrate(window)?;
        log::debug!("captured integrated background over {} bins", values.nrows());
        self.background = Some(values);
        Ok(())
    }
    pub fn background(&self) -> Option<&Array2<f64>> {
        self.background.as_ref()
    }
    pub fn axes(&self) -> Axes {
        let x_min = self
            .x_axis
            .get(0)
            .copied()
            .unwrap_or(self.sample_frequency / self.timebase.max(1) as f64);
        let y_scale = if self.linear {
            AxisScale::Linear
        } else {
            AxisScale::Log10
        };
        Axes {
            x: AxisInfo::new("Frequency", "f", "Hz", AxisScale::Log10)
                .with_range(x_min, self.sample_frequency / 2.0)
                .with_ticks(10),
            y: AxisInfo::new("Cumulative amplitude", "Y", MICROMETRE, y_scale)
                .with_range(self.y_range.0, self.y_range.1),
        }
    }
    pub fn rescale(&mut self, trace: &Trace, show_x: bool, show_y: bool) {
        if let Some((low, high)) = visible_minmax(&trace.values, show_x, show_y) {
            self.y_range = if self.linear {
                linear_range(low, high)
            } else {
                (low, high)
            };
        }
    }
    fn integrate(&self, window: ArrayView2<f64>) -> Result<Array2<f64>, FaError> {
        check_window(&window, self.timebase)?;
        let builder = self
            .builder
            .as_ref()
            .ok_or(FaError::InvalidTimebase(self.timebase))?;
        let spectrum = builder.scaled_abs_fft(window, self.sample_frequency);
        let power = spectrum.slice(s![1.., ..]).mapv(|a| a * a);
        let mut cumulative = condense(power.view(), &self.counts);
        cumulative.accumulate_axis_inplace(Axis(0), |&prev, curr| *curr += prev);
        let scale = self.sample_frequency / self.timebase as f64;
        Ok(cumulative.mapv_into(|v| (scale * v).sqrt()))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    const FS: f64 = 10072.0;
    const N: usize = 10_000;
    fn noise(seed: u64) -> Array2<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        Array2::from_shape_fn((N, 2), |_| rng.gen_range(-1.0..1.0))
    }
    #[test]
    fn cumulative_amplitude_never_decreases() {
        let mut integrated = IntegratedTransform::new(FS);
        integrated.set_timebase(N).unwrap();
        let trace = integrated.compute(noise(1).view()).unwrap();
        assert_eq!(trace.len(), integrated.counts().len());
        for column in trace.values.axis_iter(Axis(1)) {
            for pair in column.to_vec().windows(2) {
                assert!(pair[1] >= pair[0]);
            }
        }
    }
    #[test]
    fn last_bin_covers_the_binned_spectrum() {
        let window = noise(2);
        let mut integrated = IntegratedTransform::new(FS);
        integrated.set_timebase(N).unwrap();
        let trace = integrated.compute(window.view()).unwrap();
        let spectrum = SpectrumBuilder::with_size(N).scaled_abs_fft(window.view(), FS);
        let covered: usize = integrated.counts().iter().sum();
        for c in 0..2 {
            let power: f64 = (1..=covered).map(|k| spectrum[[k, c]].powi(2)).sum();
            let expected = (FS / N as f64 * power).sqrt();
            let last = trace.values[[trace.len() - 1, c]];
            assert!((last - expected).abs() < 1e-9 * expected);
        }
    }
    #[test]
    fn background_persists_until_timebase_changes() {
        let mut integrated = IntegratedTransform::new(FS);
        integrated.set_timebase(N).unwrap();
        let reference = noise(3);
        integrated.capture_background(reference.view()).unwrap();
        let expected = integrated.compute(reference.view()).unwrap().values;
        let trace = integrated.compute(noise(4).view()).unwrap();
        assert_eq!(trace.background.as_ref(), Some(&expected));
        assert_eq!(integrated.background(), Some(&expected));
        integrated.set_timebase(N / 2).unwrap();
        assert!(integrated.background().is_none());
    }
    #[test]
    fn linear_toggle_changes_only_axis_scale() {
        let window = noise(5);
        let mut integrated = IntegratedTransform::new(FS);
        integrated.set_timebase(N).unwrap();
        let log_values = integrated.compute(window.view()).unwrap().values;
        assert_eq!(integrated.axes().y.scale, AxisScale::Log10);
        integrated.set_linear(true);
        let linear_values = integrated.compute(window.view()).unwrap().values;
        assert_eq!(log_values, linear_values);
        let axes = integrated.axes();
        assert_eq!(axes.y.scale, AxisScale::Linear);
        assert_eq!(axes.y.title(), "Cumulative amplitude (µm)");
        assert_eq!((axes.y.min, axes.y.max), Y_RANGE);
    }
}

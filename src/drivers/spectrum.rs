use ndarray::{s, Array1, Array2, ArrayView2};
use crate::drivers::fft::{fft_frequencies, SpectrumBuilder};
use crate::drivers::transform::{
    check_timebase, check_window, visible_minmax, AxisInfo, AxisScale, Axes, Trace, MICROMETRE,
};
use crate::drivers::FaError;
/// Segment counts offered for spectrum averaging.
pub const FFT_DECIMATIONS: [usize; 3] = [1, 10, 100];
const Y_MIN_AMPLITUDE: f64 = 1e-4;
/// Linear-frequency amplitude (or power) spectral density.
///
/// With decimation `d` the window is cut into `d` segments whose power
/// spectra are averaged, trading resolution for variance.
pub struct SpectrumTransform {
    sample_frequency: f64,
    timebase: usize,
    decimation: usize,
    squared: bool,
    builder: Option<SpectrumBuilder>,
    x_axis: Array1<f64>,
    y_range: (f64, f64),
}
impl SpectrumTransform {
    pub fn new(sample_frequency: f64) -> Self {
        Self {
            sample_frequency,
            timebase: 0,
            decimation: 1,
            squared: false,
            builder: None,
            x_axis: Array1::zeros(0),
            y_range: (Y_MIN_AMPLITUDE, 1.0),
        }
    }
    pub fn timebase(&self) -> usize {
        self.timebase
    }
    pub fn decimation(&self) -> usize {
        self.decimation
    }
    pub fn squared(&self) -> bool {
        self.squared
    }
    /// Each segment must keep at least 1000 points.
    pub fn available_decimations(&self) -> Vec<usize> {
        let valid: Vec<usize> = FFT_DECIMATIONS
            .iter()
            .copied()
            .filter(|&d| 1000 * d <= self.timebase)
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
        let available = self.available_decimations();
        if !available.contains(&self.decimation) {
            self.decimation = available[available.len() - 1];
        }
        self.rebuild();
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
        self.rebuild();
        Ok(())
    }
    /// Switches between amplitude (µm/√Hz) and power (µm²/Hz) density.
    pub fn set_squared(&mut self, squared: bool) {
        self.squared = squared;
        self.y_range = if squared {
            (Y_MIN_AMPLITUDE * Y_MIN_AMPLITUDE, 1.0)
        } else {
            (Y_MIN_AMPLITUDE, 1.0)
        };
    }
    pub fn compute(&mut self, window: ArrayView2<f64>) -> Result<Trace, FaError> {
        check_window(&window, self.timebase)?;
        let len = window.nrows();
        if len % self.decimation != 0 {
            return Err(FaError::InvalidDecimation {
                len,
                decimation: self.decimation,
            });
        }
        let builder = self
            .builder
            .as_ref()
            .ok_or(FaError::InvalidTimebase(self.timebase))?;
        let segment = len / self.decimation;
        let mut power = Array2::<f64>::zeros((segment / 2, window.ncols()));
        for k in 0..self.decimation {
            let part = window.slice(s![k * segment..(k + 1) * segment, ..]);
            let amplitude = builder.scaled_abs_fft(part, self.sample_frequency);
            power += &amplitude.mapv(|a| a * a);
        }
        power /= self.decimation as f64;
        let values = if self.squared {
            power
        } else {
            power.mapv_into(f64::sqrt)
        };
        Ok(Trace::new(self.x_axis.clone(), values))
    }
    pub fn axes(&self) -> Axes {
        let (units, name) = if self.squared {
            (format!("{MICROMETRE}²/Hz"), "Power")
        } else {
            (format!("{MICROMETRE}/√Hz"), "Amplitude")
        };
        Axes {
            x: AxisInfo::new("Frequency", "f", "kHz", AxisScale::Linear)
                .with_range(0.0, 1e-3 * self.sample_frequency / 2.0),
            y: AxisInfo::new(name, "Y", &units, AxisScale::Log10)
                .with_range(self.y_range.0, self.y_range.1),
        }
    }
    pub fn rescale(&mut self, trace: &Trace, show_x: bool, show_y: bool) {
        if let Some(range) = visible_minmax(&trace.values, show_x, show_y) {
            self.y_range = range;
        }
    }
    fn rebuild(&mut self) {
        let segment = self.timebase / self.decimation;
        self.builder = Some(SpectrumBuilder::with_size(segment));
        self.x_axis = fft_frequencies(segment, self.sample_frequency, 1e-3);
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::f64::consts::PI;
    const FS: f64 = 10072.0;
    fn tone(len: usize, amplitude: f64, frequency: f64) -> Array2<f64> {
        Array2::from_shape_fn((len, 2), |(i, j)| {
            let t = i as f64 / FS;
            if j == 0 {
                amplitude * (2.0 * PI * frequency * t).sin()
            } else {
                0.0
            }
        })
    }
    #[test]
    fn sine_peak_matches_scaled_dft() {
        let n = 10_000;
        let bin = 250;
        let amplitude = 3.0;
        let mut fft = SpectrumTransform::new(FS);
        fft.set_timebase(n).unwrap();
        fft.set_decimation(1).unwrap();
        let trace = fft.compute(tone(n, amplitude, bin as f64 * FS / n as f64).view()).unwrap();
        assert_eq!(trace.len(), n / 2);
        let expected = amplitude * n as f64 / 2.0 * (2.0 / (FS * n as f64)).sqrt();
        assert!((trace.values[[bin, 0]] - expected).abs() < 1e-9 * expected);
        assert!((trace.x_axis[bin] - 1e-3 * bin as f64 * FS / n as f64).abs() < 1e-12);
    }
    #[test]
    fn segment_average_of_stationary_tone_keeps_peak_height() {
        let n = 10_000;
        let segment = 1000;
        // Bin-centred for the segment length, so every segment sees the same tone.
        let frequency = 25.0 * FS / segment as f64;
        let mut fft = SpectrumTransform::new(FS);
        fft.set_timebase(n).unwrap();
        fft.set_decimation(10).unwrap();
        let trace = fft.compute(tone(n, 1.0, frequency).view()).unwrap();
        assert_eq!(trace.len(), segment / 2);
        let expected = segment as f64 / 2.0 * (2.0 / (FS * segment as f64)).sqrt();
        assert!((trace.values[[25, 0]] - expected).abs() < 1e-9);
        assert!((trace.x_axis[1] - 1e-3 * FS / segment as f64).abs() < 1e-12);
    }
    #[test]
    fn segment_average_is_rms_of_segment_spectra() {
        let n = 10_000;
        let segment = 1000;
        let mut rng = StdRng::seed_from_u64(7);
        let window = Array2::from_shape_fn((n, 2), |_| rng.gen_range(-1.0..1.0));
        let mut fft = SpectrumTransform::new(FS);
        fft.set_timebase(n).unwrap();
        fft.set_decimation(10).unwrap();
        let trace = fft.compute(window.view()).unwrap();
        assert_eq!(trace.len(), segment / 2);
        let builder = SpectrumBuilder::with_size(segment);
        let parts: Vec<Array2<f64>> = (0..10)
            .map(|k| builder.scaled_abs_fft(window.slice(s![k * segment..(k + 1) * segment, ..]), FS))
            .collect();
        for k in [0, 1, 17, 499] {
            for c in 0..2 {
                let power: f64 = parts.iter().map(|p| p[[k, c]].powi(2)).sum();
                let rms = (power / 10.0).sqrt();
                let mean: f64 = parts.iter().map(|p| p[[k, c]]).sum::<f64>() / 10.0;
                assert!((trace.values[[k, c]] - rms).abs() < 1e-12);
                // Noise spectra differ per segment, so RMS and mean part ways.
                assert!(rms > mean);
            }
        }
    }
    #[test]
    fn squared_mode_reports_power_density() {
        let n = 4000;
        let window = tone(n, 2.0, 40.0 * FS / n as f64);
        let mut fft = SpectrumTransform::new(FS);
        fft.set_timebase(n).unwrap();
        fft.set_decimation(1).unwrap();
        let amplitude = fft.compute(window.view()).unwrap();
        fft.set_squared(true);
        let power = fft.compute(window.view()).unwrap();
        assert!((power.values[[40, 0]] - amplitude.values[[40, 0]].powi(2)).abs() < 1e-12);
        assert_eq!(fft.axes().y.units, "µm²/Hz");
        assert!((fft.axes().y.min - 1e-8).abs() < 1e-20);
    }
    #[test]
    fn decimation_availability_follows_timebase() {
        let mut fft = SpectrumTransform::new(FS);
        fft.set_timebase(5000).unwrap();
        assert_eq!(fft.available_decimations(), vec![1]);
        fft.set_timebase(100_000).unwrap();
        assert_eq!(fft.available_decimations(), vec![1, 10, 100]);
        assert!(fft.set_decimation(3).is_err());
    }
}

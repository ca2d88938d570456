use std::sync::Arc;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rustfft::{num_complex::Complex64, Fft, FftPlanner};
/// Forward FFT of a fixed length, applied column by column.
///
/// Every transform owns its own builder so no planner state is shared
/// between threads.
pub struct SpectrumBuilder {
    fft_size: usize,
    fft: Arc<dyn Fft<f64>>,
}
impl SpectrumBuilder {
    pub fn with_size(fft_size: usize) -> Self {
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self { fft_size, fft }
    }
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }
    /// One-sided amplitude spectral density of each column of `segment`.
    ///
    /// Returns bins `[0, N/2)` of `|FFT|` scaled by `sqrt(2 / (fs * N))`, so a
    /// signal in µm yields µm/√Hz. `segment` must have `fft_size` rows.
    pub fn scaled_abs_fft(&self, segment: ArrayView2<f64>, sample_frequency: f64) -> Array2<f64> {
        let n = self.fft_size;
        debug_assert_eq!(segment.nrows(), n);
        let scale = (2.0 / (sample_frequency * n as f64)).sqrt();
        let mut out = Array2::zeros((n / 2, segment.ncols()));
        let mut buffer = vec![Complex64::new(0.0, 0.0); n];
        for (column, mut target) in segment.axis_iter(Axis(1)).zip(out.axis_iter_mut(Axis(1))) {
            for (slot, &value) in buffer.iter_mut().zip(column.iter()) {
                *slot = Complex64::new(value, 0.0);
            }
            self.fft.process(&mut buffer);
            for (bin, slot) in target.iter_mut().zip(&buffer) {
                *bin = slot.norm() * scale;
            }
        }
        out
    }
}
/// Frequencies of bins `[0, timebase/2)` for a transform of `timebase` points,
/// multiplied by `scale` (e.g. 1e-3 for kHz).
pub fn fft_frequencies(timebase: usize, sample_frequency: f64, scale: f64) -> Array1<f64> {
    Array1::from_iter(
        (0..timebase / 2).map(|k| scale * sample_frequency * k as f64 / timebase as f64),
    )
}

//! Logarithmic frequency binning shared by the log-f and integrated modes.
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
/// Widths of roughly `hint` logarithmically spaced bins covering indexes
/// `1..=length`, so each decade gets about the same number of bins.
///
/// Breakpoints are `10^(k · log10(length) / (hint - 1))` truncated to
/// integers; zero-width gaps between equal breakpoints are dropped, which is
/// why the result is usually shorter than `hint`.
pub fn compute_gaps(length: usize, hint: usize) -> Vec<usize> {
    if length < 2 || hint < 2 {
        return Vec::new();
    }
    let stop = (length as f64).log10();
    let step = stop / (hint - 1) as f64;
    let breakpoints: Vec<usize> = (0..hint)
        .map(|k| {
            let exponent = if k == hint - 1 { stop } else { k as f64 * step };
            10f64.powf(exponent) as usize
        })
        .collect();
    breakpoints
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]))
        .filter(|&gap| gap > 0)
        .collect()
}
/// Sums consecutive runs of rows, `counts[i]` rows into output row `i`.
pub fn condense(values: ArrayView2<f64>, counts: &[usize]) -> Array2<f64> {
    let mut sums = Array2::zeros((counts.len(), values.ncols()));
    let mut left = 0;
    for (i, &step) in counts.iter().enumerate() {
        let right = (left + step).min(values.nrows());
        let start = left.min(right);
        sums.row_mut(i)
            .assign(&values.slice(s![start..right, ..]).sum_axis(Axis(0)));
        left += step;
    }
    sums
}
/// Upper frequency of each condensed bin, in Hz.
pub fn bin_frequencies(counts: &[usize], timebase: usize, sample_frequency: f64) -> Array1<f64> {
    let mut edge = 0usize;
    Array1::from_iter(counts.iter().map(|&count| {
        edge += count;
        sample_frequency * edge as f64 / timebase as f64
    }))
}

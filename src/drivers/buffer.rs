use std::sync::{Arc, Mutex, MutexGuard};
use ndarray::Array2;
use crate::drivers::FaError;
/// Raw server counts are nanometres; displayed values are micrometres.
pub const MICROMETRES_PER_COUNT: f64 = 1e-3;
/// One acquisition tick of a BPM: horizontal and vertical position in counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    pub x: i32,
    pub y: i32,
}
impl Sample {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}
/// Converts raw samples into an `(n, 2)` array of micrometres, column 0 = X.
pub fn scale_samples(samples: &[Sample]) -> Array2<f64> {
    let mut out = Array2::zeros((samples.len(), 2));
    for (mut row, sample) in out.rows_mut().into_iter().zip(samples) {
        row[0] = f64::from(sample.x) * MICROMETRES_PER_COUNT;
        row[1] = f64::from(sample.y) * MICROMETRES_PER_COUNT;
    }
    out
}
/// Fixed-capacity rolling store that always holds `capacity` samples.
///
/// Storage is a ring: `cursor` is both the slot of the oldest sample and the
/// next slot to overwrite.
pub struct SampleBuffer {
    data: Vec<Sample>,
    cursor: usize,
}
impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, FaError> {
        if capacity == 0 {
            return Err(FaError::InvalidCapacity);
        }
        Ok(Self {
            data: vec![Sample::default(); capacity],
            cursor: 0,
        })
    }
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
    /// Evicts the oldest `block.len()` samples and appends `block` in order.
    pub fn write(&mut self, block: &[Sample]) -> Result<(), FaError> {
        let capacity = self.capacity();
        let len = block.len();
        if len > capacity {
            return Err(FaError::BlockTooLarge { len, capacity });
        }
        let head = len.min(capacity - self.cursor);
        self.data[self.cursor..self.cursor + head].copy_from_slice(&block[..head]);
        self.data[..len - head].copy_from_slice(&block[head..]);
        self.cursor = (self.cursor + len) % capacity;
        Ok(())
    }
    /// Copies out the most recent `size` samples, oldest first.
    pub fn read(&self, size: usize) -> Result<Vec<Sample>, FaError> {
        let capacity = self.capacity();
        if size > capacity {
            return Err(FaError::ReadTooLarge { size, capacity });
        }
        let start = (self.cursor + capacity - size) % capacity;
        let mut out = Vec::with_capacity(size);
        if start + size <= capacity {
            out.extend_from_slice(&self.data[start..start + size]);
        } else {
            out.extend_from_slice(&self.data[start..]);
            out.extend_from_slice(&self.data[..size - (capacity - start)]);
        }
        Ok(out)
    }
    pub fn reset(&mut self) {
        self.data.fill(Sample::default());
        self.cursor = 0;
    }
}
/// Buffer shared between the acquisition worker and readers.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<Mutex<SampleBuffer>>,
    capacity: usize,
}
impl SharedBuffer {
    pub fn with_capacity(capacity: usize) -> Result<Self, FaError> {
        let buffer = SampleBuffer::with_capacity(capacity)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(buffer)),
            capacity,
        })
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn write(&self, block: &[Sample]) -> Result<(), FaError> {
        self.lock().write(block)
    }
    pub fn read(&self, size: usize) -> Result<Vec<Sample>, FaError> {
        self.lock().read(size)
    }
    /// Snapshot of the most recent `size` samples in micrometres.
    pub fn read_scaled(&self, size: usize) -> Result<Array2<f64>, FaError> {
        let raw = self.read(size)?;
        Ok(scale_samples(&raw))
    }
    pub fn reset(&self) {
        self.lock().reset();
    }
    fn lock(&self) -> MutexGuard<'_, SampleBuffer> {
        // Writes are plain slice copies, so a poisoned lock still holds whole samples.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    fn ramp(start: i32, len: usize) -> Vec<Sample> {
        (0..len as i32)
            .map(|i| Sample::new(start + i, -(start + i)))
            .collect()
    }
    #[test]
    fn read_returns_last_capacity_samples_in_order() {
        let mut buffer = SampleBuffer::with_capacity(10).unwrap();
        let mut written = Vec::new();
        let mut next = 0;
        for len in [3, 7, 4, 9, 1, 10, 6] {
            let block = ramp(next, len);
            next += len as i32;
            buffer.write(&block).unwrap();
            written.extend(block);
        }
        let tail = written[written.len() - 10..].to_vec();
        assert_eq!(buffer.read(10).unwrap(), tail);
        assert_eq!(buffer.read(4).unwrap(), tail[6..].to_vec());
    }
    #[test]
    fn reset_zeroes_every_slot() {
        let mut buffer = SampleBuffer::with_capacity(8).unwrap();
        buffer.write(&ramp(1, 5)).unwrap();
        buffer.reset();
        for k in 0..=8 {
            assert!(buffer.read(k).unwrap().iter().all(|s| *s == Sample::default()));
        }
    }
    #[test]
    fn short_write_displaces_previous_samples() {
        let mut buffer = SampleBuffer::with_capacity(6).unwrap();
        buffer.write(&ramp(0, 6)).unwrap();
        buffer.write(&ramp(100, 2)).unwrap();
        let snapshot = buffer.read(6).unwrap();
        assert_eq!(snapshot[..4].to_vec(), ramp(2, 4));
        assert_eq!(snapshot[4..].to_vec(), ramp(100, 2));
    }
    #[test]
    fn oversized_requests_are_rejected() {
        let mut buffer = SampleBuffer::with_capacity(4).unwrap();
        assert!(matches!(
            buffer.write(&ramp(0, 5)),
            Err(FaError::BlockTooLarge { len: 5, capacity: 4 })
        ));
        assert!(matches!(
            buffer.read(5),
            Err(FaError::ReadTooLarge { size: 5, capacity: 4 })
        ));
        assert!(matches!(
            SampleBuffer::with_capacity(0),
            Err(FaError::InvalidCapacity)
        ));
    }
    #[test]
    fn shared_read_is_scaled_to_micrometres() {
        let shared = SharedBuffer::with_capacity(4).unwrap();
        shared.write(&[Sample::new(1500, -250)]).unwrap();
        let window = shared.read_scaled(2).unwrap();
        assert_eq!(window.dim(), (2, 2));
        assert_eq!(window[[0, 0]], 0.0);
        assert!((window[[1, 0]] - 1.5).abs() < 1e-12);
        assert!((window[[1, 1]] + 0.25).abs() < 1e-12);
        // Raw storage is left untouched.
        assert_eq!(shared.read(1).unwrap(), vec![Sample::new(1500, -250)]);
    }
}

use std::collections::VecDeque;
use std::ops::Index;

/// Ordered sequence of current samples, in µA.
///
/// The buffer is either unbounded, or bounded to a fixed number of samples, in which case
/// appending past the capacity discards the oldest samples. Samples are addressed by index,
/// where index 0 is the oldest retained sample.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: VecDeque<i32>,
    capacity: Option<usize>,
    discarded: u64,
}

impl SampleBuffer {
    pub fn new() -> SampleBuffer {
        SampleBuffer::default()
    }

    pub fn bounded(capacity: usize) -> SampleBuffer {
        assert!(capacity > 0);
        SampleBuffer {
            samples: VecDeque::with_capacity(capacity.min(1 << 20)),
            capacity: Some(capacity),
            discarded: 0,
        }
    }

    pub(crate) fn with_capacity(capacity: Option<usize>) -> SampleBuffer {
        match capacity {
            Some(capacity) => SampleBuffer::bounded(capacity),
            None => SampleBuffer::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Number of samples dropped to stay within capacity since the last `clear`.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    pub fn get(&self, index: usize) -> Option<i32> {
        self.samples.get(index).copied()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = i32> + '_ {
        self.samples.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.discarded = 0;
    }

    /// Append samples in order. Returns the number of old samples discarded to make room.
    pub fn extend(&mut self, samples: &[i32]) -> usize {
        let mut discarded = 0;
        match self.capacity {
            None => self.samples.extend(samples),
            Some(capacity) => {
                // only the tail of an oversized batch can survive
                let skip = samples.len().saturating_sub(capacity);
                let samples = &samples[skip..];
                let overflow = (self.samples.len() + samples.len()).saturating_sub(capacity);
                self.samples.drain(..overflow);
                self.samples.extend(samples);
                discarded = skip + overflow;
            }
        }
        self.discarded += discarded as u64;
        discarded
    }

    pub fn sum(&self) -> i64 {
        self.samples.iter().map(|&sample| sample as i64).sum()
    }

    pub fn min(&self) -> Option<i32> {
        self.samples.iter().copied().min()
    }

    pub fn max(&self) -> Option<i32> {
        self.samples.iter().copied().max()
    }
}

impl Index<usize> for SampleBuffer {
    type Output = i32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unbounded() {
        let mut buf = SampleBuffer::new();
        assert!(buf.is_empty());
        assert_eq!(buf.extend(&[1, 2, 3]), 0);
        assert_eq!(buf.extend(&[4]), 0);
        assert_eq!(buf.to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(buf[2], 3);
        assert_eq!(buf.get(4), None);
        assert_eq!(buf.sum(), 10);
        assert_eq!((buf.min(), buf.max()), (Some(1), Some(4)));
    }

    #[test]
    fn test_bounded_discards_oldest() {
        let mut buf = SampleBuffer::bounded(4);
        assert_eq!(buf.extend(&[1, 2, 3]), 0);
        assert_eq!(buf.extend(&[4, 5, 6]), 2);
        assert_eq!(buf.to_vec(), vec![3, 4, 5, 6]);
        assert_eq!(buf[0], 3);
        assert_eq!(buf.discarded(), 2);
    }

    #[test]
    fn test_bounded_oversized_batch() {
        let mut buf = SampleBuffer::bounded(3);
        buf.extend(&[1]);
        assert_eq!(buf.extend(&[2, 3, 4, 5, 6]), 3);
        assert_eq!(buf.to_vec(), vec![4, 5, 6]);
        assert_eq!(buf.discarded(), 3);
    }

    #[test]
    fn test_clear_resets_discarded() {
        let mut buf = SampleBuffer::bounded(1);
        buf.extend(&[1, 2]);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.discarded(), 0);
        assert_eq!((buf.min(), buf.max()), (None, None));
    }

    #[test]
    fn test_sum_does_not_overflow() {
        let mut buf = SampleBuffer::new();
        buf.extend(&[i32::MAX, i32::MAX]);
        assert_eq!(buf.sum(), 2 * i32::MAX as i64);
    }
}

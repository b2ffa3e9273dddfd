//! Train/validation splitting and tensor batching.

use candle_core::{Device, Result, Tensor};
use motionflow_core::SequenceDataset;
use oorandom::Rand64;

/// Sample indices assigned to each side of the split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Fisher-Yates shuffle driven by a seeded generator.
pub fn shuffle(indices: &mut [usize], rng: &mut Rand64) {
    for i in (1..indices.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        indices.swap(i, j);
    }
}

/// Number of validation samples carved out of `sample_count`.
///
/// The trailing `validation_split` fraction goes to validation. When the
/// fraction is positive, at least one sample lands on each side as long as
/// there are two samples to share.
pub fn validation_count(sample_count: usize, validation_split: f64) -> usize {
    if validation_split <= 0.0 || sample_count < 2 {
        return 0;
    }
    let split_at = (sample_count as f64 * (1.0 - validation_split)).floor() as usize;
    (sample_count - split_at.min(sample_count)).clamp(1, sample_count - 1)
}

/// Splits `0..sample_count`, optionally shuffling the pool first.
pub fn split_indices(
    sample_count: usize,
    validation_split: f64,
    shuffle_pool: bool,
    seed: u64,
) -> DataSplit {
    let mut indices: Vec<usize> = (0..sample_count).collect();
    if shuffle_pool {
        let mut rng = Rand64::new(u128::from(seed));
        shuffle(&mut indices, &mut rng);
    }

    let validation = indices.split_off(sample_count - validation_count(sample_count, validation_split));
    DataSplit {
        train: indices,
        validation,
    }
}

/// The whole dataset resident on one device.
pub struct TensorDataset {
    xs: Tensor,
    ys: Tensor,
}

impl TensorDataset {
    /// `xs` has shape `(N, T, F)` as f32, `ys` has shape `(N,)` as u32.
    pub fn from_dataset(dataset: &SequenceDataset, device: &Device) -> Result<Self> {
        let xs = Tensor::from_slice(dataset.sequences(), dataset.shape(), device)?;
        let ys = Tensor::from_slice(dataset.targets(), dataset.sample_count(), device)?;
        Ok(Self { xs, ys })
    }

    pub fn len(&self) -> usize {
        self.ys.dims1().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gathers the given samples into one `(inputs, targets)` batch.
    pub fn batch(&self, indices: &[usize]) -> Result<(Tensor, Tensor)> {
        let ids: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
        let ids = Tensor::from_vec(ids, indices.len(), self.xs.device())?;
        Ok((self.xs.index_select(&ids, 0)?, self.ys.index_select(&ids, 0)?))
    }
}

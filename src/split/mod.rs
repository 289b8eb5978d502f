//! Seeded train/validation splitting.

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

use crate::error::FieldboxError;

pub const DEFAULT_VAL_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

/// Two disjoint, sorted subsets whose union is the input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrainValSplit {
    pub train: Vec<String>,
    pub val: Vec<String>,
}

pub fn validate_val_fraction(val_fraction: f64) -> Result<(), FieldboxError> {
    if !(val_fraction > 0.0 && val_fraction < 1.0) {
        return Err(FieldboxError::InvalidSplitParams {
            message: format!(
                "--val-fraction must be in the open interval (0.0, 1.0), got {}",
                val_fraction
            ),
        });
    }
    Ok(())
}

/// Number of validation items for `total` items.
///
/// Rounds `total * val_fraction`, then keeps at least one item on each side
/// when `total >= 2`. A single item always goes to train.
pub fn val_count(total: usize, val_fraction: f64) -> usize {
    if total < 2 {
        return 0;
    }
    let raw = (total as f64 * val_fraction).round() as usize;
    raw.clamp(1, total - 1)
}

/// Splits `ids` into train and validation subsets.
///
/// The input is sorted and deduplicated first, so the result depends only on
/// the set of ids, the fraction, and the seed.
pub fn split_train_val(
    ids: &[String],
    val_fraction: f64,
    seed: u64,
) -> Result<TrainValSplit, FieldboxError> {
    validate_val_fraction(val_fraction)?;

    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();

    let n_val = val_count(ids.len(), val_fraction);
    let mut rng = StdRng::seed_from_u64(seed);
    ids.shuffle(&mut rng);

    let mut val = ids.split_off(ids.len() - n_val);
    let mut train = ids;
    train.sort();
    val.sort();

    Ok(TrainValSplit { train, val })
}

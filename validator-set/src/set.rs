//! Weighted validator registry.
//!
//! Maintains the current set of consensus participants with their stake
//! weights and answers membership, total-weight, and stake-proportional
//! sampling queries. Validators are kept sorted ascending by
//! (weight, pubkey) so the set has one deterministic order for listing,
//! tie-breaking, and cumulative-weight lookups during sampling.
//!
//! Sampling is without replacement over *weight units*: the total weight
//! forms a contiguous index space partitioned into one range per validator,
//! and `sample(k)` draws k distinct indices from that space. A validator
//! that owns many units can therefore appear multiple times in one sample,
//! and `k` is bounded by the total weight rather than the member count.

use {
    crate::{
        error::{Result, SetError},
        sampler,
    },
    log::{debug, info},
    parking_lot::Mutex,
    rand::Rng,
    solana_pubkey::Pubkey,
    std::{collections::HashMap, fmt},
};

/// A single validator with its stake weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    pub pubkey: Pubkey,
    pub weight: u64,
}

impl Validator {
    /// Create a new validator record.
    pub fn new(pubkey: Pubkey, weight: u64) -> Self {
        Self { pubkey, weight }
    }
}

/// Membership state, kept consistent as one unit under the set's lock.
#[derive(Debug, Default)]
struct SetInner {
    /// Validators sorted ascending by (weight, pubkey).
    validators: Vec<Validator>,
    /// Fast lookup from pubkey to index in the validators vec.
    index: HashMap<Pubkey, usize>,
    /// Running weight sums, parallel to `validators`: `cumulative[i]` is
    /// the sum of weights of validators `0..=i`.
    cumulative: Vec<u64>,
    /// Sum of all member weights.
    total_weight: u64,
}

impl SetInner {
    /// Rebuild the pubkey index and cumulative weights from `validators`.
    fn reindex(&mut self) {
        self.index = self
            .validators
            .iter()
            .enumerate()
            .map(|(i, v)| (v.pubkey, i))
            .collect();
        let mut running: u64 = 0;
        self.cumulative = self
            .validators
            .iter()
            .map(|v| {
                running += v.weight;
                running
            })
            .collect();
    }

    /// Ordinal insertion position preserving (weight, pubkey) order.
    fn insertion_point(&self, validator: &Validator) -> usize {
        self.validators
            .partition_point(|v| (v.weight, v.pubkey) < (validator.weight, validator.pubkey))
    }
}

/// An ordered, weighted set of validators.
///
/// All state is guarded by a single internal lock, so mutation and sampling
/// always observe a consistent snapshot: no `sample` call can see a
/// partially applied [`set`](ValidatorSet::set).
#[derive(Debug, Default)]
pub struct ValidatorSet {
    inner: Mutex<SetInner>,
}

impl ValidatorSet {
    /// Create a new, empty validator set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a validator into the set.
    ///
    /// Zero-weight validators are silently discarded, not rejected: the
    /// registry never admits a member that owns no weight units. Fails with
    /// [`SetError::DuplicateValidator`] if the id is already a member and
    /// with [`SetError::WeightOverflow`] if the total weight would exceed
    /// the u64 range. On error the set is unchanged.
    pub fn add(&self, validator: Validator) -> Result<()> {
        if validator.weight == 0 {
            debug!("discarding zero-weight validator {}", validator.pubkey);
            return Ok(());
        }

        let mut inner = self.inner.lock();
        if inner.index.contains_key(&validator.pubkey) {
            return Err(SetError::DuplicateValidator(validator.pubkey));
        }
        let total = inner
            .total_weight
            .checked_add(validator.weight)
            .ok_or(SetError::WeightOverflow)?;

        let pos = inner.insertion_point(&validator);
        inner.validators.insert(pos, validator);
        inner.total_weight = total;
        inner.reindex();
        Ok(())
    }

    /// Remove a validator from the set.
    ///
    /// Fails with [`SetError::UnknownValidator`] if the id is not a member.
    pub fn remove(&self, pubkey: &Pubkey) -> Result<()> {
        let mut inner = self.inner.lock();
        let pos = *inner
            .index
            .get(pubkey)
            .ok_or(SetError::UnknownValidator(*pubkey))?;
        let removed = inner.validators.remove(pos);
        inner.total_weight -= removed.weight;
        inner.reindex();
        Ok(())
    }

    /// Atomically replace the entire membership.
    ///
    /// Zero-weight entries are discarded. Fails with
    /// [`SetError::DuplicateValidator`] if two entries share an id and with
    /// [`SetError::WeightOverflow`] if the weights sum past the u64 range;
    /// on error the previous membership is left untouched.
    pub fn set(&self, validators: Vec<Validator>) -> Result<()> {
        // Build the replacement outside the critical section, then swap.
        let mut members: Vec<Validator> = validators
            .into_iter()
            .filter(|v| {
                if v.weight == 0 {
                    debug!("discarding zero-weight validator {}", v.pubkey);
                }
                v.weight > 0
            })
            .collect();
        members.sort_by(|a, b| (a.weight, a.pubkey).cmp(&(b.weight, b.pubkey)));

        let mut total: u64 = 0;
        let mut seen = HashMap::with_capacity(members.len());
        for (i, v) in members.iter().enumerate() {
            if seen.insert(v.pubkey, i).is_some() {
                return Err(SetError::DuplicateValidator(v.pubkey));
            }
            total = total.checked_add(v.weight).ok_or(SetError::WeightOverflow)?;
        }

        let mut replacement = SetInner {
            validators: members,
            index: HashMap::new(),
            cumulative: Vec::new(),
            total_weight: total,
        };
        replacement.reindex();

        let mut inner = self.inner.lock();
        info!(
            "validator set replace: {} → {} members, weight {} → {}",
            inner.validators.len(),
            replacement.validators.len(),
            inner.total_weight,
            replacement.total_weight,
        );
        *inner = replacement;
        Ok(())
    }

    /// Check whether a validator is a member of the set.
    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.inner.lock().index.contains_key(pubkey)
    }

    /// Returns the number of validators in the set.
    pub fn len(&self) -> usize {
        self.inner.lock().validators.len()
    }

    /// Returns true if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().validators.is_empty()
    }

    /// Returns the sum of all member weights.
    pub fn weight(&self) -> u64 {
        self.inner.lock().total_weight
    }

    /// Returns the weight of a validator, or 0 if not in the set.
    pub fn weight_of(&self, pubkey: &Pubkey) -> u64 {
        self.get(pubkey).map(|v| v.weight).unwrap_or(0)
    }

    /// Look up a validator by pubkey.
    pub fn get(&self, pubkey: &Pubkey) -> Option<Validator> {
        let inner = self.inner.lock();
        inner.index.get(pubkey).map(|&i| inner.validators[i].clone())
    }

    /// Returns all validators in sampling order (ascending weight).
    pub fn list(&self) -> Vec<Validator> {
        self.inner.lock().validators.clone()
    }

    /// Sample `count` validators proportionally to stake, drawing weight
    /// units without replacement.
    ///
    /// Fails with [`SetError::InsufficientWeight`] if `count` exceeds the
    /// total weight. `count` may exceed the member count, and the same
    /// validator may appear multiple times in the result.
    pub fn sample(&self, count: u64) -> Result<Vec<Validator>> {
        self.sample_with_rng(count, &mut rand::rng())
    }

    /// [`sample`](ValidatorSet::sample) with a caller-supplied RNG, for
    /// deterministic replay and tests.
    pub fn sample_with_rng<R: Rng>(&self, count: u64, rng: &mut R) -> Result<Vec<Validator>> {
        let inner = self.inner.lock();
        if count > inner.total_weight {
            return Err(SetError::InsufficientWeight {
                requested: count,
                available: inner.total_weight,
            });
        }

        let mut sampled = Vec::with_capacity(count as usize);
        for unit in sampler::sample_distinct(rng, inner.total_weight, count) {
            // The owner of a weight unit is the first validator whose
            // cumulative weight exceeds it.
            let pos = inner.cumulative.partition_point(|&c| c <= unit);
            sampled.push(inner.validators[pos].clone());
        }
        Ok(sampled)
    }
}

impl fmt::Display for ValidatorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        write!(
            f,
            "ValidatorSet(len = {}, weight = {})",
            inner.validators.len(),
            inner.total_weight
        )?;
        for (i, v) in inner.validators.iter().enumerate() {
            write!(f, "\n    [{i}] {}: {}", v.pubkey, v.weight)?;
        }
        Ok(())
    }
}

//! The genome is an opaque fixed-length byte string, interpreted only by the caller
use crate::errors::{EvoError, Result};
use rand::distributions::{Bernoulli, Distribution};
use rand::Rng;
use rustc_hash::FxHasher;
use std::hash::Hasher;

/// An owned byte buffer representing one candidate solution.
///
/// The crate never interprets the bytes; domains decode them as they see
/// fit. Size may be lowered and raised again within the allocated capacity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Genome {
    data: Vec<u8>,
}

impl Genome {
    /// A zero-filled genome of `capacity` bytes, size == capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
        }
    }

    /// An empty genome with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// A uniformly random genome of `size` bytes
    pub fn random<R: Rng + ?Sized>(size: usize, rng: &mut R) -> Self {
        let mut genome = Self::new(size);
        genome.randomize(rng);
        genome
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite every byte with a uniform random value
    pub fn randomize<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        rng.fill(self.data.as_mut_slice());
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(buf.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                EvoError::InvalidArgument(format!(
                    "read of {} bytes at offset {} exceeds genome size {}",
                    buf.len(),
                    offset,
                    self.data.len()
                ))
            })?;
        buf.copy_from_slice(&self.data[offset..end]);
        Ok(())
    }

    /// Overwrite bytes starting at `offset`
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                EvoError::InvalidArgument(format!(
                    "write of {} bytes at offset {} exceeds genome size {}",
                    bytes.len(),
                    offset,
                    self.data.len()
                ))
            })?;
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Shrink or regrow (zero-filled) within the allocated capacity
    pub fn set_size(&mut self, size: usize) -> Result<()> {
        if size > self.data.capacity() {
            return Err(EvoError::InvalidArgument(format!(
                "size {} exceeds capacity {}",
                size,
                self.data.capacity()
            )));
        }
        self.data.resize(size, 0);
        Ok(())
    }

    /// Bytewise Hamming count over the overlapping prefix
    pub fn hamming_distance(&self, other: &Genome) -> usize {
        self.data
            .iter()
            .zip(other.data.iter())
            .filter(|(a, b)| a != b)
            .count()
    }

    /// Fraction of matching bytes over the minimum of the two sizes, in [0, 1].
    /// Empty genomes match nothing.
    pub fn similarity(&self, other: &Genome) -> f64 {
        let len = self.data.len().min(other.data.len());
        if len == 0 {
            return 0.0;
        }
        let matching = len - self.hamming_distance(other);
        matching as f64 / len as f64
    }

    /// Stable hash of the byte content, used for cardinality estimation
    pub fn hash_value(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write(&self.data);
        hasher.finish()
    }

    /// Uniform crossover: each byte position tosses a fair bit and the
    /// children receive mirrored bytes. Children take the minimum of the
    /// two parent sizes, so the bytewise XOR of the children equals the
    /// XOR of the parents over that prefix.
    pub fn crossover_uniform<R: Rng + ?Sized>(
        parent_a: &Genome,
        parent_b: &Genome,
        rng: &mut R,
    ) -> (Genome, Genome) {
        let len = parent_a.len().min(parent_b.len());
        let mut child_a = Vec::with_capacity(len);
        let mut child_b = Vec::with_capacity(len);
        for index in 0..len {
            if rng.gen::<bool>() {
                child_a.push(parent_a.data[index]);
                child_b.push(parent_b.data[index]);
            } else {
                child_a.push(parent_b.data[index]);
                child_b.push(parent_a.data[index]);
            }
        }
        (Genome { data: child_a }, Genome { data: child_b })
    }

    /// Replace each byte independently with probability `rate` by a uniform
    /// random byte. Rates outside [0, 1] are clamped.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rate: f64, rng: &mut R) {
        let rate = rate.clamp(0.0, 1.0);
        if rate == 0.0 || self.data.is_empty() {
            return;
        }
        let sampler = Bernoulli::new(rate).expect("rate clamped to [0, 1]");
        for byte in self.data.iter_mut() {
            if sampler.sample(rng) {
                *byte = rng.gen();
            }
        }
    }

    /// Hex rendering, the default domain serialization
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.data.len() * 2);
        for byte in &self.data {
            out.push_str(&format!("{:02x}", byte));
        }
        out
    }
}

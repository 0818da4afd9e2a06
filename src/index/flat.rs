//! Exact (brute-force) L2 index over a flat `f32` buffer.
//!
//! Position `i` is the i-th vector added; it never changes.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{RagError, Result};

const MAGIC: &[u8; 4] = b"GLV1";
const HEADER_LEN: usize = 4 + 4 + 8;

/// Squared Euclidean distance. Callers guarantee equal lengths.
pub fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0;
    let n = a.len();
    let mut i = 0;

    // Unrolling 4
    while i + 3 < n {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
        i += 4;
    }

    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }

    sum
}

/// A search hit ordered by (distance, position), so equal distances keep
/// insertion order.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// An index with no vectors and unknown dimension.
    pub fn empty() -> Self {
        Self::new(0)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if self.dimension == 0 || vector.len() != self.dimension {
            return Err(RagError::EncodingFailure(format!(
                "vector dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    #[cfg(test)]
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len() {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    /// The `k` nearest vectors by squared L2 distance, nearest first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(RagError::SearchFailure(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        // Max-heap of the k best seen so far; the root is the worst of them.
        let mut heap = BinaryHeap::with_capacity(k + 1);
        for (position, vector) in self.data.chunks_exact(self.dimension).enumerate() {
            let candidate = Neighbor {
                position,
                distance: l2_squared(query, vector),
            };
            if heap.len() < k {
                heap.push(candidate);
            } else if let Some(worst) = heap.peek() {
                if candidate < *worst {
                    heap.pop();
                    heap.push(candidate);
                }
            }
        }

        Ok(heap.into_sorted_vec())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        buffer.extend_from_slice(MAGIC);
        buffer.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        buffer.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(corrupt("vector artifact too short"));
        }
        if &bytes[0..4] != MAGIC {
            return Err(corrupt("vector artifact has invalid magic"));
        }

        let mut word = [0u8; 4];
        word.copy_from_slice(&bytes[4..8]);
        let dimension = u32::from_le_bytes(word) as usize;
        let mut long = [0u8; 8];
        long.copy_from_slice(&bytes[8..16]);
        let count = u64::from_le_bytes(long) as usize;

        if dimension == 0 && count != 0 {
            return Err(corrupt("vector artifact has vectors but dimension 0"));
        }
        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("vector artifact header overflows"))?;
        let body = &bytes[HEADER_LEN..];
        if body.len() != expected {
            return Err(corrupt(&format!(
                "vector artifact holds {} bytes, header promises {}",
                body.len(),
                expected
            )));
        }

        let data = body
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { dimension, data })
    }
}

fn corrupt(msg: &str) -> RagError {
    RagError::CorruptIndexStore(msg.to_string())
}

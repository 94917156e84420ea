//! Genome encoding for hold-schedule controllers.
//!
//! A genome is a flat vector of `joints × intervals` forces. Decoding reshapes
//! it row-major: element `(j, i)` is the force held on joint `j` during control
//! interval `i`.

use rand::prelude::*;

/// Default bound on initial genome values, in N·m.
pub const DEFAULT_FORCE_BOUND: f64 = 1500.0;

/// Genome shape errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GenomeError {
    #[error(
        "Genome length {actual} does not match {joints} joints x {intervals} intervals ({expected})"
    )]
    ShapeMismatch {
        expected: usize,
        actual: usize,
        joints: usize,
        intervals: usize,
    },
}

/// Number of control intervals covering an episode, one per timestep.
pub fn genome_intervals(duration: f64, timestep: f64) -> usize {
    if !(timestep > 0.0 && duration > 0.0) {
        return 1;
    }
    // Nudge up so that e.g. 5.0 / 0.01 does not truncate to 499.
    ((duration / timestep) + 1e-9).floor().max(1.0) as usize
}

/// Per-joint, per-interval force schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ForceMatrix {
    joints: usize,
    intervals: usize,
    data: Vec<f64>,
}

impl ForceMatrix {
    /// All-zero schedule.
    pub fn zeros(joints: usize, intervals: usize) -> Self {
        Self {
            joints,
            intervals,
            data: vec![0.0; joints * intervals],
        }
    }

    #[inline]
    pub fn joints(&self) -> usize {
        self.joints
    }

    #[inline]
    pub fn intervals(&self) -> usize {
        self.intervals
    }

    #[inline]
    pub fn get(&self, joint: usize, interval: usize) -> Option<f64> {
        if joint < self.joints && interval < self.intervals {
            Some(self.data[joint * self.intervals + interval])
        } else {
            None
        }
    }

    pub fn set(&mut self, joint: usize, interval: usize, value: f64) {
        if joint < self.joints && interval < self.intervals {
            self.data[joint * self.intervals + interval] = value;
        }
    }

    /// Forces of one joint across all intervals.
    pub fn row(&self, joint: usize) -> Option<&[f64]> {
        if joint >= self.joints {
            return None;
        }
        let start = joint * self.intervals;
        self.data.get(start..start + self.intervals)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // `chunks_exact(0)` panics, so an empty row length yields nothing.
        let width = self.intervals.max(1);
        self.data.chunks_exact(width).take(self.joints)
    }

    /// Forces of every joint during one interval.
    pub fn column(&self, interval: usize) -> Option<Vec<f64>> {
        (0..self.joints)
            .map(|j| self.get(j, interval))
            .collect()
    }

    /// Flatten row-major; the exact inverse of [`decode`].
    pub fn encode(&self) -> Vec<f64> {
        self.data.clone()
    }

    pub fn into_genome(self) -> Vec<f64> {
        self.data
    }
}

/// Reshape a flat genome into a `joints × intervals` force matrix.
pub fn decode(genome: &[f64], joints: usize, intervals: usize) -> Result<ForceMatrix, GenomeError> {
    let expected = joints.checked_mul(intervals);
    if expected != Some(genome.len()) {
        return Err(GenomeError::ShapeMismatch {
            expected: expected.unwrap_or(usize::MAX),
            actual: genome.len(),
            joints,
            intervals,
        });
    }
    Ok(ForceMatrix {
        joints,
        intervals,
        data: genome.to_vec(),
    })
}

/// Flatten a force matrix back into a genome.
#[inline]
pub fn encode(matrix: &ForceMatrix) -> Vec<f64> {
    matrix.encode()
}

/// Random number generator wrapper for genome seeding.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    /// Create from seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Create with random seed.
    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Uniform genome in `[-bound, bound]`.
    pub fn random_genome(&mut self, len: usize, bound: f64) -> Vec<f64> {
        let bound = bound.abs();
        if bound == 0.0 {
            return vec![0.0; len];
        }
        (0..len).map(|_| self.rng.gen_range(-bound..=bound)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_scenario() {
        let matrix = decode(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3).unwrap();
        assert_eq!(matrix.row(0), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(matrix.row(1), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(matrix.row(2), None);
        assert_eq!(matrix.column(1), Some(vec![2.0, 5.0]));
        assert_eq!(matrix.column(3), None);
        assert_eq!(matrix.get(1, 2), Some(6.0));
        assert_eq!(matrix.get(2, 0), None);
        assert_eq!(encode(&matrix), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_decode_wrong_length() {
        let err = decode(&[1.0, 2.0, 3.0, 4.0, 5.0], 2, 3).unwrap_err();
        assert_eq!(
            err,
            GenomeError::ShapeMismatch {
                expected: 6,
                actual: 5,
                joints: 2,
                intervals: 3,
            }
        );
        assert!(decode(&[0.0; 7], 2, 3).is_err());
    }

    #[test]
    fn test_decode_overflowing_shape() {
        let err = decode(&[0.0; 4], usize::MAX, 2).unwrap_err();
        assert!(matches!(
            err,
            GenomeError::ShapeMismatch {
                expected: usize::MAX,
                actual: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_genome_intervals() {
        assert_eq!(genome_intervals(5.0, 0.01), 500);
        assert_eq!(genome_intervals(5.0, 0.1), 50);
        assert_eq!(genome_intervals(1.0, 0.3), 3);
        assert_eq!(genome_intervals(0.0, 0.01), 1);
    }

    #[test]
    fn test_rows_iterator() {
        let matrix = decode(&[1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        let rows: Vec<_> = matrix.rows().collect();
        assert_eq!(rows, vec![&[1.0, 2.0][..], &[3.0, 4.0][..]]);
        assert_eq!(ForceMatrix::zeros(3, 0).rows().count(), 0);
    }

    #[test]
    fn test_set_ignores_out_of_range() {
        let mut matrix = ForceMatrix::zeros(2, 2);
        matrix.set(1, 1, 9.0);
        matrix.set(5, 5, 1.0);
        assert_eq!(matrix.encode(), vec![0.0, 0.0, 0.0, 9.0]);
    }

    #[test]
    fn test_random_genome_deterministic() {
        let a = GenomeRng::new(7).random_genome(16, DEFAULT_FORCE_BOUND);
        let b = GenomeRng::new(7).random_genome(16, DEFAULT_FORCE_BOUND);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() <= DEFAULT_FORCE_BOUND));
        assert_eq!(GenomeRng::new(1).random_genome(3, 0.0), vec![0.0; 3]);
    }

    proptest! {
        #[test]
        fn prop_decode_encode_roundtrip(
            joints in 1usize..10,
            intervals in 1usize..40,
            seed in any::<u64>(),
        ) {
            let genome = GenomeRng::new(seed).random_genome(joints * intervals, 1500.0);
            let decoded = decode(&genome, joints, intervals).unwrap();
            let again = decode(&encode(&decoded), joints, intervals).unwrap();
            prop_assert_eq!(&again, &decoded);
            prop_assert_eq!(encode(&decoded), genome);
        }

        #[test]
        fn prop_wrong_length_always_rejected(
            joints in 1usize..10,
            intervals in 1usize..40,
            delta in 1usize..5,
            longer in any::<bool>(),
        ) {
            let expected = joints * intervals;
            let len = if longer { expected + delta } else { expected.saturating_sub(delta) };
            prop_assume!(len != expected);
            let result = decode(&vec![0.0; len], joints, intervals);
            let is_shape_mismatch = matches!(result, Err(GenomeError::ShapeMismatch { .. }));
            prop_assert!(is_shape_mismatch);
        }
    }
}

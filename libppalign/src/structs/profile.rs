use crate::alphabet::{digital_to_utf8, ALPHABET_SIZE, AMINO_BACKGROUND_FREQUENCIES, NUM_RESIDUES};

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

use super::DataError;

/// A position-specific probabilistic model of a protein family: one column
/// per alignment position, each holding a target-frequency vector, a
/// log-odds score vector, an information content, and a thickness (the
/// number of sequences contributing to the column).
#[derive(Clone, Debug)]
pub struct Profile {
    /// The name of the profile
    pub name: String,
    /// Model length (number of columns)
    pub length: usize,
    /// Consensus residue codes
    pub residues: Vec<u8>,
    /// Target frequencies, one vector per column
    pub frequencies: Vec<[f64; ALPHABET_SIZE]>,
    /// Log-odds scores, one vector per column
    pub scores: Vec<[f64; ALPHABET_SIZE]>,
    /// Information content per column
    pub information: Vec<f64>,
    /// Number of contributing sequences per column
    pub thickness: Vec<usize>,
    /// Low-complexity mask flags per column
    pub masked: Vec<bool>,
}

impl Profile {
    /// Hard cap on profile length accepted at construction.
    pub const MAX_LENGTH: usize = 50_000;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        residues: Vec<u8>,
        frequencies: Vec<[f64; ALPHABET_SIZE]>,
        scores: Vec<[f64; ALPHABET_SIZE]>,
        information: Vec<f64>,
        thickness: Vec<usize>,
        masked: Vec<bool>,
    ) -> Result<Self, DataError> {
        let length = residues.len();

        if length == 0 {
            return Err(DataError::EmptyProfile);
        }
        if length > Self::MAX_LENGTH {
            return Err(DataError::ProfileTooLong {
                length,
                max: Self::MAX_LENGTH,
            });
        }

        for (what, len) in [
            ("residue and frequency vectors", frequencies.len()),
            ("residue and score vectors", scores.len()),
            ("residue and information vectors", information.len()),
            ("residue and thickness vectors", thickness.len()),
            ("residue and mask vectors", masked.len()),
        ] {
            if len != length {
                return Err(DataError::LengthMismatch {
                    what,
                    left: length,
                    right: len,
                });
            }
        }

        for (column, &code) in residues.iter().enumerate() {
            if code as usize >= ALPHABET_SIZE {
                return Err(DataError::BadResidue { code, column });
            }
        }

        Ok(Profile {
            name,
            length,
            residues,
            frequencies,
            scores,
            information,
            thickness,
            masked,
        })
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[inline]
    pub fn residue_at(&self, pos: usize) -> u8 {
        debug_assert!(pos < self.length);
        self.residues[pos]
    }

    #[inline]
    pub fn utf8_at(&self, pos: usize) -> u8 {
        digital_to_utf8(self.residue_at(pos))
    }

    #[inline]
    pub fn frequency(&self, residue: usize, pos: usize) -> f64 {
        debug_assert!(residue < ALPHABET_SIZE);
        debug_assert!(pos < self.length);
        self.frequencies[pos][residue]
    }

    #[inline]
    pub fn score(&self, residue: usize, pos: usize) -> f64 {
        debug_assert!(residue < ALPHABET_SIZE);
        debug_assert!(pos < self.length);
        self.scores[pos][residue]
    }

    #[inline]
    pub fn information_at(&self, pos: usize) -> f64 {
        debug_assert!(pos < self.length);
        self.information[pos]
    }

    #[inline]
    pub fn thickness_at(&self, pos: usize) -> usize {
        debug_assert!(pos < self.length);
        self.thickness[pos]
    }

    #[inline]
    pub fn masked_at(&self, pos: usize) -> bool {
        debug_assert!(pos < self.length);
        self.masked[pos]
    }

    /// Relative entropy of a frequency vector against the background, in
    /// bits. Gap-code entries carry no frequency mass and are skipped.
    pub fn column_information(frequencies: &[f64; ALPHABET_SIZE]) -> f64 {
        frequencies
            .iter()
            .take(NUM_RESIDUES)
            .zip(AMINO_BACKGROUND_FREQUENCIES.iter())
            .filter(|(&f, _)| f > 0.0)
            .map(|(&f, &b)| f * (f / b).log2())
            .sum()
    }

    /// A synthetic profile drawn around the background distribution: each
    /// column picks a consensus residue, boosts its frequency, and scores
    /// every residue by its log-odds against the background.
    pub fn random(name: &str, length: usize, rng: &mut impl Rng) -> Self {
        let consensus_weight = 0.5;
        let sampler = WeightedIndex::new(AMINO_BACKGROUND_FREQUENCIES).unwrap();

        let mut residues = Vec::with_capacity(length);
        let mut frequencies = Vec::with_capacity(length);
        let mut scores = Vec::with_capacity(length);
        let mut information = Vec::with_capacity(length);

        for _ in 0..length {
            let consensus = sampler.sample(rng);

            let mut freqs = [0.0; ALPHABET_SIZE];
            for (residue, freq) in freqs.iter_mut().enumerate().take(NUM_RESIDUES) {
                *freq = (1.0 - consensus_weight) * AMINO_BACKGROUND_FREQUENCIES[residue];
            }
            freqs[consensus] += consensus_weight;

            let mut column_scores = [0.0; ALPHABET_SIZE];
            for (residue, score) in column_scores.iter_mut().enumerate().take(NUM_RESIDUES) {
                *score = (freqs[residue] / AMINO_BACKGROUND_FREQUENCIES[residue]).ln();
            }

            residues.push(consensus as u8);
            information.push(Self::column_information(&freqs));
            frequencies.push(freqs);
            scores.push(column_scores);
        }

        Profile {
            name: name.to_string(),
            length,
            residues,
            frequencies,
            scores,
            information,
            thickness: vec![1; length],
            masked: vec![false; length],
        }
    }

    /// Deterministic variant of [`Profile::random`] for calibration runs
    /// and tests.
    pub fn random_seeded(name: &str, length: usize, seed: u64) -> Self {
        let mut rng = Pcg64::seed_from_u64(seed);
        Self::random(name, length, &mut rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::GAP_CODE;
    use assert2::let_assert;

    #[test]
    fn test_empty_profile_is_rejected() {
        let_assert!(
            Err(DataError::EmptyProfile) =
                Profile::new("empty".to_string(), vec![], vec![], vec![], vec![], vec![], vec![])
        );
    }

    #[test]
    fn test_mismatched_vectors_are_rejected() {
        let result = Profile::new(
            "bad".to_string(),
            vec![0, 1],
            vec![[0.0; ALPHABET_SIZE]; 2],
            vec![[0.0; ALPHABET_SIZE]; 1],
            vec![0.5; 2],
            vec![1; 2],
            vec![false; 2],
        );
        let_assert!(Err(DataError::LengthMismatch { .. }) = result);
    }

    #[test]
    fn test_bad_residue_is_rejected() {
        let result = Profile::new(
            "bad".to_string(),
            vec![0, 42],
            vec![[0.0; ALPHABET_SIZE]; 2],
            vec![[0.0; ALPHABET_SIZE]; 2],
            vec![0.5; 2],
            vec![1; 2],
            vec![false; 2],
        );
        let_assert!(Err(DataError::BadResidue { code: 42, column: 1 }) = result);
    }

    #[test]
    fn test_random_profile_is_deterministic_per_seed() {
        let a = Profile::random_seeded("a", 25, 17);
        let b = Profile::random_seeded("b", 25, 17);
        assert_eq!(a.residues, b.residues);
        assert_eq!(a.scores, b.scores);

        let c = Profile::random_seeded("c", 25, 18);
        assert_ne!(a.residues, c.residues);
    }

    #[test]
    fn test_random_profile_columns_are_valid() {
        let profile = Profile::random_seeded("p", 40, 3);
        for pos in 0..profile.len() {
            let total: f64 = profile.frequencies[pos].iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            assert!(profile.information_at(pos) >= 0.0);
            assert!((profile.residue_at(pos) as usize) < NUM_RESIDUES);
            // the consensus residue scores above background
            assert!(profile.score(profile.residue_at(pos) as usize, pos) > 0.0);
        }
        assert!(!profile.masked_at(0));
        assert_eq!(digital_to_utf8(GAP_CODE), b'-');
    }
}

use std::io::Write;

use serde::Serialize;

use crate::alphabet::NUM_RESIDUES;
use crate::structs::{DataError, Profile};

use super::statistics::StatisticalParams;
use super::ScoreConfig;

/// Whether a cell's score counts toward statistics and/or alignment.
///
/// `MaskToIgnore` drops the cell from both; `MaskToConsider` drops it from
/// the statistics only. The same value doubles as the policy applied to
/// cells covered by a masked profile column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MaskPolicy {
    Unmasked,
    MaskToIgnore,
    MaskToConsider,
}

/// The dense subject x query substitution-score table for one profile
/// pair, with a parallel mask table and the extreme-value parameters
/// estimated from the unmasked scores.
pub struct ScoreMatrix {
    pub(crate) subject_length: usize,
    pub(crate) query_length: usize,
    /// Substitution scores, subject-major
    pub(crate) scores: Vec<f64>,
    /// Per-cell masking
    pub(crate) masks: Vec<MaskPolicy>,
    pub(crate) params: StatisticalParams,
}

impl ScoreMatrix {
    /// Builds the score table for a profile pair. Each cell is the
    /// symmetric half cross product of one profile's target frequencies
    /// with the other's log-odds scores. Cells covered by a masked column
    /// of either profile are tagged with `policy`.
    pub fn build(
        subject: &Profile,
        query: &Profile,
        policy: MaskPolicy,
        config: &ScoreConfig,
    ) -> Result<Self, DataError> {
        for profile in [subject, query] {
            if profile.is_empty() {
                return Err(DataError::EmptyProfile);
            }
            if profile.len() > config.max_profile_length {
                return Err(DataError::ProfileTooLong {
                    length: profile.len(),
                    max: config.max_profile_length,
                });
            }
        }

        let subject_length = subject.len();
        let query_length = query.len();

        let mut scores = vec![0.0; subject_length * query_length];
        let mut masks = vec![MaskPolicy::Unmasked; subject_length * query_length];

        for m in 0..subject_length {
            for n in 0..query_length {
                let mask = if policy != MaskPolicy::Unmasked
                    && (subject.masked_at(m) || query.masked_at(n))
                {
                    policy
                } else {
                    MaskPolicy::Unmasked
                };

                let score = if mask == MaskPolicy::MaskToIgnore {
                    0.0
                } else {
                    let mut sum = 0.0;
                    for residue in 0..NUM_RESIDUES {
                        sum += query.frequency(residue, n) * subject.score(residue, m)
                            + subject.frequency(residue, m) * query.score(residue, n);
                    }
                    0.5 * sum
                };

                scores[m * query_length + n] = score;
                masks[m * query_length + n] = mask;
            }
        }

        Ok(ScoreMatrix {
            subject_length,
            query_length,
            scores,
            masks,
            params: StatisticalParams::new(config.reference),
        })
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        subject_length: usize,
        query_length: usize,
        scores: Vec<f64>,
        masks: Vec<MaskPolicy>,
        config: &ScoreConfig,
    ) -> Self {
        assert_eq!(scores.len(), subject_length * query_length);
        assert_eq!(masks.len(), subject_length * query_length);
        ScoreMatrix {
            subject_length,
            query_length,
            scores,
            masks,
            params: StatisticalParams::new(config.reference),
        }
    }

    pub fn subject_length(&self) -> usize {
        self.subject_length
    }

    pub fn query_length(&self) -> usize {
        self.query_length
    }

    #[inline]
    pub fn get(&self, subject_idx: usize, query_idx: usize) -> f64 {
        debug_assert!(subject_idx < self.subject_length);
        debug_assert!(query_idx < self.query_length);
        self.scores[subject_idx * self.query_length + query_idx]
    }

    #[cfg(test)]
    pub(crate) fn set(&mut self, subject_idx: usize, query_idx: usize, value: f64) {
        debug_assert!(subject_idx < self.subject_length);
        debug_assert!(query_idx < self.query_length);
        self.scores[subject_idx * self.query_length + query_idx] = value;
    }

    #[inline]
    pub fn mask_at(&self, subject_idx: usize, query_idx: usize) -> MaskPolicy {
        debug_assert!(subject_idx < self.subject_length);
        debug_assert!(query_idx < self.query_length);
        self.masks[subject_idx * self.query_length + query_idx]
    }

    #[inline]
    pub fn masked_to_ignore(&self, subject_idx: usize, query_idx: usize) -> bool {
        self.mask_at(subject_idx, query_idx) == MaskPolicy::MaskToIgnore
    }

    pub fn params(&self) -> &StatisticalParams {
        &self.params
    }

    /// The reported score for a raw alignment score: when the matrix has
    /// been rescaled toward a target lambda, the DP works in the scaled
    /// units and the report undoes the multiplier.
    pub fn final_score(&self, value: f64) -> f64 {
        value / self.params.multiplier
    }

    /// Writes the full score table, one subject row per line. Cells masked
    /// out of the statistics are marked with a trailing `*`.
    pub fn dump(&self, out: &mut impl Write) -> anyhow::Result<()> {
        let column_width = 9;
        let precision = 3;

        write!(out, "{:6}", "")?;
        for query_idx in 0..self.query_length {
            write!(out, "{:w$} ", query_idx + 1, w = column_width)?;
        }
        writeln!(out)?;

        for subject_idx in 0..self.subject_length {
            write!(out, "{:5} ", subject_idx + 1)?;
            for query_idx in 0..self.query_length {
                let marker = match self.mask_at(subject_idx, query_idx) {
                    MaskPolicy::Unmasked => ' ',
                    _ => '*',
                };
                write!(
                    out,
                    "{:w$.p$}{}",
                    self.get(subject_idx, query_idx),
                    marker,
                    w = column_width,
                    p = precision
                )?;
            }
            writeln!(out)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::ALPHABET_SIZE;
    use assert2::let_assert;

    fn uniform_profile(name: &str, length: usize, masked_column: Option<usize>) -> Profile {
        let mut masked = vec![false; length];
        if let Some(column) = masked_column {
            masked[column] = true;
        }
        Profile::new(
            name.to_string(),
            vec![0; length],
            vec![[1.0 / ALPHABET_SIZE as f64; ALPHABET_SIZE]; length],
            vec![[0.5; ALPHABET_SIZE]; length],
            vec![1.0; length],
            vec![1; length],
            masked,
        )
        .unwrap()
    }

    #[test]
    fn test_build_rejects_oversized_profiles() {
        let good = uniform_profile("good", 3, None);
        let long = uniform_profile("long", 4, None);

        let small_config = ScoreConfig {
            max_profile_length: 3,
            ..ScoreConfig::default()
        };
        let result = ScoreMatrix::build(&long, &good, MaskPolicy::Unmasked, &small_config);
        let_assert!(Err(DataError::ProfileTooLong { length: 4, max: 3 }) = result);

        let matrix =
            ScoreMatrix::build(&good, &good, MaskPolicy::Unmasked, &ScoreConfig::default())
                .unwrap();
        assert_eq!(matrix.subject_length(), 3);
        assert_eq!(matrix.query_length(), 3);
    }

    #[test]
    fn test_masked_columns_follow_policy() {
        let config = ScoreConfig::default();
        let subject = uniform_profile("s", 4, Some(2));
        let query = uniform_profile("q", 3, None);

        let ignored =
            ScoreMatrix::build(&subject, &query, MaskPolicy::MaskToIgnore, &config).unwrap();
        for n in 0..3 {
            assert!(ignored.masked_to_ignore(2, n));
            assert_eq!(ignored.get(2, n), 0.0);
        }
        assert!(!ignored.masked_to_ignore(0, 0));
        assert!(ignored.get(0, 0) != 0.0);

        let considered =
            ScoreMatrix::build(&subject, &query, MaskPolicy::MaskToConsider, &config).unwrap();
        assert_eq!(considered.mask_at(2, 1), MaskPolicy::MaskToConsider);
        assert!(considered.get(2, 1) != 0.0);

        let unmasked = ScoreMatrix::build(&subject, &query, MaskPolicy::Unmasked, &config).unwrap();
        assert_eq!(unmasked.mask_at(2, 1), MaskPolicy::Unmasked);
    }

    #[test]
    fn test_dump_writes_every_row() {
        let config = ScoreConfig::default();
        let profile = uniform_profile("p", 3, None);
        let matrix = ScoreMatrix::build(&profile, &profile, MaskPolicy::Unmasked, &config).unwrap();

        let mut out = Vec::new();
        matrix.dump(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        // header plus one line per subject position
        assert_eq!(text.lines().count(), 4);
    }
}

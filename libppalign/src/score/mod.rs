pub mod matrix;
pub use matrix::{MaskPolicy, ScoreMatrix};

pub mod root;
pub use root::{find_root, ConvergenceError, DomainError, RootError};

pub mod statistics;
pub use statistics::StatisticalParams;

use crate::alphabet::{AMINO_BACKGROUND_FREQUENCIES, NUM_RESIDUES};
use crate::structs::Profile;

use serde::Serialize;

/// Reference extreme-value parameters used when rescaling score matrices
/// and as the fallback for the reference expectation. The defaults are the
/// ungapped BLOSUM62 values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceParams {
    pub lambda: f64,
    pub k: f64,
    pub h: f64,
}

impl Default for ReferenceParams {
    fn default() -> Self {
        ReferenceParams {
            lambda: 0.3176,
            k: 0.134,
            h: 0.4012,
        }
    }
}

/// Read-only scoring configuration. Constructed once, never mutated, and
/// passed by reference into the score matrix and the alignment engine.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Background residue probabilities
    pub background: [f64; NUM_RESIDUES],
    /// Reference extreme-value parameters
    pub reference: ReferenceParams,
    /// Weight of the deletion-open probability in the gap cost discount
    pub deletion_coefficient: f64,
    /// Columns below this information content have their score
    /// contribution discounted after traceback
    pub information_threshold: f64,
    /// Longest profile accepted at construction
    pub max_profile_length: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        ScoreConfig {
            background: AMINO_BACKGROUND_FREQUENCIES,
            reference: ReferenceParams::default(),
            deletion_coefficient: 0.6,
            information_threshold: 0.17,
            max_profile_length: Profile::MAX_LENGTH,
        }
    }
}

pub mod profile;
pub use profile::Profile;

pub mod gap_model;
pub use gap_model::GapModel;

pub mod profile_file;

use thiserror::Error;

/// Construction-time input failures. Always fatal to the one pairwise
/// attempt; callers are expected to skip the pair and continue.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("profile has no columns")]
    EmptyProfile,
    #[error("profile length {length} exceeds the maximum of {max}")]
    ProfileTooLong { length: usize, max: usize },
    #[error("{what} disagree on length: {left} vs {right}")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },
    #[error("residue code {code} at column {column} is out of the alphabet")]
    BadResidue { code: u8, column: usize },
}

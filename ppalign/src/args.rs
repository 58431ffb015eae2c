use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use libppalign::score::MaskPolicy;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("unknown mask policy: {policy} (expected none, ignore, or consider)")]
pub struct UnknownMaskPolicyError {
    policy: String,
}

/// CLI wrapper around [`MaskPolicy`] so the library stays free of
/// argument-parsing concerns.
#[derive(Debug, Clone, Copy)]
pub struct MaskPolicyArg(pub MaskPolicy);

impl FromStr for MaskPolicyArg {
    type Err = UnknownMaskPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(MaskPolicyArg(MaskPolicy::Unmasked)),
            "ignore" => Ok(MaskPolicyArg(MaskPolicy::MaskToIgnore)),
            "consider" => Ok(MaskPolicyArg(MaskPolicy::MaskToConsider)),
            _ => Err(UnknownMaskPolicyError {
                policy: s.to_string(),
            }),
        }
    }
}

#[derive(Parser)]
#[command(
    name = "ppalign",
    about = "Align two protein sequence profiles and report the statistical significance of the alignment",
    version
)]
pub struct Args {
    /// Query profile file
    pub query: PathBuf,
    /// Subject profile file
    pub subject: PathBuf,
    /// Align without gaps
    #[arg(long)]
    pub ungapped: bool,
    /// How masked profile columns enter statistics and alignment:
    /// none, ignore, or consider
    #[arg(long, default_value = "consider")]
    pub mask_policy: MaskPolicyArg,
    /// Columns below this information content have their score
    /// contribution discounted
    #[arg(long, default_value_t = 0.17)]
    pub info_threshold: f64,
    /// Weight of the deletion-open probability in the gap cost discount
    #[arg(long, default_value_t = 0.6)]
    pub deletion_coefficient: f64,
    /// Rescale the score matrix to this lambda before aligning
    #[arg(long)]
    pub target_lambda: Option<f64>,
    /// Print the result as JSON instead of the text report
    #[arg(long)]
    pub json: bool,
    /// Write the full score table to this file
    #[arg(long)]
    pub dump_matrix: Option<PathBuf>,
    /// Write the report to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_policy_parses() {
        assert!(matches!(
            "ignore".parse::<MaskPolicyArg>(),
            Ok(MaskPolicyArg(MaskPolicy::MaskToIgnore))
        ));
        assert!("bogus".parse::<MaskPolicyArg>().is_err());
    }

    #[test]
    fn test_args_parse_defaults() {
        let args = Args::parse_from(["ppalign", "query.pro", "subject.pro"]);
        assert!(!args.ungapped);
        assert!(!args.json);
        assert!(matches!(
            args.mask_policy,
            MaskPolicyArg(MaskPolicy::MaskToConsider)
        ));
        assert_eq!(args.info_threshold, 0.17);
    }
}

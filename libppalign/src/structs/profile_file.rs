use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::alphabet::{ALPHABET_SIZE, GAP_CODE, UTF8_TO_DIGITAL_AMINO};
use crate::structs::{GapModel, Profile};

// flags of the line-oriented profile text format
const FLAG_NAME: &str = "NAME";
const FLAG_LENGTH: &str = "LENG";
const FLAG_DESCRIPTION: &str = "DESC";
const FLAG_COLUMN: &str = "COL";
const FLAG_FREQUENCIES: &str = "FREQ";
const FLAG_SCORES: &str = "SCORE";
const FLAG_INFORMATION: &str = "INFO";
const FLAG_THICKNESS: &str = "THCK";
const FLAG_MASK: &str = "MASK";
const FLAG_GAP: &str = "GAP";
const FLAG_END: &str = "//";

// this static regex is used to find float strings
lazy_static! {
    static ref FLOAT_RE: Regex = Regex::new(r"-?\d+\.?\d*(?:[eE][+-]?\d+)?").unwrap();
}

/// An Error that is thrown when an unknown flag is found
/// when parsing a profile file
#[derive(Error, Debug)]
#[error("unknown profile flag: {flag}")]
struct UnknownFlagError {
    flag: String,
}

/// An Error that is thrown when a token parsing function
/// recognizes that the token vector index is out of bounds.
#[derive(Error, Debug)]
#[error("token index out of bounds")]
struct TokenIndexError;

/// An Error that is thrown when a token parsing function
/// fails to find a float-like substring.
#[derive(Error, Debug)]
#[error("unable to find a float-like substring")]
struct FloatRegexError;

fn parse_float(tokens: &[&str], idx: usize) -> Result<f64> {
    let token = tokens.get(idx).ok_or(TokenIndexError)?;
    let matched = FLOAT_RE.find(token).ok_or(FloatRegexError)?;
    matched
        .as_str()
        .parse::<f64>()
        .context(format!("failed to parse float: {token}"))
}

fn parse_usize(tokens: &[&str], idx: usize) -> Result<usize> {
    let token = tokens.get(idx).ok_or(TokenIndexError)?;
    token
        .parse::<usize>()
        .context(format!("failed to parse integer: {token}"))
}

fn parse_vector(tokens: &[&str], count: usize) -> Result<Vec<f64>> {
    (1..=count).map(|idx| parse_float(tokens, idx)).collect()
}

/// Reads one profile and its gap model from a plain-text profile file.
pub fn read_profile(path: &impl AsRef<Path>) -> Result<(Profile, GapModel)> {
    let file = File::open(path).context(format!(
        "failed to open profile file: {}",
        path.as_ref().to_string_lossy()
    ))?;
    parse_profile(BufReader::new(file)).context(format!(
        "failed to parse profile file: {}",
        path.as_ref().to_string_lossy()
    ))
}

/// Parses the line-oriented profile text format: a NAME/LENG header
/// followed by per-column COL/FREQ/SCORE/INFO/THCK/MASK/GAP records and a
/// terminating `//`. Columns without GAP records fall back to a fixed-cost
/// gap model.
pub fn parse_profile(reader: impl BufRead) -> Result<(Profile, GapModel)> {
    let mut name = String::new();
    let mut declared_length: Option<usize> = None;

    let mut residues: Vec<u8> = vec![];
    let mut frequencies: Vec<[f64; ALPHABET_SIZE]> = vec![];
    let mut scores: Vec<[f64; ALPHABET_SIZE]> = vec![];
    let mut information: Vec<f64> = vec![];
    let mut thickness: Vec<usize> = vec![];
    let mut masked: Vec<bool> = vec![];

    let mut insertion: Vec<f64> = vec![];
    let mut delete_open: Vec<f64> = vec![];
    let mut delete_extend: Vec<f64> = vec![];
    let mut open_costs: Vec<f64> = vec![];
    let mut extend_costs: Vec<f64> = vec![];

    let mut terminated = false;

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&flag) = tokens.first() else {
            continue;
        };

        let result: Result<()> = (|| {
            match flag {
                FLAG_NAME => {
                    name = tokens.get(1).ok_or(TokenIndexError)?.to_string();
                }
                FLAG_LENGTH => {
                    declared_length = Some(parse_usize(&tokens, 1)?);
                }
                FLAG_DESCRIPTION => {
                    // descriptions are carried by the surrounding tools
                }
                FLAG_COLUMN => {
                    let index = parse_usize(&tokens, 1)?;
                    if index != residues.len() + 1 {
                        return Err(anyhow!(
                            "column index {index} out of order (expected {})",
                            residues.len() + 1
                        ));
                    }
                    let residue = tokens.get(2).ok_or(TokenIndexError)?;
                    let code = residue
                        .bytes()
                        .next()
                        .and_then(|b| UTF8_TO_DIGITAL_AMINO.get(&b).copied())
                        .unwrap_or(GAP_CODE);
                    residues.push(code);
                }
                FLAG_FREQUENCIES => {
                    let values = parse_vector(&tokens, ALPHABET_SIZE)?;
                    let mut column = [0.0; ALPHABET_SIZE];
                    column.copy_from_slice(&values);
                    frequencies.push(column);
                }
                FLAG_SCORES => {
                    let values = parse_vector(&tokens, ALPHABET_SIZE)?;
                    let mut column = [0.0; ALPHABET_SIZE];
                    column.copy_from_slice(&values);
                    scores.push(column);
                }
                FLAG_INFORMATION => {
                    information.push(parse_float(&tokens, 1)?);
                }
                FLAG_THICKNESS => {
                    thickness.push(parse_usize(&tokens, 1)?);
                }
                FLAG_MASK => {
                    masked.push(parse_usize(&tokens, 1)? != 0);
                }
                FLAG_GAP => {
                    insertion.push(parse_float(&tokens, 1)?);
                    delete_open.push(parse_float(&tokens, 2)?);
                    delete_extend.push(parse_float(&tokens, 3)?);
                    open_costs.push(parse_float(&tokens, 4)?);
                    extend_costs.push(parse_float(&tokens, 5)?);
                }
                FLAG_END => {
                    terminated = true;
                }
                _ => {
                    return Err(UnknownFlagError {
                        flag: flag.to_string(),
                    }
                    .into());
                }
            }
            Ok(())
        })();

        result.context(format!("at line {}", line_number + 1))?;

        if terminated {
            break;
        }
    }

    if !terminated {
        return Err(anyhow!("profile record is missing its terminating //"));
    }

    if let Some(declared) = declared_length {
        if declared != residues.len() {
            return Err(anyhow!(
                "LENG declares {declared} columns but {} were read",
                residues.len()
            ));
        }
    }

    let length = residues.len();
    let profile = Profile::new(
        name,
        residues,
        frequencies,
        scores,
        information,
        thickness,
        masked,
    )?;

    let gap_model = if insertion.is_empty() {
        GapModel::fixed(
            length,
            GapModel::DEFAULT_OPEN_COST,
            GapModel::DEFAULT_EXTEND_COST,
        )
    } else {
        GapModel::new(
            insertion,
            delete_open,
            delete_extend,
            open_costs,
            extend_costs,
        )?
    };

    if gap_model.len() != profile.len() {
        return Err(anyhow!(
            "profile has {} columns but {} GAP records",
            profile.len(),
            gap_model.len()
        ));
    }

    Ok((profile, gap_model))
}

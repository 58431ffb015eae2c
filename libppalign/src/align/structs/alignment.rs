use std::cmp::min;

use serde::Serialize;

use crate::alphabet::{UTF8_PLUS, UTF8_SPACE};
use crate::stats::Significance;

/// One step of the alignment path: paired one-based column indices into
/// the query and subject profiles. A repeated index between neighboring
/// steps marks a gap column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PathStep {
    pub query_idx: usize,
    pub subject_idx: usize,
}

/// The reported outcome of one pairwise profile alignment.
#[derive(Debug, Clone, Serialize)]
pub struct Alignment {
    /// The name of the query profile
    pub query_name: String,
    /// The name of the subject profile
    pub subject_name: String,
    /// The length of the query profile
    pub query_length: usize,
    /// The length of the subject profile
    pub subject_length: usize,
    /// Path from alignment start to end
    pub path: Vec<PathStep>,
    /// Number of alignment columns
    pub length: usize,
    /// Final score after post-processing, in the original score scale
    pub score: f64,
    /// DP maximum before post-processing
    pub raw_score: f64,
    /// Significance of the final score
    pub significance: Significance,
    /// Number of identical aligned residue pairs
    pub identities: usize,
    /// Number of positively scoring aligned pairs
    pub positives: usize,
    /// Number of gap columns
    pub gaps: usize,
    /// The display for the query portion of the alignment
    pub query_string: String,
    /// The display in between the query and subject
    pub middle_string: String,
    /// The display for the subject portion of the alignment
    pub subject_string: String,
}

/// This selects the proper character for the middle line of the alignment
/// reporting.
pub(crate) fn select_middle_character(query_byte: u8, subject_byte: u8, pair_score: f64) -> u8 {
    if query_byte == subject_byte {
        query_byte
    } else if pair_score > 0.0 {
        UTF8_PLUS
    } else {
        UTF8_SPACE
    }
}

impl Alignment {
    const BLOCK_WIDTH: usize = 60;

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Fraction helper for the identity/positive/gap summary line.
    fn percentage(&self, count: usize) -> usize {
        count * 100 / self.length
    }

    /// A human-readable report in the classical pairwise search layout:
    /// score and significance lines followed by 60-column alignment
    /// blocks.
    pub fn report(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!(
            "  Query: {}, length = {}\n  Sbjct: {}, length = {}\n\n",
            self.query_name, self.query_length, self.subject_name, self.subject_length
        ));

        if self.is_empty() {
            out.push_str(" No significant alignment found.\n");
            return out;
        }

        match self.significance.bit_score {
            Some(bits) => out.push_str(&format!(
                " Score = {:.2} ({:.1} bits),",
                self.score, bits
            )),
            None => out.push_str(&format!(" Score = {:.2},", self.score)),
        }
        match (self.significance.e_value, self.significance.p_value) {
            (Some(e_value), Some(p)) => {
                out.push_str(&format!("  Expect = {:.2e}, P-value = {:.2e}\n", e_value, p))
            }
            _ => out.push_str(&format!(
                "  Expect = {:.2e} (reference), P-value = n/a\n",
                self.significance.reference_e_value
            )),
        }

        out.push_str(&format!(
            " Identities = {}/{} ({}%), Positives = {}/{} ({}%), Gaps = {}/{} ({}%)\n\n",
            self.identities,
            self.length,
            self.percentage(self.identities),
            self.positives,
            self.length,
            self.percentage(self.positives),
            self.gaps,
            self.length,
            self.percentage(self.gaps),
        ));

        let mut start = 0;
        while start < self.length {
            let end = min(start + Self::BLOCK_WIDTH, self.length);

            out.push_str(&format!(
                "Query: {:5} {} {:<5}\n",
                self.path[start].query_idx,
                &self.query_string[start..end],
                self.path[end - 1].query_idx
            ));
            out.push_str(&format!("       {:5} {}\n", "", &self.middle_string[start..end]));
            out.push_str(&format!(
                "Sbjct: {:5} {} {:<5}\n\n",
                self.path[start].subject_idx,
                &self.subject_string[start..end],
                self.path[end - 1].subject_idx
            ));

            start = end;
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::UTF8_DASH;

    fn stub_alignment() -> Alignment {
        Alignment {
            query_name: "q".to_string(),
            subject_name: "s".to_string(),
            query_length: 3,
            subject_length: 3,
            path: vec![
                PathStep {
                    query_idx: 1,
                    subject_idx: 1,
                },
                PathStep {
                    query_idx: 2,
                    subject_idx: 2,
                },
                PathStep {
                    query_idx: 3,
                    subject_idx: 3,
                },
            ],
            length: 3,
            score: 6.5,
            raw_score: 6.5,
            significance: Significance::unavailable(0.5),
            identities: 3,
            positives: 0,
            gaps: 0,
            query_string: "ARN".to_string(),
            middle_string: "ARN".to_string(),
            subject_string: "ARN".to_string(),
        }
    }

    #[test]
    fn test_middle_character_selection() {
        assert_eq!(select_middle_character(b'A', b'A', -1.0), b'A');
        assert_eq!(select_middle_character(b'A', b'R', 1.0), UTF8_PLUS);
        assert_eq!(select_middle_character(b'A', b'R', 0.0), UTF8_SPACE);
        assert_eq!(select_middle_character(b'A', UTF8_DASH, 1.0), UTF8_PLUS);
    }

    #[test]
    fn test_report_contains_coordinates_and_strings() {
        let alignment = stub_alignment();
        let report = alignment.report();

        assert!(report.contains("Query:     1 ARN 3"));
        assert!(report.contains("Sbjct:     1 ARN 3"));
        assert!(report.contains("Identities = 3/3 (100%)"));
        assert!(report.contains("P-value = n/a"));
    }

    #[test]
    fn test_empty_alignment_report() {
        let mut alignment = stub_alignment();
        alignment.path.clear();
        alignment.length = 0;
        alignment.score = 0.0;

        assert!(alignment.is_empty());
        assert!(alignment.report().contains("No significant alignment"));
    }

    #[test]
    fn test_alignment_serializes_to_json() {
        let alignment = stub_alignment();
        let json = serde_json::to_string(&alignment).unwrap();

        assert!(json.contains("\"score\":6.5"));
        assert!(json.contains("\"reference_e_value\":0.5"));
        assert!(json.contains("\"query_idx\":1"));
    }
}

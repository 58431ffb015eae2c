use crate::alphabet::{UTF8_DASH, UTF8_SPACE};
use crate::score::{ScoreConfig, ScoreMatrix};
use crate::stats::compute_significance;
use crate::structs::{DataError, GapModel, Profile};

use super::structs::{select_middle_character, Alignment, Direction, DpMatrix, PathStep, State};

/// Gap transition score in ungapped mode.
const SCORE_MIN: f64 = f64::NEG_INFINITY;

/// Computes the locally optimal gapped alignment between two profiles
/// under a score matrix and two position-specific gap-cost models.
///
/// One engine instance processes exactly one profile pair and owns its DP
/// matrix and path buffer, both sized at construction; independent pairs
/// can run on independent instances with no shared mutable state.
pub struct AlignmentEngine<'a> {
    query: &'a Profile,
    query_gaps: &'a GapModel,
    subject: &'a Profile,
    subject_gaps: &'a GapModel,
    matrix: &'a ScoreMatrix,
    config: &'a ScoreConfig,
    /// Align without gaps: every gap transition costs `SCORE_MIN`
    ungapped: bool,
    dp: DpMatrix,
    /// Traceback cells from the alignment end down to the zero
    /// predecessor
    trace: Vec<PathStep>,
    aln_score: f64,
    aln_steps: usize,
}

impl<'a> AlignmentEngine<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        query: &'a Profile,
        query_gaps: &'a GapModel,
        subject: &'a Profile,
        subject_gaps: &'a GapModel,
        matrix: &'a ScoreMatrix,
        config: &'a ScoreConfig,
        ungapped: bool,
    ) -> Result<Self, DataError> {
        for profile in [query, subject] {
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

        for (what, profile, gaps) in [
            ("query profile and gap model", query, query_gaps),
            ("subject profile and gap model", subject, subject_gaps),
        ] {
            if profile.len() != gaps.len() {
                return Err(DataError::LengthMismatch {
                    what,
                    left: profile.len(),
                    right: gaps.len(),
                });
            }
        }

        if matrix.subject_length() != subject.len() {
            return Err(DataError::LengthMismatch {
                what: "score matrix and subject profile",
                left: matrix.subject_length(),
                right: subject.len(),
            });
        }
        if matrix.query_length() != query.len() {
            return Err(DataError::LengthMismatch {
                what: "score matrix and query profile",
                left: matrix.query_length(),
                right: query.len(),
            });
        }

        Ok(AlignmentEngine {
            query,
            query_gaps,
            subject,
            subject_gaps,
            matrix,
            config,
            ungapped,
            dp: DpMatrix::new(subject.len(), query.len()),
            trace: Vec::with_capacity(subject.len() + query.len() + 1),
            aln_score: 0.0,
            aln_steps: 0,
        })
    }

    /// Runs all steps of one pairwise comparison: fill the DP matrix,
    /// trace the optimal path, apply the information-content adjustment,
    /// and attach the significance of the final score.
    pub fn run(&mut self) -> Alignment {
        self.init();
        self.fill();
        self.trace_path();
        self.adjust_information();
        self.build_alignment()
    }

    fn init(&mut self) {
        self.dp.reset();
        self.trace.clear();
        self.aln_score = 0.0;
        self.aln_steps = 0;
    }

    /// The three-state recurrence with position-specific gap costs. A gap
    /// step pays the gap-receiving profile's own open/extend cost,
    /// discounted by how strongly the other profile favors an insertion
    /// and this profile a deletion at the aligned position. Every state is
    /// floored at zero with its direction cleared.
    fn fill(&mut self) {
        let coefficient = self.config.deletion_coefficient;
        let fixed_costs = self.query_gaps.is_fixed() || self.subject_gaps.is_fixed();

        // gap extension times, reset whenever an opening wins
        let mut extend_time_up = 0usize;
        let mut extend_time_left = 0usize;

        for n in 1..=self.query.len() {
            let mut best_a = self.dp.get(0, n, State::Align);
            let mut current_a = self.dp.get(0, n - 1, State::Align);
            let mut best_u = self.dp.get(0, n, State::GapInQuery);
            let mut current_l = self.dp.get(0, n - 1, State::GapInSubject);

            for m in 1..=self.subject.len() {
                let pair_score = self.matrix.get(m - 1, n - 1);

                // gap opening against the query: the subject advances
                let mut up_open = best_a;
                if self.ungapped {
                    up_open += SCORE_MIN;
                } else if fixed_costs {
                    up_open += self.query_gaps.open_at(n - 1);
                } else {
                    let adjust = self.subject_gaps.insertion_prob_at(m - 1)
                        + self.query_gaps.delete_open_prob_at(n - 1) * coefficient;
                    up_open += self.query_gaps.open_at(n - 1) * (1.0 - adjust.min(1.0));
                }

                let a = current_a;
                current_a = self.dp.get(m, n - 1, State::Align);

                // gap opening against the subject: the query advances
                let mut left_open = current_a;
                if self.ungapped {
                    left_open += SCORE_MIN;
                } else if fixed_costs {
                    left_open += self.subject_gaps.open_at(m - 1);
                } else {
                    let adjust = self.query_gaps.insertion_prob_at(n - 1)
                        + self.subject_gaps.delete_open_prob_at(m - 1) * coefficient;
                    left_open += self.subject_gaps.open_at(m - 1) * (1.0 - adjust.min(1.0));
                }

                let l = current_l;
                current_l = self.dp.get(m, n - 1, State::GapInSubject);

                let mut left_extend = current_l;
                if self.ungapped {
                    left_extend += SCORE_MIN;
                } else if fixed_costs {
                    left_extend += self.subject_gaps.extend_at(m - 1);
                } else {
                    let adjust = self.query_gaps.insertion_prob_at(n - 1)
                        + self
                            .subject_gaps
                            .delete_extend_prob_at(m - 1, extend_time_left)
                            * coefficient;
                    left_extend += self.subject_gaps.extend_at(m - 1) * (1.0 - adjust.min(1.0));
                }

                let mut up_extend = best_u;
                if self.ungapped {
                    up_extend += SCORE_MIN;
                } else if fixed_costs {
                    up_extend += self.query_gaps.extend_at(n - 1);
                } else {
                    let adjust = self.subject_gaps.insertion_prob_at(m - 1)
                        + self.query_gaps.delete_extend_prob_at(n - 1, extend_time_up)
                            * coefficient;
                    up_extend += self.query_gaps.extend_at(n - 1) * (1.0 - adjust.min(1.0));
                }

                let u = self.dp.get(m - 1, n - 1, State::GapInQuery);

                // GapInQuery state
                let direction;
                if up_open > up_extend {
                    extend_time_up = 0;
                    best_u = up_open;
                    direction = Direction::Diag;
                } else if up_open < up_extend {
                    extend_time_up += 1;
                    best_u = up_extend;
                    direction = Direction::Up;
                } else {
                    extend_time_up = 0;
                    best_u = up_open;
                    direction = Direction::DiagUp;
                }
                if best_u > 0.0 {
                    self.dp.set(m, n, State::GapInQuery, best_u);
                    self.dp.set_direction(m, n, State::GapInQuery, direction);
                } else {
                    best_u = 0.0;
                    self.dp.set_direction(m, n, State::GapInQuery, Direction::None);
                }

                // GapInSubject state
                let direction;
                let best_l;
                if left_open > left_extend {
                    extend_time_left = 0;
                    best_l = left_open;
                    direction = Direction::Diag;
                } else if left_open < left_extend {
                    extend_time_left += 1;
                    best_l = left_extend;
                    direction = Direction::Left;
                } else {
                    extend_time_left = 0;
                    best_l = left_open;
                    direction = Direction::DiagLeft;
                }
                if best_l > 0.0 {
                    self.dp.set(m, n, State::GapInSubject, best_l);
                    self.dp.set_direction(m, n, State::GapInSubject, direction);
                } else {
                    self.dp.set_direction(m, n, State::GapInSubject, Direction::None);
                }

                // Align state, from any of the three states at the
                // diagonal predecessor; the direction keeps every tied
                // incoming state
                let direction;
                if a > u {
                    if a > l {
                        best_a = a;
                        direction = Direction::Diag;
                    } else if a < l {
                        best_a = l;
                        direction = Direction::Left;
                    } else {
                        best_a = a;
                        direction = Direction::DiagLeft;
                    }
                } else if a < u {
                    if u > l {
                        best_a = u;
                        direction = Direction::Up;
                    } else if u < l {
                        best_a = l;
                        direction = Direction::Left;
                    } else {
                        best_a = u;
                        direction = Direction::UpLeft;
                    }
                } else if a > l {
                    best_a = a;
                    direction = Direction::DiagUp;
                } else if a < l {
                    best_a = l;
                    direction = Direction::Left;
                } else {
                    best_a = a;
                    direction = Direction::All;
                }

                best_a += pair_score;
                if best_a > 0.0 {
                    self.dp.set(m, n, State::Align, best_a);
                    self.dp.set_direction(m, n, State::Align, direction);
                } else {
                    best_a = 0.0;
                    self.dp.set_direction(m, n, State::Align, Direction::None);
                }
            }
        }
    }

    /// Locates the globally maximum Align-state score, preferring the most
    /// distant cell on ties, and walks the stored directions back to a
    /// cell with no predecessor. An empty path is left when the maximum is
    /// not positive.
    fn trace_path(&mut self) {
        let mut score = 0.0;
        let mut row = 0;
        let mut column = 0;

        // alignments cannot end in a gap state, so only Align is scanned
        for m in (1..=self.subject.len()).rev() {
            for n in (1..=self.query.len()).rev() {
                let value = self.dp.get(m, n, State::Align);
                if score < value {
                    score = value;
                    row = m;
                    column = n;
                }
            }
        }

        if score <= 0.0 {
            return;
        }

        self.trace.push(PathStep {
            query_idx: column,
            subject_idx: row,
        });

        let mut state = State::Align;
        while row > 0 && column > 0 {
            let Some(previous_state) = self.dp.direction(row, column, state).state() else {
                break;
            };
            match state {
                State::Align => {
                    row -= 1;
                    column -= 1;
                }
                State::GapInQuery => row -= 1,
                State::GapInSubject => column -= 1,
            }
            self.trace.push(PathStep {
                query_idx: column,
                subject_idx: row,
            });
            state = previous_state;
        }

        self.aln_score = score;
        // the last recorded cell is the zero predecessor, not a column
        self.aln_steps = self.trace.len() - 1;
    }

    /// The information-content adjustment: every aligned column pair where
    /// either partner falls below the configured threshold has its score
    /// contribution subtracted from the total. A final score that drops to
    /// zero clears the path, reporting the alignment as empty.
    fn adjust_information(&mut self) {
        let threshold = self.config.information_threshold;

        let mut query_pos: Option<usize> = None;
        let mut subject_pos: Option<usize> = None;
        let mut gap = false;

        for step in (0..self.aln_steps).rev() {
            let current = self.trace[step];

            if step + 1 < self.aln_steps && current.query_idx == self.trace[step + 1].query_idx {
                gap = true;
            } else {
                query_pos = Some(current.query_idx - 1);
            }
            if step + 1 < self.aln_steps && current.subject_idx == self.trace[step + 1].subject_idx
            {
                gap = true;
            } else {
                subject_pos = Some(current.subject_idx - 1);
            }

            if gap {
                gap = false;
                continue;
            }

            let (Some(q), Some(s)) = (query_pos, subject_pos) else {
                continue;
            };

            if self.query.information_at(q) < threshold
                || self.subject.information_at(s) < threshold
            {
                self.subtract_score(self.matrix.get(s, q));
            }
        }

        if self.aln_score <= 0.0 {
            self.trace.clear();
            self.aln_steps = 0;
            self.aln_score = 0.0;
        }
    }

    fn subtract_score(&mut self, value: f64) {
        if value <= 0.0 {
            return;
        }
        if self.aln_score - value < 0.0 {
            return;
        }
        self.aln_score -= value;
    }

    fn build_alignment(&self) -> Alignment {
        let steps = self.aln_steps;

        let significance = compute_significance(
            self.aln_score,
            self.matrix.params(),
            self.subject.len(),
            self.query.len(),
        );

        let mut path = Vec::with_capacity(steps);
        let mut query_bytes = Vec::with_capacity(steps);
        let mut middle_bytes = Vec::with_capacity(steps);
        let mut subject_bytes = Vec::with_capacity(steps);

        let mut identities = 0;
        let mut positives = 0;
        let mut gaps = 0;

        for step in (0..steps).rev() {
            let current = self.trace[step];
            path.push(current);

            let query_byte = if step + 1 < steps
                && current.query_idx == self.trace[step + 1].query_idx
            {
                None
            } else {
                Some(self.query.utf8_at(current.query_idx - 1))
            };
            let subject_byte = if step + 1 < steps
                && current.subject_idx == self.trace[step + 1].subject_idx
            {
                None
            } else {
                Some(self.subject.utf8_at(current.subject_idx - 1))
            };

            match (query_byte, subject_byte) {
                (Some(q), Some(s)) => {
                    let pair_score = self
                        .matrix
                        .get(current.subject_idx - 1, current.query_idx - 1);

                    query_bytes.push(q);
                    subject_bytes.push(s);
                    middle_bytes.push(select_middle_character(q, s, pair_score));

                    if q == s {
                        identities += 1;
                    } else if pair_score > 0.0 {
                        positives += 1;
                    }
                }
                (query_byte, subject_byte) => {
                    query_bytes.push(query_byte.unwrap_or(UTF8_DASH));
                    subject_bytes.push(subject_byte.unwrap_or(UTF8_DASH));
                    middle_bytes.push(UTF8_SPACE);
                    gaps += 1;
                }
            }
        }

        Alignment {
            query_name: self.query.name.clone(),
            subject_name: self.subject.name.clone(),
            query_length: self.query.len(),
            subject_length: self.subject.len(),
            path,
            length: steps,
            score: self.matrix.final_score(self.aln_score),
            raw_score: self.aln_score,
            significance,
            identities,
            positives,
            gaps,
            query_string: String::from_utf8_lossy(&query_bytes).into_owned(),
            middle_string: String::from_utf8_lossy(&middle_bytes).into_owned(),
            subject_string: String::from_utf8_lossy(&subject_bytes).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::{ALPHABET_SIZE, NUM_RESIDUES};
    use crate::score::MaskPolicy;
    use assert2::let_assert;

    fn test_profile(name: &str, length: usize, information: f64) -> Profile {
        Profile::new(
            name.to_string(),
            (0..length).map(|i| (i % NUM_RESIDUES) as u8).collect(),
            vec![[1.0 / ALPHABET_SIZE as f64; ALPHABET_SIZE]; length],
            vec![[0.0; ALPHABET_SIZE]; length],
            vec![information; length],
            vec![1; length],
            vec![false; length],
        )
        .unwrap()
    }

    fn diagonal_matrix(length: usize, diagonal_score: f64, config: &ScoreConfig) -> ScoreMatrix {
        let mut scores = vec![0.0; length * length];
        for i in 0..length {
            scores[i * length + i] = diagonal_score;
        }
        ScoreMatrix::from_parts(
            length,
            length,
            scores,
            vec![MaskPolicy::Unmasked; length * length],
            config,
        )
    }

    #[test]
    fn test_mismatched_gap_model_is_rejected() {
        let config = ScoreConfig::default();
        let profile = test_profile("p", 4, 1.0);
        let gaps = GapModel::fixed(4, -4.0, -1.0);
        let short_gaps = GapModel::fixed(3, -4.0, -1.0);
        let matrix = diagonal_matrix(4, 2.0, &config);

        let result = AlignmentEngine::new(
            &profile,
            &short_gaps,
            &profile,
            &gaps,
            &matrix,
            &config,
            false,
        );
        let_assert!(Err(DataError::LengthMismatch { .. }) = result);
    }

    #[test]
    fn test_mismatched_matrix_is_rejected() {
        let config = ScoreConfig::default();
        let profile = test_profile("p", 4, 1.0);
        let gaps = GapModel::fixed(4, -4.0, -1.0);
        let matrix = diagonal_matrix(3, 2.0, &config);

        let result =
            AlignmentEngine::new(&profile, &gaps, &profile, &gaps, &matrix, &config, false);
        let_assert!(Err(DataError::LengthMismatch { .. }) = result);
    }

    #[test]
    fn test_identical_profiles_align_along_the_diagonal() {
        let config = ScoreConfig::default();
        let profile = test_profile("ident", 10, 1.0);
        let gaps = GapModel::fixed(10, -4.0, -1.0);
        let matrix = diagonal_matrix(10, 2.0, &config);

        let mut engine =
            AlignmentEngine::new(&profile, &gaps, &profile, &gaps, &matrix, &config, false)
                .unwrap();
        let alignment = engine.run();

        assert_eq!(alignment.length, 10);
        assert_eq!(alignment.gaps, 0);
        assert_eq!(alignment.raw_score, 20.0);
        assert_eq!(alignment.identities, 10);
        for (i, step) in alignment.path.iter().enumerate() {
            assert_eq!(step.query_idx, i + 1);
            assert_eq!(step.subject_idx, i + 1);
        }
    }

    #[test]
    fn test_zero_information_profiles_produce_an_empty_alignment() {
        let config = ScoreConfig::default();
        let profile = test_profile("flat", 10, 0.0);
        let gaps = GapModel::fixed(10, -4.0, -1.0);
        let matrix = diagonal_matrix(10, 2.0, &config);

        let mut engine =
            AlignmentEngine::new(&profile, &gaps, &profile, &gaps, &matrix, &config, false)
                .unwrap();
        let alignment = engine.run();

        assert!(alignment.is_empty());
        assert!(alignment.path.is_empty());
        assert_eq!(alignment.score, 0.0);
    }

    /// A 2x3 score table where the best gapped path crosses a cheap gap
    /// and beats the best ungapped path.
    fn crooked_matrix(config: &ScoreConfig) -> ScoreMatrix {
        ScoreMatrix::from_parts(
            2,
            3,
            vec![5.0, 0.0, 0.0, 0.0, 0.0, 5.0],
            vec![MaskPolicy::Unmasked; 6],
            config,
        )
    }

    #[test]
    fn test_ungapped_mode_forbids_gap_columns() {
        let config = ScoreConfig::default();
        let query = test_profile("q", 3, 1.0);
        let subject = test_profile("s", 2, 1.0);
        let query_gaps = GapModel::fixed(3, -0.5, -0.5);
        let subject_gaps = GapModel::fixed(2, -0.5, -0.5);
        let matrix = crooked_matrix(&config);

        let mut gapped = AlignmentEngine::new(
            &query,
            &query_gaps,
            &subject,
            &subject_gaps,
            &matrix,
            &config,
            false,
        )
        .unwrap();
        let gapped_alignment = gapped.run();
        assert_eq!(gapped_alignment.gaps, 1);
        assert_eq!(gapped_alignment.raw_score, 9.5);

        let mut ungapped = AlignmentEngine::new(
            &query,
            &query_gaps,
            &subject,
            &subject_gaps,
            &matrix,
            &config,
            true,
        )
        .unwrap();
        let ungapped_alignment = ungapped.run();

        assert_eq!(ungapped_alignment.gaps, 0);
        assert_eq!(ungapped_alignment.raw_score, 5.0);
        for pair in ungapped_alignment.path.windows(2) {
            assert_eq!(pair[1].query_idx, pair[0].query_idx + 1);
            assert_eq!(pair[1].subject_idx, pair[0].subject_idx + 1);
        }
    }

    #[test]
    fn test_no_dp_state_is_ever_negative() {
        let config = ScoreConfig::default();
        let query = Profile::random_seeded("q", 30, 7);
        let subject = Profile::random_seeded("s", 25, 8);
        let query_gaps = GapModel::fixed(30, -4.0, -1.0);
        let subject_gaps = GapModel::fixed(25, -4.0, -1.0);
        let matrix = ScoreMatrix::build(&subject, &query, MaskPolicy::Unmasked, &config).unwrap();

        let mut engine = AlignmentEngine::new(
            &query,
            &query_gaps,
            &subject,
            &subject_gaps,
            &matrix,
            &config,
            false,
        )
        .unwrap();
        engine.run();

        for m in 0..=subject.len() {
            for n in 0..=query.len() {
                for state in [State::Align, State::GapInQuery, State::GapInSubject] {
                    let value = engine.dp.get(m, n, state);
                    assert!(value >= 0.0, "negative DP score at ({m}, {n})");
                    if value == 0.0 && state == State::Align {
                        assert_eq!(engine.dp.direction(m, n, state), Direction::None);
                    }
                }
            }
        }
    }

    #[test]
    fn test_runs_are_deterministic() {
        let config = ScoreConfig::default();
        let query = Profile::random_seeded("q", 20, 11);
        let subject = Profile::random_seeded("s", 20, 12);
        let gaps = GapModel::fixed(20, -4.0, -1.0);
        let matrix = ScoreMatrix::build(&subject, &query, MaskPolicy::Unmasked, &config).unwrap();

        let mut first =
            AlignmentEngine::new(&query, &gaps, &subject, &gaps, &matrix, &config, false).unwrap();
        let mut second =
            AlignmentEngine::new(&query, &gaps, &subject, &gaps, &matrix, &config, false).unwrap();

        let a = first.run();
        let b = second.run();
        assert_eq!(a.raw_score, b.raw_score);
        assert_eq!(a.path, b.path);
    }

    #[test]
    fn test_raising_an_on_path_score_never_lowers_the_final_score() {
        let config = ScoreConfig::default();
        let query = test_profile("q", 3, 1.0);
        let subject = test_profile("s", 2, 1.0);
        let query_gaps = GapModel::fixed(3, -0.5, -0.5);
        let subject_gaps = GapModel::fixed(2, -0.5, -0.5);

        let matrix = crooked_matrix(&config);
        let mut engine = AlignmentEngine::new(
            &query,
            &query_gaps,
            &subject,
            &subject_gaps,
            &matrix,
            &config,
            false,
        )
        .unwrap();
        let before = engine.run();

        // bump the first aligned pair on the optimal path
        let step = before.path[0];
        let mut raised = crooked_matrix(&config);
        raised.set(
            step.subject_idx - 1,
            step.query_idx - 1,
            raised.get(step.subject_idx - 1, step.query_idx - 1) + 1.0,
        );

        let mut engine = AlignmentEngine::new(
            &query,
            &query_gaps,
            &subject,
            &subject_gaps,
            &raised,
            &config,
            false,
        )
        .unwrap();
        let after = engine.run();

        assert!(after.raw_score >= before.raw_score);
    }
}

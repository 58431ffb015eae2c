use serde::Serialize;

use crate::util::gcd;

use super::matrix::{MaskPolicy, ScoreMatrix};
use super::root::{find_root, DomainError, RootError};
use super::ReferenceParams;

/// Extreme-value parameters describing a score matrix under the
/// random-alignment null model. A negative lambda is the "unresolved"
/// sentinel; downstream consumers must check it rather than assume
/// convergence.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatisticalParams {
    /// Scale parameter of the score distribution
    pub lambda: f64,
    /// Karlin's constant
    pub k: f64,
    /// Relative entropy per aligned column pair
    pub h: f64,
    /// Expected score per column pair
    pub expected_score: f64,
    /// Accumulated score multiplier applied by rescaling
    pub multiplier: f64,
    /// Reference parameters used for rescaling and fallback expectations
    pub reference: ReferenceParams,
}

impl StatisticalParams {
    pub const UNRESOLVED: f64 = -1.0;

    pub fn new(reference: ReferenceParams) -> Self {
        StatisticalParams {
            lambda: Self::UNRESOLVED,
            k: Self::UNRESOLVED,
            h: Self::UNRESOLVED,
            expected_score: 0.0,
            multiplier: 1.0,
            reference,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.lambda > 0.0 && self.k > 0.0
    }
}

/// An integer-binned score distribution over the lattice of multiples of
/// `lattice_unit` (in real score units), reduced by the greatest common
/// divisor of the binned scores.
struct ScoreDistribution {
    /// Probability of each lattice score; index 0 corresponds to `min_score`
    probabilities: Vec<f64>,
    /// Lowest lattice score with support
    min_score: i64,
    /// Highest lattice score with support
    max_score: i64,
    /// Real score units per lattice step
    lattice_unit: f64,
}

impl ScoreDistribution {
    /// Lattice steps per unit of real score before gcd reduction.
    const LATTICE_SCALE: f64 = 2.0;
    /// Widest supported lattice span.
    const MAX_RANGE: i64 = 4096;

    fn from_scores(scores: impl Iterator<Item = f64>) -> Result<Self, DomainError> {
        let binned: Vec<i64> = scores
            .map(|s| (s * Self::LATTICE_SCALE).round() as i64)
            .collect();

        if binned.is_empty() {
            return Err(DomainError::OutOfDomain {
                what: "no unmasked scores to bin".to_string(),
            });
        }

        let mut step = 0;
        for &score in &binned {
            if score != 0 {
                step = gcd(step, score);
            }
        }
        if step == 0 {
            return Err(DomainError::OutOfDomain {
                what: "every score bins to zero".to_string(),
            });
        }

        let min_score = binned.iter().min().unwrap() / step;
        let max_score = binned.iter().max().unwrap() / step;

        if min_score >= 0 || max_score <= 0 {
            return Err(DomainError::OutOfDomain {
                what: "score distribution does not span zero".to_string(),
            });
        }
        if max_score - min_score > Self::MAX_RANGE {
            return Err(DomainError::OutOfDomain {
                what: "score range too wide for lattice statistics".to_string(),
            });
        }

        let mut probabilities = vec![0.0; (max_score - min_score + 1) as usize];
        for &score in &binned {
            probabilities[(score / step - min_score) as usize] += 1.0;
        }
        let total = binned.len() as f64;
        probabilities.iter_mut().for_each(|p| *p /= total);

        Ok(ScoreDistribution {
            probabilities,
            min_score,
            max_score,
            lattice_unit: step as f64 / Self::LATTICE_SCALE,
        })
    }

    fn mean(&self) -> f64 {
        self.probabilities
            .iter()
            .enumerate()
            .map(|(i, p)| p * (self.min_score + i as i64) as f64)
            .sum()
    }
}

/// The conservation equation of one lattice distribution, evaluated by
/// Horner's scheme in y = e^{-lambda}: the returned pair is the function
/// value and its derivative with respect to y. The root away from y = 1
/// satisfies sum p(s) e^{lambda s} = 1.
fn positional_conservation(probabilities: &[f64], min_score: i64, y: f64) -> (f64, f64) {
    let mut value = 0.0;
    let mut derivative = 0.0;

    for (i, &p) in probabilities.iter().enumerate() {
        let score = min_score + i as i64;
        derivative = derivative * y + value;
        value = value * y + p;
        // zero is always inside the support
        if score == 0 {
            value -= 1.0;
        }
    }

    (value, derivative)
}

/// Karlin's constant from a lattice distribution and the already-resolved
/// lambda and relative entropy (both in real score units):
///
///   K = lambda * e^{-2 sigma} / (H * (1 - e^{-lambda}))
///
/// with sigma the convolution series over powers of the distribution,
///
///   sigma = sum_j (1/j) * ( sum_{s<0} P_j(s) e^{lambda s} + sum_{s>=0} P_j(s) )
fn karlin_k_from_distribution(
    dist: &ScoreDistribution,
    lambda_real: f64,
    h_real: f64,
) -> Result<f64, DomainError> {
    const SUM_LIMIT: usize = 64;
    const TERM_EPSILON: f64 = 1e-5;

    let lambda = lambda_real * dist.lattice_unit;
    let entropy = h_real * dist.lattice_unit;

    if lambda <= 0.0 || entropy <= 0.0 {
        return Err(DomainError::OutOfDomain {
            what: "lambda and entropy must be positive to derive K".to_string(),
        });
    }

    let base = &dist.probabilities;
    let mut power = base.clone();
    let mut power_min = dist.min_score;
    let mut sigma = 0.0;

    for j in 1..=SUM_LIMIT {
        let mut term = 0.0;
        for (i, &p) in power.iter().enumerate() {
            if p == 0.0 {
                continue;
            }
            let score = power_min + i as i64;
            if score < 0 {
                term += p * (lambda * score as f64).exp();
            } else {
                term += p;
            }
        }

        sigma += term / j as f64;
        if term / (j as f64) < TERM_EPSILON {
            break;
        }
        if j < SUM_LIMIT {
            power = convolve(&power, base);
            power_min += dist.min_score;
        }
    }

    let k = lambda * (-2.0 * sigma).exp() / (entropy * (1.0 - (-lambda).exp()));

    if !k.is_finite() || k <= 0.0 {
        return Err(DomainError::OutOfDomain {
            what: "derived K is not a positive finite value".to_string(),
        });
    }

    Ok(k)
}

fn convolve(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

impl ScoreMatrix {
    pub const LAMBDA_ACCURACY: f64 = 1e-5;
    pub const MAX_ITERATIONS: usize = 100;
    pub const LAMBDA_UPPER_BOUND: f64 = 10.0;

    /// Scores that enter the statistics: cells masked to ignore and
    /// zero-valued scores never contribute to the sums.
    fn unmasked_scores(&self) -> impl Iterator<Item = f64> + '_ {
        self.scores
            .iter()
            .zip(self.masks.iter())
            .filter(|(&score, &mask)| mask != MaskPolicy::MaskToIgnore && score != 0.0)
            .map(|(&score, _)| score)
    }

    /// Estimates lambda, H, and K from the unmasked scores and commits them
    /// to the matrix parameters. On failure the parameters keep their
    /// unresolved sentinels (the expected score is recorded regardless) and
    /// the raw alignment score remains usable.
    pub fn compute_statistics(&mut self) -> Result<(), RootError> {
        let mut count = 0usize;
        let mut sum = 0.0;
        for score in self.unmasked_scores() {
            count += 1;
            sum += score;
        }
        if count == 0 {
            return Err(DomainError::OutOfDomain {
                what: "score matrix has no unmasked cells".to_string(),
            }
            .into());
        }
        self.params.expected_score = sum / count as f64;

        let lambda = self.compute_lambda()?;
        let h = self.entropy_given_lambda(lambda)?;
        if h < 0.0 {
            return Err(DomainError::OutOfDomain {
                what: format!("relative entropy {h} is negative"),
            }
            .into());
        }
        let k = self.karlin_k(lambda, h)?;

        self.params.lambda = lambda;
        self.params.h = h;
        self.params.k = k;
        Ok(())
    }

    /// Solves the conservation equation sum e^{lambda s} / N = 1 for
    /// lambda > 0 over the unmasked scores. Never returns an unvalidated
    /// guess: a missing positive root is a `DomainError`, a stalled search
    /// a `ConvergenceError`.
    pub fn compute_lambda(&self) -> Result<f64, RootError> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        for score in self.unmasked_scores() {
            count += 1;
            sum += score;
            max = max.max(score);
        }

        if count == 0 {
            return Err(DomainError::OutOfDomain {
                what: "score matrix has no unmasked cells".to_string(),
            }
            .into());
        }
        if sum / count as f64 >= 0.0 {
            return Err(DomainError::OutOfDomain {
                what: "expected score is non-negative; no positive root exists".to_string(),
            }
            .into());
        }
        if max <= 0.0 {
            return Err(DomainError::OutOfDomain {
                what: "no positive scores; no positive root exists".to_string(),
            }
            .into());
        }

        let n = count as f64;
        let conservation = |x: f64| {
            let mut value = 0.0;
            let mut derivative = 0.0;
            for score in self.unmasked_scores() {
                let r = (x * score).exp();
                value += r;
                derivative += r * score;
            }
            (value / n - 1.0, derivative / n)
        };

        // the conservation function is negative just above zero; walk the
        // upper bracket out until it turns positive
        let mut hi = 0.5;
        loop {
            let (value, _) = conservation(hi);
            if value > 0.0 {
                break;
            }
            hi *= 2.0;
            if hi > Self::LAMBDA_UPPER_BOUND {
                return Err(DomainError::OutOfDomain {
                    what: format!(
                        "conservation equation has no root below lambda = {}",
                        Self::LAMBDA_UPPER_BOUND
                    ),
                }
                .into());
            }
        }

        find_root(
            conservation,
            Self::LAMBDA_ACCURACY,
            hi,
            Self::LAMBDA_ACCURACY,
            Self::MAX_ITERATIONS,
        )
    }

    /// Relative entropy given a resolved lambda:
    /// H = lambda * E[s e^{lambda s}] over the unmasked scores.
    pub fn entropy_given_lambda(&self, lambda: f64) -> Result<f64, DomainError> {
        if lambda < 0.0 {
            return Err(DomainError::OutOfDomain {
                what: "lambda is unresolved".to_string(),
            });
        }

        let mut count = 0usize;
        let mut sum = 0.0;
        for score in self.unmasked_scores() {
            count += 1;
            sum += score * (lambda * score).exp();
        }
        if count == 0 {
            return Err(DomainError::OutOfDomain {
                what: "score matrix has no unmasked cells".to_string(),
            });
        }

        Ok(lambda * sum / count as f64)
    }

    /// Karlin's K for the whole matrix, derived from the integer-binned
    /// score distribution.
    pub fn karlin_k(&self, lambda: f64, h: f64) -> Result<f64, DomainError> {
        let dist = ScoreDistribution::from_scores(self.unmasked_scores())?;
        karlin_k_from_distribution(&dist, lambda, h)
    }

    /// Multiplies every score so that the recomputed lambda hits `target`,
    /// and re-estimates lambda/K/H on the rescaled matrix to confirm
    /// convergence. The applied multiplier accumulates on the parameters so
    /// reported scores can be mapped back to the original scale.
    pub fn scale_to_target_lambda(&mut self, target: f64) -> Result<(), RootError> {
        if target <= 0.0 {
            return Err(DomainError::OutOfDomain {
                what: format!("target lambda {target} is not positive"),
            }
            .into());
        }

        let lambda = self.compute_lambda()?;
        let multiplier = lambda / target;

        self.scores.iter_mut().for_each(|s| *s *= multiplier);
        self.params.multiplier *= multiplier;

        self.compute_statistics()
    }

    fn column_distribution(&self, subject_idx: usize) -> Result<ScoreDistribution, DomainError> {
        debug_assert!(subject_idx < self.subject_length);
        let scores = (0..self.query_length)
            .filter(|&n| !self.masked_to_ignore(subject_idx, n))
            .map(|n| self.get(subject_idx, n))
            .filter(|&s| s != 0.0);
        ScoreDistribution::from_scores(scores)
    }

    /// Lambda for a single subject column's score distribution: the same
    /// root-finding contract as [`ScoreMatrix::compute_lambda`], applied to
    /// the column's integer-binned scores through the substitution
    /// y = e^{-lambda}.
    pub fn positional_lambda(&self, subject_idx: usize) -> Result<f64, RootError> {
        let dist = self.column_distribution(subject_idx)?;

        if dist.mean() >= 0.0 {
            return Err(DomainError::OutOfDomain {
                what: "expected column score is non-negative; no positive root exists".to_string(),
            }
            .into());
        }

        let y_low = (-Self::LAMBDA_UPPER_BOUND).exp();
        let y_high = (-Self::LAMBDA_ACCURACY).exp();

        let root = find_root(
            |y| positional_conservation(&dist.probabilities, dist.min_score, y),
            y_low,
            y_high,
            Self::LAMBDA_ACCURACY,
            Self::MAX_ITERATIONS,
        )?;

        if root <= 0.0 || 1.0 <= root {
            return Err(DomainError::OutOfDomain {
                what: format!("positional root y = {root} maps to a non-positive lambda"),
            }
            .into());
        }

        Ok(-root.ln() / dist.lattice_unit)
    }

    /// Relative entropy of a single subject column given a resolved lambda.
    pub fn positional_entropy(&self, lambda: f64, subject_idx: usize) -> Result<f64, DomainError> {
        if lambda < 0.0 {
            return Err(DomainError::OutOfDomain {
                what: "lambda is unresolved".to_string(),
            });
        }

        let dist = self.column_distribution(subject_idx)?;
        let lattice_lambda = lambda * dist.lattice_unit;
        let y = (-lattice_lambda).exp();
        let max_term = y.powi(dist.max_score as i32);

        let mut entropy = 0.0;
        for (i, &p) in dist.probabilities.iter().enumerate() {
            let score = dist.min_score + i as i64;
            entropy = entropy * y + score as f64 * p;
        }

        if max_term > 0.0 {
            entropy /= max_term;
        } else if entropy > 0.0 {
            entropy = (lattice_lambda * dist.max_score as f64 + entropy.ln()).exp();
        }

        Ok(lattice_lambda * entropy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreConfig;
    use assert2::let_assert;

    /// 2x2 matrix with one strongly positive and three negative scores;
    /// the conservation equation has a root near 0.27.
    fn small_matrix() -> ScoreMatrix {
        ScoreMatrix::from_parts(
            2,
            2,
            vec![2.0, -1.0, -1.0, -1.0],
            vec![MaskPolicy::Unmasked; 4],
            &ScoreConfig::default(),
        )
    }

    fn conservation_residual(matrix: &ScoreMatrix, lambda: f64) -> f64 {
        let mut sum = 0.0;
        let mut count = 0;
        for m in 0..matrix.subject_length() {
            for n in 0..matrix.query_length() {
                let s = matrix.get(m, n);
                if s != 0.0 && !matrix.masked_to_ignore(m, n) {
                    sum += (lambda * s).exp();
                    count += 1;
                }
            }
        }
        sum / count as f64 - 1.0
    }

    #[test]
    fn test_lambda_satisfies_conservation_equation() {
        let matrix = small_matrix();
        let lambda = matrix.compute_lambda().unwrap();
        assert!(lambda > 0.0);
        assert!(conservation_residual(&matrix, lambda).abs() < 1e-3);
    }

    #[test]
    fn test_statistics_are_deterministic() {
        let mut matrix = small_matrix();
        matrix.compute_statistics().unwrap();
        let first = *matrix.params();
        matrix.compute_statistics().unwrap();
        let second = *matrix.params();

        assert_eq!(first.lambda, second.lambda);
        assert_eq!(first.k, second.k);
        assert_eq!(first.h, second.h);
        assert_eq!(first.expected_score, second.expected_score);
    }

    #[test]
    fn test_entropy_and_k_are_positive() {
        let mut matrix = small_matrix();
        matrix.compute_statistics().unwrap();
        let params = matrix.params();
        assert!(params.is_resolved());
        assert!(params.h > 0.0);
        assert!(params.k > 0.0 && params.k < 10.0);
        assert!(params.expected_score < 0.0);
    }

    #[test]
    fn test_entropy_requires_resolved_lambda() {
        let matrix = small_matrix();
        let_assert!(
            Err(DomainError::OutOfDomain { .. }) =
                matrix.entropy_given_lambda(StatisticalParams::UNRESOLVED)
        );
    }

    #[test]
    fn test_rescaling_round_trips_to_target_lambda() {
        let mut matrix = small_matrix();
        matrix.scale_to_target_lambda(0.25).unwrap();

        let lambda = matrix.compute_lambda().unwrap();
        assert!((lambda - 0.25).abs() < 1e-4);
        assert!(matrix.params().is_resolved());
        assert!(matrix.params().h >= 0.0);

        // the multiplier undoes the scaling in reported scores
        let original = 2.0;
        let scaled = matrix.get(0, 0);
        assert!((matrix.final_score(scaled) - original).abs() < 1e-9);
    }

    #[test]
    fn test_fully_masked_matrix_never_fabricates_lambda() {
        let mut matrix = ScoreMatrix::from_parts(
            2,
            2,
            vec![2.0, -1.0, -1.0, -1.0],
            vec![MaskPolicy::MaskToIgnore; 4],
            &ScoreConfig::default(),
        );

        let_assert!(Err(RootError::Domain(_)) = matrix.compute_lambda());
        let_assert!(Err(RootError::Domain(_)) = matrix.compute_statistics());
        assert!(!matrix.params().is_resolved());
        assert_eq!(matrix.params().lambda, StatisticalParams::UNRESOLVED);
    }

    #[test]
    fn test_non_negative_expected_score_is_rejected() {
        let matrix = ScoreMatrix::from_parts(
            2,
            2,
            vec![2.0, 1.0, -1.0, -1.0],
            vec![MaskPolicy::Unmasked; 4],
            &ScoreConfig::default(),
        );
        let_assert!(Err(RootError::Domain(_)) = matrix.compute_lambda());
    }

    #[test]
    fn test_zero_scores_do_not_shift_lambda() {
        let with_zeros = ScoreMatrix::from_parts(
            2,
            3,
            vec![2.0, -1.0, 0.0, -1.0, -1.0, 0.0],
            vec![MaskPolicy::Unmasked; 6],
            &ScoreConfig::default(),
        );

        let lambda = small_matrix().compute_lambda().unwrap();
        let lambda_with_zeros = with_zeros.compute_lambda().unwrap();
        assert!((lambda - lambda_with_zeros).abs() < 1e-4);
    }

    #[test]
    fn test_positional_lambda_satisfies_column_conservation() {
        let matrix = ScoreMatrix::from_parts(
            1,
            4,
            vec![2.0, -1.0, -1.0, -1.0],
            vec![MaskPolicy::Unmasked; 4],
            &ScoreConfig::default(),
        );

        let lambda = matrix.positional_lambda(0).unwrap();
        assert!(lambda > 0.0);

        let residual: f64 = [2.0, -1.0, -1.0, -1.0]
            .iter()
            .map(|s| 0.25 * (lambda * s).exp())
            .sum::<f64>()
            - 1.0;
        assert!(residual.abs() < 1e-3);

        let entropy = matrix.positional_entropy(lambda, 0).unwrap();
        assert!(entropy > 0.0);
    }

    #[test]
    fn test_positional_lambda_rejects_non_negative_column_mean() {
        // subject row 0 holds {2, -1}: its mean is positive
        let matrix = small_matrix();
        let_assert!(Err(RootError::Domain(_)) = matrix.positional_lambda(0));
    }

    #[test]
    fn test_karlin_k_on_two_point_distribution() {
        let dist = ScoreDistribution {
            probabilities: vec![0.75, 0.0, 0.0, 0.25],
            min_score: -1,
            max_score: 2,
            lattice_unit: 1.0,
        };
        // lambda solving 0.25 e^{2x} + 0.75 e^{-x} = 1
        let lambda: f64 = 0.2716;
        let h = lambda * (0.25 * 2.0 * (2.0 * lambda).exp() - 0.75 * (-lambda).exp());
        let k = karlin_k_from_distribution(&dist, lambda, h).unwrap();
        assert!(k > 0.0 && k < 1.0);
    }
}

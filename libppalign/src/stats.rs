use serde::Serialize;

use crate::score::StatisticalParams;

/// Statistical significance of one raw alignment score.
///
/// The expectations follow E = K m n e^{-lambda S}: `raw_e_value` uses the
/// full search space, `e_value` applies the edge-effect length correction,
/// and `per_alignment_e_value` drops the search-space factor entirely. When
/// lambda is unresolved only the reference expectation is populated and the
/// optional fields stay empty rather than being computed from invalid
/// inputs.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Significance {
    /// Lambda-normalized score in bits
    pub bit_score: Option<f64>,
    /// Length-corrected expectation
    pub e_value: Option<f64>,
    /// Expectation without the finite-length correction
    pub raw_e_value: Option<f64>,
    /// Expected count per candidate start pair
    pub per_alignment_e_value: Option<f64>,
    /// Expectation under the reference parameters; equals `e_value` once
    /// the matrix statistics resolve
    pub reference_e_value: f64,
    /// Probability of at least one equal-or-better chance alignment
    pub p_value: Option<f64>,
}

impl Significance {
    pub fn unavailable(reference_e_value: f64) -> Self {
        Significance {
            bit_score: None,
            e_value: None,
            raw_e_value: None,
            per_alignment_e_value: None,
            reference_e_value,
            p_value: None,
        }
    }
}

/// P-value for an expectation: 1 - e^{-E}.
pub fn p_value(e_value: f64) -> f64 {
    1.0 - (-e_value).exp()
}

/// Expected length of a chance alignment, used to correct the search space
/// for edge effects.
fn expected_alignment_length(k: f64, h: f64, m: f64, n: f64) -> f64 {
    (k * m * n).ln() / h
}

/// Derives bit score, E-values, and P-value for a raw alignment score from
/// the pair's statistical parameters and the two profile lengths.
pub fn compute_significance(
    score: f64,
    params: &StatisticalParams,
    subject_length: usize,
    query_length: usize,
) -> Significance {
    let m = subject_length as f64;
    let n = query_length as f64;

    let reference = &params.reference;
    let reference_e_value = reference.k * m * n * (-reference.lambda * score).exp();

    if !params.is_resolved() {
        return Significance::unavailable(reference_e_value);
    }

    let lambda = params.lambda;
    let k = params.k;

    let bit_score = (lambda * score - k.ln()) / std::f64::consts::LN_2;
    let raw_e_value = k * m * n * (-lambda * score).exp();

    let (m_eff, n_eff) = if params.h > 0.0 {
        let length = expected_alignment_length(k, params.h, m, n);
        ((m - length).max(1.0), (n - length).max(1.0))
    } else {
        (m, n)
    };

    let e_value = k * m_eff * n_eff * (-lambda * score).exp();
    let per_alignment_e_value = k * (-lambda * score).exp();

    Significance {
        bit_score: Some(bit_score),
        e_value: Some(e_value),
        raw_e_value: Some(raw_e_value),
        per_alignment_e_value: Some(per_alignment_e_value),
        reference_e_value: e_value,
        p_value: Some(p_value(e_value)),
    }
}

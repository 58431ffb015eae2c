use thiserror::Error;

/// The root finder failed to converge within its bounds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvergenceError {
    #[error("root finder made no progress at x = {x}")]
    NoProgress { x: f64 },
    #[error("root finder exceeded {max_iterations} iterations")]
    MaxIterations { max_iterations: usize },
}

/// The problem handed to the root finder has no solution in its domain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("function values at the bracket endpoints do not straddle zero")]
    BracketWithoutRoot,
    #[error("degenerate derivative at x = {x}")]
    DegenerateDerivative { x: f64 },
    #[error("argument out of domain: {what}")]
    OutOfDomain { what: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RootError {
    #[error(transparent)]
    Convergence(#[from] ConvergenceError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Finds a root of `f` inside the bracket `[x1, x2]` with a combined
/// Newton-Raphson/bisection scheme: each iteration attempts a
/// derivative-guided step and falls back to bisection whenever the step
/// would leave the bracket or fails to shrink it fast enough.
///
/// `f` returns the function value and its derivative at the argument.
/// The bracket endpoints must evaluate to opposite signs.
pub fn find_root(
    mut f: impl FnMut(f64) -> (f64, f64),
    x1: f64,
    x2: f64,
    accuracy: f64,
    max_iterations: usize,
) -> Result<f64, RootError> {
    if !x1.is_finite() || !x2.is_finite() {
        return Err(DomainError::OutOfDomain {
            what: format!("bracket [{x1}, {x2}] is not finite"),
        }
        .into());
    }

    let (f_low, _) = f(x1);
    let (f_high, _) = f(x2);

    if !f_low.is_finite() || !f_high.is_finite() {
        return Err(DomainError::OutOfDomain {
            what: "function value at a bracket endpoint is not finite".to_string(),
        }
        .into());
    }

    if f_low == 0.0 {
        return Ok(x1);
    }
    if f_high == 0.0 {
        return Ok(x2);
    }
    if f_low * f_high > 0.0 {
        return Err(DomainError::BracketWithoutRoot.into());
    }

    // orient so that f(x_low) < 0 < f(x_high)
    let (mut x_low, mut x_high) = if f_low < 0.0 { (x1, x2) } else { (x2, x1) };

    let mut root = 0.5 * (x1 + x2);
    let mut step_old = (x2 - x1).abs();
    let mut step = step_old;
    let (mut value, mut derivative) = f(root);

    for _ in 0..max_iterations {
        let newton_leaves_bracket = ((root - x_high) * derivative - value)
            * ((root - x_low) * derivative - value)
            > 0.0;
        let newton_too_slow = (2.0 * value).abs() > (step_old * derivative).abs();

        if newton_leaves_bracket || newton_too_slow {
            step_old = step;
            step = 0.5 * (x_high - x_low);
            root = x_low + step;
            if root == x_low {
                return Err(ConvergenceError::NoProgress { x: root }.into());
            }
        } else {
            if derivative == 0.0 || !derivative.is_finite() {
                return Err(DomainError::DegenerateDerivative { x: root }.into());
            }
            step_old = step;
            step = value / derivative;
            let previous = root;
            root -= step;
            if previous == root {
                return Err(ConvergenceError::NoProgress { x: root }.into());
            }
        }

        if step.abs() < accuracy {
            return Ok(root);
        }

        let (new_value, new_derivative) = f(root);
        if !new_value.is_finite() {
            return Err(DomainError::OutOfDomain {
                what: format!("function value at x = {root} is not finite"),
            }
            .into());
        }
        value = new_value;
        derivative = new_derivative;

        if value < 0.0 {
            x_low = root;
        } else {
            x_high = root;
        }
    }

    Err(ConvergenceError::MaxIterations { max_iterations }.into())
}

use crate::core::{LpcError, LpcResult};

/// Prediction error below `phi[0] * DEGENERATE_ENERGY_RATIO` counts as zero.
pub const DEGENERATE_ENERGY_RATIO: f64 = 1e-12;

/// Result of analysing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LpcFrame {
    /// predictor polynomial, alphas[0] == 1
    pub alphas: Vec<f64>,
    /// reflection coefficients, one per order
    pub reflections: Vec<f64>,
    /// synthesis gain
    pub gain: f64,
    /// final prediction error of the recursion
    pub error: f64,
}

/// Calculate biased autocorrelation coefficients for lags 0..=max_lag
pub fn autocorrelation(samples: &[f64], max_lag: usize) -> Vec<f64> {
    let mut phi = vec![0.0; max_lag + 1];
    autocorrelate_into(samples, &mut phi);
    phi
}

/// Autocorrelation into a caller-owned slice, one lag per slot
pub fn autocorrelate_into(samples: &[f64], phi: &mut [f64]) {
    let n = samples.len();
    for (lag, out) in phi.iter_mut().enumerate() {
        let mut sum = 0.0;
        for i in 0..n.saturating_sub(lag) {
            sum += samples[i] * samples[i + lag];
        }
        *out = sum;
    }
}

/// Levinson-Durbin recursion.
///
/// `phi` needs at least `order + 1` lags, `alphas` is `order + 1` long and
/// `reflections` is `order` long, where `order = reflections.len()`.
/// Returns the final prediction error. A zero `phi[0]` or an error that
/// collapses to zero along the way is reported as [`LpcError::DegenerateFrame`];
/// `alphas` and `reflections` are then only partially updated.
pub fn levinson_durbin(
    phi: &[f64],
    alphas: &mut [f64],
    reflections: &mut [f64],
) -> LpcResult<f64> {
    let order = reflections.len();
    debug_assert!(alphas.len() == order + 1 && phi.len() > order);

    alphas.fill(0.0);
    alphas[0] = 1.0;

    let mut error = phi[0];
    if error <= 0.0 || !error.is_finite() {
        return Err(LpcError::DegenerateFrame);
    }
    let floor = phi[0] * DEGENERATE_ENERGY_RATIO;

    for k in 0..order {
        let mut acc = 0.0;
        for j in 0..=k {
            acc += alphas[j] * phi[k + 1 - j];
        }
        let lambda = -acc / error;
        reflections[k] = lambda;

        // symmetric in-place update, the middle element pairs with itself
        let half = (k + 1) / 2;
        for n in 0..=half {
            let lo = alphas[n];
            let hi = alphas[k + 1 - n];
            alphas[n] = lo + lambda * hi;
            alphas[k + 1 - n] = hi + lambda * lo;
        }

        error *= 1.0 - lambda * lambda;
        if error <= floor || !error.is_finite() {
            return Err(LpcError::DegenerateFrame);
        }
    }

    Ok(error)
}

/// Residual prediction energy.
///
/// With predictor coefficients `c[k] = -alphas[k]` this is
/// `phi[0] - sum(c[k] * phi[k])`, the same quantity the recursion ends on.
/// Ill-conditioned frames can push it below zero.
pub fn residual_energy(phi: &[f64], alphas: &[f64]) -> f64 {
    let mut energy = phi[0];
    for k in 1..alphas.len() {
        energy += alphas[k] * phi[k];
    }
    energy
}

/// Synthesis gain, sqrt of the residual energy
pub fn synthesis_gain(phi: &[f64], alphas: &[f64]) -> LpcResult<f64> {
    let energy = residual_energy(phi, alphas);
    if energy < 0.0 {
        return Err(LpcError::NegativeResidualEnergy { energy });
    }
    Ok(energy.sqrt())
}

/// A lattice filter is stable when every reflection coefficient sits inside (-1, 1)
pub fn is_stable(reflections: &[f64]) -> bool {
    reflections.iter().all(|k| k.is_finite() && k.abs() < 1.0)
}

/// Full analysis of an already windowed frame
pub fn analyze_frame(frame: &[f64], order: usize) -> LpcResult<LpcFrame> {
    let phi = autocorrelation(frame, order);
    let mut alphas = vec![0.0; order + 1];
    let mut reflections = vec![0.0; order];
    let error = levinson_durbin(&phi, &mut alphas, &mut reflections)?;
    let gain = synthesis_gain(&phi, &alphas)?;
    Ok(LpcFrame {
        alphas,
        reflections,
        gain,
        error,
    })
}

/// Run a signal through the all-pole filter 1/A(z), fresh state.
pub fn all_pole_filter(alphas: &[f64], excitation: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::with_capacity(excitation.len());
    for (n, &e) in excitation.iter().enumerate() {
        let mut y = e;
        for k in 1..alphas.len() {
            if n >= k {
                y -= alphas[k] * out[n - k];
            }
        }
        out.push(y);
    }
    out
}

use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, SirvError, SirvResult};

/// Explicit (forward) Euler step: `y <- y + dt * f(t, y)`.
///
/// All components are advanced from the same pre-step derivative, never
/// from partially updated values.
pub fn euler_step<F>(y: &mut [f64], t: f64, dt: f64, dy: &mut [f64], mut f: F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    f(t, y, dy);
    for (yi, di) in y.iter_mut().zip(dy.iter()) {
        *yi += *di * dt;
    }
}

// Classic RK4 tableau, in the same layout as the Dormand–Prince one below.
const RK4_C: [f64; 4] = [0.0, 0.5, 0.5, 1.0];
const RK4_A: [[f64; 4]; 4] = [
    [0.0, 0.0, 0.0, 0.0],
    [0.5, 0.0, 0.0, 0.0],
    [0.0, 0.5, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];
const RK4_B: [f64; 4] = [1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0];

/// Stage vectors for allocation-free explicit Runge–Kutta steps.
pub struct RkWorkspace<const S: usize> {
    pub k: [Vec<f64>; S],
    pub ytmp: Vec<f64>,
}

impl<const S: usize> RkWorkspace<S> {
    pub fn new(n: usize) -> Self {
        Self {
            k: std::array::from_fn(|_| vec![0.0; n]),
            ytmp: vec![0.0; n],
        }
    }
}

pub type Rk4Workspace = RkWorkspace<4>;

/// Fill stages `1..S` of an explicit Runge–Kutta step; `k[0]` must already
/// hold `f(t, y)`. On return `ytmp` is the input of the last stage.
fn explicit_stages<const S: usize, F>(
    y: &[f64],
    t: f64,
    h: f64,
    c: &[f64; S],
    a: &[[f64; S]; S],
    ws: &mut RkWorkspace<S>,
    f: &mut F,
) where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    for s in 1..S {
        for (i, yt) in ws.ytmp.iter_mut().enumerate() {
            let acc: f64 = (0..s).map(|m| a[s][m] * ws.k[m][i]).sum();
            *yt = y[i] + h * acc;
        }
        f(t + c[s] * h, &ws.ytmp, &mut ws.k[s]);
    }
}

/// Classic fixed-step RK4 using a preallocated workspace.
pub fn rk4_step_ws<F>(y: &mut [f64], t: f64, dt: f64, ws: &mut Rk4Workspace, mut f: F)
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    f(t, y, &mut ws.k[0]);
    explicit_stages(y, t, dt, &RK4_C, &RK4_A, ws, &mut f);
    for (i, yi) in y.iter_mut().enumerate() {
        let incr: f64 = RK4_B.iter().zip(ws.k.iter()).map(|(b, k)| b * k[i]).sum();
        *yi += dt * incr;
    }
}

/// Error-control settings for [`integrate_adaptive`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptiveOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Upper bound on any accepted step. Keeps the dense output fine enough
    /// for linear resampling.
    pub max_step: f64,
    /// Attempted steps (accepted + rejected) before giving up.
    pub max_steps: usize,
}

impl Default for AdaptiveOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_step: 1.0,
            max_steps: 1_000_000,
        }
    }
}

impl AdaptiveOptions {
    pub fn check(&self) -> SirvResult<()> {
        ensure_positive("adaptive.rtol", self.rtol)?;
        ensure_positive("adaptive.atol", self.atol)?;
        ensure_positive("adaptive.max_step", self.max_step)?;
        if self.max_steps == 0 {
            return Err(SirvError::invalid("adaptive.max_steps", 0.0, "must be >= 1"));
        }
        Ok(())
    }
}

// Dormand–Prince 5(4) tableau. Row s holds a[s][0..s]; row 6 is the 5th-order
// solution, so the last stage doubles as the next step's first (FSAL).
const DP_C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const DP_A: [[f64; 7]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0, 0.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0, 0.0, 0.0],
    [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0, 0.0],
];
// 5th-order minus embedded 4th-order weights.
const DP_E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Adaptive Dormand–Prince 5(4) integration from `t0` to `t_end`.
///
/// Returns every accepted step as `(t, y)`, starting with `(t0, y0)` and
/// ending exactly at `t_end`. Local error is controlled per component with
/// `atol + rtol * max(|y_old|, |y_new|)` in the RMS norm.
pub fn integrate_adaptive<F>(
    y0: &[f64],
    t0: f64,
    t_end: f64,
    opts: &AdaptiveOptions,
    mut f: F,
) -> SirvResult<Vec<(f64, Vec<f64>)>>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    opts.check()?;
    let n = y0.len();
    let mut ws = RkWorkspace::<7>::new(n);
    let mut y = y0.to_vec();
    let mut t = t0;
    let mut out = vec![(t, y.clone())];
    if t_end <= t0 || n == 0 {
        return Ok(out);
    }

    let mut h = ((t_end - t0) * 1e-3).min(opts.max_step);
    let end_slack = 4.0 * f64::EPSILON * t_end.abs().max(1.0);
    let mut attempts = 0usize;
    let mut rejected = 0usize;
    f(t, &y, &mut ws.k[0]);

    while t < t_end {
        if attempts >= opts.max_steps {
            return Err(SirvError::TooManySteps { max_steps: opts.max_steps, horizon: t_end });
        }
        attempts += 1;

        // a step ending within a few ulps of t_end finishes the run
        let remaining = t_end - t;
        let last = h >= remaining - end_slack;
        if last {
            h = remaining;
        }
        if h <= f64::EPSILON * t.abs().max(1.0) {
            return Err(SirvError::StepSizeUnderflow { t, step: h });
        }

        explicit_stages(&y, t, h, &DP_C, &DP_A, &mut ws, &mut f);

        let mut sum = 0.0;
        for i in 0..n {
            let mut e = 0.0;
            for m in 0..7 {
                e += DP_E[m] * ws.k[m][i];
            }
            let scale = opts.atol + opts.rtol * y[i].abs().max(ws.ytmp[i].abs());
            sum += (h * e / scale).powi(2);
        }
        let norm = (sum / n as f64).sqrt();

        let factor = if !norm.is_finite() {
            MIN_FACTOR
        } else if norm == 0.0 {
            MAX_FACTOR
        } else {
            (SAFETY * norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
        };

        if norm <= 1.0 {
            t = if last { t_end } else { t + h };
            y.copy_from_slice(&ws.ytmp);
            ws.k.swap(0, 6);
            out.push((t, y.clone()));
            h = (h * factor).min(opts.max_step);
        } else {
            rejected += 1;
            tracing::trace!(t, h, norm, "adaptive step rejected");
            h *= factor.min(1.0);
        }
    }

    tracing::debug!(accepted = out.len() - 1, rejected, "adaptive integration finished");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decay(_t: f64, y: &[f64], dy: &mut [f64]) {
        dy[0] = -y[0];
    }

    #[test]
    fn euler_uses_pre_step_derivative() {
        // dy/dt = (-y1, y0): a sequential update would feed the new y0 into y1.
        let mut y = [1.0, 1.0];
        let mut dy = [0.0; 2];
        euler_step(&mut y, 0.0, 0.5, &mut dy, |_, y, dy| {
            dy[0] = -y[1];
            dy[1] = y[0];
        });
        assert_eq!(y, [0.5, 1.5]);
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let mut y = [1.0];
        let mut ws = Rk4Workspace::new(1);
        let dt = 0.1;
        for i in 0..10 {
            rk4_step_ws(&mut y, i as f64 * dt, dt, &mut ws, decay);
        }
        assert!((y[0] - (-1.0f64).exp()).abs() < 1e-6);
    }

    #[test]
    fn adaptive_hits_end_time_and_tolerance() {
        let opts = AdaptiveOptions::default();
        let out = integrate_adaptive(&[1.0], 0.0, 5.0, &opts, decay).unwrap();
        let (t_last, y_last) = out.last().unwrap();
        assert_eq!(*t_last, 5.0);
        assert!((y_last[0] - (-5.0f64).exp()).abs() < 1e-6);
        assert!(out.windows(2).all(|w| w[1].0 > w[0].0));
        assert!(out.windows(2).all(|w| w[1].0 - w[0].0 <= opts.max_step + 1e-12));
    }

    #[test]
    fn adaptive_rejects_bad_tolerance() {
        let opts = AdaptiveOptions { rtol: 0.0, ..AdaptiveOptions::default() };
        let err = integrate_adaptive(&[1.0], 0.0, 1.0, &opts, decay).unwrap_err();
        assert!(matches!(err, SirvError::InvalidParameter { name: "adaptive.rtol", .. }));
    }

    #[test]
    fn adaptive_finishes_when_max_step_divides_the_span() {
        let still = |_t: f64, _y: &[f64], dy: &mut [f64]| dy[0] = 0.0;
        let opts = AdaptiveOptions { max_step: 0.0189, ..AdaptiveOptions::default() };
        let out = integrate_adaptive(&[1.0], 0.0, 18.9, &opts, still).unwrap();
        assert_eq!(out.last().unwrap().0, 18.9);

        for tenth in 1..200 {
            let t_end = tenth as f64 * 0.1;
            for div in [3.0, 7.0, 10.0, 100.0, 1000.0] {
                let opts = AdaptiveOptions { max_step: t_end / div, ..AdaptiveOptions::default() };
                let out = integrate_adaptive(&[1.0], 0.0, t_end, &opts, still)
                    .unwrap_or_else(|e| panic!("t_end={t_end} div={div}: {e}"));
                assert_eq!(out.last().unwrap().0, t_end);
            }
        }
    }

    #[test]
    fn adaptive_reports_step_size_underflow() {
        // undefined past t = 1: every step across it is rejected until h vanishes
        let wall = |t: f64, _y: &[f64], dy: &mut [f64]| dy[0] = if t > 1.0 { f64::NAN } else { 0.0 };
        let err = integrate_adaptive(&[1.0], 0.0, 2.0, &AdaptiveOptions::default(), wall).unwrap_err();
        match err {
            SirvError::StepSizeUnderflow { t, step } => {
                assert!(t > 0.99 && t <= 1.0, "t={t}");
                assert!(step <= f64::EPSILON * 2.0, "step={step}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn adaptive_gives_up_after_max_steps() {
        let opts = AdaptiveOptions { max_steps: 3, max_step: 0.1, ..AdaptiveOptions::default() };
        let err = integrate_adaptive(&[1.0], 0.0, 10.0, &opts, decay).unwrap_err();
        assert_eq!(err, SirvError::TooManySteps { max_steps: 3, horizon: 10.0 });
    }
}

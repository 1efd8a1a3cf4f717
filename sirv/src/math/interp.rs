/// Resample a dense vector-valued series onto sorted report times.
///
/// `knots` are `(t, y)` pairs with strictly increasing `t`. Each output row
/// interpolates every component independently between the bracketing knots.
pub fn resample(knots: &[(f64, Vec<f64>)], times: &[f64]) -> Vec<Vec<f64>> {
    let mut out = Vec::with_capacity(times.len());
    if knots.is_empty() {
        return out;
    }
    let last = knots.len() - 1;
    let mut cursor = 0usize;
    for &t in times {
        while cursor < last && knots[cursor + 1].0 < t {
            cursor += 1;
        }
        let (t0, y0) = &knots[cursor];
        if cursor == last || t <= *t0 {
            out.push(y0.clone());
            continue;
        }
        let (t1, y1) = &knots[cursor + 1];
        let row = y0
            .iter()
            .zip(y1.iter())
            .map(|(a, b)| lerp(*t0, *a, *t1, *b, t))
            .collect();
        out.push(row);
    }
    out
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

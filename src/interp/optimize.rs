//! Derivative-free minimization for kernel hyperparameters.

/// Bounded Nelder–Mead simplex search.
///
/// Every candidate is clamped into `[lo, hi]` per coordinate. Non-finite
/// objective values count as +inf. Returns the best point and its value.
pub(crate) fn nelder_mead<F>(
    objective: F,
    start: &[f64],
    bounds: (f64, f64),
    step: f64,
    max_iterations: usize,
    tolerance: f64,
) -> (Vec<f64>, f64)
where
    F: Fn(&[f64]) -> f64,
{
    let (lo, hi) = bounds;
    let clamp = |x: Vec<f64>| -> Vec<f64> { x.into_iter().map(|v| v.clamp(lo, hi)).collect() };
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    let n = start.len();
    if n == 0 {
        return (Vec::new(), eval(start));
    }

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    let origin = clamp(start.to_vec());
    simplex.push((origin.clone(), eval(&origin)));
    for i in 0..n {
        let mut vertex = origin.clone();
        // step inward when the start sits on the upper bound
        vertex[i] = if vertex[i] + step <= hi {
            vertex[i] + step
        } else {
            vertex[i] - step
        };
        let vertex = clamp(vertex);
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    for _ in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[n].1;
        if best.is_finite() && (worst - best).abs() <= tolerance * (1.0 + best.abs()) {
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|(x, _)| x[j]).sum::<f64>() / n as f64)
            .collect();
        let toward = |coef: f64| -> Vec<f64> {
            clamp(
                centroid
                    .iter()
                    .zip(&simplex[n].0)
                    .map(|(c, w)| c + coef * (c - w))
                    .collect(),
            )
        };

        let reflected = toward(1.0);
        let f_reflected = eval(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = toward(2.0);
            let f_expanded = eval(&expanded);
            simplex[n] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
        } else if f_reflected < simplex[n - 1].1 {
            simplex[n] = (reflected, f_reflected);
        } else {
            let contracted = toward(-0.5);
            let f_contracted = eval(&contracted);
            if f_contracted < simplex[n].1 {
                simplex[n] = (contracted, f_contracted);
            } else {
                let anchor = simplex[0].0.clone();
                for vertex in simplex.iter_mut().skip(1) {
                    let shrunk: Vec<f64> = anchor
                        .iter()
                        .zip(&vertex.0)
                        .map(|(a, v)| a + 0.5 * (v - a))
                        .collect();
                    let value = eval(&shrunk);
                    *vertex = (shrunk, value);
                }
            }
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    simplex.swap_remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_minimum() {
        let (x, v) = nelder_mead(
            |p| (p[0] - 1.5).powi(2) + 2.0 * (p[1] + 0.5).powi(2),
            &[0.0, 0.0],
            (-10.0, 10.0),
            1.0,
            500,
            1e-12,
        );
        assert!((x[0] - 1.5).abs() < 1e-3);
        assert!((x[1] + 0.5).abs() < 1e-3);
        assert!(v < 1e-6);
    }

    #[test]
    fn test_respects_bounds() {
        let (x, _) = nelder_mead(|p| -p[0], &[0.0], (-1.0, 2.0), 0.5, 200, 1e-12);
        assert!((x[0] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_infeasible_region_is_avoided() {
        let (x, v) = nelder_mead(
            |p| if p[0] < 0.0 { f64::NAN } else { (p[0] - 1.0).powi(2) },
            &[0.5],
            (-5.0, 5.0),
            0.25,
            300,
            1e-12,
        );
        assert!(v.is_finite());
        assert!((x[0] - 1.0).abs() < 1e-3);
    }
}

//! Small descriptive statistics shared by the cleaner, selector and analyzers.

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::{Data, Median, Statistics};

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().mean())
}

pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(Data::new(xs.to_vec()).median())
}

/// Quantile with linear interpolation between closest ranks. `sorted` must be non-empty.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Sample variance (n − 1 denominator); `None` below two observations.
pub fn variance_sample(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    Some(xs.iter().variance())
}

/// Population standard deviation (n denominator); 0 for empty input.
pub fn std_population(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().population_std_dev()
}

/// Most frequent value; ties resolve to the smallest.
pub fn mode<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|(_, c)| *c == best)
        .map(|(v, _)| v.to_string())
}

/// Pearson correlation coefficient; `None` when undefined (fewer than two points or zero variance).
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let mx = mean(&x[..n])?;
    let my = mean(&y[..n])?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Pearson r with a two-sided p-value from Student's t on n − 2 degrees of freedom.
pub fn pearson_test(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let r = pearson(x, y)?;
    let n = x.len().min(y.len());
    if n < 3 {
        return Some((r, 1.0));
    }
    let df = (n - 2) as f64;
    if (1.0 - r * r) <= f64::EPSILON {
        return Some((r, 0.0));
    }
    let t = r * (df / (1.0 - r * r)).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    let p = 2.0 * (1.0 - dist.cdf(t.abs()));
    Some((r, p.clamp(0.0, 1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quantiles_interpolate() {
        let sorted = [10.0, 10.0, 20.0, 20.0];
        assert_relative_eq!(quantile_sorted(&sorted, 0.25), 10.0);
        assert_relative_eq!(quantile_sorted(&sorted, 0.75), 20.0);
        assert_relative_eq!(quantile_sorted(&[1.0, 2.0, 3.0, 4.0], 0.5), 2.5);
    }

    #[test]
    fn mode_prefers_smallest_on_tie() {
        assert_eq!(mode(["M", "F", "M", "F"]), Some("F".to_string()));
        assert_eq!(mode(std::iter::empty::<&str>()), None);
    }

    #[test]
    fn pearson_perfect_and_undefined() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        let (r, p) = pearson_test(&x, &y).unwrap();
        assert_relative_eq!(r, 1.0);
        assert_eq!(p, 0.0);
        assert!(pearson(&x, &[1.0, 1.0, 1.0, 1.0]).is_none());
    }

    #[test]
    fn pearson_p_value_is_two_sided() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let (r, p) = pearson_test(&x, &y).unwrap();
        assert!(r > 0.8);
        assert!(p > 0.0 && p < 0.05);
    }

    #[test]
    fn spreads() {
        assert_relative_eq!(std_population(&[1.0, 3.0]), 1.0);
        assert_relative_eq!(variance_sample(&[1.0, 3.0]).unwrap(), 2.0);
        assert!(variance_sample(&[1.0]).is_none());
        assert_eq!(std_population(&[]), 0.0);
    }

    #[test]
    fn central_values() {
        assert_relative_eq!(mean(&[1.0, 2.0, 6.0]).unwrap(), 3.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert_relative_eq!(median(&[5.0, 1.0, 3.0]).unwrap(), 3.0);
        assert!(mean(&[]).is_none());
        assert!(median(&[]).is_none());
    }
}

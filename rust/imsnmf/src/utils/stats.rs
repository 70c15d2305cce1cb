/// Median of the values, averaging the two middle elements for even lengths.
///
/// Reorders `vals` in place. Returns `None` for empty input.
pub fn median_in_place(vals: &mut [f64]) -> Option<f64> {
    let n = vals.len();
    if n == 0 {
        return None;
    }
    let mid = n / 2;
    let (lower, upper_mid, _) = vals.select_nth_unstable_by(mid, f64::total_cmp);
    let upper_mid = *upper_mid;
    if n % 2 == 1 {
        return Some(upper_mid);
    }
    let lower_mid = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((lower_mid + upper_mid) / 2.0)
}

/// Population (ddof = 0) standard deviation.
pub fn population_std(vals: &[f64]) -> Option<f64> {
    if vals.is_empty() {
        return None;
    }
    let n = vals.len() as f64;
    let mean = vals.iter().sum::<f64>() / n;
    let variance = vals.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_even() {
        let mut odd = vec![5.0, 1.0, 3.0];
        assert_eq!(median_in_place(&mut odd), Some(3.0));
        let mut even = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median_in_place(&mut even), Some(2.5));
        let mut empty: Vec<f64> = vec![];
        assert_eq!(median_in_place(&mut empty), None);
    }

    #[test]
    fn test_population_std() {
        let vals = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let std = population_std(&vals).unwrap();
        assert!((std - 2.0).abs() < 1e-12, "Expected 2.0, got {}", std);
        assert_eq!(population_std(&[3.0]), Some(0.0));
        assert_eq!(population_std(&[]), None);
    }
}

//! Pure time-series metrics over daily mention counts.
//!
//! Every function takes an oldest-first slice and never fails: short or empty
//! input yields zeros instead of errors.

/// Floor for denominators when measuring relative growth.
pub const GROWTH_EPSILON: f64 = 0.001;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// The last `min(window, len)` values.
pub fn trailing(values: &[f64], window: usize) -> &[f64] {
    let n = values.len().min(window);
    &values[values.len() - n..]
}

/// Mean mentions per day over the trailing window.
pub fn velocity(values: &[f64], window: usize) -> f64 {
    mean(trailing(values, window))
}

/// Prior and recent halves of the trailing window, each `h = m / 2` days long
/// where `m = min(window, len)`. The oldest day is dropped when `m` is odd.
pub fn window_halves(values: &[f64], window: usize) -> Option<(&[f64], &[f64])> {
    let m = values.len().min(window);
    let h = m / 2;
    if h == 0 {
        return None;
    }
    let n = values.len();
    Some((&values[n - 2 * h..n - h], &values[n - h..]))
}

/// Change in half-window velocity, per day.
pub fn acceleration(values: &[f64], window: usize) -> f64 {
    match window_halves(values, window) {
        Some((prior, recent)) => (mean(recent) - mean(prior)) / recent.len() as f64,
        None => 0.0,
    }
}

/// Relative growth from the prior half-window velocity to the recent one.
pub fn velocity_growth(values: &[f64], window: usize) -> f64 {
    match window_halves(values, window) {
        Some((prior, recent)) => {
            let earliest = mean(prior);
            (mean(recent) - earliest) / earliest.max(GROWTH_EPSILON)
        }
        None => 0.0,
    }
}

/// Z-score of the latest value against the rest of the trailing window.
pub fn z_spike(values: &[f64], window: usize) -> f64 {
    let recent = trailing(values, window);
    let Some((latest, history)) = recent.split_last() else {
        return 0.0;
    };
    if history.is_empty() {
        return 0.0;
    }
    let sd = std_dev(history);
    if sd == 0.0 {
        return 0.0;
    }
    (latest - mean(history)) / sd
}

/// Fraction of source columns with any activity in the trailing window.
pub fn convergence(sources: &[&[f64]], window: usize) -> f64 {
    if sources.is_empty() {
        return 0.0;
    }
    let active = sources
        .iter()
        .filter(|col| trailing(col, window).iter().any(|v| *v > 0.0))
        .count();
    active as f64 / sources.len() as f64
}

/// Trailing moving average. The first `window - 1` points average what is available.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            mean(&values[start..=i])
        })
        .collect()
}

/// Rolling population standard deviation; zero until a full window exists.
pub fn rolling_volatility(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                0.0
            } else {
                std_dev(&values[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Least-squares slope and intercept over `x = 0..n`.
pub fn linear_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if n == 1 {
        return (0.0, values[0]);
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };
    (slope, y_mean - slope * x_mean)
}

/// R² of a least-squares line. Flat series have no trend.
pub fn trend_strength(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let (slope, intercept) = linear_fit(values);
    let y_mean = mean(values);
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, y) in values.iter().enumerate() {
        let pred = slope * i as f64 + intercept;
        ss_res += (y - pred).powi(2);
        ss_tot += (y - y_mean).powi(2);
    }
    if ss_tot == 0.0 {
        0.0
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// Rolling z-score of each point against the `window` points before it.
pub fn rolling_z_scores(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            if i < 2 {
                return 0.0;
            }
            let history = &values[i.saturating_sub(window)..i];
            let sd = std_dev(history);
            if sd == 0.0 {
                0.0
            } else {
                (values[i] - mean(history)) / sd
            }
        })
        .collect()
}

/// Indices whose rolling z-score magnitude exceeds `threshold`.
pub fn change_points(values: &[f64], window: usize, threshold: f64) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }
    rolling_z_scores(values, window)
        .into_iter()
        .enumerate()
        .filter(|(_, z)| z.abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn velocity_uses_all_days_when_short() {
        assert!(approx(velocity(&[2.0, 4.0], 30), 3.0));
        assert!(approx(velocity(&[1.0, 1.0, 5.0, 7.0], 2), 6.0));
        assert_eq!(velocity(&[], 30), 0.0);
    }

    #[test]
    fn all_zero_series_has_no_motion() {
        let zeros = vec![0.0; 45];
        assert_eq!(velocity(&zeros, 30), 0.0);
        assert_eq!(acceleration(&zeros, 30), 0.0);
        assert_eq!(z_spike(&zeros, 30), 0.0);
        assert_eq!(velocity_growth(&zeros, 30), 0.0);
    }

    #[test]
    fn increasing_series_accelerates_and_grows() {
        let rising: Vec<f64> = (1..=40).map(|v| v as f64).collect();
        assert!(acceleration(&rising, 30) > 0.0);
        assert!(velocity_growth(&rising, 30) > 0.0);
    }

    #[test]
    fn halves_drop_oldest_odd_day() {
        let values = [100.0, 1.0, 2.0, 3.0, 4.0];
        let (prior, recent) = window_halves(&values, 30).unwrap();
        assert_eq!(prior, &[1.0, 2.0]);
        assert_eq!(recent, &[3.0, 4.0]);
        // (3.5 - 1.5) / 2
        assert!(approx(acceleration(&values, 30), 1.0));
    }

    #[test]
    fn acceleration_over_full_window() {
        let mut values = vec![2.0; 15];
        values.extend(vec![5.0; 15]);
        assert!(approx(acceleration(&values, 30), 3.0 / 15.0));
        assert!(approx(velocity_growth(&values, 30), 1.5));
    }

    #[test]
    fn growth_from_zero_uses_epsilon_floor() {
        let values = [0.0, 0.0, 1.0, 1.0];
        assert!(approx(velocity_growth(&values, 30), 1.0 / GROWTH_EPSILON));
    }

    #[test]
    fn z_spike_flags_latest_outlier() {
        let mut values = vec![1.0, 3.0, 1.0, 3.0];
        values.push(10.0);
        // history mean 2, population std 1
        assert!(approx(z_spike(&values, 30), 8.0));
    }

    #[test]
    fn z_spike_is_zero_for_constant_history() {
        assert_eq!(z_spike(&[4.0, 4.0, 4.0, 9.0], 30), 0.0);
        assert_eq!(z_spike(&[9.0], 30), 0.0);
    }

    #[test]
    fn convergence_two_of_four_is_half() {
        let arxiv = [0.0, 1.0];
        let github = [2.0, 0.0];
        let jobs = [0.0, 0.0];
        let funding = [0.0, 0.0];
        let cols: [&[f64]; 4] = [&arxiv, &github, &jobs, &funding];
        assert_eq!(convergence(&cols, 30), 0.5);
    }

    #[test]
    fn convergence_ignores_activity_outside_window() {
        let arxiv = [5.0, 0.0, 0.0];
        let github = [0.0, 0.0, 1.0];
        let cols: [&[f64]; 4] = [&arxiv, &github, &[0.0; 3], &[0.0; 3]];
        assert_eq!(convergence(&cols, 2), 0.25);
    }

    #[test]
    fn smoothing_averages_available_prefix() {
        let smoothed = smooth(&[3.0, 6.0, 9.0, 12.0], 3);
        assert_eq!(smoothed, vec![3.0, 4.5, 6.0, 9.0]);
    }

    #[test]
    fn volatility_is_zero_before_full_window() {
        let vol = rolling_volatility(&[1.0, 3.0, 1.0, 3.0], 2);
        assert_eq!(vol, vec![0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn trend_strength_of_line_is_one() {
        let line: Vec<f64> = (0..10).map(|v| 2.0 * v as f64 + 1.0).collect();
        assert!(approx(trend_strength(&line), 1.0));
        assert_eq!(trend_strength(&[5.0; 10]), 0.0);
    }

    #[test]
    fn change_points_detect_a_jump() {
        let mut values = vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0, 1.0, 2.0];
        values.push(20.0);
        let points = change_points(&values, 7, 2.0);
        assert_eq!(points, vec![8]);
        assert!(change_points(&[1.0, 50.0], 7, 2.0).is_empty());
    }
}

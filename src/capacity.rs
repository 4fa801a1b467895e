//! Capacity integration over the logged current/time series.
//!
//! Current is converted to amperes and elapsed time to seconds, then the
//! curve is integrated with composite Simpson's rule for irregular spacing.
//! The area in ampere-seconds is truncated toward zero.
//!
//! Interval parity:
//! - fewer than 2 points: 0, there is no interval to integrate.
//! - exactly 2 points: trapezoid over the single interval.
//! - odd point count (even interval count): pure composite Simpson.
//! - even point count (odd interval count): Simpson over all but the last
//!   interval, plus a three-point quadratic correction for the last one.
//!   Both pieces are exact for quadratics.
//!
//! Zero-width intervals (two samples in the same millisecond) contribute no
//! area and are integrated with the trapezoid rule so the Simpson weights
//! never divide by zero.

use crate::protocol::Reading;

/// Ampere-seconds delivered over `readings`, truncated to an integer.
pub fn ampere_seconds(readings: &[Reading]) -> u64 {
    let times: Vec<f64> = readings.iter().map(Reading::seconds).collect();
    let currents: Vec<f64> = readings.iter().map(Reading::amperes).collect();
    truncate_charge(simpson(&times, &currents))
}

/// Display-only conversion; the integer ampere-seconds stay the stored truth.
pub fn ampere_hours(ampere_seconds: u64) -> f64 {
    ampere_seconds as f64 / 3600.0
}

/// Integrate `y` over the sample points `x` (ascending) with Simpson's rule.
///
/// Mismatched slice lengths are integrated over their common prefix.
pub fn simpson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);

    match n {
        0 | 1 => 0.0,
        2 => trapezoid(x[1] - x[0], y[0], y[1]),
        _ if n % 2 == 1 => composite(x, y),
        _ => composite(&x[..n - 1], &y[..n - 1]) + last_interval(&x[n - 3..], &y[n - 3..]),
    }
}

fn trapezoid(h: f64, y0: f64, y1: f64) -> f64 {
    0.5 * h * (y0 + y1)
}

/// Simpson panels over an odd number of points.
fn composite(x: &[f64], y: &[f64]) -> f64 {
    (0..x.len() - 2)
        .step_by(2)
        .map(|i| {
            let h0 = x[i + 1] - x[i];
            let h1 = x[i + 2] - x[i + 1];
            panel(h0, h1, y[i], y[i + 1], y[i + 2])
        })
        .sum()
}

/// One parabolic panel spanning two possibly unequal intervals.
fn panel(h0: f64, h1: f64, y0: f64, y1: f64, y2: f64) -> f64 {
    if h0 <= 0.0 || h1 <= 0.0 {
        return trapezoid(h0, y0, y1) + trapezoid(h1, y1, y2);
    }
    let hsum = h0 + h1;
    let hprod = h0 * h1;
    let ratio = h0 / h1;
    hsum / 6.0 * (y0 * (2.0 - 1.0 / ratio) + y1 * hsum * hsum / hprod + y2 * (2.0 - ratio))
}

/// Area of the final interval of three points, fitted by the parabola through all three.
fn last_interval(x: &[f64], y: &[f64]) -> f64 {
    let h0 = x[1] - x[0];
    let h1 = x[2] - x[1];
    if h1 <= 0.0 {
        return 0.0;
    }
    if h0 <= 0.0 {
        return trapezoid(h1, y[1], y[2]);
    }
    let alpha = (2.0 * h1 * h1 + 3.0 * h0 * h1) / (6.0 * (h0 + h1));
    let beta = (h1 * h1 + 3.0 * h0 * h1) / (6.0 * h0);
    let eta = h1 * h1 * h1 / (6.0 * h0 * (h0 + h1));
    alpha * y[2] + beta * y[1] - eta * y[0]
}

fn truncate_charge(area: f64) -> u64 {
    if area.is_finite() && area > 0.0 {
        area.trunc() as u64
    } else {
        0
    }
}

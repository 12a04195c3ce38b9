//! Small numeric helpers shared by the estimators.

/// Guard added to denominators that may legitimately approach zero.
pub const EPS: f64 = 1e-6;

/// Sign with `sign(0) == 0`, unlike [`f64::signum`].
#[inline]
pub fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Linear ramp from 0 at `lo` to 1 at `hi`, saturated outside.
#[inline]
pub fn ramp(x: f64, lo: f64, hi: f64) -> f64 {
    if x <= lo {
        0.0
    } else if x >= hi {
        1.0
    } else {
        (x - lo) / (hi - lo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_of_zero_is_zero() {
        assert_eq!(sign(0.0), 0.0);
        assert_eq!(sign(-0.0), 0.0);
        assert_eq!(sign(3.2), 1.0);
        assert_eq!(sign(-1e-300), -1.0);
    }

    #[test]
    fn ramp_saturates() {
        assert_eq!(ramp(0.5, 1.0, 5.0), 0.0);
        assert_eq!(ramp(3.0, 1.0, 5.0), 0.5);
        assert_eq!(ramp(9.0, 1.0, 5.0), 1.0);
    }
}

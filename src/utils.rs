use anyhow::{Result, bail};
use std::{
    fmt::Debug,
    ops::{Bound, RangeBounds},
};

/// Finite and strictly positive.
pub const POSITIVE: (Bound<f64>, Bound<f64>) =
    (Bound::Excluded(0.0), Bound::Excluded(f64::INFINITY));

/// Finite and non-negative.
pub const NON_NEGATIVE: (Bound<f64>, Bound<f64>) =
    (Bound::Included(0.0), Bound::Excluded(f64::INFINITY));

/// Any finite value.
pub const FINITE: (Bound<f64>, Bound<f64>) = (
    Bound::Excluded(f64::NEG_INFINITY),
    Bound::Excluded(f64::INFINITY),
);

pub fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    // NaN is outside every range.
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: f64) -> f64 {
    use std::f64::consts::{PI, TAU};
    let wrapped = angle.rem_euclid(TAU);
    if wrapped > PI { wrapped - TAU } else { wrapped }
}

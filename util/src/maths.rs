//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use num_traits::Float;

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range [0, 2pi).
pub fn wrap_2pi<T>(angle: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    rem_euclid(angle, tau_t)
}

/// Limit the euclidian norm of a vector to the given value, preserving its
/// direction.
///
/// Returns the (possibly rescaled) vector and a flag which is true if the
/// limit was applied. Vectors already within the limit are returned
/// unchanged, as is the zero vector.
pub fn saturate_norm(vec: Vector2<f64>, limit: f64) -> (Vector2<f64>, bool) {
    let norm = vec.norm();

    if norm > limit && norm > 0.0 {
        (vec * (limit / norm), true)
    }
    else {
        (vec, false)
    }
}

use kurbo::{Affine, Point, Rect, Vec2};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, ignoring poisoning.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The vectors a unit step in x and y direction map to, ignoring
/// translation.
pub(crate) fn x_y_advances(transform: &Affine) -> (Vec2, Vec2) {
    let scale_skew_transform = {
        let c = transform.as_coeffs();
        Affine::new([c[0], c[1], c[2], c[3], 0.0, 0.0])
    };

    let x_advance = scale_skew_transform * Point::new(1.0, 0.0);
    let y_advance = scale_skew_transform * Point::new(0.0, 1.0);

    (x_advance.to_vec2(), y_advance.to_vec2())
}

/// The smallest and largest factor by which a transform scales lengths, i.e.
/// the singular values of its linear part.
pub(crate) fn singular_values(transform: &Affine) -> (f64, f64) {
    let [a, b, c, d, _, _] = transform.as_coeffs();
    let sum = a * a + b * b + c * c + d * d;
    let det = a * d - b * c;
    let root = (sum * sum - 4.0 * det * det).max(0.0).sqrt();

    let max = ((sum + root) / 2.0).sqrt();
    let min = ((sum - root) / 2.0).max(0.0).sqrt();

    (min, max)
}

/// Union two optional rectangles.
pub(crate) fn union(a: Option<Rect>, b: Rect) -> Rect {
    match a {
        Some(a) => a.union(b),
        None => b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factors() {
        let close = |a: f64, b: f64| (a - b).abs() < 1e-6;

        let (min, max) = singular_values(&Affine::scale_non_uniform(2.0, 0.5));
        assert!(close(min, 0.5) && close(max, 2.0));

        let (min, max) = singular_values(&Affine::rotate(1.0));
        assert!(close(min, 1.0) && close(max, 1.0));

        assert_eq!(singular_values(&Affine::translate((5.0, 5.0))), (1.0, 1.0));

        // Both columns have length one, but the transform squashes the
        // diagonal direction.
        let (min, max) = singular_values(&Affine::new([1.0, 0.0, 0.99, 0.141, 0.0, 0.0]));
        assert!(min < 0.11 && max > 1.3);

        let (min, _) = singular_values(&Affine::scale_non_uniform(1.0, 0.0));
        assert_eq!(min, 0.0);
    }
}

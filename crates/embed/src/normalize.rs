/// Scale `vector` to unit length in place.
///
/// Returns `false` and leaves the vector alone when its norm is zero or not
/// finite; those vectors are rejected downstream as degenerate, so they must
/// not be disguised by scaling.
pub(crate) fn normalize_l2(vector: &mut [f32]) -> bool {
    // f64 so tiny or huge finite components cannot underflow or overflow the sum.
    let norm = vector
        .iter()
        .map(|&x| f64::from(x) * f64::from(x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    vector
        .iter_mut()
        .for_each(|x| *x = (f64::from(*x) / norm) as f32);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_to_unit_length() {
        let mut v = vec![3.0f32, 4.0];
        assert!(normalize_l2(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn zero_and_empty_vectors_are_untouched() {
        let mut zero = vec![0.0f32; 3];
        assert!(!normalize_l2(&mut zero));
        assert_eq!(zero, vec![0.0; 3]);

        let mut empty: Vec<f32> = Vec::new();
        assert!(!normalize_l2(&mut empty));
    }

    #[test]
    fn non_finite_vectors_are_untouched() {
        let mut v = vec![f32::NAN, 1.0];
        assert!(!normalize_l2(&mut v));
        assert!(v[0].is_nan());
    }

    #[test]
    fn extreme_magnitudes_still_normalize() {
        for scale in [1e-30f32, 1e30] {
            let mut v = vec![3.0 * scale, 4.0 * scale];
            assert!(normalize_l2(&mut v), "scale {scale}");
            assert!((v[0] - 0.6).abs() < 1e-6);
            assert!((v[1] - 0.8).abs() < 1e-6);
        }
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let mut v = vec![1.0f32, 2.0, 3.0];
        normalize_l2(&mut v);
        let once = v.clone();
        normalize_l2(&mut v);
        for (a, b) in v.iter().zip(&once) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }
}

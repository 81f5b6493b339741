use crate::somelinalg::triplet::Triplet;
use nalgebra::DVector;

/// forward-difference Jacobian df/dy at y, given f0 = f(y).
/// `w` is a work vector of size ndim; costs ndim evaluations of f
pub fn numerical_jacobian<F>(
    jac: &mut Triplet<f64>,
    mut f: F,
    y: &DVector<f64>,
    f0: &DVector<f64>,
    w: &mut DVector<f64>,
) where
    F: FnMut(&mut DVector<f64>, &DVector<f64>),
{
    let ndim = y.len();
    let mut ya = y.clone();
    jac.start();
    for j in 0..ndim {
        let delta = (f64::EPSILON * f64::max(1e-5, y[j].abs())).sqrt();
        ya[j] = y[j] + delta;
        f(w, &ya);
        for i in 0..ndim {
            let v = (w[i] - f0[i]) / delta;
            if v != 0.0 {
                jac.put(i, j, v);
            }
        }
        ya[j] = y[j];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_numerical_jacobian() {
        // f = (y0^2 y1, 5 y0 + sin(y1))
        let fcn = |f: &mut DVector<f64>, y: &DVector<f64>| {
            f[0] = y[0] * y[0] * y[1];
            f[1] = 5.0 * y[0] + y[1].sin();
        };
        let y = DVector::from_vec(vec![1.5, 0.3]);
        let mut f0 = DVector::zeros(2);
        fcn(&mut f0, &y);
        let mut jac = Triplet::new(2, 2, 4);
        let mut w = DVector::zeros(2);
        let mut count = 0;
        numerical_jacobian(
            &mut jac,
            |f, y| {
                count += 1;
                fcn(f, y)
            },
            &y,
            &f0,
            &mut w,
        );
        assert_eq!(count, 2);
        let a = jac.to_dense();
        assert_relative_eq!(a[(0, 0)], 2.0 * 1.5 * 0.3, epsilon = 1e-6);
        assert_relative_eq!(a[(0, 1)], 1.5 * 1.5, epsilon = 1e-6);
        assert_relative_eq!(a[(1, 0)], 5.0, epsilon = 1e-6);
        assert_relative_eq!(a[(1, 1)], 0.3_f64.cos(), epsilon = 1e-6);
    }
}

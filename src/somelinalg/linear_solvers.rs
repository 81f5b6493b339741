//! Direct linear solvers behind a common init/fact/solve/free interface.
//!
//! Two backends are available:
//! - `Dense`: nalgebra LU decomposition of the densified matrix
//! - `Sparse`: faer sparse LU; complex systems are solved through the
//!   equivalent real block system of twice the size
//!
//! Factorisation is the expensive part: callers are expected to factor once and
//! solve many times. Every instance owns its own factorisation so independent
//! instances may live in different threads.
use crate::somelinalg::triplet::Triplet;
use faer::linalg::solvers::Solve;
use faer::mat::Mat;
use faer::sparse::{SparseColMat, Triplet as FaerTriplet};
use nalgebra::linalg::LU;
use nalgebra::{ComplexField, DMatrix, DVector, Dyn};
use num_complex::Complex;
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString, Display, EnumIter)]
pub enum LinSolKind {
    #[strum(serialize = "dense")]
    Dense,
    #[default]
    #[strum(serialize = "sparse")]
    Sparse,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinSolError {
    NotInitialized,
    NotFactorized,
    NotSquare { nrows: usize, ncols: usize },
    DimensionMismatch { expected: usize, found: usize },
    Singular(String),
    Backend(String),
}

impl fmt::Display for LinSolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinSolError::NotInitialized => write!(f, "linear solver: matrix was not given (call init first)"),
            LinSolError::NotFactorized => write!(f, "linear solver: matrix was not factorized (call fact first)"),
            LinSolError::NotSquare { nrows, ncols } => {
                write!(f, "linear solver: matrix must be square, got {}x{}", nrows, ncols)
            }
            LinSolError::DimensionMismatch { expected, found } => write!(
                f,
                "linear solver: vector of length {} does not fit matrix of size {}",
                found, expected
            ),
            LinSolError::Singular(msg) => write!(f, "linear solver: singular matrix: {}", msg),
            LinSolError::Backend(msg) => write!(f, "linear solver backend error: {}", msg),
        }
    }
}

impl std::error::Error for LinSolError {}

/// Solver of A x = b for one matrix A at a time
pub trait LinSol<T> {
    /// takes (a copy of) the matrix; any previous factorisation is dropped
    fn init(&mut self, a: &Triplet<T>) -> Result<(), LinSolError>;
    /// factorises the matrix given to `init`
    fn fact(&mut self) -> Result<(), LinSolError>;
    /// solves A x = b with the last factorisation
    fn solve(&self, x: &mut DVector<T>, b: &DVector<T>) -> Result<(), LinSolError>;
    /// drops matrix and factorisation; safe to call more than once
    fn free(&mut self);
}

/// real solver for the chosen backend
pub fn new_lin_sol(kind: LinSolKind) -> Box<dyn LinSol<f64>> {
    match kind {
        LinSolKind::Dense => Box::new(DenseLU::<f64>::new()),
        LinSolKind::Sparse => Box::new(SparseLU::new()),
    }
}

/// complex solver for the chosen backend
pub fn new_lin_sol_cmplx(kind: LinSolKind) -> Box<dyn LinSol<Complex<f64>>> {
    match kind {
        LinSolKind::Dense => Box::new(DenseLU::<Complex<f64>>::new()),
        LinSolKind::Sparse => Box::new(SparseLUCmplx::new()),
    }
}

fn check_square<T: ComplexField>(a: &Triplet<T>) -> Result<usize, LinSolError> {
    if a.nrows() != a.ncols() {
        return Err(LinSolError::NotSquare {
            nrows: a.nrows(),
            ncols: a.ncols(),
        });
    }
    Ok(a.nrows())
}

//////////////////////////////////////////////////////////////////////////////////////////////
///                 DENSE (nalgebra)
//////////////////////////////////////////////////////////////////////////////////////////////
pub struct DenseLU<T: ComplexField> {
    n: usize,
    a: Option<DMatrix<T>>,
    lu: Option<LU<T, Dyn, Dyn>>,
}

impl<T: ComplexField> DenseLU<T> {
    pub fn new() -> Self {
        DenseLU {
            n: 0,
            a: None,
            lu: None,
        }
    }
}

impl<T: ComplexField> Default for DenseLU<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ComplexField> LinSol<T> for DenseLU<T> {
    fn init(&mut self, a: &Triplet<T>) -> Result<(), LinSolError> {
        self.n = check_square(a)?;
        self.a = Some(a.to_dense());
        self.lu = None;
        Ok(())
    }

    fn fact(&mut self) -> Result<(), LinSolError> {
        let a = self.a.take().ok_or(LinSolError::NotInitialized)?;
        let lu = a.lu();
        if !lu.is_invertible() {
            return Err(LinSolError::Singular("zero pivot in dense LU".to_string()));
        }
        self.lu = Some(lu);
        Ok(())
    }

    fn solve(&self, x: &mut DVector<T>, b: &DVector<T>) -> Result<(), LinSolError> {
        let lu = self.lu.as_ref().ok_or(LinSolError::NotFactorized)?;
        let n = self.n;
        if b.len() != n || x.len() != n {
            return Err(LinSolError::DimensionMismatch {
                expected: n,
                found: b.len().max(x.len()),
            });
        }
        let sol = lu
            .solve(b)
            .ok_or_else(|| LinSolError::Singular("dense LU solve failed".to_string()))?;
        x.copy_from(&sol);
        Ok(())
    }

    fn free(&mut self) {
        self.a = None;
        self.lu = None;
    }
}

//////////////////////////////////////////////////////////////////////////////////////////////
///                 SPARSE (faer)
//////////////////////////////////////////////////////////////////////////////////////////////
type FaerSolveFn = Box<dyn Fn(Mat<f64>) -> Mat<f64>>;

/// real sparse LU (faer)
pub struct SparseLU {
    n: usize,
    a: Option<SparseColMat<usize, f64>>,
    solver: Option<FaerSolveFn>,
}

impl SparseLU {
    pub fn new() -> Self {
        SparseLU {
            n: 0,
            a: None,
            solver: None,
        }
    }

    fn set_matrix(&mut self, n: usize, entries: &[(usize, usize, f64)]) -> Result<(), LinSolError> {
        let triplets: Vec<_> = entries
            .iter()
            .map(|&(i, j, v)| FaerTriplet::new(i, j, v))
            .collect();
        let mat = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets)
            .map_err(|e| LinSolError::Backend(format!("{:?}", e)))?;
        self.n = n;
        self.a = Some(mat);
        self.solver = None;
        Ok(())
    }

    fn solve_slice(&self, b: &[f64]) -> Result<Vec<f64>, LinSolError> {
        let solver = self.solver.as_ref().ok_or(LinSolError::NotFactorized)?;
        if b.len() != self.n {
            return Err(LinSolError::DimensionMismatch {
                expected: self.n,
                found: b.len(),
            });
        }
        let rhs = Mat::<f64>::from_fn(self.n, 1, |i, _| b[i]);
        let res = solver(rhs);
        Ok((0..self.n).map(|i| res[(i, 0)]).collect())
    }
}

impl Default for SparseLU {
    fn default() -> Self {
        Self::new()
    }
}

impl LinSol<f64> for SparseLU {
    fn init(&mut self, a: &Triplet<f64>) -> Result<(), LinSolError> {
        let n = check_square(a)?;
        self.set_matrix(n, &a.compressed())
    }

    fn fact(&mut self) -> Result<(), LinSolError> {
        let mat = self.a.take().ok_or(LinSolError::NotInitialized)?;
        let lu = mat
            .sp_lu()
            .map_err(|e| LinSolError::Singular(format!("{:?}", e)))?;
        self.solver = Some(Box::new(move |rhs: Mat<f64>| lu.solve(rhs.as_ref())));
        Ok(())
    }

    fn solve(&self, x: &mut DVector<f64>, b: &DVector<f64>) -> Result<(), LinSolError> {
        if x.len() != b.len() {
            return Err(LinSolError::DimensionMismatch {
                expected: b.len(),
                found: x.len(),
            });
        }
        let sol = self.solve_slice(b.as_slice())?;
        x.copy_from_slice(&sol);
        Ok(())
    }

    fn free(&mut self) {
        self.n = 0;
        self.a = None;
        self.solver = None;
    }
}

/// complex sparse LU: (Ar + i Ai)(xr + i xi) = br + i bi is solved as
/// [Ar -Ai; Ai Ar] [xr; xi] = [br; bi]
pub struct SparseLUCmplx {
    n: usize,
    real: SparseLU,
}

impl SparseLUCmplx {
    pub fn new() -> Self {
        SparseLUCmplx {
            n: 0,
            real: SparseLU::new(),
        }
    }
}

impl Default for SparseLUCmplx {
    fn default() -> Self {
        Self::new()
    }
}

impl LinSol<Complex<f64>> for SparseLUCmplx {
    fn init(&mut self, a: &Triplet<Complex<f64>>) -> Result<(), LinSolError> {
        let n = check_square(a)?;
        let compressed = a.compressed();
        let mut block = Vec::with_capacity(4 * compressed.len());
        for (i, j, v) in compressed {
            if v.re != 0.0 {
                block.push((i, j, v.re));
                block.push((i + n, j + n, v.re));
            }
            if v.im != 0.0 {
                block.push((i, j + n, -v.im));
                block.push((i + n, j, v.im));
            }
        }
        self.n = n;
        self.real.set_matrix(2 * n, &block)
    }

    fn fact(&mut self) -> Result<(), LinSolError> {
        self.real.fact()
    }

    fn solve(
        &self,
        x: &mut DVector<Complex<f64>>,
        b: &DVector<Complex<f64>>,
    ) -> Result<(), LinSolError> {
        if b.len() != self.n || x.len() != self.n {
            return Err(LinSolError::DimensionMismatch {
                expected: self.n,
                found: b.len().max(x.len()),
            });
        }
        let mut rhs = vec![0.0; 2 * self.n];
        for i in 0..self.n {
            rhs[i] = b[i].re;
            rhs[i + self.n] = b[i].im;
        }
        let sol = self.real.solve_slice(&rhs)?;
        for i in 0..self.n {
            x[i] = Complex::new(sol[i], sol[i + self.n]);
        }
        Ok(())
    }

    fn free(&mut self) {
        self.n = 0;
        self.real.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    fn real_system() -> (Triplet<f64>, DVector<f64>, DVector<f64>) {
        // 4x4, diagonally dominant, with a duplicated entry
        let mut a = Triplet::new(4, 4, 10);
        a.put(0, 0, 4.0);
        a.put(0, 1, 1.0);
        a.put(1, 0, 1.0);
        a.put(1, 1, 5.0);
        a.put(1, 3, 2.0);
        a.put(2, 2, 3.0);
        a.put(2, 2, 1.0);
        a.put(3, 1, -1.0);
        a.put(3, 3, 6.0);
        let x_exact = DVector::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let b = a.to_dense() * &x_exact;
        (a, b, x_exact)
    }

    #[test]
    fn test_real_backends() {
        let (a, b, x_exact) = real_system();
        for kind in LinSolKind::iter() {
            let mut ls = new_lin_sol(kind);
            ls.init(&a).unwrap();
            ls.fact().unwrap();
            let mut x = DVector::zeros(4);
            ls.solve(&mut x, &b).unwrap();
            for i in 0..4 {
                assert_relative_eq!(x[i], x_exact[i], epsilon = 1e-12);
            }
            // factorisation is reused by further solves
            let mut x2 = DVector::zeros(4);
            ls.solve(&mut x2, &(&b * 2.0)).unwrap();
            assert_relative_eq!(x2[3], 6.0, epsilon = 1e-12);
            ls.free();
            ls.free();
            assert_eq!(ls.solve(&mut x, &b), Err(LinSolError::NotFactorized));
        }
    }

    #[test]
    fn test_complex_backends() {
        let mut a = Triplet::new(3, 3, 6);
        a.put(0, 0, Complex::new(2.0, 1.0));
        a.put(0, 2, Complex::new(0.0, -1.0));
        a.put(1, 1, Complex::new(3.0, 0.0));
        a.put(2, 0, Complex::new(1.0, 1.0));
        a.put(2, 2, Complex::new(4.0, -2.0));
        let x_exact = DVector::from_vec(vec![
            Complex::new(1.0, -1.0),
            Complex::new(0.5, 2.0),
            Complex::new(-3.0, 0.25),
        ]);
        let b = a.to_dense() * &x_exact;
        for kind in LinSolKind::iter() {
            let mut ls = new_lin_sol_cmplx(kind);
            ls.init(&a).unwrap();
            ls.fact().unwrap();
            let mut x = DVector::from_element(3, Complex::new(0.0, 0.0));
            ls.solve(&mut x, &b).unwrap();
            for i in 0..3 {
                assert_relative_eq!(x[i].re, x_exact[i].re, epsilon = 1e-12);
                assert_relative_eq!(x[i].im, x_exact[i].im, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_errors() {
        let mut ls = DenseLU::<f64>::new();
        assert_eq!(ls.fact(), Err(LinSolError::NotInitialized));
        let mut singular = Triplet::new(2, 2, 2);
        singular.put(0, 0, 1.0);
        singular.put(1, 0, 1.0);
        ls.init(&singular).unwrap();
        assert!(matches!(ls.fact(), Err(LinSolError::Singular(_))));

        let rect = Triplet::<f64>::new(2, 3, 0);
        let mut sp = SparseLU::new();
        assert_eq!(
            sp.init(&rect),
            Err(LinSolError::NotSquare { nrows: 2, ncols: 3 })
        );
        assert_eq!("sparse".parse::<LinSolKind>().unwrap(), LinSolKind::Sparse);
        assert_eq!(LinSolKind::Dense.to_string(), "dense");
    }
}

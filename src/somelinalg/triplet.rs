//! Coordinate storage of sparse matrices: the format in which Jacobians and
//! iteration matrices are assembled before being handed to a linear solver.
use nalgebra::{ComplexField, DMatrix, DVector};
use std::collections::BTreeMap;

/// sparse matrix in coordinate form: a list of (i, j, value) entries.
/// Repeated (i, j) entries are summed when the matrix is compressed or densified.
#[derive(Debug, Clone, PartialEq)]
pub struct Triplet<T> {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<T>,
}

impl<T: ComplexField> Triplet<T> {
    /// `max` is only a capacity hint
    pub fn new(nrows: usize, ncols: usize, max: usize) -> Self {
        Triplet {
            nrows,
            ncols,
            rows: Vec::with_capacity(max),
            cols: Vec::with_capacity(max),
            vals: Vec::with_capacity(max),
        }
    }

    /// forget all entries but keep the allocation
    pub fn start(&mut self) {
        self.rows.clear();
        self.cols.clear();
        self.vals.clear();
    }

    pub fn put(&mut self, i: usize, j: usize, x: T) {
        assert!(
            i < self.nrows && j < self.ncols,
            "entry ({}, {}) is outside of {}x{} matrix",
            i,
            j,
            self.nrows,
            self.ncols
        );
        self.rows.push(i);
        self.cols.push(j);
        self.vals.push(x);
    }

    /// puts alpha * I
    pub fn put_diagonal(&mut self, alpha: T) {
        for i in 0..self.nrows.min(self.ncols) {
            self.put(i, i, alpha.clone());
        }
    }

    /// puts alpha * other, `other` holding real values
    pub fn put_scaled(&mut self, other: &Triplet<f64>, alpha: T) {
        for (i, j, v) in other.entries() {
            self.put(i, j, alpha.clone() * nalgebra::convert::<f64, T>(v));
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// number of stored entries (duplicates included)
    pub fn len(&self) -> usize {
        self.vals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vals.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.rows
            .iter()
            .zip(self.cols.iter())
            .zip(self.vals.iter())
            .map(|((&i, &j), v)| (i, j, v.clone()))
    }

    /// entries with duplicates summed, sorted by (column, row)
    pub fn compressed(&self) -> Vec<(usize, usize, T)> {
        let mut map: BTreeMap<(usize, usize), T> = BTreeMap::new();
        for (i, j, v) in self.entries() {
            map.entry((j, i))
                .and_modify(|acc| *acc += v.clone())
                .or_insert(v);
        }
        map.into_iter().map(|((j, i), v)| (i, j, v)).collect()
    }

    pub fn to_dense(&self) -> DMatrix<T> {
        let mut a = DMatrix::<T>::zeros(self.nrows, self.ncols);
        for (i, j, v) in self.entries() {
            a[(i, j)] += v;
        }
        a
    }

    /// out = A * v
    pub fn mul_vec(&self, out: &mut DVector<T>, v: &DVector<T>) {
        out.fill(T::zero());
        for (i, j, a) in self.entries() {
            out[i] += a * v[j].clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex;

    #[test]
    fn test_duplicates_are_summed() {
        let mut t = Triplet::<f64>::new(2, 2, 4);
        t.put(0, 0, 1.0);
        t.put(1, 1, 2.0);
        t.put(0, 0, 3.0);
        assert_eq!(t.len(), 3);
        let a = t.to_dense();
        assert_eq!(a[(0, 0)], 4.0);
        assert_eq!(a[(1, 1)], 2.0);
        assert_eq!(a[(0, 1)], 0.0);
        let c = t.compressed();
        assert_eq!(c, vec![(0, 0, 4.0), (1, 1, 2.0)]);
        t.start();
        assert!(t.is_empty());
    }

    #[test]
    fn test_mul_vec_and_scaled_copy() {
        let mut m = Triplet::<f64>::new(2, 2, 3);
        m.put(0, 0, 2.0);
        m.put(0, 1, 1.0);
        m.put(1, 1, -1.0);
        let mut out = DVector::zeros(2);
        m.mul_vec(&mut out, &DVector::from_vec(vec![1.0, 2.0]));
        assert_eq!(out, DVector::from_vec(vec![4.0, -2.0]));

        let mut c = Triplet::<Complex<f64>>::new(2, 2, 3);
        c.put_scaled(&m, Complex::new(0.0, 1.0));
        c.put_diagonal(Complex::new(1.0, 0.0));
        let a = c.to_dense();
        assert_eq!(a[(0, 0)], Complex::new(1.0, 2.0));
        assert_eq!(a[(0, 1)], Complex::new(0.0, 1.0));
        assert_eq!(a[(1, 1)], Complex::new(1.0, -1.0));
    }

    #[test]
    #[should_panic]
    fn test_put_outside() {
        let mut t = Triplet::<f64>::new(2, 2, 1);
        t.put(2, 0, 1.0);
    }
}

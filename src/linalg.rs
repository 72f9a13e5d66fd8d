//! Dense linear algebra for the low-rank codecs.
//!
//! The full decompositions are Jacobi-rotation based: one-sided (Hestenes) for
//! the SVD of a channel matrix, two-sided cyclic for the eigenbasis of a
//! symmetric matrix. Both cost O(n^3) per sweep, so when only the leading `k`
//! pairs are wanted [`leading_eigen`] runs subspace iteration with
//! Rayleigh-Ritz on a `k + 8` column block instead, and [`truncated_svd`]
//! applies it to the Gram matrix of the shorter side.

use rayon::prelude::*;

use crate::cancel::CancellationToken;
use crate::constants::{
    JACOBI_TOLERANCE, MAX_JACOBI_SWEEPS, MAX_SUBSPACE_ITERATIONS, SUBSPACE_OVERSAMPLE,
    SUBSPACE_TOLERANCE,
};
use crate::error::Result;

// Relative norm below which a column is treated as linearly dependent.
const DEPENDENCE_TOLERANCE: f64 = 1e-8;

/// Column-major dense matrix of `f64`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.set(i, i, 1.0);
        }
        m
    }

    /// Interprets a row-major plane of samples as a `rows x cols` matrix.
    pub fn from_row_major_u8(rows: usize, cols: usize, samples: &[u8]) -> Self {
        let mut m = Self::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, samples[r * cols + c] as f64);
            }
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[col * self.rows + row] = value;
    }

    pub fn column(&self, col: usize) -> &[f64] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    fn column_mut(&mut self, col: usize) -> &mut [f64] {
        &mut self.data[col * self.rows..(col + 1) * self.rows]
    }

    fn from_columns(rows: usize, columns: Vec<Vec<f64>>) -> Self {
        Self {
            rows,
            cols: columns.len(),
            data: columns.concat(),
        }
    }

    /// First `count` columns.
    pub fn leading_columns(&self, count: usize) -> Self {
        let count = count.min(self.cols);
        Self {
            rows: self.rows,
            cols: count,
            data: self.data[..count * self.rows].to_vec(),
        }
    }

    /// Column-major contents narrowed to `f32`.
    pub fn to_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&x| x as f32).collect()
    }

    /// `self * other`, one output column per rayon task.
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.cols, other.rows);
        let columns = (0..other.cols)
            .into_par_iter()
            .map(|j| {
                let mut out = vec![0.0; self.rows];
                for (l, &weight) in other.column(j).iter().enumerate() {
                    if weight == 0.0 {
                        continue;
                    }
                    for (o, &x) in out.iter_mut().zip(self.column(l)) {
                        *o += weight * x;
                    }
                }
                out
            })
            .collect();
        Self::from_columns(self.rows, columns)
    }

    /// `self^T * other`.
    pub fn transpose_multiply(&self, other: &Matrix) -> Matrix {
        debug_assert_eq!(self.rows, other.rows);
        let columns = (0..other.cols)
            .into_par_iter()
            .map(|j| {
                (0..self.cols)
                    .map(|i| dot(self.column(i), other.column(j)))
                    .collect()
            })
            .collect();
        Self::from_columns(self.cols, columns)
    }

    fn symmetrize(&mut self) {
        for c in 0..self.cols {
            for r in (c + 1)..self.rows {
                let mean = 0.5 * (self.get(r, c) + self.get(c, r));
                self.set(r, c, mean);
                self.set(c, r, mean);
            }
        }
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for c in 0..self.cols {
            for r in 0..self.rows {
                t.set(c, r, self.get(r, c));
            }
        }
        t
    }

    fn column_dot(&self, a: usize, b: usize) -> f64 {
        dot(self.column(a), self.column(b))
    }

    /// Replaces columns `p`, `q` with `c*p - s*q` and `s*p + c*q`.
    fn rotate_columns(&mut self, p: usize, q: usize, c: f64, s: f64) {
        for r in 0..self.rows {
            let xp = self.get(r, p);
            let xq = self.get(r, q);
            self.set(r, p, c * xp - s * xq);
            self.set(r, q, s * xp + c * xq);
        }
    }

    fn rotate_rows(&mut self, p: usize, q: usize, c: f64, s: f64) {
        for col in 0..self.cols {
            let xp = self.get(p, col);
            let xq = self.get(q, col);
            self.set(p, col, c * xp - s * xq);
            self.set(q, col, s * xp + c * xq);
        }
    }
}

/// Thin singular value decomposition `A = U * diag(S) * V^T`, singular values descending.
#[derive(Debug, Clone)]
pub struct Svd {
    pub u: Matrix,
    pub singular_values: Vec<f64>,
    pub v: Matrix,
}

impl Svd {
    /// Keeps the `rank` largest singular triplets.
    pub fn leading(self, rank: usize) -> Self {
        Self {
            u: self.u.leading_columns(rank),
            singular_values: self.singular_values.into_iter().take(rank).collect(),
            v: self.v.leading_columns(rank),
        }
    }
}

/// Computes the thin SVD of `a` (`m x n`); `u` is `m x r`, `v` is `n x r`, `r = min(m, n)`.
pub fn svd(a: &Matrix, cancel: &CancellationToken) -> Result<Svd> {
    if a.rows() < a.cols() {
        let Svd {
            u,
            singular_values,
            v,
        } = svd_tall(a.transpose(), cancel)?;
        return Ok(Svd {
            u: v,
            singular_values,
            v: u,
        });
    }
    svd_tall(a.clone(), cancel)
}

// One-sided Jacobi on a matrix with rows >= cols.
fn svd_tall(mut w: Matrix, cancel: &CancellationToken) -> Result<Svd> {
    let n = w.cols();
    let mut v = Matrix::identity(n);

    for sweep in 0..MAX_JACOBI_SWEEPS {
        cancel.check()?;
        let mut rotated = false;
        for p in 0..n {
            for q in (p + 1)..n {
                let alpha = w.column_dot(p, p);
                let beta = w.column_dot(q, q);
                let gamma = w.column_dot(p, q);
                if gamma == 0.0 || gamma.abs() <= JACOBI_TOLERANCE * (alpha * beta).sqrt() {
                    continue;
                }
                rotated = true;
                let zeta = (beta - alpha) / (2.0 * gamma);
                let t = zeta.signum() / (zeta.abs() + (1.0 + zeta * zeta).sqrt());
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = c * t;
                w.rotate_columns(p, q, c, s);
                v.rotate_columns(p, q, c, s);
            }
        }
        if !rotated {
            log::trace!("one-sided jacobi converged after {} sweep(s)", sweep + 1);
            break;
        }
    }

    let mut order: Vec<(usize, f64)> = (0..n).map(|j| (j, w.column_dot(j, j).sqrt())).collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let m = w.rows();
    let mut u = Matrix::zeros(m, n);
    let mut v_sorted = Matrix::zeros(n, n);
    let mut singular_values = Vec::with_capacity(n);
    for (dst, &(src, sigma)) in order.iter().enumerate() {
        singular_values.push(sigma);
        if sigma > 0.0 {
            for r in 0..m {
                u.set(r, dst, w.get(r, src) / sigma);
            }
        }
        for r in 0..n {
            v_sorted.set(r, dst, v.get(r, src));
        }
    }

    Ok(Svd {
        u,
        singular_values,
        v: v_sorted,
    })
}

/// Leading `rank` singular triplets of `a`.
///
/// Uses the full one-sided Jacobi SVD when `rank` is close to the shorter
/// side, otherwise the leading eigenvectors of the Gram matrix of that side.
pub fn truncated_svd(a: &Matrix, rank: usize, cancel: &CancellationToken) -> Result<Svd> {
    let side = a.rows().min(a.cols());
    if rank + SUBSPACE_OVERSAMPLE >= side {
        return Ok(svd(a, cancel)?.leading(rank));
    }
    if a.rows() < a.cols() {
        let Svd {
            u,
            singular_values,
            v,
        } = truncated_svd(&a.transpose(), rank, cancel)?;
        return Ok(Svd {
            u: v,
            singular_values,
            v: u,
        });
    }

    let eigen = leading_eigen(&a.transpose_multiply(a), rank, cancel)?;
    let image = a.multiply(&eigen.eigenvectors);
    let mut u = Matrix::zeros(a.rows(), rank);
    let mut singular_values = Vec::with_capacity(rank);
    for j in 0..rank {
        let sigma = norm(image.column(j));
        singular_values.push(sigma);
        if sigma > 0.0 {
            for (dst, &x) in u.column_mut(j).iter_mut().zip(image.column(j)) {
                *dst = x / sigma;
            }
        }
    }
    Ok(Svd {
        u,
        singular_values,
        v: eigen.eigenvectors,
    })
}

/// Eigen-decomposition of a symmetric matrix, eigenvalues descending.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub eigenvalues: Vec<f64>,
    /// Eigenvectors as columns, in the order of `eigenvalues`.
    pub eigenvectors: Matrix,
}

/// Cyclic Jacobi eigenvalue algorithm.
pub fn symmetric_eigen(a: &Matrix, cancel: &CancellationToken) -> Result<SymmetricEigen> {
    let n = a.rows();
    debug_assert_eq!(n, a.cols());
    let mut m = a.clone();
    let mut vectors = Matrix::identity(n);

    let scale: f64 = m.data.iter().map(|x| x * x).sum::<f64>().sqrt();
    for sweep in 0..MAX_JACOBI_SWEEPS {
        cancel.check()?;
        let off: f64 = (0..n)
            .flat_map(|c| (0..n).filter(move |&r| r != c).map(move |r| (r, c)))
            .map(|(r, c)| m.get(r, c) * m.get(r, c))
            .sum::<f64>()
            .sqrt();
        if off <= JACOBI_TOLERANCE * scale {
            log::trace!("cyclic jacobi converged after {sweep} sweep(s)");
            break;
        }
        for p in 0..n {
            for q in (p + 1)..n {
                let apq = m.get(p, q);
                if apq == 0.0 {
                    continue;
                }
                let theta = (m.get(q, q) - m.get(p, p)) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                m.rotate_columns(p, q, c, s);
                m.rotate_rows(p, q, c, s);
                vectors.rotate_columns(p, q, c, s);
            }
        }
    }

    let mut order: Vec<(usize, f64)> = (0..n).map(|i| (i, m.get(i, i))).collect();
    order.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut eigenvectors = Matrix::zeros(n, n);
    let mut eigenvalues = Vec::with_capacity(n);
    for (dst, &(src, lambda)) in order.iter().enumerate() {
        eigenvalues.push(lambda);
        for r in 0..n {
            eigenvectors.set(r, dst, vectors.get(r, src));
        }
    }
    Ok(SymmetricEigen {
        eigenvalues,
        eigenvectors,
    })
}

impl SymmetricEigen {
    /// Keeps the `count` largest eigenpairs.
    pub fn leading(self, count: usize) -> Self {
        Self {
            eigenvalues: self.eigenvalues.into_iter().take(count).collect(),
            eigenvectors: self.eigenvectors.leading_columns(count),
        }
    }
}

/// Leading `count` eigenpairs of a symmetric positive semi-definite matrix.
///
/// Subspace iteration: the block is pushed through `a`, re-orthonormalised,
/// and rotated onto its Ritz vectors until the leading Ritz values settle.
pub fn leading_eigen(a: &Matrix, count: usize, cancel: &CancellationToken) -> Result<SymmetricEigen> {
    let n = a.rows();
    debug_assert_eq!(n, a.cols());
    let block = count + SUBSPACE_OVERSAMPLE;
    if block >= n {
        return Ok(symmetric_eigen(a, cancel)?.leading(count));
    }

    let mut basis = orthonormal_columns(&start_block(n, block), block);
    let mut previous: Vec<f64> = Vec::new();
    let mut iteration = 0;
    loop {
        cancel.check()?;
        iteration += 1;
        let image = a.multiply(&basis);
        let mut projected = basis.transpose_multiply(&image);
        projected.symmetrize();
        let ritz = symmetric_eigen(&projected, cancel)?;

        let reference = ritz.eigenvalues[0].abs().max(f64::MIN_POSITIVE);
        let settled = previous.len() == block
            && (0..count).all(|j| {
                (ritz.eigenvalues[j] - previous[j]).abs() <= SUBSPACE_TOLERANCE * reference
            });
        if settled || iteration == MAX_SUBSPACE_ITERATIONS {
            log::trace!(
                "subspace iteration for {count} of {n} eigenpairs stopped after {iteration} step(s), settled={settled}"
            );
            return Ok(SymmetricEigen {
                eigenvectors: basis.multiply(&ritz.eigenvectors),
                eigenvalues: ritz.eigenvalues,
            }
            .leading(count));
        }
        previous = ritz.eigenvalues;
        basis = orthonormal_columns(&image.multiply(&ritz.eigenvectors), block);
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

// Deterministic +-1 starting block (xorshift64), so streams are reproducible.
fn start_block(rows: usize, cols: usize) -> Matrix {
    let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
    let mut m = Matrix::zeros(rows, cols);
    for c in 0..cols {
        for r in 0..rows {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            m.set(r, c, if state & 1 == 0 { 1.0 } else { -1.0 });
        }
    }
    m
}

/// Orthonormalises the columns of `z` in order (Gram-Schmidt, applied twice),
/// topping up from the standard basis when a column depends on earlier ones.
/// `count` must not exceed `z.rows()`.
fn orthonormal_columns(z: &Matrix, count: usize) -> Matrix {
    let n = z.rows();
    let mut q = Matrix::zeros(n, count);
    let unit = |i: usize| {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        e
    };
    let candidates = (0..z.cols()).map(|j| z.column(j).to_vec()).chain((0..n).map(unit));

    let mut filled = 0;
    for mut x in candidates {
        if filled == count {
            break;
        }
        let before = norm(&x);
        if before == 0.0 {
            continue;
        }
        for _ in 0..2 {
            for j in 0..filled {
                let qj = q.column(j);
                let d = dot(qj, &x);
                for (xi, &qi) in x.iter_mut().zip(qj) {
                    *xi -= d * qi;
                }
            }
        }
        let after = norm(&x);
        if after <= DEPENDENCE_TOLERANCE * before {
            continue;
        }
        for (dst, &xi) in q.column_mut(filled).iter_mut().zip(&x) {
            *dst = xi / after;
        }
        filled += 1;
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_matrix(rows: usize, cols: usize) -> Matrix {
        let mut m = Matrix::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, ((r * 31 + c * 17) % 23) as f64 - 11.0 + (r as f64 * 0.5));
            }
        }
        m
    }

    fn reconstruct(svd: &Svd, rows: usize, cols: usize) -> Matrix {
        let mut out = Matrix::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                let value = (0..svd.singular_values.len())
                    .map(|k| svd.u.get(r, k) * svd.singular_values[k] * svd.v.get(c, k))
                    .sum();
                out.set(r, c, value);
            }
        }
        out
    }

    #[test]
    fn test_svd_reconstructs_tall_and_wide() {
        let cancel = CancellationToken::new();
        for (rows, cols) in [(7, 4), (4, 7), (5, 5)] {
            let a = sample_matrix(rows, cols);
            let svd = svd(&a, &cancel).unwrap();
            assert_eq!(svd.singular_values.len(), rows.min(cols));
            assert!(svd.singular_values.windows(2).all(|w| w[0] >= w[1]));
            let back = reconstruct(&svd, rows, cols);
            for r in 0..rows {
                for c in 0..cols {
                    assert!((back.get(r, c) - a.get(r, c)).abs() < 1e-9);
                }
            }
        }
    }

    #[test]
    fn test_svd_of_rank_one_matrix() {
        let cancel = CancellationToken::new();
        let mut a = Matrix::zeros(3, 3);
        for r in 0..3 {
            for c in 0..3 {
                a.set(r, c, ((r + 1) * (c + 1)) as f64);
            }
        }
        let svd = svd(&a, &cancel).unwrap();
        assert!((svd.singular_values[0] - 14.0).abs() < 1e-9);
        assert!(svd.singular_values[1].abs() < 1e-9);
    }

    #[test]
    fn test_symmetric_eigen() {
        let cancel = CancellationToken::new();
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 0, 2.0);
        a.set(0, 1, 1.0);
        a.set(1, 0, 1.0);
        a.set(1, 1, 2.0);
        let eigen = symmetric_eigen(&a, &cancel).unwrap();
        assert!((eigen.eigenvalues[0] - 3.0).abs() < 1e-12);
        assert!((eigen.eigenvalues[1] - 1.0).abs() < 1e-12);
        let v0 = eigen.eigenvectors.column(0);
        assert!((v0[0].abs() - v0[1].abs()).abs() < 1e-12);
    }

    // Sum of s_i * u_i * v_i^T over orthogonal cosine vectors, s_i = 0.7^i.
    fn spectral_matrix(rows: usize, cols: usize) -> Matrix {
        let basis = |i: usize, x: usize, len: usize| {
            (std::f64::consts::PI * i as f64 * (x as f64 + 0.5) / len as f64).cos()
        };
        let mut m = Matrix::zeros(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                let value = (0..rows.min(cols))
                    .map(|i| 0.7f64.powi(i as i32) * basis(i, r, rows) * basis(i, c, cols))
                    .sum();
                m.set(r, c, value);
            }
        }
        m
    }

    fn frobenius_distance(a: &Matrix, b: &Matrix) -> f64 {
        let mut sum = 0.0;
        for r in 0..a.rows() {
            for c in 0..a.cols() {
                sum += (a.get(r, c) - b.get(r, c)).powi(2);
            }
        }
        sum.sqrt()
    }

    #[test]
    fn test_truncated_svd_matches_full_decomposition() {
        let cancel = CancellationToken::new();
        for (rows, cols) in [(48, 36), (36, 48)] {
            let a = spectral_matrix(rows, cols);
            let full = svd(&a, &cancel).unwrap();
            let top = truncated_svd(&a, 3, &cancel).unwrap();
            assert_eq!(top.singular_values.len(), 3);
            assert_eq!((top.u.rows(), top.u.cols()), (rows, 3));
            assert_eq!((top.v.rows(), top.v.cols()), (cols, 3));

            let scale = full.singular_values[0];
            for j in 0..3 {
                assert!((top.singular_values[j] - full.singular_values[j]).abs() < 1e-8 * scale);
            }
            let tail: f64 = full.singular_values[3..].iter().map(|s| s * s).sum::<f64>().sqrt();
            let error = frobenius_distance(&a, &reconstruct(&top, rows, cols));
            assert!((error - tail).abs() < 1e-6 * scale, "{error} vs {tail}");
        }
    }

    #[test]
    fn test_leading_eigen_matches_full_eigen() {
        let cancel = CancellationToken::new();
        let a = spectral_matrix(40, 30);
        let gram = a.transpose_multiply(&a);
        let full = symmetric_eigen(&gram, &cancel).unwrap();
        let top = leading_eigen(&gram, 4, &cancel).unwrap();
        assert_eq!(top.eigenvectors.cols(), 4);
        for j in 0..4 {
            assert!((top.eigenvalues[j] - full.eigenvalues[j]).abs() < 1e-8 * full.eigenvalues[0]);
            let alignment = dot(top.eigenvectors.column(j), full.eigenvectors.column(j)).abs();
            assert!((alignment - 1.0).abs() < 1e-6, "vector {j}: {alignment}");
        }
    }

    #[test]
    fn test_leading_eigen_of_zero_matrix_is_orthonormal() {
        let cancel = CancellationToken::new();
        let top = leading_eigen(&Matrix::zeros(16, 16), 2, &cancel).unwrap();
        assert_eq!(top.eigenvalues, vec![0.0, 0.0]);
        let q = &top.eigenvectors;
        assert!((norm(q.column(0)) - 1.0).abs() < 1e-12);
        assert!((norm(q.column(1)) - 1.0).abs() < 1e-12);
        assert!(dot(q.column(0), q.column(1)).abs() < 1e-12);
    }

    #[test]
    fn test_multiply_and_transpose_multiply() {
        let a = sample_matrix(3, 2);
        let b = sample_matrix(2, 4);
        let product = a.multiply(&b);
        let expected = a.transpose().transpose_multiply(&b);
        assert_eq!((product.rows(), product.cols()), (3, 4));
        assert!(frobenius_distance(&product, &expected) < 1e-12);
        assert_eq!(product.get(1, 2), a.get(1, 0) * b.get(0, 2) + a.get(1, 1) * b.get(1, 2));
    }

    #[test]
    fn test_cancelled_svd() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(svd(&sample_matrix(4, 4), &cancel).is_err());
    }
}

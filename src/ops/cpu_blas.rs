//! Matrix-level kernels: generalized matrix multiply and matrix-vector multiply.
//!
//! Operands are row-major host slices in storage precision `D`. They are
//! widened to the compute precision `M`, multiplied with ndarray's
//! `general_mat_mul` / `general_mat_vec_mul` (matrixmultiply, or OpenBLAS with
//! the `cpu_openblas` feature) and rounded back into `C` / `y`.

use crate::dtype::{DataType, MathType};
use crate::error::{Error, Transpose};
use ndarray::linalg::{general_mat_mul, general_mat_vec_mul};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

fn operand<'a, D: DataType>(
    name: &str,
    data: &'a [D],
    rows: usize,
    cols: usize,
) -> Result<ArrayView2<'a, D>, Error> {
    let needed = rows * cols;
    if data.len() < needed {
        return Err(Error::CountMismatch {
            op: format!("gemm operand {}", name),
            expected: needed,
            actual: data.len(),
        });
    }
    ArrayView2::from_shape((rows, cols), &data[..needed])
        .map_err(|e| Error::ShapeError(e.to_string()))
}

fn widen<D: DataType, M: MathType>(view: ArrayView2<'_, D>, trans: Transpose) -> Array2<M> {
    let wide = view.mapv(|v| v.to_math::<M>());
    match trans {
        Transpose::NoTrans => wide,
        Transpose::Trans => wide.reversed_axes(),
    }
}

/// `C = alpha * op(A) * op(B) + beta * C`
///
/// `op(A)` is `m x k`, `op(B)` is `k x n` and `C` is `m x n`. When `beta` is
/// zero the previous contents of `C` are ignored, so NaN or garbage in `C`
/// does not leak into the result.
#[allow(clippy::too_many_arguments)]
pub fn gemm<D: DataType, M: MathType>(
    trans_a: Transpose,
    trans_b: Transpose,
    m: usize,
    n: usize,
    k: usize,
    alpha: M,
    a: &[D],
    b: &[D],
    beta: M,
    c: &mut [D],
) -> Result<(), Error> {
    let a_view = match trans_a {
        Transpose::NoTrans => operand("A", a, m, k)?,
        Transpose::Trans => operand("A", a, k, m)?,
    };
    let b_view = match trans_b {
        Transpose::NoTrans => operand("B", b, k, n)?,
        Transpose::Trans => operand("B", b, n, k)?,
    };
    let needed = m * n;
    if c.len() < needed {
        return Err(Error::CountMismatch {
            op: "gemm operand C".to_string(),
            expected: needed,
            actual: c.len(),
        });
    }
    let a_wide = widen::<D, M>(a_view, trans_a);
    let b_wide = widen::<D, M>(b_view, trans_b);

    let c = &mut c[..needed];
    let mut c_wide = if beta == M::zero() {
        Array2::<M>::zeros((m, n))
    } else {
        ArrayView2::from_shape((m, n), &*c)
            .map_err(|e| Error::ShapeError(e.to_string()))?
            .mapv(|v| v.to_math::<M>())
    };
    general_mat_mul(alpha, &a_wide, &b_wide, beta, &mut c_wide);

    for (dst, &src) in c.iter_mut().zip(c_wide.iter()) {
        *dst = D::from_math(src);
    }
    Ok(())
}

/// `y = alpha * op(A) * x + beta * y`
///
/// `A` is stored as `m x n`; with `Transpose::Trans` the product uses `Aᵀ`
/// (so `x` has `m` elements and `y` has `n`).
#[allow(clippy::too_many_arguments)]
pub fn gemv<D: DataType, M: MathType>(
    trans_a: Transpose,
    m: usize,
    n: usize,
    alpha: M,
    a: &[D],
    x: &[D],
    beta: M,
    y: &mut [D],
) -> Result<(), Error> {
    let a_view = operand("A", a, m, n)?;
    let (x_len, y_len) = match trans_a {
        Transpose::NoTrans => (n, m),
        Transpose::Trans => (m, n),
    };
    if x.len() < x_len || y.len() < y_len {
        return Err(Error::CountMismatch {
            op: "gemv".to_string(),
            expected: x_len.max(y_len),
            actual: x.len().min(y.len()),
        });
    }
    let a_wide = widen::<D, M>(a_view, trans_a);
    let x_wide = ArrayView1::from(&x[..x_len]).mapv(|v| v.to_math::<M>());

    let y = &mut y[..y_len];
    let mut y_wide = if beta == M::zero() {
        Array1::<M>::zeros(y_len)
    } else {
        ArrayView1::from(&*y).mapv(|v| v.to_math::<M>())
    };
    general_mat_vec_mul(alpha, &a_wide, &x_wide, beta, &mut y_wide);

    for (dst, &src) in y.iter_mut().zip(y_wide.iter()) {
        *dst = D::from_math(src);
    }
    Ok(())
}

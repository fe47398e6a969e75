//! Element-wise kernels over host slices.
//!
//! Every kernel reads storage values, evaluates in the compute precision `M`
//! and writes the rounded result back. Domain errors (e.g. `log` of a negative
//! value) are not checked and surface as NaN/Inf.

use crate::dtype::{DataType, MathType};
use crate::error::Error;
use ndarray::{ArrayView1, ArrayViewMut1, Zip};

fn check_len(op: &str, expected: usize, actual: usize) -> Result<(), Error> {
    if expected != actual {
        return Err(Error::CountMismatch {
            op: op.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

/// Apply `f` to every element of `y` in place.
#[inline]
fn map_inplace<D: DataType, M: MathType>(y: &mut [D], f: impl Fn(M) -> M) {
    for v in y.iter_mut() {
        *v = D::from_math(f(v.to_math()));
    }
}

/// `y[i] = f(a[i])`
fn unary<D: DataType, M: MathType>(
    op: &str,
    a: &[D],
    y: &mut [D],
    f: impl Fn(M) -> M,
) -> Result<(), Error> {
    check_len(op, a.len(), y.len())?;
    Zip::from(ArrayViewMut1::from(y))
        .and(ArrayView1::from(a))
        .for_each(|y, &a| *y = D::from_math(f(a.to_math())));
    Ok(())
}

/// `y[i] = f(a[i], b[i])`
fn binary<D: DataType, M: MathType>(
    op: &str,
    a: &[D],
    b: &[D],
    y: &mut [D],
    f: impl Fn(M, M) -> M,
) -> Result<(), Error> {
    check_len(op, a.len(), b.len())?;
    check_len(op, a.len(), y.len())?;
    Zip::from(ArrayViewMut1::from(y))
        .and(ArrayView1::from(a))
        .and(ArrayView1::from(b))
        .for_each(|y, &a, &b| *y = D::from_math(f(a.to_math(), b.to_math())));
    Ok(())
}

/// `y[i] = f(y[i], a[i])`
fn binary_assign<D: DataType, M: MathType>(
    op: &str,
    a: &[D],
    y: &mut [D],
    f: impl Fn(M, M) -> M,
) -> Result<(), Error> {
    check_len(op, a.len(), y.len())?;
    Zip::from(ArrayViewMut1::from(y))
        .and(ArrayView1::from(a))
        .for_each(|y, &a| *y = D::from_math(f(y.to_math(), a.to_math())));
    Ok(())
}

/// Fill `y` with `alpha`.
pub fn set<D: DataType, M: MathType>(alpha: M, y: &mut [D]) {
    y.fill(D::from_math(alpha));
}

pub fn copy<D: DataType>(x: &[D], y: &mut [D]) -> Result<(), Error> {
    check_len("copy", x.len(), y.len())?;
    y.copy_from_slice(x);
    Ok(())
}

/// `x *= alpha`
pub fn scal<D: DataType, M: MathType>(alpha: M, x: &mut [D]) {
    map_inplace::<D, M>(x, |v| v * alpha);
}

/// `y += alpha`
pub fn add_scalar<D: DataType, M: MathType>(alpha: M, y: &mut [D]) {
    map_inplace::<D, M>(y, |v| v + alpha);
}

/// `y += alpha * x`
pub fn axpy<D: DataType, M: MathType>(alpha: M, x: &[D], y: &mut [D]) -> Result<(), Error> {
    binary_assign::<D, M>("axpy", x, y, |y, x| alpha * x + y)
}

/// `y = alpha * x + beta * y`
pub fn axpby<D: DataType, M: MathType>(
    alpha: M,
    x: &[D],
    beta: M,
    y: &mut [D],
) -> Result<(), Error> {
    binary_assign::<D, M>("axpby", x, y, |y, x| alpha * x + beta * y)
}

pub fn add<D: DataType, M: MathType>(a: &[D], b: &[D], y: &mut [D]) -> Result<(), Error> {
    binary::<D, M>("add", a, b, y, |a, b| a + b)
}

pub fn sub<D: DataType, M: MathType>(a: &[D], b: &[D], y: &mut [D]) -> Result<(), Error> {
    binary::<D, M>("sub", a, b, y, |a, b| a - b)
}

pub fn mul<D: DataType, M: MathType>(a: &[D], b: &[D], y: &mut [D]) -> Result<(), Error> {
    binary::<D, M>("mul", a, b, y, |a, b| a * b)
}

pub fn div<D: DataType, M: MathType>(a: &[D], b: &[D], y: &mut [D]) -> Result<(), Error> {
    binary::<D, M>("div", a, b, y, |a, b| a / b)
}

/// `y *= a`
pub fn mul_assign<D: DataType, M: MathType>(a: &[D], y: &mut [D]) -> Result<(), Error> {
    binary_assign::<D, M>("mul_assign", a, y, |y, a| y * a)
}

/// `y /= a`
pub fn div_assign<D: DataType, M: MathType>(a: &[D], y: &mut [D]) -> Result<(), Error> {
    binary_assign::<D, M>("div_assign", a, y, |y, a| y / a)
}

pub fn exp<D: DataType, M: MathType>(a: &[D], y: &mut [D]) -> Result<(), Error> {
    unary::<D, M>("exp", a, y, |v| v.exp())
}

/// Natural logarithm.
pub fn log<D: DataType, M: MathType>(a: &[D], y: &mut [D]) -> Result<(), Error> {
    unary::<D, M>("log", a, y, |v| v.ln())
}

/// `y = a^b`
pub fn powx<D: DataType, M: MathType>(a: &[D], b: M, y: &mut [D]) -> Result<(), Error> {
    unary::<D, M>("powx", a, y, |v| v.powf(b))
}

pub fn exp_inplace<D: DataType, M: MathType>(y: &mut [D]) {
    map_inplace::<D, M>(y, |v| v.exp());
}

pub fn log_inplace<D: DataType, M: MathType>(y: &mut [D]) {
    map_inplace::<D, M>(y, |v| v.ln());
}

pub fn powx_inplace<D: DataType, M: MathType>(b: M, y: &mut [D]) {
    map_inplace::<D, M>(y, |v| v.powf(b));
}

/// Sum of absolute values, accumulated in `M`.
pub fn asum<D: DataType, M: MathType>(x: &[D]) -> M {
    x.iter().fold(M::zero(), |acc, &v| acc + v.to_math::<M>().abs())
}

/// Inner product accumulated in `M`.
pub fn dot<D: DataType, M: MathType>(x: &[D], y: &[D]) -> Result<M, Error> {
    check_len("dot", x.len(), y.len())?;
    Ok(x.iter()
        .zip(y)
        .fold(M::zero(), |acc, (&a, &b)| acc + a.to_math::<M>() * b.to_math::<M>()))
}

/// Inner product of `n` elements taken every `incx` / `incy` positions.
pub fn strided_dot<D: DataType, M: MathType>(
    n: usize,
    x: &[D],
    incx: usize,
    y: &[D],
    incy: usize,
) -> Result<M, Error> {
    if incx == 0 || incy == 0 {
        return Err(Error::InvalidOperation(
            "strided_dot requires non-zero strides".to_string(),
        ));
    }
    if n == 0 {
        return Ok(M::zero());
    }
    let need_x = (n - 1) * incx + 1;
    let need_y = (n - 1) * incy + 1;
    if x.len() < need_x || y.len() < need_y {
        return Err(Error::CountMismatch {
            op: "strided_dot".to_string(),
            expected: need_x.max(need_y),
            actual: x.len().min(y.len()),
        });
    }
    Ok(x.iter()
        .step_by(incx)
        .zip(y.iter().step_by(incy))
        .take(n)
        .fold(M::zero(), |acc, (&a, &b)| acc + a.to_math::<M>() * b.to_math::<M>()))
}

//! Element-wise activation formulas shared by the portable layers and the
//! host reference device.

use crate::dtype::{DataType, MathType};
use crate::error::Error;
use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// Activation functions an accelerator can evaluate through descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationMode {
    Relu,
    Sigmoid,
    Tanh,
}

impl std::fmt::Display for ActivationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationMode::Relu => write!(f, "ReLU"),
            ActivationMode::Sigmoid => write!(f, "Sigmoid"),
            ActivationMode::Tanh => write!(f, "TanH"),
        }
    }
}

fn same_len(op: &str, lens: &[usize]) -> Result<(), Error> {
    if let Some((&first, rest)) = lens.split_first() {
        if let Some(&bad) = rest.iter().find(|&&l| l != first) {
            return Err(Error::CountMismatch {
                op: op.to_string(),
                expected: first,
                actual: bad,
            });
        }
    }
    Ok(())
}

/// `y = max(x, 0) + negative_slope * min(x, 0)`
pub fn relu_forward<D: DataType, M: MathType>(
    x: &[D],
    y: &mut [D],
    negative_slope: M,
) -> Result<(), Error> {
    same_len("relu_forward", &[x.len(), y.len()])?;
    Zip::from(ArrayViewMut1::from(y))
        .and(ArrayView1::from(x))
        .for_each(|y, &x| {
            let x: M = x.to_math();
            *y = D::from_math(x.max(M::zero()) + negative_slope * x.min(M::zero()));
        });
    Ok(())
}

/// `dx = dy * (x > 0 ? 1 : negative_slope)`
pub fn relu_backward<D: DataType, M: MathType>(
    x: &[D],
    dy: &[D],
    dx: &mut [D],
    negative_slope: M,
) -> Result<(), Error> {
    same_len("relu_backward", &[x.len(), dy.len(), dx.len()])?;
    Zip::from(ArrayViewMut1::from(dx))
        .and(ArrayView1::from(x))
        .and(ArrayView1::from(dy))
        .for_each(|dx, &x, &dy| {
            let x: M = x.to_math();
            let slope = if x > M::zero() { M::one() } else { negative_slope };
            *dx = D::from_math(dy.to_math::<M>() * slope);
        });
    Ok(())
}

/// `y = 1 / (1 + exp(-x))`, evaluated as `0.5 * tanh(0.5 x) + 0.5` to stay
/// finite for large `|x|`.
pub fn sigmoid_forward<D: DataType, M: MathType>(x: &[D], y: &mut [D]) -> Result<(), Error> {
    same_len("sigmoid_forward", &[x.len(), y.len()])?;
    let half = M::from_f64(0.5);
    Zip::from(ArrayViewMut1::from(y))
        .and(ArrayView1::from(x))
        .for_each(|y, &x| {
            let x: M = x.to_math();
            *y = D::from_math(half * (half * x).tanh() + half);
        });
    Ok(())
}

/// `dx = dy * y * (1 - y)` in terms of the forward output `y`.
pub fn sigmoid_backward<D: DataType, M: MathType>(
    y: &[D],
    dy: &[D],
    dx: &mut [D],
) -> Result<(), Error> {
    same_len("sigmoid_backward", &[y.len(), dy.len(), dx.len()])?;
    Zip::from(ArrayViewMut1::from(dx))
        .and(ArrayView1::from(y))
        .and(ArrayView1::from(dy))
        .for_each(|dx, &y, &dy| {
            let y: M = y.to_math();
            *dx = D::from_math(dy.to_math::<M>() * y * (M::one() - y));
        });
    Ok(())
}

pub fn tanh_forward<D: DataType, M: MathType>(x: &[D], y: &mut [D]) -> Result<(), Error> {
    same_len("tanh_forward", &[x.len(), y.len()])?;
    Zip::from(ArrayViewMut1::from(y))
        .and(ArrayView1::from(x))
        .for_each(|y, &x| *y = D::from_math(x.to_math::<M>().tanh()));
    Ok(())
}

/// `dx = dy * (1 - y^2)`
pub fn tanh_backward<D: DataType, M: MathType>(
    y: &[D],
    dy: &[D],
    dx: &mut [D],
) -> Result<(), Error> {
    same_len("tanh_backward", &[y.len(), dy.len(), dx.len()])?;
    Zip::from(ArrayViewMut1::from(dx))
        .and(ArrayView1::from(y))
        .and(ArrayView1::from(dy))
        .for_each(|dx, &y, &dy| {
            let y: M = y.to_math();
            *dx = D::from_math(dy.to_math::<M>() * (M::one() - y * y));
        });
    Ok(())
}

/// Forward dispatch on `mode`. ReLU uses a zero negative slope.
pub fn forward<D: DataType, M: MathType>(
    mode: ActivationMode,
    x: &[D],
    y: &mut [D],
) -> Result<(), Error> {
    match mode {
        ActivationMode::Relu => relu_forward::<D, M>(x, y, M::zero()),
        ActivationMode::Sigmoid => sigmoid_forward::<D, M>(x, y),
        ActivationMode::Tanh => tanh_forward::<D, M>(x, y),
    }
}

/// Backward dispatch on `mode`. ReLU reads `x`, the others read `y`.
pub fn backward<D: DataType, M: MathType>(
    mode: ActivationMode,
    x: &[D],
    y: &[D],
    dy: &[D],
    dx: &mut [D],
) -> Result<(), Error> {
    match mode {
        ActivationMode::Relu => relu_backward::<D, M>(x, dy, dx, M::zero()),
        ActivationMode::Sigmoid => sigmoid_backward::<D, M>(y, dy, dx),
        ActivationMode::Tanh => tanh_backward::<D, M>(y, dy, dx),
    }
}

use crate::blob::Blob;
use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::layer::Layer;

/// Finite-difference gradient checker for layers.
///
/// The layer is driven with the objective `L = Σ_top Σ_i ½·top_i²`, so every
/// top `diff` is seeded with its own `data`. The analytical gradient produced
/// by `backward` is compared against the central difference
/// `(L(x + h) - L(x - h)) / 2h` for every element of every bottom blob and of
/// every parameter blob whose gradient is enabled.
///
/// Blob indices in [`Error::GradientCheckError`] count bottoms first, then
/// parameter blobs.
#[derive(Debug, Clone)]
pub struct GradientChecker {
    stepsize: f64,
    threshold: f64,
    kink: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Bottom(usize),
    Param(usize),
}

impl GradientChecker {
    pub fn new(stepsize: f64, threshold: f64) -> Self {
        Self {
            stepsize,
            threshold,
            kink: None,
        }
    }

    /// Skip bottom elements within `range` of a non-differentiable point.
    pub fn with_kink(mut self, kink: f64, range: f64) -> Self {
        self.kink = Some((kink, range));
        self
    }

    /// Set up `layer` on `bottom`/`top` and check every gradient it produces.
    pub fn check_layer<D, M, L>(
        &self,
        layer: &mut L,
        bottom: &mut [Blob<D>],
        top: &mut [Blob<D>],
    ) -> Result<(), Error>
    where
        D: DataType,
        M: MathType,
        L: Layer<D, M> + ?Sized,
    {
        {
            let bottom_refs: Vec<&Blob<D>> = bottom.iter().collect();
            let mut top_refs: Vec<&mut Blob<D>> = top.iter_mut().collect();
            layer.setup(&bottom_refs, &mut top_refs)?;
        }

        let mut targets: Vec<Target> = (0..bottom.len()).map(Target::Bottom).collect();
        targets.extend(
            (0..layer.blobs().len())
                .filter(|&j| layer.param_propagate_down(j))
                .map(Target::Param),
        );

        let analytical = analytical_gradients::<D, M, L>(layer, bottom, top, &targets)?;

        for (blob_index, (&target, grads)) in targets.iter().zip(&analytical).enumerate() {
            for (at_index, &a) in grads.iter().enumerate() {
                let original = read::<D, M, L>(layer, bottom, target, at_index);
                if let (Target::Bottom(_), Some((kink, range))) = (target, self.kink) {
                    if (original - kink).abs() < range {
                        continue;
                    }
                }

                write::<D, M, L>(layer, bottom, target, at_index, original + self.stepsize);
                let loss_plus = forward_objective::<D, M, L>(layer, bottom, top)?;
                write::<D, M, L>(layer, bottom, target, at_index, original - self.stepsize);
                let loss_minus = forward_objective::<D, M, L>(layer, bottom, top)?;
                write::<D, M, L>(layer, bottom, target, at_index, original);

                let numerical = (loss_plus - loss_minus) / (2.0 * self.stepsize);
                let scale = a.abs().max(numerical.abs()).max(1.0);
                if (a - numerical).abs() > self.threshold * scale {
                    return Err(Error::GradientCheckError {
                        analytical: a,
                        numerical,
                        blob_index,
                        at_index,
                        threshold: self.threshold,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Check `layer` with the given finite-difference step and relative tolerance.
pub fn check_layer_gradient<D, M, L>(
    layer: &mut L,
    bottom: &mut [Blob<D>],
    top: &mut [Blob<D>],
    stepsize: f64,
    threshold: f64,
) -> Result<(), Error>
where
    D: DataType,
    M: MathType,
    L: Layer<D, M> + ?Sized,
{
    GradientChecker::new(stepsize, threshold).check_layer::<D, M, L>(layer, bottom, top)
}

fn run_forward<D, M, L>(layer: &mut L, bottom: &[Blob<D>], top: &mut [Blob<D>]) -> Result<(), Error>
where
    D: DataType,
    M: MathType,
    L: Layer<D, M> + ?Sized,
{
    let bottom_refs: Vec<&Blob<D>> = bottom.iter().collect();
    let mut top_refs: Vec<&mut Blob<D>> = top.iter_mut().collect();
    layer.forward(&bottom_refs, &mut top_refs)
}

fn forward_objective<D, M, L>(layer: &mut L, bottom: &[Blob<D>], top: &mut [Blob<D>]) -> Result<f64, Error>
where
    D: DataType,
    M: MathType,
    L: Layer<D, M> + ?Sized,
{
    run_forward::<D, M, L>(layer, bottom, top)?;
    Ok(top
        .iter()
        .map(|t| {
            t.cpu_data()
                .iter()
                .map(|v| 0.5 * v.as_f64() * v.as_f64())
                .sum::<f64>()
        })
        .sum())
}

fn analytical_gradients<D, M, L>(
    layer: &mut L,
    bottom: &mut [Blob<D>],
    top: &mut [Blob<D>],
    targets: &[Target],
) -> Result<Vec<Vec<f64>>, Error>
where
    D: DataType,
    M: MathType,
    L: Layer<D, M> + ?Sized,
{
    run_forward::<D, M, L>(layer, bottom, top)?;
    for t in top.iter_mut() {
        let data = t.data_vec();
        t.set_diff_from_slice(&data)?;
    }
    for b in bottom.iter_mut() {
        b.zero_diff();
    }
    for p in layer.blobs_mut() {
        p.zero_diff();
    }
    {
        let propagate_down = vec![true; bottom.len()];
        let top_refs: Vec<&Blob<D>> = top.iter().collect();
        let mut bottom_refs: Vec<&mut Blob<D>> = bottom.iter_mut().collect();
        layer.backward(&top_refs, &propagate_down, &mut bottom_refs)?;
    }

    let to_f64 = |blob: &Blob<D>| -> Vec<f64> { blob.cpu_diff().iter().map(|v| v.as_f64()).collect() };
    Ok(targets
        .iter()
        .map(|&target| match target {
            Target::Bottom(i) => to_f64(&bottom[i]),
            Target::Param(j) => to_f64(&layer.blobs()[j]),
        })
        .collect())
}

fn read<D, M, L>(layer: &L, bottom: &[Blob<D>], target: Target, at: usize) -> f64
where
    D: DataType,
    M: MathType,
    L: Layer<D, M> + ?Sized,
{
    match target {
        Target::Bottom(i) => bottom[i].cpu_data()[at].as_f64(),
        Target::Param(j) => layer.blobs()[j].cpu_data()[at].as_f64(),
    }
}

fn write<D, M, L>(layer: &mut L, bottom: &mut [Blob<D>], target: Target, at: usize, value: f64)
where
    D: DataType,
    M: MathType,
    L: Layer<D, M> + ?Sized,
{
    let blob = match target {
        Target::Bottom(i) => &mut bottom[i],
        Target::Param(j) => &mut layer.blobs_mut()[j],
    };
    blob.mutable_cpu_data()[at] = D::from_f64(value);
}

//! Parameter initialization strategies.
//!
//! A filler writes initial values into a blob's `data`. Layers call one filler
//! per parameter blob, exactly once, during setup.

use crate::blob::Blob;
use crate::config::{FillerParameter, VarianceNorm};
use crate::dtype::DataType;
use crate::error::Error;
use rand::RngCore;
use rand_distr::{Distribution, Normal, Uniform};

pub trait Filler<D: DataType> {
    /// Fill `blob` drawing randomness from `rng`.
    fn fill_with_rng(&self, blob: &mut Blob<D>, rng: &mut dyn RngCore) -> Result<(), Error>;

    /// Fill `blob` using the thread-local generator.
    fn fill(&self, blob: &mut Blob<D>) -> Result<(), Error> {
        let mut rng = rand::rng();
        self.fill_with_rng(blob, &mut rng)
    }
}

fn sample_into<D: DataType>(
    blob: &mut Blob<D>,
    dist: impl Distribution<f64>,
    rng: &mut dyn RngCore,
) {
    for v in blob.mutable_cpu_data().iter_mut() {
        *v = D::from_f64(dist.sample(&mut *rng));
    }
}

fn uniform(min: f64, max: f64) -> Result<Uniform<f64>, Error> {
    if !(min <= max) {
        return Err(Error::InvalidParameter(format!(
            "uniform filler requires min <= max, got [{}, {}]",
            min, max
        )));
    }
    Uniform::new_inclusive(min, max).map_err(|e| Error::InvalidParameter(e.to_string()))
}

fn normal(mean: f64, std: f64) -> Result<Normal<f64>, Error> {
    if !(std >= 0.0) {
        return Err(Error::InvalidParameter(format!(
            "gaussian filler requires a non-negative std, got {}",
            std
        )));
    }
    Normal::new(mean, std).map_err(|e| Error::InvalidParameter(e.to_string()))
}

/// Fan count used by the variance-scaling fillers.
fn fan<D: DataType>(blob: &Blob<D>, norm: VarianceNorm) -> Result<f64, Error> {
    let count = blob.count();
    let num = blob.num()?;
    let channels = blob.channels()?;
    if count == 0 || num == 0 || channels == 0 {
        return Err(Error::InvalidParameter(format!(
            "cannot derive fans from an empty blob of shape {:?}",
            blob.shape()
        )));
    }
    let fan_in = (count / num) as f64;
    let fan_out = (count / channels) as f64;
    Ok(match norm {
        VarianceNorm::FanIn => fan_in,
        VarianceNorm::FanOut => fan_out,
        VarianceNorm::Average => (fan_in + fan_out) / 2.0,
    })
}

#[derive(Debug, Clone)]
pub struct ConstantFiller {
    pub value: f64,
}

impl<D: DataType> Filler<D> for ConstantFiller {
    fn fill_with_rng(&self, blob: &mut Blob<D>, _rng: &mut dyn RngCore) -> Result<(), Error> {
        blob.mutable_cpu_data().fill(D::from_f64(self.value));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct UniformFiller {
    pub min: f64,
    pub max: f64,
}

impl<D: DataType> Filler<D> for UniformFiller {
    fn fill_with_rng(&self, blob: &mut Blob<D>, rng: &mut dyn RngCore) -> Result<(), Error> {
        let dist = uniform(self.min, self.max)?;
        sample_into(blob, dist, rng);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct GaussianFiller {
    pub mean: f64,
    pub std: f64,
}

impl<D: DataType> Filler<D> for GaussianFiller {
    fn fill_with_rng(&self, blob: &mut Blob<D>, rng: &mut dyn RngCore) -> Result<(), Error> {
        let dist = normal(self.mean, self.std)?;
        sample_into(blob, dist, rng);
        Ok(())
    }
}

/// Uniform in `[-s, s]` with `s = sqrt(3 / n)`, `n` chosen by `variance_norm`.
#[derive(Debug, Clone)]
pub struct XavierFiller {
    pub variance_norm: VarianceNorm,
}

impl<D: DataType> Filler<D> for XavierFiller {
    fn fill_with_rng(&self, blob: &mut Blob<D>, rng: &mut dyn RngCore) -> Result<(), Error> {
        let n = fan(blob, self.variance_norm)?;
        let scale = (3.0 / n).sqrt();
        let dist = uniform(-scale, scale)?;
        sample_into(blob, dist, rng);
        Ok(())
    }
}

/// Gaussian with zero mean and `std = sqrt(2 / n)`.
#[derive(Debug, Clone)]
pub struct MsraFiller {
    pub variance_norm: VarianceNorm,
}

impl<D: DataType> Filler<D> for MsraFiller {
    fn fill_with_rng(&self, blob: &mut Blob<D>, rng: &mut dyn RngCore) -> Result<(), Error> {
        let n = fan(blob, self.variance_norm)?;
        let dist = normal(0.0, (2.0 / n).sqrt())?;
        sample_into(blob, dist, rng);
        Ok(())
    }
}

/// Build the filler described by `param`.
pub fn create_filler<D: DataType>(param: &FillerParameter) -> Box<dyn Filler<D>> {
    match *param {
        FillerParameter::Constant { value } => Box::new(ConstantFiller { value }),
        FillerParameter::Uniform { min, max } => Box::new(UniformFiller { min, max }),
        FillerParameter::Gaussian { mean, std } => Box::new(GaussianFiller { mean, std }),
        FillerParameter::Xavier { variance_norm } => Box::new(XavierFiller { variance_norm }),
        FillerParameter::Msra { variance_norm } => Box::new(MsraFiller { variance_norm }),
    }
}

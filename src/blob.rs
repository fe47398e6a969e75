use crate::dtype::{DataType, MathType};
use crate::error::Error;
use crate::ops::cpu_ops;
use crate::util::{self, MAX_BLOB_AXES};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

type Buffer<D> = Rc<RefCell<Vec<D>>>;

fn alloc<D: DataType>(len: usize) -> Buffer<D> {
    Rc::new(RefCell::new(vec![D::default(); len]))
}

/// A shaped buffer holding forward values (`data`) and gradients (`diff`).
///
/// Both arrays always have the same shape. The buffers are reference counted
/// so one blob can alias another's values via [`Blob::share_data`]; the alias
/// is a view, not an owner. When the producer reshapes to a larger size it
/// reallocates and the alias keeps pointing at the old buffer until it is
/// shared again.
///
/// # Example
/// ```rust
/// use rust_layer_lib::Blob;
///
/// let mut blob = Blob::<f32>::new(&[2, 3, 4]).unwrap();
/// assert_eq!(blob.count(), 24);
/// assert_eq!(blob.count_from(1).unwrap(), 12);
/// blob.reshape(&[6, 4]).unwrap();
/// assert_eq!(blob.shape(), &[6, 4]);
/// ```
pub struct Blob<D: DataType> {
    shape: Vec<usize>,
    count: usize,
    capacity: usize,
    data: Buffer<D>,
    diff: Buffer<D>,
}

impl<D: DataType> Blob<D> {
    /// A blob with no axes and no storage.
    pub fn empty() -> Self {
        Self {
            shape: Vec::new(),
            count: 0,
            capacity: 0,
            data: alloc(0),
            diff: alloc(0),
        }
    }

    /// A zero-initialized blob of the given shape.
    pub fn new(shape: &[usize]) -> Result<Self, Error> {
        let mut blob = Self::empty();
        blob.reshape(shape)?;
        Ok(blob)
    }

    pub fn from_vec(data: Vec<D>, shape: &[usize]) -> Result<Self, Error> {
        let mut blob = Self::new(shape)?;
        blob.set_data_from_slice(&data)?;
        Ok(blob)
    }

    /// Change the shape of both `data` and `diff`.
    ///
    /// Storage is reallocated only when the new count exceeds the current
    /// capacity, otherwise the existing buffers are reused as they are.
    pub fn reshape(&mut self, shape: &[usize]) -> Result<(), Error> {
        if shape.len() > MAX_BLOB_AXES {
            return Err(Error::ShapeError(format!(
                "Blob has {} axes, at most {} are supported",
                shape.len(),
                MAX_BLOB_AXES
            )));
        }
        let count = util::checked_count(shape)?;
        self.shape.clear();
        self.shape.extend_from_slice(shape);
        self.count = count;
        if count > self.capacity {
            self.capacity = count;
            self.data = alloc(count);
            self.diff = alloc(count);
        }
        Ok(())
    }

    pub fn reshape_like(&mut self, other: &Blob<D>) -> Result<(), Error> {
        self.reshape(&other.shape)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Dimension at a possibly negative axis.
    pub fn shape_at(&self, axis: isize) -> Result<usize, Error> {
        Ok(self.shape[self.canonical_axis_index(axis)?])
    }

    pub fn num_axes(&self) -> usize {
        self.shape.len()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Product of dimensions from `start` to the last axis.
    pub fn count_from(&self, start: usize) -> Result<usize, Error> {
        util::count_range(&self.shape, start, self.shape.len())
    }

    /// Product of dimensions in `[start, end)`.
    pub fn count_range(&self, start: usize, end: usize) -> Result<usize, Error> {
        util::count_range(&self.shape, start, end)
    }

    pub fn canonical_axis_index(&self, axis: isize) -> Result<usize, Error> {
        util::canonical_axis_index(axis, self.shape.len())
    }

    fn legacy_shape(&self, index: isize) -> Result<usize, Error> {
        if self.shape.len() > 4 {
            return Err(Error::ShapeError(format!(
                "Cannot use legacy accessors on a blob with {} axes",
                self.shape.len()
            )));
        }
        if index >= self.shape.len() as isize || index < -(self.shape.len() as isize) {
            // Axes past the end behave as singleton dimensions.
            return Ok(1);
        }
        self.shape_at(index)
    }

    /// Legacy 4-D view: sample count.
    pub fn num(&self) -> Result<usize, Error> {
        self.legacy_shape(0)
    }

    pub fn channels(&self) -> Result<usize, Error> {
        self.legacy_shape(1)
    }

    pub fn height(&self) -> Result<usize, Error> {
        self.legacy_shape(2)
    }

    pub fn width(&self) -> Result<usize, Error> {
        self.legacy_shape(3)
    }

    /// Flat offset of a (possibly partial) index.
    pub fn offset(&self, indices: &[usize]) -> Result<usize, Error> {
        if indices.len() > self.shape.len() {
            return Err(Error::ShapeError(format!(
                "Index {:?} has more axes than shape {:?}",
                indices, self.shape
            )));
        }
        let mut offset = 0;
        for (axis, &dim) in self.shape.iter().enumerate() {
            offset *= dim;
            if let Some(&i) = indices.get(axis) {
                if i >= dim {
                    return Err(Error::ShapeError(format!(
                        "Index {:?} out of bounds for shape {:?}",
                        indices, self.shape
                    )));
                }
                offset += i;
            }
        }
        Ok(offset)
    }

    // --- Data access ---

    pub fn cpu_data(&self) -> Ref<'_, [D]> {
        let count = self.count;
        Ref::map(self.data.borrow(), |v| &v[..count])
    }

    pub fn mutable_cpu_data(&mut self) -> RefMut<'_, [D]> {
        let count = self.count;
        RefMut::map(self.data.borrow_mut(), |v| &mut v[..count])
    }

    pub fn cpu_diff(&self) -> Ref<'_, [D]> {
        let count = self.count;
        Ref::map(self.diff.borrow(), |v| &v[..count])
    }

    pub fn mutable_cpu_diff(&mut self) -> RefMut<'_, [D]> {
        let count = self.count;
        RefMut::map(self.diff.borrow_mut(), |v| &mut v[..count])
    }

    /// Read `data` while writing `diff` of the same blob.
    pub fn data_and_mutable_diff(&mut self) -> (Ref<'_, [D]>, RefMut<'_, [D]>) {
        let count = self.count;
        (
            Ref::map(self.data.borrow(), |v| &v[..count]),
            RefMut::map(self.diff.borrow_mut(), |v| &mut v[..count]),
        )
    }

    /// Copies `data` out as a vector.
    pub fn data_vec(&self) -> Vec<D> {
        self.cpu_data().to_vec()
    }

    pub fn diff_vec(&self) -> Vec<D> {
        self.cpu_diff().to_vec()
    }

    pub fn data_at(&self, indices: &[usize]) -> Result<D, Error> {
        let offset = self.offset(indices)?;
        Ok(self.cpu_data()[offset])
    }

    pub fn diff_at(&self, indices: &[usize]) -> Result<D, Error> {
        let offset = self.offset(indices)?;
        Ok(self.cpu_diff()[offset])
    }

    pub fn set_data_from_slice(&mut self, values: &[D]) -> Result<(), Error> {
        if values.len() != self.count {
            return Err(Error::CountMismatch {
                op: "set_data_from_slice".to_string(),
                expected: self.count,
                actual: values.len(),
            });
        }
        self.mutable_cpu_data().copy_from_slice(values);
        Ok(())
    }

    pub fn set_diff_from_slice(&mut self, values: &[D]) -> Result<(), Error> {
        if values.len() != self.count {
            return Err(Error::CountMismatch {
                op: "set_diff_from_slice".to_string(),
                expected: self.count,
                actual: values.len(),
            });
        }
        self.mutable_cpu_diff().copy_from_slice(values);
        Ok(())
    }

    pub fn zero_diff(&mut self) {
        self.mutable_cpu_diff().fill(D::default());
    }

    // --- Sharing ---

    /// Alias this blob's `data` with `other`'s. Writes through either blob are
    /// visible through both; `diff` stays independently owned.
    pub fn share_data(&mut self, other: &Blob<D>) -> Result<(), Error> {
        if self.count != other.count {
            return Err(Error::CountMismatch {
                op: "share_data".to_string(),
                expected: other.count,
                actual: self.count,
            });
        }
        self.data = Rc::clone(&other.data);
        self.capacity = self.capacity.min(other.data.borrow().len());
        Ok(())
    }

    /// Alias this blob's `diff` with `other`'s.
    pub fn share_diff(&mut self, other: &Blob<D>) -> Result<(), Error> {
        if self.count != other.count {
            return Err(Error::CountMismatch {
                op: "share_diff".to_string(),
                expected: other.count,
                actual: self.count,
            });
        }
        self.diff = Rc::clone(&other.diff);
        self.capacity = self.capacity.min(other.diff.borrow().len());
        Ok(())
    }

    pub fn shares_data_with(&self, other: &Blob<D>) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    pub fn shares_diff_with(&self, other: &Blob<D>) -> bool {
        Rc::ptr_eq(&self.diff, &other.diff)
    }

    // --- Whole-blob arithmetic ---

    /// Copy `source` into this blob, optionally reshaping first.
    pub fn copy_from(&mut self, source: &Blob<D>, copy_diff: bool, reshape: bool) -> Result<(), Error> {
        if source.count != self.count || source.shape != self.shape {
            if reshape {
                self.reshape_like(source)?;
            } else {
                return Err(Error::ShapeMismatch {
                    expected: self.shape.clone(),
                    actual: source.shape.clone(),
                });
            }
        }
        if copy_diff {
            if !self.shares_diff_with(source) {
                cpu_ops::copy(&source.cpu_diff(), &mut self.mutable_cpu_diff())?;
            }
        } else if !self.shares_data_with(source) {
            cpu_ops::copy(&source.cpu_data(), &mut self.mutable_cpu_data())?;
        }
        Ok(())
    }

    /// `data -= diff`, the plain gradient step applied to parameter blobs.
    pub fn update<M: MathType>(&mut self) -> Result<(), Error> {
        let diff = Rc::clone(&self.diff);
        let diff = diff.borrow();
        cpu_ops::axpy::<D, M>(-M::one(), &diff[..self.count], &mut self.mutable_cpu_data())
    }

    pub fn asum_data<M: MathType>(&self) -> M {
        cpu_ops::asum::<D, M>(&self.cpu_data())
    }

    pub fn asum_diff<M: MathType>(&self) -> M {
        cpu_ops::asum::<D, M>(&self.cpu_diff())
    }

    pub fn sumsq_data<M: MathType>(&self) -> M {
        let data = self.cpu_data();
        cpu_ops::dot::<D, M>(&data, &data).unwrap_or_else(|_| M::zero())
    }

    pub fn sumsq_diff<M: MathType>(&self) -> M {
        let diff = self.cpu_diff();
        cpu_ops::dot::<D, M>(&diff, &diff).unwrap_or_else(|_| M::zero())
    }

    pub fn scale_data<M: MathType>(&mut self, factor: M) {
        cpu_ops::scal::<D, M>(factor, &mut self.mutable_cpu_data());
    }

    pub fn scale_diff<M: MathType>(&mut self, factor: M) {
        cpu_ops::scal::<D, M>(factor, &mut self.mutable_cpu_diff());
    }
}

impl<D: DataType> Default for Blob<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<D: DataType> fmt::Debug for Blob<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("dtype", &D::NAME)
            .field("shape", &self.shape)
            .field("capacity", &self.capacity)
            .field("data", &"<host buffer>")
            .field("diff", &"<host buffer>")
            .finish()
    }
}

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use dispose_scope::{Disposable, ResourceId, ScopeLink, notify_disposed, track_new};
use tracing::trace;

use crate::{NativeHandle, TensorError, native_heap};

/// A dense `f32` tensor whose storage lives on the native heap.
///
/// Clones share the same storage and identity. New tensors join the calling
/// thread's current dispose scope.
#[derive(Clone)]
pub struct Tensor {
    inner: Rc<TensorInner>,
}

struct TensorInner {
    link: ScopeLink,
    handle: Cell<Option<NativeHandle>>,
    shape: Vec<usize>,
}

impl Drop for TensorInner {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            native_heap().free(handle);
            trace!(resource = %self.link.id(), "tensor storage freed on drop");
        }
    }
}

impl Tensor {
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(TensorError::LengthMismatch {
                expected,
                got: data.len(),
            });
        }
        Ok(Self::alloc(data, shape.to_vec()))
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        let len = shape.iter().product();
        Self::alloc(vec![value; len], shape.to_vec())
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    fn alloc(data: Vec<f32>, shape: Vec<usize>) -> Self {
        let tensor = Self {
            inner: Rc::new(TensorInner {
                link: ScopeLink::new(),
                handle: Cell::new(Some(native_heap().allocate(data))),
                shape,
            }),
        };
        track_new(tensor)
    }

    pub fn id(&self) -> ResourceId {
        self.inner.link.id()
    }

    pub fn shape(&self) -> &[usize] {
        &self.inner.shape
    }

    pub fn numel(&self) -> usize {
        self.inner.shape.iter().product()
    }

    fn handle(&self) -> Result<NativeHandle, TensorError> {
        self.inner
            .handle
            .get()
            .ok_or(TensorError::Released { id: self.id() })
    }

    fn read<T>(&self, f: impl FnOnce(&[f32]) -> T) -> Result<T, TensorError> {
        native_heap()
            .with_block(self.handle()?, f)
            .ok_or(TensorError::Released { id: self.id() })
    }

    pub fn to_vec(&self) -> Result<Vec<f32>, TensorError> {
        self.read(|data| data.to_vec())
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        self.zip_with(other, |a, b| a + b)
    }

    pub fn mul(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn sub(&self, other: &Tensor) -> Result<Tensor, TensorError> {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn scale(&self, factor: f32) -> Result<Tensor, TensorError> {
        let data: Vec<f32> = self.read(|data| data.iter().map(|v| v * factor).collect())?;
        Ok(Self::alloc(data, self.inner.shape.clone()))
    }

    /// Sum of all elements, as a one-element tensor.
    pub fn sum(&self) -> Result<Tensor, TensorError> {
        let total = self.read(|data| data.iter().sum::<f32>())?;
        Ok(Self::alloc(vec![total], vec![1]))
    }

    fn zip_with(
        &self,
        other: &Tensor,
        op: impl Fn(f32, f32) -> f32,
    ) -> Result<Tensor, TensorError> {
        if self.shape() != other.shape() {
            return Err(TensorError::ShapeMismatch {
                left: self.shape().to_vec(),
                right: other.shape().to_vec(),
            });
        }
        let right = other.to_vec()?;
        let data: Vec<f32> =
            self.read(|left| left.iter().zip(&right).map(|(a, b)| op(*a, *b)).collect())?;
        Ok(Self::alloc(data, self.inner.shape.clone()))
    }

    /// Releases the storage now, updating the owning scope's bookkeeping.
    pub fn dispose(&self) {
        if self.is_released() {
            return;
        }
        notify_disposed(self);
        self.release();
    }
}

impl Disposable for Tensor {
    fn scope_link(&self) -> &ScopeLink {
        &self.inner.link
    }

    fn release(&self) {
        if let Some(handle) = self.inner.handle.take() {
            native_heap().free(handle);
            trace!(resource = %self.id(), handle = handle.get(), "tensor storage released");
        }
    }

    fn is_released(&self) -> bool {
        self.inner.handle.get().is_none()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("id", &self.id())
            .field("shape", &self.inner.shape)
            .field("released", &self.is_released())
            .field("scope", &self.inner.link.owner_id())
            .finish()
    }
}

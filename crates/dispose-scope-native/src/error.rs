use dispose_scope::ResourceId;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    Released { id: ResourceId },
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },
    LengthMismatch { expected: usize, got: usize },
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Released { id } => write!(f, "{id} has already been released"),
            Self::ShapeMismatch { left, right } => {
                write!(f, "shape mismatch: {left:?} vs {right:?}")
            }
            Self::LengthMismatch { expected, got } => {
                write!(f, "shape needs {expected} elements, got {got}")
            }
        }
    }
}

impl Error for TensorError {}

//! Entity model and its serialized forms.

pub mod input;
pub mod opl;
pub mod record;
pub mod types;

pub use input::{EntityReader, InputFormat};
pub use types::*;

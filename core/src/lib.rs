//! # ROI Align
//!
//! Region-of-interest pooling by bilinear resampling.
//!
//! Given a feature map `[N?, C, H, W]` and a list of regions expressed in input
//! image coordinates, produce one `[C_out, pooled_height, pooled_width]` tile per
//! region. Each output bin is the average of a small grid of bilinearly
//! interpolated samples taken inside the bin.
//!
//! ## Example
//!
//! ```
//! # use roialign_core::internal::*;
//! # fn main() -> RoiResult<()> {
//! let params = RoiAlignParams::new(2, 2, 1.0, 2, false, PoolMode::Avg);
//! let geometry = RoiAlignGeometry::from_shapes(&params, &[1, 1, 4, 4], &[1, 4])?;
//! let fmap = ndarray::Array::range(0f32, 16.0, 1.0).into_shape_with_order((1, 1, 4, 4))?;
//! let rois = ndarray::arr2(&[[0f32, 0.0, 4.0, 4.0]]);
//! let mut output = ndarray::Array4::<f32>::zeros((1, 1, 2, 2));
//! assert_eq!(&*geometry.output_shape(), output.shape());
//! RoiAlign::new(params, geometry).eval(
//!     fmap.view().into_dyn(),
//!     rois.view().into_dyn(),
//!     output.view_mut().into_dyn(),
//!     &Executor::SingleThread,
//! )?;
//! assert_eq!(output.as_slice().unwrap(), &[5.0, 6.75, 12.0, 13.75]);
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate derive_new;
#[macro_use]
pub extern crate log;

pub mod datum;
pub mod errors;
pub mod executor;
pub mod geometry;
pub mod kernel;
pub mod params;

/// A Smallvec instantiation with 4 embeddable values.
///
/// Used for tensor dimensions: feature maps and outputs are rank 4 at most.
pub type TVec<T> = smallvec::SmallVec<[T; 4]>;

pub use anyhow;
pub use ndarray;
pub use smallvec::smallvec as tvec;

pub mod prelude {
    pub use crate::TVec;
    pub use crate::datum::DatumType;
    pub use crate::errors::{RoiAlignError, RoiResult, error_kind};
    pub use crate::executor::Executor;
    pub use crate::geometry::{RoiAlignGeometry, RoiLayout};
    pub use crate::kernel::RoiAlign;
    pub use crate::params::{PoolMode, RoiAlignParams};
    pub use crate::tvec;
}

pub mod internal {
    pub use crate::prelude::*;
    pub use anyhow::{Context, bail, ensure, format_err};
    pub use ndarray;
    pub use std::borrow::Cow;
    pub use std::sync::Arc;
}

#[cfg(test)]
#[allow(dead_code)]
pub(crate) fn setup_test_logger() {
    let _ = env_logger::Builder::from_env("ROIALIGN_LOG").is_test(true).try_init();
}

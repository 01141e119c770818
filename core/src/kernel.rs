//! ROI Align forward kernel.
//!
//! For every region, every output channel and every bin of the pooled tile,
//! a `samples_h x samples_w` grid of points is laid over the bin, each point
//! is bilinearly interpolated from the feature map, and the bin receives the
//! mean of its samples.
//!
//! The output is split in `(roi, output channel)` planes of
//! `pooled_height * pooled_width` values. Planes share nothing, so they are
//! computed independently on whatever [`Executor`] the caller provides.
use crate::internal::*;
use ndarray::prelude::*;

#[cfg(feature = "multithread")]
use rayon::prelude::*;

/// A region mapped to feature map coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledRoi {
    pub batch: usize,
    pub x1: f32,
    pub y1: f32,
    pub width: f32,
    pub height: f32,
}

impl ScaledRoi {
    /// Scale `[x1, y1, x2, y2]` from image to feature map space.
    ///
    /// Width and height are floored at one feature map cell, so collapsed or
    /// inverted regions still pool a well defined area.
    pub fn new(batch: usize, corners: [f32; 4], spatial_scale: f32) -> ScaledRoi {
        let [x1, y1, x2, y2] = corners.map(|c| c * spatial_scale);
        ScaledRoi { batch, x1, y1, width: (x2 - x1).max(1.0), height: (y2 - y1).max(1.0) }
    }
}

/// Upper bound on the adaptive sample count along one bin axis.
///
/// Bins wider than this many feature map cells are sampled at this many
/// evenly spread sub-cell centres.
pub const MAX_ADAPTIVE_SAMPLES: usize = 64;

#[inline]
fn adaptive_samples(bin_extent: f32) -> usize {
    (bin_extent.ceil() as usize).clamp(1, MAX_ADAPTIVE_SAMPLES)
}

/// Sub-bin sampling layout for one region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingGrid {
    pub bin_h: f32,
    pub bin_w: f32,
    pub samples_h: usize,
    pub samples_w: usize,
}

impl SamplingGrid {
    pub fn for_roi(params: &RoiAlignParams, roi: &ScaledRoi) -> SamplingGrid {
        let bin_h = roi.height / params.pooled_height as f32;
        let bin_w = roi.width / params.pooled_width as f32;
        let (samples_h, samples_w) = match params.fixed_sample_ratio() {
            Some(ratio) => (ratio, ratio),
            None => (adaptive_samples(bin_h), adaptive_samples(bin_w)),
        };
        SamplingGrid { bin_h, bin_w, samples_h, samples_w }
    }

    pub fn count(&self) -> usize {
        self.samples_h.saturating_mul(self.samples_w)
    }

    /// Sample coordinates `(y, x)` for bin `(ph, pw)`, row major.
    ///
    /// Each sample sits at the centre of its sub-cell.
    pub fn samples<'a>(
        &'a self,
        roi: &'a ScaledRoi,
        ph: usize,
        pw: usize,
    ) -> impl Iterator<Item = (f32, f32)> + 'a {
        let y0 = roi.y1 + ph as f32 * self.bin_h;
        let x0 = roi.x1 + pw as f32 * self.bin_w;
        (0..self.samples_h).flat_map(move |iy| {
            let y = y0 + (iy as f32 + 0.5) * self.bin_h / self.samples_h as f32;
            (0..self.samples_w).map(move |ix| {
                (y, x0 + (ix as f32 + 0.5) * self.bin_w / self.samples_w as f32)
            })
        })
    }

    /// Mean of the interpolated samples of bin `(ph, pw)` over one channel plane.
    pub fn average(&self, plane: &ArrayView2<f32>, roi: &ScaledRoi, ph: usize, pw: usize) -> f32 {
        let sum: f32 =
            self.samples(roi, ph, pw).map(|(y, x)| bilinear_interpolate(plane, y, x)).sum();
        sum / self.count() as f32
    }
}

/// Low and high neighbours of `v` along an axis of length `len`, plus the
/// coordinate to weight them with. `v` must be non-negative.
#[inline]
fn neighbours(v: f32, len: usize) -> (usize, usize, f32) {
    let low = v as usize;
    if low >= len - 1 { (len - 1, len - 1, (len - 1) as f32) } else { (low, low + 1, v) }
}

/// Bilinear interpolation of `plane` at `(y, x)`.
///
/// Points more than one cell outside the plane contribute 0. Points in the
/// one-cell margin are clamped onto the border.
#[inline]
pub fn bilinear_interpolate(plane: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
    let (height, width) = plane.dim();
    if y < -1.0 || y > height as f32 || x < -1.0 || x > width as f32 {
        return 0.0;
    }
    let (y_low, y_high, y) = neighbours(y.max(0.0), height);
    let (x_low, x_high, x) = neighbours(x.max(0.0), width);
    let ly = y - y_low as f32;
    let lx = x - x_low as f32;
    let (hy, hx) = (1.0 - ly, 1.0 - lx);
    hy * hx * plane[(y_low, x_low)]
        + hy * lx * plane[(y_low, x_high)]
        + ly * hx * plane[(y_high, x_low)]
        + ly * lx * plane[(y_high, x_high)]
}

/// The ROI Align operator, ready to run for one binding.
#[derive(Debug, Clone, new)]
pub struct RoiAlign {
    pub params: RoiAlignParams,
    pub geometry: RoiAlignGeometry,
}

impl RoiAlign {
    /// Decode the ROI rows, checking batch indices.
    fn scaled_rois(&self, rois: &ArrayView2<f32>) -> RoiResult<Vec<ScaledRoi>> {
        rois.outer_iter()
            .enumerate()
            .map(|(ix, row)| {
                let (batch, corners) = match self.geometry.roi_layout {
                    RoiLayout::Corners => (0, [row[0], row[1], row[2], row[3]]),
                    RoiLayout::BatchIndexed => {
                        let b = row[0];
                        if !(b >= 0.0 && b.fract() == 0.0 && (b as usize) < self.geometry.batch) {
                            return Err(RoiAlignError::shape(format!(
                                "ROI #{ix} refers to image {b}, feature map batch is {}",
                                self.geometry.batch
                            ))
                            .into());
                        }
                        (b as usize, [row[1], row[2], row[3], row[4]])
                    }
                };
                if corners.iter().any(|c| !c.is_finite()) {
                    return Err(RoiAlignError::shape(format!(
                        "ROI #{ix} has non-finite coordinates {corners:?}"
                    ))
                    .into());
                }
                Ok(ScaledRoi::new(batch, corners, self.params.spatial_scale))
            })
            .collect()
    }

    /// Fill one `[pooled_height, pooled_width]` output plane.
    fn pool_plane(&self, fmap: &ArrayView4<f32>, roi: &ScaledRoi, c: usize, plane: &mut [f32]) {
        let grid = SamplingGrid::for_roi(&self.params, roi);
        let pw_count = self.params.pooled_width;
        for ph in 0..self.params.pooled_height {
            for pw in 0..pw_count {
                let bin = ph * pw_count + pw;
                let input_c = if self.params.position_sensitive {
                    bin * self.geometry.output_channels + c
                } else {
                    c
                };
                let input = fmap.slice(s![roi.batch, input_c, .., ..]);
                plane[bin] = grid.average(&input, roi, ph, pw);
            }
        }
    }

    /// Run the kernel. Shapes are checked against the configured geometry
    /// before anything is written to `output`.
    pub fn eval(
        &self,
        feature_map: ArrayViewD<f32>,
        rois: ArrayViewD<f32>,
        mut output: ArrayViewMutD<f32>,
        executor: &Executor,
    ) -> RoiResult<()> {
        let g = &self.geometry;
        g.check_feature_map(feature_map.shape())?;
        g.check_rois(rois.shape())?;
        g.check_output(output.shape())?;
        let fmap = feature_map.to_shape((g.batch, g.channels, g.height, g.width))?;
        let fmap = fmap.view();
        let rois = rois.to_shape((g.n_rois, g.roi_layout.columns()))?;
        let rois = self.scaled_rois(&rois.view())?;
        let Some(output) = output.as_slice_mut() else {
            return Err(RoiAlignError::shape("output buffer must be contiguous").into());
        };
        let plane_len = self.params.bins();
        let c_out = g.output_channels;
        trace!(
            "RoiAlign {} rois x {} channels x {}x{} bins on {:?}",
            g.n_rois, c_out, self.params.pooled_height, self.params.pooled_width, executor
        );
        let run = |(ix, plane): (usize, &mut [f32])| {
            self.pool_plane(&fmap, &rois[ix / c_out], ix % c_out, plane)
        };
        match executor {
            Executor::SingleThread => output.chunks_mut(plane_len).enumerate().for_each(run),
            #[cfg(feature = "multithread")]
            Executor::MultiThread(pool) => {
                pool.install(|| output.par_chunks_mut(plane_len).enumerate().for_each(run))
            }
        }
        Ok(())
    }
}

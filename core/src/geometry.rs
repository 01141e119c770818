//! Shape inference and the per-binding state derived from concrete shapes.
use crate::internal::*;

/// How a row of the ROI tensor is laid out.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RoiLayout {
    /// `[x1, y1, x2, y2]`, all rows refer to the single image of the call.
    Corners,
    /// `[batch_index, x1, y1, x2, y2]`, selecting an image of a batched feature map.
    BatchIndexed,
}

impl RoiLayout {
    pub fn columns(&self) -> usize {
        match self {
            RoiLayout::Corners => 4,
            RoiLayout::BatchIndexed => 5,
        }
    }

    pub fn for_columns(columns: usize) -> RoiResult<RoiLayout> {
        match columns {
            4 => Ok(RoiLayout::Corners),
            5 => Ok(RoiLayout::BatchIndexed),
            other => Err(RoiAlignError::shape(format!(
                "ROI rows must have 4 ([x1, y1, x2, y2]) or 5 ([batch, x1, y1, x2, y2]) values, got {other}"
            ))
            .into()),
        }
    }
}

/// Number of output channels for a feature map with `channels` channels.
///
/// In position-sensitive mode every bin reads its own block of channels, so
/// the channel count must split evenly among the bins.
pub fn output_channels(params: &RoiAlignParams, channels: usize) -> RoiResult<usize> {
    if params.position_sensitive {
        if channels % params.bins() != 0 {
            return Err(RoiAlignError::shape(format!(
                "position-sensitive pooling needs channels ({channels}) divisible by pooled_height * pooled_width ({}x{})",
                params.pooled_height, params.pooled_width
            ))
            .into());
        }
        Ok(channels / params.bins())
    } else {
        Ok(channels)
    }
}

/// Output shape `[n_rois, C_out, pooled_height, pooled_width]`.
///
/// Channels are read 3 axes from the end of the feature map shape, the ROI
/// count from the first axis of the ROI shape. Pure, may be called for any
/// number of candidate shapes.
pub fn infer_output_shape(
    params: &RoiAlignParams,
    feature_map: &[usize],
    rois: &[usize],
) -> RoiResult<TVec<usize>> {
    if feature_map.len() < 3 {
        return Err(RoiAlignError::shape(format!(
            "feature map must be at least rank 3 ([C, H, W]), got {feature_map:?}"
        ))
        .into());
    }
    if rois.is_empty() {
        return Err(RoiAlignError::shape("ROI list must be at least rank 1").into());
    }
    let channels = feature_map[feature_map.len() - 3];
    Ok(tvec![rois[0], output_channels(params, channels)?, params.pooled_height, params.pooled_width])
}

/// Concrete dimensions of one binding of the operator in a graph.
///
/// Recomputed on every configuration, never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, new)]
pub struct RoiAlignGeometry {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub n_rois: usize,
    pub roi_layout: RoiLayout,
    pub output_channels: usize,
    pub pooled_height: usize,
    pub pooled_width: usize,
}

impl RoiAlignGeometry {
    pub fn from_shapes(
        params: &RoiAlignParams,
        feature_map: &[usize],
        rois: &[usize],
    ) -> RoiResult<RoiAlignGeometry> {
        let output = infer_output_shape(params, feature_map, rois)?;
        let rank = feature_map.len();
        let batch = feature_map[..rank - 3].iter().product::<usize>();
        let (channels, height, width) =
            (feature_map[rank - 3], feature_map[rank - 2], feature_map[rank - 1]);
        if height == 0 || width == 0 {
            return Err(RoiAlignError::shape(format!(
                "feature map must have a non-empty spatial extent, got {feature_map:?}"
            ))
            .into());
        }
        if rois.len() < 2 {
            return Err(RoiAlignError::shape(format!(
                "ROI list must be [N, 4] or [N, 5], got {rois:?}"
            ))
            .into());
        }
        let roi_layout = RoiLayout::for_columns(rois[1..].iter().product())?;
        if roi_layout == RoiLayout::Corners && batch != 1 {
            return Err(RoiAlignError::shape(format!(
                "feature map batch is {batch}, ROI rows need a leading batch index column"
            ))
            .into());
        }
        let geometry = RoiAlignGeometry {
            batch,
            channels,
            height,
            width,
            n_rois: output[0],
            roi_layout,
            output_channels: output[1],
            pooled_height: params.pooled_height,
            pooled_width: params.pooled_width,
        };
        trace!("{geometry:?}");
        Ok(geometry)
    }

    pub fn output_shape(&self) -> TVec<usize> {
        tvec![self.n_rois, self.output_channels, self.pooled_height, self.pooled_width]
    }

    pub fn input_volume(&self) -> usize {
        self.batch * self.channels * self.height * self.width
    }

    /// Check a concrete feature map shape agrees with this binding.
    pub fn check_feature_map(&self, shape: &[usize]) -> RoiResult<()> {
        let rank = shape.len();
        if rank < 3
            || shape[rank - 3..] != [self.channels, self.height, self.width]
            || shape[..rank - 3].iter().product::<usize>() != self.batch
        {
            return Err(RoiAlignError::shape(format!(
                "feature map {shape:?} does not match configured [{}, {}, {}, {}]",
                self.batch, self.channels, self.height, self.width
            ))
            .into());
        }
        Ok(())
    }

    pub fn check_rois(&self, shape: &[usize]) -> RoiResult<()> {
        if shape.is_empty()
            || shape[0] != self.n_rois
            || shape[1..].iter().product::<usize>() != self.roi_layout.columns()
        {
            return Err(RoiAlignError::shape(format!(
                "ROI list {shape:?} does not match configured [{}, {}]",
                self.n_rois,
                self.roi_layout.columns()
            ))
            .into());
        }
        Ok(())
    }

    pub fn check_output(&self, shape: &[usize]) -> RoiResult<()> {
        if shape != &*self.output_shape() {
            return Err(RoiAlignError::shape(format!(
                "output {shape:?} does not match inferred {:?}",
                self.output_shape()
            ))
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    fn params(ph: usize, pw: usize, ps: bool) -> RoiAlignParams {
        RoiAlignParams::new(pw, ph, 1.0, 0, ps, PoolMode::Avg)
    }

    #[test]
    fn standard_output_shape() {
        let shape = infer_output_shape(&params(7, 7, false), &[1, 256, 38, 50], &[300, 4]).unwrap();
        assert_eq!(&*shape, &[300, 256, 7, 7]);
        let shape = infer_output_shape(&params(2, 3, false), &[16, 5, 5], &[2, 4]).unwrap();
        assert_eq!(&*shape, &[2, 16, 2, 3]);
    }

    #[test]
    fn position_sensitive_output_shape() {
        let shape = infer_output_shape(&params(3, 3, true), &[1, 18, 8, 8], &[5, 4]).unwrap();
        assert_eq!(&*shape, &[5, 2, 3, 3]);
        let err = infer_output_shape(&params(3, 3, true), &[1, 20, 8, 8], &[5, 4]).unwrap_err();
        assert!(matches!(error_kind(&err), Some(RoiAlignError::Shape(_))));
    }

    #[test]
    fn malformed_ranks() {
        assert!(infer_output_shape(&params(2, 2, false), &[8, 8], &[1, 4]).is_err());
        assert!(infer_output_shape(&params(2, 2, false), &[1, 8, 8], &[]).is_err());
    }

    #[test]
    fn geometry_from_shapes() {
        let g = RoiAlignGeometry::from_shapes(&params(2, 2, false), &[1, 3, 6, 9], &[4, 4]).unwrap();
        assert_eq!((g.batch, g.channels, g.height, g.width, g.n_rois), (1, 3, 6, 9, 4));
        assert_eq!(g.roi_layout, RoiLayout::Corners);
        assert_eq!(g.input_volume(), 162);
        assert_eq!(&*g.output_shape(), &[4, 3, 2, 2]);
        g.check_output(&[4, 3, 2, 2]).unwrap();
        assert!(g.check_output(&[4, 3, 2, 1]).is_err());
        g.check_feature_map(&[3, 6, 9]).unwrap();
        assert!(g.check_feature_map(&[2, 3, 6, 9]).is_err());
        g.check_rois(&[4, 4]).unwrap();
        assert!(g.check_rois(&[4, 5]).is_err());
    }

    #[test]
    fn batched_feature_map_needs_batch_index() {
        let p = params(2, 2, false);
        assert!(RoiAlignGeometry::from_shapes(&p, &[2, 3, 6, 9], &[4, 4]).is_err());
        let g = RoiAlignGeometry::from_shapes(&p, &[2, 3, 6, 9], &[4, 5]).unwrap();
        assert_eq!(g.roi_layout, RoiLayout::BatchIndexed);
        assert_eq!(g.batch, 2);
        assert!(RoiAlignGeometry::from_shapes(&p, &[1, 3, 6, 9], &[4, 6]).is_err());
        assert!(RoiAlignGeometry::from_shapes(&p, &[1, 3, 0, 9], &[4, 4]).is_err());
        assert!(RoiAlignGeometry::from_shapes(&p, &[1, 3, 6, 9], &[4]).is_err());
    }

    proptest! {
        #[test]
        fn output_shape_is_n_cout_ph_pw(
            ph in 1usize..5,
            pw in 1usize..5,
            c_out in 1usize..6,
            extra in 0usize..3,
            n in 0usize..10,
            ps in any::<bool>(),
        ) {
            let channels = if ps { c_out * ph * pw + extra } else { c_out };
            let refused = ps && channels % (ph * pw) != 0;
            let p = params(ph, pw, ps);
            let result = infer_output_shape(&p, &[1, channels, 4, 4], &[n, 4]);
            if refused {
                prop_assert!(result.is_err());
            } else {
                let expected_c = if ps { channels / (ph * pw) } else { channels };
                let shape = result.unwrap();
                prop_assert_eq!(&*shape, &[n, expected_c, ph, pw]);
            }
            // inference is pure
            prop_assert_eq!(infer_output_shape(&p, &[1, channels, 4, 4], &[n, 4]).is_ok(), !refused);
        }
    }
}

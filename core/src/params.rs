use crate::internal::*;
use byteorder::{LE, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Write};

/// Aggregation applied to the samples of a bin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PoolMode {
    #[default]
    Avg,
    /// Declared by the configuration format, rejected at binding time.
    Max,
}

impl PoolMode {
    pub fn as_i32(&self) -> i32 {
        match self {
            PoolMode::Avg => 0,
            PoolMode::Max => 1,
        }
    }

    /// Decode and check a mode coming from configuration or a serialized blob.
    ///
    /// Anything but average is refused, max included.
    pub fn supported(mode: i32) -> RoiResult<PoolMode> {
        match mode {
            0 => Ok(PoolMode::Avg),
            other => Err(RoiAlignError::UnsupportedMode(other).into()),
        }
    }
}

/// Parameters of one ROI Align operator.
///
/// Immutable once bound. `sample_ratio <= 0` selects the adaptive sampling
/// grid, derived from the bin extent.
#[derive(Debug, Clone, Copy, PartialEq, new)]
pub struct RoiAlignParams {
    pub pooled_width: usize,
    pub pooled_height: usize,
    pub spatial_scale: f32,
    pub sample_ratio: i32,
    pub position_sensitive: bool,
    pub mode: PoolMode,
}

impl RoiAlignParams {
    /// Size of the serialized form, in bytes.
    ///
    /// Five 4-byte fields plus the boolean, padded to 4 bytes.
    pub const SERIALIZED_LEN: usize = 24;

    pub fn validate(&self) -> RoiResult<()> {
        if self.pooled_height == 0 || self.pooled_width == 0 {
            return Err(RoiAlignError::configuration(format!(
                "pooled output must be at least 1x1, got {}x{}",
                self.pooled_height, self.pooled_width
            ))
            .into());
        }
        if self.pooled_height > i32::MAX as usize || self.pooled_width > i32::MAX as usize {
            return Err(RoiAlignError::configuration(format!(
                "pooled output {}x{} does not fit 32-bit dimensions",
                self.pooled_height, self.pooled_width
            ))
            .into());
        }
        if !(self.spatial_scale.is_finite() && self.spatial_scale > 0.0) {
            return Err(RoiAlignError::configuration(format!(
                "spatial_scale must be a positive finite number, got {}",
                self.spatial_scale
            ))
            .into());
        }
        if self.mode != PoolMode::Avg {
            return Err(RoiAlignError::UnsupportedMode(self.mode.as_i32()).into());
        }
        Ok(())
    }

    pub fn bins(&self) -> usize {
        self.pooled_height * self.pooled_width
    }

    /// Fixed number of samples per bin axis, or None in adaptive mode.
    pub fn fixed_sample_ratio(&self) -> Option<usize> {
        if self.sample_ratio > 0 { Some(self.sample_ratio as usize) } else { None }
    }

    /// Little-endian layout, in declaration order:
    ///
    /// ```text
    /// 0..4    pooled_width        i32
    /// 4..8    pooled_height       i32
    /// 8..12   spatial_scale       f32
    /// 12..16  sample_ratio        i32
    /// 16      position_sensitive  u8 (0 or 1), then 3 zero bytes
    /// 20..24  mode                i32
    /// ```
    pub fn serialize_into(&self, buffer: &mut [u8]) -> RoiResult<usize> {
        if buffer.len() < Self::SERIALIZED_LEN {
            return Err(RoiAlignError::Serialization {
                expected: Self::SERIALIZED_LEN,
                got: buffer.len(),
            }
            .into());
        }
        let mut writer = Cursor::new(&mut buffer[..Self::SERIALIZED_LEN]);
        writer.write_i32::<LE>(self.pooled_width as i32)?;
        writer.write_i32::<LE>(self.pooled_height as i32)?;
        writer.write_f32::<LE>(self.spatial_scale)?;
        writer.write_i32::<LE>(self.sample_ratio)?;
        writer.write_u8(self.position_sensitive as u8)?;
        writer.write_all(&[0u8; 3])?;
        writer.write_i32::<LE>(self.mode.as_i32())?;
        debug_assert_eq!(writer.position() as usize, Self::SERIALIZED_LEN);
        Ok(Self::SERIALIZED_LEN)
    }

    pub fn to_bytes(&self) -> RoiResult<Vec<u8>> {
        let mut bytes = vec![0u8; Self::SERIALIZED_LEN];
        self.serialize_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Decode a blob written by [`RoiAlignParams::serialize_into`] and check it.
    pub fn deserialize(bytes: &[u8]) -> RoiResult<RoiAlignParams> {
        if bytes.len() != Self::SERIALIZED_LEN {
            return Err(RoiAlignError::Serialization {
                expected: Self::SERIALIZED_LEN,
                got: bytes.len(),
            }
            .into());
        }
        let mut reader = Cursor::new(bytes);
        let pooled_width = reader.read_i32::<LE>()?;
        let pooled_height = reader.read_i32::<LE>()?;
        let spatial_scale = reader.read_f32::<LE>()?;
        let sample_ratio = reader.read_i32::<LE>()?;
        let position_sensitive = match reader.read_u8()? {
            0 => false,
            1 => true,
            other => {
                return Err(RoiAlignError::configuration(format!(
                    "position_sensitive flag must be 0 or 1, got {other}"
                ))
                .into());
            }
        };
        reader.set_position(20);
        let mode = PoolMode::supported(reader.read_i32::<LE>()?)?;
        if pooled_width < 1 || pooled_height < 1 {
            return Err(RoiAlignError::configuration(format!(
                "pooled output must be at least 1x1, got {pooled_height}x{pooled_width}"
            ))
            .into());
        }
        let params = RoiAlignParams {
            pooled_width: pooled_width as usize,
            pooled_height: pooled_height as usize,
            spatial_scale,
            sample_ratio,
            position_sensitive,
            mode,
        };
        params.validate()?;
        Ok(params)
    }
}

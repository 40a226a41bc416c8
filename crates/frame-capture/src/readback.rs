use alloc::vec::Vec;
use core::{error::Error as StdError, marker::PhantomData, mem::size_of, slice};
use std::path::Path;

use ash::vk;
use bytemuck::Pod;
use half::f16;

use crate::{CaptureDevice, CaptureError, CaptureFormat, StagingResource, format::TexelKind};

/// Writes captured pixels somewhere, usually a file. The capture core does not care about the
/// serialization format.
pub trait PixelSink {
    /// The error returned when writing fails.
    type Error: StdError + Send + Sync + 'static;

    /// Write `pixels` to `path`. The pixels are only valid for the duration of the call.
    fn write(&mut self, pixels: &PixelData<'_>, path: &Path) -> Result<(), Self::Error>;
}

/// A typed 2D view over mapped staging memory.
///
/// Rows are `row_pitch` bytes apart, each row holds `width` tightly packed elements of `T`.
/// Elements are read unaligned so the view works for any row pitch the device reports.
pub struct PixelBuffer2D<'map, T> {
    bytes: &'map [u8],
    width: u32,
    height: u32,
    row_pitch: usize,
    format: CaptureFormat,
    element: PhantomData<T>,
}

impl<'map, T: Pod> PixelBuffer2D<'map, T> {
    /// Creates the view, checking `bytes` covers every row.
    pub fn new(
        bytes: &'map [u8],
        extent: vk::Extent2D,
        row_pitch: usize,
        format: CaptureFormat,
    ) -> Result<Self, CaptureError> {
        let row_size = extent.width as usize * size_of::<T>();
        let required = if extent.height == 0 {
            0
        } else {
            row_pitch * (extent.height as usize - 1) + row_size
        };

        if row_pitch < row_size || bytes.len() < required {
            return Err(CaptureError::MappedSizeMismatch {
                required: required.max(row_size * extent.height as usize) as u64,
                mapped: bytes.len() as u64,
            });
        }

        Ok(Self {
            bytes,
            width: extent.width,
            height: extent.height,
            row_pitch,
            format,
            element: PhantomData,
        })
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes between the start of two rows.
    #[inline]
    pub fn row_pitch(&self) -> usize {
        self.row_pitch
    }

    /// Bytes between two elements in a row.
    #[inline]
    pub fn element_stride(&self) -> usize {
        size_of::<T>()
    }

    /// The format the pixels are in.
    #[inline]
    pub fn format(&self) -> CaptureFormat {
        self.format
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// If the view has no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The pixel at `x`, `y`.
    pub fn get(&self, x: u32, y: u32) -> Option<T> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let start = y as usize * self.row_pitch + x as usize * size_of::<T>();
        Some(bytemuck::pod_read_unaligned(
            &self.bytes[start..start + size_of::<T>()],
        ))
    }

    /// The bytes of row `y`, without padding.
    pub fn row_bytes(&self, y: u32) -> Option<&'map [u8]> {
        if y >= self.height {
            return None;
        }

        let start = y as usize * self.row_pitch;
        Some(&self.bytes[start..start + self.width as usize * size_of::<T>()])
    }

    /// Iterates every row's bytes, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &'map [u8]> + '_ {
        (0..self.height).filter_map(|y| self.row_bytes(y))
    }

    /// Iterates every pixel, row by row.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.rows().flat_map(|row| {
            row.chunks_exact(size_of::<T>())
                .map(bytemuck::pod_read_unaligned::<T>)
        })
    }

    /// Copies the pixels into a tightly packed vector.
    pub fn to_vec(&self) -> Vec<T> {
        let mut pixels = Vec::with_capacity(self.len());
        pixels.extend(self.iter());
        pixels
    }

    /// Copies the pixel bytes into a tightly packed vector.
    pub fn to_packed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len() * size_of::<T>());
        for row in self.rows() {
            bytes.extend_from_slice(row);
        }
        bytes
    }
}

/// Captured pixels, tagged with their host representation.
#[allow(clippy::exhaustive_enums)]
pub enum PixelData<'map> {
    /// Four 8-bit channels in the order of the target format.
    Color8x4(PixelBuffer2D<'map, [u8; 4]>),

    /// 32-bit packed colour.
    ColorPacked32(PixelBuffer2D<'map, u32>),

    /// Four 16-bit float channels.
    ColorHalf4(PixelBuffer2D<'map, [f16; 4]>),

    /// 32-bit float depth.
    Depth32Float(PixelBuffer2D<'map, f32>),

    /// 24-bit normalized depth in the low bits.
    Depth24Packed(PixelBuffer2D<'map, u32>),

    /// 16-bit normalized depth.
    Depth16(PixelBuffer2D<'map, u16>),
}

impl<'map> PixelData<'map> {
    /// Views `bytes` as pixels of `format`'s target.
    pub fn new(
        bytes: &'map [u8],
        extent: vk::Extent2D,
        row_pitch: usize,
        format: CaptureFormat,
    ) -> Result<Self, CaptureError> {
        let data = match format.texel()? {
            TexelKind::Color8x4 => {
                Self::Color8x4(PixelBuffer2D::new(bytes, extent, row_pitch, format)?)
            }
            TexelKind::ColorPacked32 => {
                Self::ColorPacked32(PixelBuffer2D::new(bytes, extent, row_pitch, format)?)
            }
            TexelKind::ColorHalf4 => {
                Self::ColorHalf4(PixelBuffer2D::new(bytes, extent, row_pitch, format)?)
            }
            TexelKind::Depth32Float => {
                Self::Depth32Float(PixelBuffer2D::new(bytes, extent, row_pitch, format)?)
            }
            TexelKind::Depth24Packed => {
                Self::Depth24Packed(PixelBuffer2D::new(bytes, extent, row_pitch, format)?)
            }
            TexelKind::Depth16 => {
                Self::Depth16(PixelBuffer2D::new(bytes, extent, row_pitch, format)?)
            }
        };

        Ok(data)
    }

    /// The format the pixels are in.
    pub fn format(&self) -> CaptureFormat {
        match self {
            Self::Color8x4(pixels) => pixels.format(),
            Self::ColorPacked32(pixels) | Self::Depth24Packed(pixels) => pixels.format(),
            Self::ColorHalf4(pixels) => pixels.format(),
            Self::Depth32Float(pixels) => pixels.format(),
            Self::Depth16(pixels) => pixels.format(),
        }
    }

    /// The pixel extent.
    pub fn extent(&self) -> vk::Extent2D {
        let (width, height) = match self {
            Self::Color8x4(pixels) => (pixels.width(), pixels.height()),
            Self::ColorPacked32(pixels) | Self::Depth24Packed(pixels) => {
                (pixels.width(), pixels.height())
            }
            Self::ColorHalf4(pixels) => (pixels.width(), pixels.height()),
            Self::Depth32Float(pixels) => (pixels.width(), pixels.height()),
            Self::Depth16(pixels) => (pixels.width(), pixels.height()),
        };

        vk::Extent2D { width, height }
    }

    /// If the pixels hold depth.
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            Self::Depth32Float(_) | Self::Depth24Packed(_) | Self::Depth16(_)
        )
    }
}

/// The depth convention of the renderer, deciding the far plane sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::exhaustive_enums)]
pub enum FarPlane {
    /// Depth is cleared to 1.0, the far plane.
    #[default]
    Standard,

    /// Reversed-Z, depth is cleared to 0.0.
    Reversed,
}

impl FarPlane {
    fn float(self) -> f32 {
        match self {
            Self::Standard => 1.0,
            Self::Reversed => 0.0,
        }
    }

    fn unorm(self, max: u32) -> u32 {
        match self {
            Self::Standard => max,
            Self::Reversed => 0,
        }
    }
}

/// How many depth pixels were left at the far plane and how many were written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthStatistics {
    /// Pixels at the far plane sentinel.
    pub far_plane: u64,

    /// Every other pixel.
    pub finite: u64,
}

impl DepthStatistics {
    /// Counts the pixels at the far plane, `None` for colour.
    pub fn collect(pixels: &PixelData<'_>, far_plane: FarPlane) -> Option<Self> {
        let far = match pixels {
            PixelData::Depth32Float(depth) => {
                let sentinel = far_plane.float();
                depth.iter().filter(|&value| value == sentinel).count()
            }

            PixelData::Depth24Packed(depth) => {
                let sentinel = far_plane.unorm(0x00FF_FFFF);
                depth
                    .iter()
                    .filter(|&value| value & 0x00FF_FFFF == sentinel)
                    .count()
            }

            PixelData::Depth16(depth) => {
                let sentinel = far_plane.unorm(u32::from(u16::MAX));
                depth
                    .iter()
                    .filter(|&value| u32::from(value) == sentinel)
                    .count()
            }

            PixelData::Color8x4(_) | PixelData::ColorPacked32(_) | PixelData::ColorHalf4(_) => {
                return None;
            }
        };

        let extent = pixels.extent();
        let total = u64::from(extent.width) * u64::from(extent.height);
        let far = far as u64;

        Some(Self {
            far_plane: far,
            finite: total - far,
        })
    }

    /// Total pixels counted.
    pub fn total(&self) -> u64 {
        self.far_plane + self.finite
    }
}

/// A mapping of a staging resource's memory, unmapped when dropped.
pub struct MappedStaging<'a, D: CaptureDevice + ?Sized> {
    device: &'a D,
    staging: &'a StagingResource,
    bytes: &'a [u8],
}

impl<'a, D: CaptureDevice + ?Sized> MappedStaging<'a, D> {
    /// Maps the staging memory, the view starts at the staging resource's offset.
    pub unsafe fn map(device: &'a D, staging: &'a StagingResource) -> Result<Self, CaptureError> {
        let base = unsafe { device.map_staging(staging)? };

        let bytes = unsafe {
            slice::from_raw_parts(base.add(staging.offset() as usize), staging.size() as usize)
        };

        Ok(Self {
            device,
            staging,
            bytes,
        })
    }

    /// The mapped pixel bytes, including any row padding.
    pub fn bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Views the mapping as pixels of `format`.
    pub fn pixels(&self, format: CaptureFormat) -> Result<PixelData<'_>, CaptureError> {
        PixelData::new(
            self.bytes,
            self.staging.extent(),
            self.staging.row_pitch() as usize,
            format,
        )
    }
}

impl<D: CaptureDevice + ?Sized> Drop for MappedStaging<'_, D> {
    fn drop(&mut self) {
        unsafe { self.device.unmap_staging(self.staging) };
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;
    use half::f16;
    use rand::Rng;

    use super::{DepthStatistics, FarPlane, PixelBuffer2D, PixelData};
    use crate::{CANONICAL_COLOR_FORMAT, CaptureError, CaptureFormat, ConversionMode};

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn row_pitch_padding_is_skipped() {
        // 3x2 RGBA with rows padded to 16 bytes.
        let mut bytes = vec![0xEE_u8; 16 * 2];
        for y in 0..2 {
            for x in 0..3 {
                let start = y * 16 + x * 4;
                bytes[start..start + 4].copy_from_slice(&[x as u8, y as u8, 7, 255]);
            }
        }

        let format = CaptureFormat {
            source: vk::Format::B8G8R8A8_SRGB,
            target: CANONICAL_COLOR_FORMAT,
            mode: ConversionMode::Blit,
        };
        let pixels = PixelBuffer2D::<[u8; 4]>::new(&bytes, extent(3, 2), 16, format).unwrap();

        assert_eq!(pixels.len(), 6);
        assert_eq!(pixels.element_stride(), 4);
        assert_eq!(pixels.get(2, 1), Some([2, 1, 7, 255]));
        assert_eq!(pixels.get(3, 0), None);
        assert_eq!(pixels.row_bytes(1).unwrap().len(), 12);

        let packed = pixels.to_packed_bytes();
        assert_eq!(packed.len(), 3 * 2 * 4);
        assert!(!packed.contains(&0xEE));

        assert_eq!(pixels.to_vec()[4], [1, 1, 7, 255]);
    }

    #[test]
    fn short_mapping_is_rejected() {
        let bytes = [0_u8; 10];
        let format = CaptureFormat::resolve_depth(vk::Format::D32_SFLOAT);

        let result = PixelBuffer2D::<f32>::new(&bytes, extent(2, 2), 8, format);
        assert!(matches!(
            result,
            Err(CaptureError::MappedSizeMismatch {
                required: 16,
                mapped: 10
            })
        ));
    }

    #[test]
    fn half_float_pixels() {
        let value = [
            f16::from_f32(0.5),
            f16::from_f32(1.0),
            f16::from_f32(2.0),
            f16::ONE,
        ];
        let bytes: Vec<u8> = bytemuck::cast_slice(&[value, value]).to_vec();

        let format = CaptureFormat::passthrough(vk::Format::R16G16B16A16_SFLOAT);
        let pixels = PixelData::new(&bytes, extent(2, 1), 16, format).unwrap();

        let PixelData::ColorHalf4(pixels) = pixels else {
            panic!("Expected half float pixels");
        };
        assert_eq!(pixels.get(1, 0).unwrap()[2].to_f32(), 2.0);
    }

    #[test]
    fn float_depth_statistics() {
        let depth: Vec<f32> = vec![1.0, 0.25, 1.0, 0.5, 1.0, 1.0];
        let bytes: &[u8] = bytemuck::cast_slice(&depth);

        let format = CaptureFormat::resolve_depth(vk::Format::D32_SFLOAT);
        let pixels = PixelData::new(bytes, extent(3, 2), 12, format).unwrap();
        assert!(pixels.is_depth());

        let statistics = DepthStatistics::collect(&pixels, FarPlane::Standard).unwrap();
        assert_eq!(statistics.far_plane, 4);
        assert_eq!(statistics.finite, 2);
        assert_eq!(statistics.total(), 6);

        let reversed = DepthStatistics::collect(&pixels, FarPlane::Reversed).unwrap();
        assert_eq!(reversed.far_plane, 0);
        assert_eq!(reversed.finite, 6);
    }

    #[test]
    fn packed_depth_ignores_stencil_bits() {
        let depth: Vec<u32> = vec![0xAB_FF_FF_FF, 0x00_12_34_56, 0x00_FF_FF_FF, 0];
        let bytes: &[u8] = bytemuck::cast_slice(&depth);

        let format = CaptureFormat::resolve_depth(vk::Format::D24_UNORM_S8_UINT);
        let pixels = PixelData::new(bytes, extent(2, 2), 8, format).unwrap();

        let statistics = DepthStatistics::collect(&pixels, FarPlane::Standard).unwrap();
        assert_eq!(statistics.far_plane, 2);
        assert_eq!(statistics.finite, 2);
    }

    #[test]
    fn colour_has_no_depth_statistics() {
        let bytes = [0_u8; 16];
        let format = CaptureFormat::passthrough(vk::Format::R8G8B8A8_UNORM);
        let pixels = PixelData::new(&bytes, extent(2, 2), 8, format).unwrap();

        assert!(DepthStatistics::collect(&pixels, FarPlane::Standard).is_none());
    }

    #[test]
    fn random_depth_statistics_cover_every_pixel() {
        let mut rng = rand::rng();

        for _ in 0..16 {
            let width = rng.random_range(1..64_u32);
            let height = rng.random_range(1..64_u32);
            let row_pitch = width as usize * 4 + rng.random_range(0..5_usize) * 4;

            let mut bytes = vec![0_u8; row_pitch * height as usize];
            let mut expected_far = 0;
            for y in 0..height as usize {
                for x in 0..width as usize {
                    let depth: f32 = if rng.random_bool(0.3) {
                        expected_far += 1;
                        1.0
                    } else {
                        rng.random_range(0.0..0.999)
                    };

                    let start = y * row_pitch + x * 4;
                    bytes[start..start + 4].copy_from_slice(&depth.to_le_bytes());
                }
            }

            let format = CaptureFormat::passthrough(vk::Format::D32_SFLOAT);
            let pixels = PixelData::new(&bytes, extent(width, height), row_pitch, format).unwrap();
            let statistics = DepthStatistics::collect(&pixels, FarPlane::Standard).unwrap();

            assert_eq!(statistics.far_plane, expected_far);
            assert_eq!(statistics.total(), u64::from(width * height));
        }
    }
}

use ash::vk;

use crate::{CaptureDevice, CaptureError};

/// The format colour captures are converted to when the device can blit into it.
pub const CANONICAL_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

/// How the staging resource is filled from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum ConversionMode {
    /// A format converting blit into [`CANONICAL_COLOR_FORMAT`].
    Blit,

    /// A byte exact copy, the target format equals the source format.
    Copy,
}

/// The resolved source and target format of a capture.
///
/// The target is [`CANONICAL_COLOR_FORMAT`] only for [`ConversionMode::Blit`], otherwise the
/// target is the source format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    /// The format of the image being captured.
    pub source: vk::Format,

    /// The format of the staging resource and the resulting pixels.
    pub target: vk::Format,

    /// How the staging resource is filled.
    pub mode: ConversionMode,
}

impl CaptureFormat {
    /// Resolves the capture format for a colour source from the format properties of the source and
    /// the canonical format.
    pub fn resolve_color(
        source: vk::Format,
        source_properties: vk::FormatProperties,
        canonical_properties: vk::FormatProperties,
    ) -> Self {
        if supports_blit(source_properties, canonical_properties) {
            Self {
                source,
                target: CANONICAL_COLOR_FORMAT,
                mode: ConversionMode::Blit,
            }
        } else {
            Self::passthrough(source)
        }
    }

    /// Queries the device for blit support and resolves the capture format for a colour source.
    pub unsafe fn query_color<D: CaptureDevice + ?Sized>(device: &D, source: vk::Format) -> Self {
        let source_properties = unsafe { device.format_properties(source) };
        let canonical_properties = unsafe { device.format_properties(CANONICAL_COLOR_FORMAT) };

        Self::resolve_color(source, source_properties, canonical_properties)
    }

    /// Resolves the capture format for a depth source. Depth is never converted.
    pub fn resolve_depth(source: vk::Format) -> Self {
        Self::passthrough(source)
    }

    /// A raw copy that keeps the source format.
    pub fn passthrough(source: vk::Format) -> Self {
        Self {
            source,
            target: source,
            mode: ConversionMode::Copy,
        }
    }

    /// If the capture converts the source into the canonical format.
    #[inline]
    pub fn supports_conversion(&self) -> bool {
        self.mode == ConversionMode::Blit
    }

    /// The host representation of the target format.
    pub fn texel(&self) -> Result<TexelKind, CaptureError> {
        TexelKind::of(self.target).ok_or(CaptureError::UnsupportedFormat(self.target))
    }
}

/// If the device can blit from `source` with optimal tiling into a linear tiled image of the
/// canonical format.
pub fn supports_blit(
    source_properties: vk::FormatProperties,
    canonical_properties: vk::FormatProperties,
) -> bool {
    source_properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::BLIT_SRC)
        && canonical_properties
            .linear_tiling_features
            .contains(vk::FormatFeatureFlags::BLIT_DST)
}

/// The element type a format is read back as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::exhaustive_enums)]
pub enum TexelKind {
    /// Four 8-bit channels, `[u8; 4]`.
    Color8x4,

    /// A 32-bit packed colour, `u32`.
    ColorPacked32,

    /// Four 16-bit float channels, `[f16; 4]`.
    ColorHalf4,

    /// 32-bit float depth, `f32`.
    Depth32Float,

    /// 24-bit depth in the low bits of a `u32`.
    Depth24Packed,

    /// 16-bit normalized depth, `u16`.
    Depth16,
}

impl TexelKind {
    /// The host representation of `format`, `None` if it has none.
    pub fn of(format: vk::Format) -> Option<Self> {
        let kind = match format {
            vk::Format::R8G8B8A8_UNORM
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::R8G8B8A8_SNORM
            | vk::Format::R8G8B8A8_UINT
            | vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::B8G8R8A8_SNORM
            | vk::Format::B8G8R8A8_UINT
            | vk::Format::A8B8G8R8_UNORM_PACK32
            | vk::Format::A8B8G8R8_SRGB_PACK32 => Self::Color8x4,

            vk::Format::A2R10G10B10_UNORM_PACK32
            | vk::Format::A2B10G10R10_UNORM_PACK32
            | vk::Format::B10G11R11_UFLOAT_PACK32
            | vk::Format::E5B9G9R9_UFLOAT_PACK32 => Self::ColorPacked32,

            vk::Format::R16G16B16A16_SFLOAT => Self::ColorHalf4,

            vk::Format::D32_SFLOAT | vk::Format::D32_SFLOAT_S8_UINT => Self::Depth32Float,

            vk::Format::D24_UNORM_S8_UINT | vk::Format::X8_D24_UNORM_PACK32 => {
                Self::Depth24Packed
            }

            vk::Format::D16_UNORM | vk::Format::D16_UNORM_S8_UINT => Self::Depth16,

            _ => return None,
        };

        Some(kind)
    }

    /// Size of one element in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Color8x4
            | Self::ColorPacked32
            | Self::Depth32Float
            | Self::Depth24Packed => 4,
            Self::ColorHalf4 => 8,
            Self::Depth16 => 2,
        }
    }

    /// If the texel holds depth.
    pub fn is_depth(self) -> bool {
        matches!(
            self,
            Self::Depth32Float | Self::Depth24Packed | Self::Depth16
        )
    }
}

/// The aspects a whole-image barrier must cover for `format`.
pub fn barrier_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT => {
            vk::ImageAspectFlags::DEPTH
        }

        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }

        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,

        _ => vk::ImageAspectFlags::COLOR,
    }
}

#[cfg(test)]
mod tests {
    use ash::vk;

    use super::{
        CANONICAL_COLOR_FORMAT, CaptureFormat, ConversionMode, TexelKind, barrier_aspect,
    };
    use crate::CaptureError;

    fn properties(
        optimal: vk::FormatFeatureFlags,
        linear: vk::FormatFeatureFlags,
    ) -> vk::FormatProperties {
        vk::FormatProperties {
            linear_tiling_features: linear,
            optimal_tiling_features: optimal,
            buffer_features: vk::FormatFeatureFlags::empty(),
        }
    }

    #[test]
    fn blit_resolves_to_canonical() {
        let source = properties(vk::FormatFeatureFlags::BLIT_SRC, vk::FormatFeatureFlags::empty());
        let canonical =
            properties(vk::FormatFeatureFlags::empty(), vk::FormatFeatureFlags::BLIT_DST);

        for source_format in [
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::B8G8R8A8_UNORM,
            vk::Format::A2B10G10R10_UNORM_PACK32,
            vk::Format::R16G16B16A16_SFLOAT,
        ] {
            let format = CaptureFormat::resolve_color(source_format, source, canonical);

            assert!(format.supports_conversion());
            assert_eq!(format.source, source_format);
            assert_eq!(format.target, CANONICAL_COLOR_FORMAT);
            assert_eq!(format.texel().unwrap(), TexelKind::Color8x4);
        }
    }

    #[test]
    fn missing_feature_falls_back_to_copy() {
        // Source can be blitted from, but the canonical format cannot be a linear blit target.
        let source = properties(vk::FormatFeatureFlags::BLIT_SRC, vk::FormatFeatureFlags::empty());
        let canonical =
            properties(vk::FormatFeatureFlags::BLIT_DST, vk::FormatFeatureFlags::empty());

        let format = CaptureFormat::resolve_color(vk::Format::B8G8R8A8_SRGB, source, canonical);
        assert_eq!(format.mode, ConversionMode::Copy);
        assert_eq!(format.target, vk::Format::B8G8R8A8_SRGB);

        // Canonical is fine, but the source cannot be blitted from.
        let source = properties(vk::FormatFeatureFlags::empty(), vk::FormatFeatureFlags::BLIT_SRC);
        let canonical =
            properties(vk::FormatFeatureFlags::empty(), vk::FormatFeatureFlags::BLIT_DST);

        let format =
            CaptureFormat::resolve_color(vk::Format::A2B10G10R10_UNORM_PACK32, source, canonical);
        assert!(!format.supports_conversion());
        assert_eq!(format.target, vk::Format::A2B10G10R10_UNORM_PACK32);
        assert_eq!(format.texel().unwrap(), TexelKind::ColorPacked32);
    }

    #[test]
    fn depth_is_never_converted() {
        for source in [
            vk::Format::D32_SFLOAT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D16_UNORM,
        ] {
            let format = CaptureFormat::resolve_depth(source);
            assert_eq!(format.mode, ConversionMode::Copy);
            assert_eq!(format.target, source);
            assert!(format.texel().unwrap().is_depth());
        }
    }

    #[test]
    fn unrepresentable_format() {
        let format = CaptureFormat::passthrough(vk::Format::BC1_RGB_UNORM_BLOCK);

        assert!(matches!(
            format.texel(),
            Err(CaptureError::UnsupportedFormat(vk::Format::BC1_RGB_UNORM_BLOCK))
        ));
        assert!(TexelKind::of(vk::Format::S8_UINT).is_none());
    }

    #[test]
    fn texel_sizes() {
        assert_eq!(TexelKind::of(vk::Format::R16G16B16A16_SFLOAT).unwrap().size(), 8);
        assert_eq!(TexelKind::of(vk::Format::D32_SFLOAT_S8_UINT).unwrap().size(), 4);
        assert_eq!(TexelKind::of(vk::Format::X8_D24_UNORM_PACK32).unwrap().size(), 4);
        assert_eq!(TexelKind::of(vk::Format::D16_UNORM).unwrap().size(), 2);
    }

    #[test]
    fn aspects() {
        assert_eq!(barrier_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            barrier_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(barrier_aspect(vk::Format::B8G8R8A8_SRGB), vk::ImageAspectFlags::COLOR);
    }
}

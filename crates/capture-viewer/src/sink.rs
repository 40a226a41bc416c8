use std::{fs::create_dir_all, io, path::Path};

use ash::vk;
use bytemuck::Pod;
use frame_capture::{PixelBuffer2D, PixelData, PixelSink};
use image::{ImageBuffer, ImageError, ImageFormat, Luma, Pixel, Rgba};
use thiserror::Error;
use tracing::debug;

/// Writes captures as PNG files.
///
/// 8-bit colour is written as RGBA8, half float colour as clamped RGBA16, depth as 16-bit
/// greyscale.
#[derive(Debug, Default)]
pub struct ImageFileSink;

impl PixelSink for ImageFileSink {
    type Error = SinkError;

    fn write(&mut self, pixels: &PixelData<'_>, path: &Path) -> Result<(), Self::Error> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let vk::Extent2D { width, height } = pixels.extent();

        match pixels {
            PixelData::Color8x4(buffer) => {
                let swizzle = is_bgra(buffer.format().target);
                let image = image_from_fn(width, height, buffer, |[c0, c1, c2, a]| {
                    if swizzle {
                        Rgba([c2, c1, c0, a])
                    } else {
                        Rgba([c0, c1, c2, a])
                    }
                });
                save(&image, path)?;
            }

            PixelData::ColorPacked32(buffer) => {
                let format = buffer.format().target;
                let unpack: fn(u32) -> Rgba<u16> = match format {
                    vk::Format::A2B10G10R10_UNORM_PACK32 => |texel| unpack_10bit(texel, false),
                    vk::Format::A2R10G10B10_UNORM_PACK32 => |texel| unpack_10bit(texel, true),
                    _ => return Err(SinkError::Unsupported(format)),
                };

                let image = image_from_fn(width, height, buffer, unpack);
                save(&image, path)?;
            }

            PixelData::ColorHalf4(buffer) => {
                let image = image_from_fn(width, height, buffer, |texel| {
                    Rgba(texel.map(|channel| unorm16(channel.to_f32())))
                });
                save(&image, path)?;
            }

            PixelData::Depth32Float(buffer) => {
                let image = image_from_fn(width, height, buffer, |depth| Luma([unorm16(depth)]));
                save(&image, path)?;
            }

            PixelData::Depth24Packed(buffer) => {
                let image = image_from_fn(width, height, buffer, |texel| {
                    Luma([((texel & 0x00FF_FFFF) >> 8) as u16])
                });
                save(&image, path)?;
            }

            PixelData::Depth16(buffer) => {
                let image = image_from_fn(width, height, buffer, |depth| Luma([depth]));
                save(&image, path)?;
            }
        }

        debug!("Wrote {width}x{height} capture to '{}'", path.display());

        Ok(())
    }
}

fn image_from_fn<T, P, F>(
    width: u32,
    height: u32,
    buffer: &PixelBuffer2D<'_, T>,
    convert: F,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    T: Pod,
    P: Pixel,
    F: Fn(T) -> P,
{
    let mut image = ImageBuffer::new(width, height);

    for (pixel, texel) in image.pixels_mut().zip(buffer.iter()) {
        *pixel = convert(texel);
    }

    image
}

fn save<P>(image: &ImageBuffer<P, Vec<P::Subpixel>>, path: &Path) -> Result<(), SinkError>
where
    P: Pixel + image::PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
{
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

fn is_bgra(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::B8G8R8A8_UNORM
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::B8G8R8A8_SNORM
            | vk::Format::B8G8R8A8_UINT
    )
}

fn unorm16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
}

/// Widens a 2-10-10-10 packed texel to 16 bits per channel. `bgr` when red is in the high bits.
fn unpack_10bit(texel: u32, bgr: bool) -> Rgba<u16> {
    let channel = |shift: u32| -> u16 {
        let value = ((texel >> shift) & 0x3FF) as u16;
        (value << 6) | (value >> 4)
    };

    let (r, b) = if bgr {
        (channel(20), channel(0))
    } else {
        (channel(0), channel(20))
    };
    let a = ((texel >> 30) & 0b11) as u16 * 0x5555;

    Rgba([r, channel(10), b, a])
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Captures in {0:?} cannot be written as an image")]
    Unsupported(vk::Format),

    #[error("Could not encode the capture:\n{0}")]
    Image(#[from] ImageError),

    #[error("Could not create the capture directory:\n{0}")]
    Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use ash::vk;
    use frame_capture::{CaptureFormat, PixelData, PixelSink};
    use half::f16;

    use super::{ImageFileSink, SinkError};

    const EXTENT: vk::Extent2D = vk::Extent2D {
        width: 3,
        height: 2,
    };

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("capture-viewer-sink-{}", std::process::id()))
            .join(name)
    }

    /// Lays out `texels` in rows of `row_pitch` bytes.
    fn pitched(texels: &[u8], texel_size: usize, row_pitch: usize) -> Vec<u8> {
        let row_size = EXTENT.width as usize * texel_size;
        let mut bytes = vec![0xEE; row_pitch * EXTENT.height as usize];

        for (y, row) in texels.chunks_exact(row_size).enumerate() {
            bytes[y * row_pitch..y * row_pitch + row_size].copy_from_slice(row);
        }

        bytes
    }

    #[test]
    fn bgra_is_swizzled() {
        let texels: Vec<u8> = (0..6_u8).flat_map(|i| [i, 10 + i, 20 + i, 255]).collect();
        let bytes = pitched(&texels, 4, 16);
        let format = CaptureFormat::passthrough(vk::Format::B8G8R8A8_UNORM);
        let pixels = PixelData::new(&bytes, EXTENT, 16, format).unwrap();

        let path = temp_path("bgra.png");
        ImageFileSink.write(&pixels, &path).unwrap();

        let image = image::open(&path).unwrap().into_rgba8();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(1, 1).0, [24, 14, 4, 255]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn half_float_is_clamped() {
        let texels: Vec<u8> = (0..6)
            .flat_map(|i| {
                let value = f16::from_f32(i as f32 * 0.5 - 0.5);
                [value, value, value, f16::ONE]
            })
            .flat_map(|channel| channel.to_le_bytes())
            .collect();
        let format = CaptureFormat::passthrough(vk::Format::R16G16B16A16_SFLOAT);
        let pixels = PixelData::new(&texels, EXTENT, 24, format).unwrap();

        let path = temp_path("half.png");
        ImageFileSink.write(&pixels, &path).unwrap();

        let image = image::open(&path).unwrap().into_rgba16();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, u16::MAX]);
        assert_eq!(image.get_pixel(2, 0).0[0], u16::MAX / 2 + 1);
        assert_eq!(image.get_pixel(2, 1).0[0], u16::MAX);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn depth_is_greyscale() {
        let texels: Vec<u8> = [0.0_f32, 0.25, 0.5, 0.75, 1.0, 2.0]
            .iter()
            .flat_map(|depth| depth.to_le_bytes())
            .collect();
        let bytes = pitched(&texels, 4, 32);
        let format = CaptureFormat::passthrough(vk::Format::D32_SFLOAT);
        let pixels = PixelData::new(&bytes, EXTENT, 32, format).unwrap();

        let path = temp_path("depth.png");
        ImageFileSink.write(&pixels, &path).unwrap();

        let image = image::open(&path).unwrap().into_luma16();
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 1).0, [u16::MAX]);
        assert_eq!(image.get_pixel(2, 1).0, [u16::MAX]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn packed_depth_drops_stencil_and_low_bits() {
        let texels: Vec<u8> = [0xFF00_0000_u32, 0xAB_FF_FF_FF, 0x0012_3456, 0, 0, 0]
            .iter()
            .flat_map(|texel| texel.to_le_bytes())
            .collect();
        let format = CaptureFormat::passthrough(vk::Format::D24_UNORM_S8_UINT);
        let pixels = PixelData::new(&texels, EXTENT, 12, format).unwrap();

        let path = temp_path("packed-depth.png");
        ImageFileSink.write(&pixels, &path).unwrap();

        let image = image::open(&path).unwrap().into_luma16();
        assert_eq!(image.get_pixel(0, 0).0, [0]);
        assert_eq!(image.get_pixel(1, 0).0, [0xFFFF]);
        assert_eq!(image.get_pixel(2, 0).0, [0x1234]);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn float_packed_colour_is_unsupported() {
        let texels = vec![0_u8; 24];
        let format = CaptureFormat::passthrough(vk::Format::B10G11R11_UFLOAT_PACK32);
        let pixels = PixelData::new(&texels, EXTENT, 12, format).unwrap();

        let path = temp_path("unsupported.png");
        let result = ImageFileSink.write(&pixels, &path);

        assert!(matches!(
            result,
            Err(SinkError::Unsupported(vk::Format::B10G11R11_UFLOAT_PACK32))
        ));
        assert!(!path.exists());
    }
}

//! Owned pixel buffers and their array conversions.

use image::{DynamicImage, RgbImage, RgbaImage};
use ndarray::Array3;
use srvk_ncnn::{buffer_len, ImageRef};

use crate::error::{Result, SrError};

/// Channel counts the native engine accepts: RGB and RGBA.
pub const SUPPORTED_CHANNELS: [u32; 2] = [3, 4];

/// An 8-bit image laid out row-major as height x width x channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u32,
    data: Vec<u8>,
}

impl Image {
    /// Wraps `data`, which must hold `width * height * channels` bytes.
    pub fn new(width: u32, height: u32, channels: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SrError::InvalidImage(format!("empty image {width}x{height}")));
        }
        if !SUPPORTED_CHANNELS.contains(&channels) {
            return Err(SrError::InvalidImage(format!(
                "{channels} channels, expected 3 (RGB) or 4 (RGBA)"
            )));
        }
        let expected = buffer_len(width, height, channels)
            .ok_or_else(|| SrError::InvalidImage(format!("{width}x{height}x{channels} overflows")))?;
        if data.len() != expected {
            return Err(SrError::InvalidImage(format!(
                "{} bytes for {width}x{height}x{channels}, expected {expected}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Wraps `data` for a `width x height` image, deriving the channel count
    /// from the buffer length.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let pixels = (width as usize).saturating_mul(height as usize);
        if pixels == 0 || data.len() % pixels != 0 {
            return Err(SrError::InvalidImage(format!(
                "{} bytes is not a whole number of {width}x{height} pixels",
                data.len()
            )));
        }
        let channels = u32::try_from(data.len() / pixels)
            .map_err(|_| SrError::InvalidImage("too many channels".into()))?;
        Self::new(width, height, channels, data)
    }

    /// A black image.
    pub fn zeroed(width: u32, height: u32, channels: u32) -> Result<Self> {
        let len = buffer_len(width, height, channels)
            .ok_or_else(|| SrError::InvalidImage(format!("{width}x{height}x{channels} overflows")))?;
        Self::new(width, height, channels, vec![0; len])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// `(height, width, channels)`, the array shape.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, self.channels as usize)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Borrowed descriptor for the native call.
    pub fn view(&self) -> Result<ImageRef<'_>> {
        Ok(ImageRef::new(&self.data, self.width, self.height, self.channels)?)
    }

    /// Copies an `(h, w, c)` array, in any memory layout.
    pub fn from_array(array: &Array3<u8>) -> Result<Self> {
        let (h, w, c) = array.dim();
        let dim = |v: usize| u32::try_from(v).map_err(|_| SrError::InvalidImage(format!("dimension {v} too large")));
        let data: Vec<u8> = array.iter().copied().collect();
        Self::new(dim(w)?, dim(h)?, dim(c)?, data)
    }

    /// Converts into an `(h, w, c)` array without copying.
    pub fn into_array(self) -> Result<Array3<u8>> {
        let shape = self.shape();
        Array3::from_shape_vec(shape, self.data).map_err(|e| SrError::InvalidImage(e.to_string()))
    }

    /// RGB8 for opaque images, RGBA8 when the source has alpha.
    pub fn from_dynamic(img: &DynamicImage) -> Result<Self> {
        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            Self::new(w, h, 4, rgba.into_raw())
        } else {
            let rgb = img.to_rgb8();
            let (w, h) = rgb.dimensions();
            Self::new(w, h, 3, rgb.into_raw())
        }
    }

    pub fn into_dynamic(self) -> Result<DynamicImage> {
        let (w, h) = (self.width, self.height);
        let img = match self.channels {
            3 => RgbImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgb8),
            4 => RgbaImage::from_raw(w, h, self.data).map(DynamicImage::ImageRgba8),
            c => return Err(SrError::InvalidImage(format!("{c} channels"))),
        };
        img.ok_or_else(|| SrError::InvalidImage("buffer does not match dimensions".into()))
    }
}

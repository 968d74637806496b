//! Borrowed pixel buffers handed to [`NativeEngine::process`](crate::NativeEngine::process).

use crate::error::EngineError;

/// Computes `width * height * channels`, rejecting overflow.
pub fn buffer_len(width: u32, height: u32, channels: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(channels as usize)
}

fn check_len(width: u32, height: u32, channels: u32, got: usize) -> Result<(), EngineError> {
    if got == 0 {
        return Err(EngineError::EmptyData);
    }
    let expected = buffer_len(width, height, channels).unwrap_or(usize::MAX);
    if got != expected {
        return Err(EngineError::BufferSize {
            width,
            height,
            channels,
            expected,
            got,
        });
    }
    Ok(())
}

/// Read-only row-major pixel buffer (height x width x channels).
#[derive(Debug, Clone, Copy)]
pub struct ImageRef<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    channels: u32,
}

impl<'a> ImageRef<'a> {
    /// Wraps `data`, which must hold exactly `width * height * channels` bytes.
    pub fn new(data: &'a [u8], width: u32, height: u32, channels: u32) -> Result<Self, EngineError> {
        check_len(width, height, channels, data.len())?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
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
}

/// Writable row-major pixel buffer the engine fills with its result.
#[derive(Debug)]
pub struct ImageMut<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    channels: u32,
}

impl<'a> ImageMut<'a> {
    /// Wraps `data`, which must hold exactly `width * height * channels` bytes.
    pub fn new(data: &'a mut [u8], width: u32, height: u32, channels: u32) -> Result<Self, EngineError> {
        check_len(width, height, channels, data.len())?;
        Ok(Self {
            data,
            width,
            height,
            channels,
        })
    }

    pub fn data(&self) -> &[u8] {
        self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data
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
}

/// Checks that `output` is `input` scaled by `scale` with the same channel count.
pub fn check_scaled(input: &ImageRef<'_>, output: &ImageMut<'_>, scale: u32) -> Result<(), EngineError> {
    let want_w = input.width().saturating_mul(scale);
    let want_h = input.height().saturating_mul(scale);
    if output.width() != want_w || output.height() != want_h {
        return Err(EngineError::OutputShape {
            scale,
            want_w,
            want_h,
            got_w: output.width(),
            got_h: output.height(),
        });
    }
    if output.channels() != input.channels() {
        return Err(EngineError::Internal(format!(
            "channel mismatch: input {} vs output {}",
            input.channels(),
            output.channels()
        )));
    }
    Ok(())
}

//! Pure-Rust stand-in for the native engine.
//!
//! [`ReferenceEngine`] upscales by nearest-neighbour pixel replication. It
//! honours the same contract as the Vulkan engine (load before process,
//! output sized `scale x input`, only the output buffer is written) so the
//! binding, recipe transfer and isolated workers run on machines without a
//! GPU or the native library. Tile size, pre-padding and TTA are recorded but
//! have no effect on the result.

use std::path::Path;

use tracing::debug;

use crate::engine::{Backend, NativeEngine};
use crate::error::EngineError;
use crate::image::{check_scaled, ImageMut, ImageRef};

/// Heap budget reported when none is configured, in megabytes.
pub const DEFAULT_HEAP_BUDGET_MB: u32 = 2048;

/// [`Backend`] producing [`ReferenceEngine`] handles.
#[derive(Debug, Clone)]
pub struct ReferenceBackend {
    heap_budget_mb: u32,
    gpu_count: i32,
}

impl Default for ReferenceBackend {
    fn default() -> Self {
        Self {
            heap_budget_mb: DEFAULT_HEAP_BUDGET_MB,
            gpu_count: 1,
        }
    }
}

impl ReferenceBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `mb` as the heap budget of every device.
    pub fn with_heap_budget(mut self, mb: u32) -> Self {
        self.heap_budget_mb = mb;
        self
    }

    /// Pretends `count` devices are present.
    pub fn with_gpu_count(mut self, count: i32) -> Self {
        self.gpu_count = count;
        self
    }

    fn check_device(&self, gpuid: i32) -> Result<(), EngineError> {
        if gpuid < 0 || gpuid >= self.gpu_count {
            return Err(EngineError::InvalidDevice {
                gpuid,
                count: self.gpu_count,
            });
        }
        Ok(())
    }
}

impl Backend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn create_engine(&self, gpuid: i32, tta_mode: bool) -> Result<Box<dyn NativeEngine>, EngineError> {
        self.check_device(gpuid)?;
        debug!(gpuid, tta_mode, "reference engine created");
        Ok(Box::new(ReferenceEngine::new(tta_mode)))
    }

    fn heap_budget(&self, gpuid: i32) -> Result<u32, EngineError> {
        self.check_device(gpuid)?;
        Ok(self.heap_budget_mb)
    }

    fn gpu_count(&self) -> Result<i32, EngineError> {
        Ok(self.gpu_count)
    }
}

/// Nearest-neighbour engine handle.
#[derive(Debug, Default)]
pub struct ReferenceEngine {
    scale: u32,
    tilesize: u32,
    prepadding: u32,
    tta_mode: bool,
    loaded: bool,
}

impl ReferenceEngine {
    pub fn new(tta_mode: bool) -> Self {
        Self {
            scale: 1,
            tta_mode,
            ..Default::default()
        }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn tilesize(&self) -> u32 {
        self.tilesize
    }

    pub fn prepadding(&self) -> u32 {
        self.prepadding
    }

    pub fn tta_mode(&self) -> bool {
        self.tta_mode
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }
}

impl NativeEngine for ReferenceEngine {
    fn set_scale(&mut self, scale: u32) {
        self.scale = scale;
    }

    fn set_tilesize(&mut self, tilesize: u32) {
        self.tilesize = tilesize;
    }

    fn set_prepadding(&mut self, prepadding: u32) {
        self.prepadding = prepadding;
    }

    fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), EngineError> {
        // The native loader fails on unreadable files; so do we.
        for (op, path) in [("load_param", param_path), ("load_model", model_path)] {
            if !path.is_file() {
                return Err(EngineError::Native { op, code: -1 });
            }
        }
        self.loaded = true;
        Ok(())
    }

    fn process(&self, input: &ImageRef<'_>, output: &mut ImageMut<'_>) -> Result<(), EngineError> {
        if !self.loaded {
            return Err(EngineError::NotLoaded);
        }
        if self.scale == 0 {
            return Err(EngineError::Internal("scale must be positive".into()));
        }
        check_scaled(input, output, self.scale)?;

        let scale = self.scale as usize;
        let channels = input.channels() as usize;
        let in_row = input.width() as usize * channels;
        let out_row = in_row * scale;
        let src = input.data();
        let dst = output.data_mut();

        for (y, row) in src.chunks_exact(in_row).enumerate() {
            let first = y * scale * out_row;
            let line = &mut dst[first..first + out_row];
            for (x, px) in row.chunks_exact(channels).enumerate() {
                for k in 0..scale {
                    let at = (x * scale + k) * channels;
                    line[at..at + channels].copy_from_slice(px);
                }
            }
            for k in 1..scale {
                dst.copy_within(first..first + out_row, first + k * out_row);
            }
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<(), EngineError> {
        self.loaded = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_engine(scale: u32) -> (ReferenceEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let param = dir.path().join("x.param");
        let bin = dir.path().join("x.bin");
        std::fs::write(&param, b"7767517").unwrap();
        std::fs::write(&bin, b"\0").unwrap();
        let mut engine = ReferenceEngine::new(false);
        engine.set_scale(scale);
        engine.load(&param, &bin).unwrap();
        (engine, dir)
    }

    #[test]
    fn process_before_load_fails() {
        let engine = ReferenceEngine::new(false);
        let input = vec![0u8; 3];
        let mut output = vec![0u8; 3];
        let i = ImageRef::new(&input, 1, 1, 3).unwrap();
        let mut o = ImageMut::new(&mut output, 1, 1, 3).unwrap();
        assert!(matches!(engine.process(&i, &mut o), Err(EngineError::NotLoaded)));
    }

    #[test]
    fn load_missing_file_fails() {
        let mut engine = ReferenceEngine::new(false);
        let err = engine
            .load(Path::new("/nonexistent/x4.param"), Path::new("/nonexistent/x4.bin"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Native { op: "load_param", code: -1 }));
        assert!(!engine.is_loaded());
    }

    #[test]
    fn nearest_neighbour_2x() {
        let (engine, _dir) = loaded_engine(2);
        // 2x1 RGB: red, blue
        let input = [255, 0, 0, 0, 0, 255];
        let mut output = vec![0u8; 4 * 2 * 3];
        let i = ImageRef::new(&input, 2, 1, 3).unwrap();
        let mut o = ImageMut::new(&mut output, 4, 2, 3).unwrap();
        engine.process(&i, &mut o).unwrap();

        let row = [255, 0, 0, 255, 0, 0, 0, 0, 255, 0, 0, 255];
        assert_eq!(&output[..12], &row);
        assert_eq!(&output[12..], &row);
    }

    #[test]
    fn rgba_3x_preserves_alpha() {
        let (engine, _dir) = loaded_engine(3);
        let input = [10, 20, 30, 40];
        let mut output = vec![0u8; 3 * 3 * 4];
        let i = ImageRef::new(&input, 1, 1, 4).unwrap();
        let mut o = ImageMut::new(&mut output, 3, 3, 4).unwrap();
        engine.process(&i, &mut o).unwrap();
        for px in output.chunks_exact(4) {
            assert_eq!(px, &input);
        }
    }

    #[test]
    fn cleanup_unloads() {
        let (mut engine, _dir) = loaded_engine(2);
        engine.cleanup().unwrap();
        assert!(!engine.is_loaded());
    }

    #[test]
    fn backend_rejects_unknown_device() {
        let backend = ReferenceBackend::new().with_gpu_count(2);
        assert!(backend.create_engine(1, true).is_ok());
        assert!(matches!(
            backend.create_engine(2, false),
            Err(EngineError::InvalidDevice { gpuid: 2, count: 2 })
        ));
        assert!(backend.heap_budget(-1).is_err());
    }

    #[test]
    fn backend_reports_configured_budget() {
        let backend = ReferenceBackend::new().with_heap_budget(600);
        assert_eq!(backend.heap_budget(0).unwrap(), 600);
        assert_eq!(backend.gpu_count().unwrap(), 1);
    }
}

//! The binding facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use srvk_ncnn::{Backend, ImageMut, NativeEngine};
use tracing::{debug, info};

use crate::config::{EngineConfig, Recipe};
use crate::error::{Result, SrError};
use crate::image::Image;
use crate::model::ModelFamily;
use crate::paths::{ModelFiles, ModelLocator};
use crate::worker::{TaskOptions, WorkerPool};

/// Upscales images with one native engine handle.
///
/// Configuration and loaded weights are fixed for the lifetime of the
/// value; [`SuperResolution::process`] calls are independent of each other.
///
/// # Example
///
/// ```no_run
/// use srvk_sr::{EngineConfig, Image, SuperResolution};
///
/// let cfg = EngineConfig::new("models-DF2K").with_scale(4);
/// let sr = SuperResolution::new(cfg)?;
/// let out = sr.process(&Image::zeroed(64, 64, 3)?)?;
/// assert_eq!(out.shape(), (256, 256, 3));
/// # Ok::<(), srvk_sr::SrError>(())
/// ```
pub struct SuperResolution {
    engine: Box<dyn NativeEngine>,
    backend: Arc<dyn Backend>,
    config: EngineConfig,
    locator: ModelLocator,
    tilesize: u32,
    prepadding: u32,
    files: Option<ModelFiles>,
}

impl SuperResolution {
    /// Creates the engine on the configured backend, sets its parameters
    /// and loads the model.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let backend = config.backend.backend()?;
        Self::with_backend(config, backend)
    }

    /// Like [`SuperResolution::new`] with an explicit backend.
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        config.validate()?;
        let engine = backend.create_engine(config.gpuid, config.tta_mode)?;
        info!(
            backend = backend.name(),
            gpuid = config.gpuid,
            model = %config.model,
            scale = config.scale,
            tta = config.tta_mode,
            "engine created"
        );

        let mut sr = Self {
            engine,
            backend,
            locator: ModelLocator::new(config.search_roots.clone()),
            tilesize: 0,
            prepadding: 0,
            files: None,
            config,
        };
        sr.set_params(sr.config.scale, sr.config.tilesize)?;
        let (param, bin) = (sr.config.param_path.clone(), sr.config.bin_path.clone());
        sr.load(param.as_deref(), bin.as_deref())?;
        Ok(sr)
    }

    /// Rebuilds a binding from a captured [`Recipe`].
    pub fn from_recipe(recipe: Recipe) -> Result<Self> {
        Self::new(recipe.into_config())
    }

    /// Like [`SuperResolution::from_recipe`] with an explicit backend.
    pub fn from_recipe_with_backend(recipe: Recipe, backend: Arc<dyn Backend>) -> Result<Self> {
        Self::with_backend(recipe.into_config(), backend)
    }

    /// Writes scale, tile size and pre-padding onto the engine.
    ///
    /// A `tilesize` of 0 derives one from the device heap budget.
    pub fn set_params(&mut self, scale: u32, tilesize: u32) -> Result<()> {
        if scale == 0 {
            return Err(SrError::InvalidConfig("scale must be at least 1".into()));
        }
        let family = ModelFamily::from_model(&self.config.model)?;
        let requested = tilesize;
        let tilesize = if tilesize > 0 {
            tilesize
        } else {
            let budget = self.backend.heap_budget(self.config.gpuid)?;
            let tilesize = family.tile_size_for_budget(budget);
            debug!(heap_budget_mb = budget, tilesize, "tile size from heap budget");
            tilesize
        };
        let prepadding = family.prepadding();

        self.engine.set_scale(scale);
        self.engine.set_tilesize(tilesize);
        self.engine.set_prepadding(prepadding);
        self.config.scale = scale;
        self.config.tilesize = requested;
        self.tilesize = tilesize;
        self.prepadding = prepadding;
        Ok(())
    }

    /// Model files `load` would use for the given explicit paths.
    ///
    /// Unless both paths are given, both are derived from the model
    /// identifier as `x{scale}.param` / `x{scale}.bin`.
    pub fn resolve_files(&self, param_path: Option<&Path>, model_path: Option<&Path>) -> ModelFiles {
        match (param_path, model_path) {
            (Some(p), Some(m)) if !p.as_os_str().is_empty() && !m.as_os_str().is_empty() => {
                ModelFiles::new(p, m)
            }
            _ => self.locator.resolve(&self.config.model, self.config.scale),
        }
    }

    /// Loads the model, failing before any native call unless both files exist.
    pub fn load(&mut self, param_path: Option<&Path>, model_path: Option<&Path>) -> Result<()> {
        let files = self.resolve_files(param_path, model_path);
        files.ensure_exist()?;
        self.engine.load(&files.param, &files.model)?;
        info!(param = %files.param.display(), model = %files.model.display(), "model loaded");
        self.files = Some(files);
        Ok(())
    }

    /// Upscales `image` in this process.
    pub fn process(&self, image: &Image) -> Result<Image> {
        invoke(self.engine.as_ref(), self.config.scale, image)
    }

    /// Upscales `image` in a worker process of `pool`.
    ///
    /// The worker rebuilds this binding from [`SuperResolution::recipe`]; a
    /// native crash kills the worker, not the caller.
    pub async fn process_isolated(&self, pool: &WorkerPool, image: Image) -> Result<Image> {
        pool.submit(self.recipe(), image).await
    }

    /// [`SuperResolution::process_isolated`] with a timeout or cancellation token.
    pub async fn process_isolated_with(&self, pool: &WorkerPool, image: Image, opts: TaskOptions) -> Result<Image> {
        pool.submit_with(self.recipe(), image, opts).await
    }

    /// Captures the construction recipe, pinned to the files actually loaded.
    pub fn recipe(&self) -> Recipe {
        let mut recipe = Recipe::from(&self.config);
        if let Some(files) = &self.files {
            recipe.param_path = Some(absolute(&files.param));
            recipe.bin_path = Some(absolute(&files.model));
        }
        recipe
    }

    /// Releases the engine's pipelines. `process` fails until the next `load`.
    pub fn cleanup(&mut self) -> Result<()> {
        self.engine.cleanup()?;
        self.files = None;
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scale(&self) -> u32 {
        self.config.scale
    }

    pub fn tilesize(&self) -> u32 {
        self.tilesize
    }

    pub fn prepadding(&self) -> u32 {
        self.prepadding
    }

    /// Files passed to the last successful `load`.
    pub fn model_files(&self) -> Option<&ModelFiles> {
        self.files.as_ref()
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Runs one native process call: allocates the `scale²`-sized output,
/// hands both descriptors to the engine and wraps the filled buffer.
pub(crate) fn invoke(engine: &dyn NativeEngine, scale: u32, image: &Image) -> Result<Image> {
    let out_w = image
        .width()
        .checked_mul(scale)
        .ok_or_else(|| SrError::InvalidImage("output width overflows".into()))?;
    let out_h = image
        .height()
        .checked_mul(scale)
        .ok_or_else(|| SrError::InvalidImage("output height overflows".into()))?;
    let out_len = image
        .len()
        .checked_mul((scale as usize).pow(2))
        .ok_or_else(|| SrError::InvalidImage("output buffer overflows".into()))?;

    let mut out = vec![0u8; out_len];
    let start = Instant::now();
    {
        let input = image.view()?;
        let mut output = ImageMut::new(&mut out, out_w, out_h, image.channels())?;
        engine.process(&input, &mut output)?;
    }
    debug!(
        width = image.width(),
        height = image.height(),
        channels = image.channels(),
        scale,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "processed"
    );
    Image::new(out_w, out_h, image.channels(), out)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use srvk_ncnn::{EngineError, ImageRef, ReferenceBackend};

    use super::*;

    /// Native calls seen by a [`RecordingEngine`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Scale(u32),
        Tilesize(u32),
        Prepadding(u32),
        Load(PathBuf, PathBuf),
        Process,
        Cleanup,
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    struct RecordingEngine {
        log: Log,
        fill: u8,
    }

    impl NativeEngine for RecordingEngine {
        fn set_scale(&mut self, scale: u32) {
            self.log.lock().unwrap().push(Call::Scale(scale));
        }

        fn set_tilesize(&mut self, tilesize: u32) {
            self.log.lock().unwrap().push(Call::Tilesize(tilesize));
        }

        fn set_prepadding(&mut self, prepadding: u32) {
            self.log.lock().unwrap().push(Call::Prepadding(prepadding));
        }

        fn load(&mut self, param_path: &Path, model_path: &Path) -> std::result::Result<(), EngineError> {
            self.log
                .lock()
                .unwrap()
                .push(Call::Load(param_path.to_path_buf(), model_path.to_path_buf()));
            Ok(())
        }

        fn process(&self, _input: &ImageRef<'_>, output: &mut ImageMut<'_>) -> std::result::Result<(), EngineError> {
            self.log.lock().unwrap().push(Call::Process);
            output.data_mut().fill(self.fill);
            Ok(())
        }

        fn cleanup(&mut self) -> std::result::Result<(), EngineError> {
            self.log.lock().unwrap().push(Call::Cleanup);
            Ok(())
        }
    }

    struct RecordingBackend {
        log: Log,
        heap_budget: u32,
    }

    impl Backend for RecordingBackend {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn create_engine(&self, _gpuid: i32, _tta: bool) -> std::result::Result<Box<dyn NativeEngine>, EngineError> {
            Ok(Box::new(RecordingEngine {
                log: self.log.clone(),
                fill: 0xAB,
            }))
        }

        fn heap_budget(&self, _gpuid: i32) -> std::result::Result<u32, EngineError> {
            Ok(self.heap_budget)
        }

        fn gpu_count(&self) -> std::result::Result<i32, EngineError> {
            Ok(1)
        }
    }

    fn recording(heap_budget: u32) -> (Arc<dyn Backend>, Log) {
        let log: Log = Arc::default();
        let backend = Arc::new(RecordingBackend {
            log: log.clone(),
            heap_budget,
        });
        (backend, log)
    }

    /// A `models-DF2K` directory holding `x{scale}` files.
    fn model_dir(scale: u32) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("models-DF2K");
        std::fs::create_dir_all(&dir).unwrap();
        let files = ModelFiles::in_dir(&dir, scale);
        std::fs::write(&files.param, b"7767517\n").unwrap();
        std::fs::write(&files.model, b"\0\0\0\0").unwrap();
        (tmp, dir)
    }

    fn config_for(dir: &Path, scale: u32) -> EngineConfig {
        EngineConfig::new(dir.to_string_lossy()).with_scale(scale)
    }

    #[test]
    fn construct_sets_params_then_loads() {
        let (_tmp, dir) = model_dir(4);
        let (backend, log) = recording(2000);
        let sr = SuperResolution::with_backend(config_for(&dir, 4), backend).unwrap();

        let files = ModelFiles::in_dir(&dir, 4);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                Call::Scale(4),
                Call::Tilesize(200),
                Call::Prepadding(10),
                Call::Load(files.param.clone(), files.model.clone()),
            ]
        );
        assert_eq!(sr.tilesize(), 200);
        assert_eq!(sr.prepadding(), 10);
        assert_eq!(sr.model_files(), Some(&files));
    }

    #[test]
    fn tile_size_follows_heap_budget() {
        let (_tmp, dir) = model_dir(2);
        for (budget, tile) in [(2000, 200), (600, 100), (200, 64), (100, 32)] {
            let (backend, _log) = recording(budget);
            let sr = SuperResolution::with_backend(config_for(&dir, 2), backend).unwrap();
            assert_eq!(sr.tilesize(), tile, "budget {budget}");
        }
    }

    #[test]
    fn explicit_tilesize_skips_budget() {
        let (_tmp, dir) = model_dir(2);
        let (backend, log) = recording(100);
        let sr = SuperResolution::with_backend(config_for(&dir, 2).with_tilesize(128), backend).unwrap();
        assert_eq!(sr.tilesize(), 128);
        assert!(log.lock().unwrap().contains(&Call::Tilesize(128)));
    }

    #[test]
    fn unsupported_model_fails_before_load() {
        let (backend, log) = recording(2000);
        let cfg = EngineConfig::new("models-cunet").with_model_files("/x.param", "/x.bin");
        let err = SuperResolution::with_backend(cfg, backend).err().unwrap();
        assert!(matches!(err, SrError::UnsupportedModel(ref m) if m == "models-cunet"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_artifacts_never_reach_native_load() {
        let (_tmp, dir) = model_dir(4);
        let present = ModelFiles::in_dir(&dir, 4);
        let absent = dir.join("absent.bin");
        let cases = [
            (present.param.clone(), absent.clone()),
            (absent.with_extension("param"), present.model.clone()),
            (absent.with_extension("param"), absent.clone()),
        ];
        for (param, bin) in cases {
            let (backend, log) = recording(2000);
            let cfg = config_for(&dir, 4).with_model_files(&param, &bin);
            let err = SuperResolution::with_backend(cfg, backend).err().unwrap();
            match err {
                SrError::MissingArtifact { param: p, model: m } => {
                    assert_eq!(p, param);
                    assert_eq!(m, bin);
                }
                other => panic!("unexpected error: {other}"),
            }
            assert!(
                !log.lock().unwrap().iter().any(|c| matches!(c, Call::Load(..))),
                "native load must not run"
            );
        }
    }

    #[test]
    fn derived_files_follow_scale() {
        // Only x4 files exist; scale 2 looks for x2 and fails.
        let (_tmp, dir) = model_dir(4);
        let (backend, _log) = recording(2000);
        let err = SuperResolution::with_backend(config_for(&dir, 2), backend).err().unwrap();
        match err {
            SrError::MissingArtifact { param, .. } => assert!(param.ends_with("x2.param")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn one_explicit_path_is_not_enough() {
        let (_tmp, dir) = model_dir(4);
        let (backend, log) = recording(2000);
        let mut cfg = config_for(&dir, 4);
        cfg.param_path = Some(PathBuf::from("/elsewhere/custom.param"));
        SuperResolution::with_backend(cfg, backend).unwrap();

        let files = ModelFiles::in_dir(&dir, 4);
        assert!(log.lock().unwrap().contains(&Call::Load(files.param, files.model)));
    }

    #[test]
    fn process_output_shape() {
        let (_tmp, dir) = model_dir(3);
        let (backend, _log) = recording(2000);
        let sr = SuperResolution::with_backend(config_for(&dir, 3), backend).unwrap();

        for (w, h, c) in [(1, 1, 3), (5, 2, 4), (7, 9, 3)] {
            let input = Image::zeroed(w, h, c).unwrap();
            let out = sr.process(&input).unwrap();
            assert_eq!(out.shape(), (3 * h as usize, 3 * w as usize, c as usize));
            assert_eq!(out.len(), 9 * input.len());
            assert!(out.as_bytes().iter().all(|&b| b == 0xAB));
        }
    }

    #[test]
    fn reference_backend_end_to_end() {
        let (_tmp, dir) = model_dir(2);
        let backend = Arc::new(ReferenceBackend::new().with_heap_budget(600));
        let sr = SuperResolution::with_backend(config_for(&dir, 2), backend).unwrap();
        assert_eq!(sr.tilesize(), 100);

        let input = Image::new(2, 1, 3, vec![1, 2, 3, 4, 5, 6]).unwrap();
        let out = sr.process(&input).unwrap();
        assert_eq!(
            out.as_bytes(),
            &[1, 2, 3, 1, 2, 3, 4, 5, 6, 4, 5, 6, 1, 2, 3, 1, 2, 3, 4, 5, 6, 4, 5, 6]
        );
    }

    #[test]
    fn recipe_round_trip_reproduces_output() {
        let (_tmp, dir) = model_dir(4);
        let cfg = config_for(&dir, 4).with_tta(true).with_backend(srvk_ncnn::BackendKind::Reference);
        let sr = SuperResolution::new(cfg).unwrap();

        let json = serde_json::to_string(&sr.recipe()).unwrap();
        let restored = SuperResolution::from_recipe(serde_json::from_str(&json).unwrap()).unwrap();
        assert!(restored.config().tta_mode);
        assert_eq!(restored.model_files(), sr.model_files());

        let input = Image::new(3, 2, 4, (0..24).collect()).unwrap();
        assert_eq!(restored.process(&input).unwrap(), sr.process(&input).unwrap());
    }

    #[test]
    fn recipe_pins_loaded_files() {
        let (_tmp, dir) = model_dir(2);
        let (backend, _log) = recording(2000);
        let sr = SuperResolution::with_backend(config_for(&dir, 2), backend).unwrap();
        let recipe = sr.recipe();
        assert_eq!(recipe.param_path, Some(dir.join("x2.param")));
        assert_eq!(recipe.bin_path, Some(dir.join("x2.bin")));
        assert_eq!(recipe.scale, 2);
    }

    #[test]
    fn rebuilt_binding_keeps_pinned_tilesize() {
        let (_tmp, dir) = model_dir(2);
        let (backend, _log) = recording(2000);
        let sr = SuperResolution::with_backend(config_for(&dir, 2).with_tilesize(64), backend.clone()).unwrap();

        let recipe: Recipe = serde_json::from_str(&serde_json::to_string(&sr.recipe()).unwrap()).unwrap();
        assert_eq!(recipe.tilesize, 64);
        let restored = SuperResolution::from_recipe_with_backend(recipe, backend.clone()).unwrap();
        assert_eq!(restored.tilesize(), 64);

        let auto = SuperResolution::with_backend(config_for(&dir, 2), backend.clone()).unwrap();
        let restored = SuperResolution::from_recipe_with_backend(auto.recipe(), backend).unwrap();
        assert_eq!(restored.tilesize(), 200);
    }

    #[test]
    fn cleanup_forwards_and_forgets_files() {
        let (_tmp, dir) = model_dir(2);
        let (backend, log) = recording(2000);
        let mut sr = SuperResolution::with_backend(config_for(&dir, 2), backend).unwrap();
        sr.cleanup().unwrap();
        assert_eq!(log.lock().unwrap().last(), Some(&Call::Cleanup));
        assert!(sr.model_files().is_none());
    }

    #[test]
    fn set_params_rejects_zero_scale() {
        let (_tmp, dir) = model_dir(2);
        let (backend, _log) = recording(2000);
        let mut sr = SuperResolution::with_backend(config_for(&dir, 2), backend).unwrap();
        assert!(matches!(sr.set_params(0, 0), Err(SrError::InvalidConfig(_))));
    }
}

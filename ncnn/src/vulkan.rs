//! [`Backend`] implementation over the native ncnn-vulkan engine.

use std::path::{Path, PathBuf};
use std::ptr;

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::engine::{Backend, NativeEngine};
use crate::error::EngineError;
use crate::ffi;
use crate::image::{check_scaled, ImageMut, ImageRef};

// ncnn wants exactly one GPU instance per process, created before any device query.
static GPU_INSTANCE: Lazy<Result<(), i32>> = Lazy::new(|| {
    let ret = unsafe { ffi::srvk_create_gpu_instance() };
    if ret != 0 {
        return Err(ret);
    }
    info!(gpus = unsafe { ffi::srvk_get_gpu_count() }, "vulkan gpu instance created");
    Ok(())
});

fn ensure_gpu_instance() -> Result<(), EngineError> {
    GPU_INSTANCE.as_ref().map_err(|&code| EngineError::Native {
        op: "create_gpu_instance",
        code,
    })?;
    Ok(())
}

/// Tears down the process-wide GPU instance.
///
/// Call once before exit, after every [`VulkanEngine`] has been dropped. No
/// engine can be created afterwards.
pub fn release_gpu_instance() {
    if Lazy::get(&GPU_INSTANCE).is_some_and(|r| r.is_ok()) {
        unsafe { ffi::srvk_destroy_gpu_instance() };
    }
}

/// Vulkan-backed engine factory.
#[derive(Debug)]
pub struct VulkanBackend {
    _priv: (),
}

impl VulkanBackend {
    /// Initializes the GPU instance if needed.
    pub fn new() -> Result<Self, EngineError> {
        ensure_gpu_instance()?;
        Ok(Self { _priv: () })
    }

    fn check_device(&self, gpuid: i32) -> Result<(), EngineError> {
        let count = self.gpu_count()?;
        if gpuid < 0 || gpuid >= count {
            return Err(EngineError::InvalidDevice { gpuid, count });
        }
        Ok(())
    }
}

impl Backend for VulkanBackend {
    fn name(&self) -> &'static str {
        "vulkan"
    }

    fn create_engine(&self, gpuid: i32, tta_mode: bool) -> Result<Box<dyn NativeEngine>, EngineError> {
        self.check_device(gpuid)?;
        let engine = unsafe { ffi::srvk_engine_create(gpuid, tta_mode as i32) };
        if engine.is_null() {
            return Err(EngineError::Internal("engine_create failed".into()));
        }
        debug!(gpuid, tta_mode, "vulkan engine created");
        Ok(Box::new(VulkanEngine { engine, scale: 1 }))
    }

    fn heap_budget(&self, gpuid: i32) -> Result<u32, EngineError> {
        self.check_device(gpuid)?;
        Ok(unsafe { ffi::srvk_get_heap_budget(gpuid) })
    }

    fn gpu_count(&self) -> Result<i32, EngineError> {
        Ok(unsafe { ffi::srvk_get_gpu_count() })
    }
}

/// Owns one native `SR` object.
pub struct VulkanEngine {
    engine: ffi::SrvkEngineT,
    scale: u32,
}

// The handle is only ever touched by its owning binding.
unsafe impl Send for VulkanEngine {}

impl VulkanEngine {
    fn check(op: &'static str, ret: i32) -> Result<(), EngineError> {
        if ret != 0 {
            return Err(EngineError::Native { op, code: ret });
        }
        Ok(())
    }
}

fn to_c_int(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn descriptor(data: *const u8, w: u32, h: u32, c: u32) -> ffi::SrvkImage {
    ffi::SrvkImage {
        data: data as *mut u8,
        w: to_c_int(w),
        h: to_c_int(h),
        elempack: to_c_int(c),
    }
}

#[cfg(unix)]
fn narrow_path(path: &Path) -> Result<std::ffi::CString, EngineError> {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::CString::new(path.as_os_str().as_bytes()).map_err(|_| EngineError::InvalidPath(PathBuf::from(path)))
}

#[cfg(all(not(unix), not(windows)))]
fn narrow_path(path: &Path) -> Result<std::ffi::CString, EngineError> {
    let s = path.to_str().ok_or_else(|| EngineError::InvalidPath(PathBuf::from(path)))?;
    std::ffi::CString::new(s).map_err(|_| EngineError::InvalidPath(PathBuf::from(path)))
}

#[cfg(windows)]
fn wide_path(path: &Path) -> Result<Vec<ffi::WChar>, EngineError> {
    use std::os::windows::ffi::OsStrExt;
    let mut wide: Vec<u16> = path.as_os_str().encode_wide().collect();
    if wide.contains(&0) {
        return Err(EngineError::InvalidPath(PathBuf::from(path)));
    }
    wide.push(0);
    Ok(wide)
}

impl NativeEngine for VulkanEngine {
    fn set_scale(&mut self, scale: u32) {
        self.scale = scale;
        unsafe { ffi::srvk_engine_set_scale(self.engine, to_c_int(scale)) };
    }

    fn set_tilesize(&mut self, tilesize: u32) {
        unsafe { ffi::srvk_engine_set_tilesize(self.engine, to_c_int(tilesize)) };
    }

    fn set_prepadding(&mut self, prepadding: u32) {
        unsafe { ffi::srvk_engine_set_prepadding(self.engine, to_c_int(prepadding)) };
    }

    #[cfg(not(windows))]
    fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), EngineError> {
        let c_param = narrow_path(param_path)?;
        let c_model = narrow_path(model_path)?;
        let ret = unsafe { ffi::srvk_engine_load(self.engine, c_param.as_ptr(), c_model.as_ptr()) };
        Self::check("load", ret)
    }

    #[cfg(windows)]
    fn load(&mut self, param_path: &Path, model_path: &Path) -> Result<(), EngineError> {
        let w_param = wide_path(param_path)?;
        let w_model = wide_path(model_path)?;
        let ret = unsafe { ffi::srvk_engine_load_w(self.engine, w_param.as_ptr(), w_model.as_ptr()) };
        Self::check("load", ret)
    }

    fn process(&self, input: &ImageRef<'_>, output: &mut ImageMut<'_>) -> Result<(), EngineError> {
        check_scaled(input, output, self.scale)?;

        let in_desc = descriptor(input.data().as_ptr(), input.width(), input.height(), input.channels());
        let (w, h, c) = (output.width(), output.height(), output.channels());
        let out_desc = descriptor(output.data_mut().as_mut_ptr(), w, h, c);
        let ret = unsafe { ffi::srvk_engine_process(self.engine, &in_desc, &out_desc) };
        Self::check("process", ret)
    }

    fn cleanup(&mut self) -> Result<(), EngineError> {
        let ret = unsafe { ffi::srvk_engine_cleanup(self.engine) };
        Self::check("cleanup", ret)
    }
}

impl Drop for VulkanEngine {
    fn drop(&mut self) {
        if !self.engine.is_null() {
            unsafe { ffi::srvk_engine_destroy(self.engine) };
            self.engine = ptr::null_mut();
        }
    }
}

//! Raw FFI bindings for the engine C shim.
//!
//! These declarations match `csrc/srvk_engine.h`. The shim wraps the C++
//! `SR` class from the sr-ncnn-vulkan sources; we hand-write the bindings
//! for the handful of entry points it exports.

#[cfg(not(windows))]
use std::os::raw::c_char;
use std::os::raw::{c_int, c_uchar, c_void};

/// Opaque engine handle (`SR*` on the C++ side).
pub type SrvkEngineT = *mut c_void;

/// Pixel buffer descriptor. `elempack` carries the channel count.
#[repr(C)]
pub struct SrvkImage {
    pub data: *mut c_uchar,
    pub w: c_int,
    pub h: c_int,
    pub elempack: c_int,
}

/// `wchar_t` as seen by the shim on Windows.
#[cfg(windows)]
pub type WChar = u16;

unsafe extern "C" {
    // GPU instance
    pub fn srvk_create_gpu_instance() -> c_int;
    pub fn srvk_destroy_gpu_instance();
    pub fn srvk_get_gpu_count() -> c_int;
    pub fn srvk_get_heap_budget(gpuid: c_int) -> u32;

    // Engine
    pub fn srvk_engine_create(gpuid: c_int, tta_mode: c_int) -> SrvkEngineT;
    pub fn srvk_engine_destroy(engine: SrvkEngineT);
    pub fn srvk_engine_set_scale(engine: SrvkEngineT, scale: c_int);
    pub fn srvk_engine_set_tilesize(engine: SrvkEngineT, tilesize: c_int);
    pub fn srvk_engine_set_prepadding(engine: SrvkEngineT, prepadding: c_int);
    #[cfg(not(windows))]
    pub fn srvk_engine_load(engine: SrvkEngineT, parampath: *const c_char, modelpath: *const c_char) -> c_int;
    #[cfg(windows)]
    pub fn srvk_engine_load_w(engine: SrvkEngineT, parampath: *const WChar, modelpath: *const WChar) -> c_int;
    pub fn srvk_engine_process(engine: SrvkEngineT, inimage: *const SrvkImage, outimage: *const SrvkImage) -> c_int;
    pub fn srvk_engine_cleanup(engine: SrvkEngineT) -> c_int;
}

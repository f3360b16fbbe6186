//! Drone Shield Web - browser viewer for the drone defence simulation
//!
//! Connects to the simulation's world-state websocket and renders every
//! snapshot with the droneshield-scene plugin inside a WebGPU canvas.

mod app;
pub mod config;
pub mod feed;
pub mod overlay;

use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging with filtering to reduce wgpu noise
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build(),
    );

    app::run();
}

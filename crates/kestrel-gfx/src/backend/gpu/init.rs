use anyhow::{Context, Result};

use super::WgpuBackend;

/// Initialization parameters for a [`WgpuBackend`] that owns its device.
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Backends wgpu may pick an adapter from.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Format of every color target the backend will render into.
    ///
    /// Pipelines are built against this format; a [`WgpuTarget`](super::WgpuTarget)
    /// with a different view format fails validation.
    pub target_format: wgpu::TextureFormat,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            target_format: wgpu::TextureFormat::Rgba8UnormSrgb,
        }
    }
}

impl WgpuBackend {
    /// Creates a backend with its own device and no surface.
    ///
    /// Rendering goes to whatever target is installed with
    /// [`set_target`](WgpuBackend::set_target), typically an offscreen texture.
    pub fn headless(init: WgpuInit) -> Result<Self> {
        pollster::block_on(Self::headless_async(init))
    }

    pub async fn headless_async(init: WgpuInit) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: init.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("kestrel device"),
                required_features: init.required_features,
                required_limits: init.required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        log::debug!(
            "headless wgpu backend on {:?}, target format {:?}",
            adapter.get_info().backend,
            init.target_format
        );

        Ok(Self::new(device, queue, init.target_format))
    }
}

// ============================================================================
// GPU CONTEXT — headless wgpu device for the compute pass backend
// ============================================================================

use std::sync::Arc;

/// Device and queue owned by one [`super::GpuBackend`].
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Largest 2D texture edge the device accepts.
    pub max_texture_dim: u32,
}

/// Power preference implied by a user-facing GPU string.  Anything that is
/// not a power keyword is treated as an adapter name fragment.
fn power_preference(preferred_gpu: &str) -> wgpu::PowerPreference {
    match preferred_gpu.trim().to_lowercase().as_str() {
        "low power" | "integrated" => wgpu::PowerPreference::LowPower,
        _ => wgpu::PowerPreference::HighPerformance,
    }
}

fn is_power_keyword(preferred_gpu: &str) -> bool {
    matches!(
        preferred_gpu.trim().to_lowercase().as_str(),
        "" | "low power" | "integrated" | "high performance" | "discrete"
    )
}

impl GpuContext {
    /// Open a device without a surface.
    ///
    /// `preferred_gpu` is either empty, a power keyword ("integrated",
    /// "discrete", ...) or a case-insensitive fragment of an adapter name.  A
    /// named adapter is looked up first; otherwise the power preference picks
    /// a hardware adapter, and the software rasterizer is the last resort.
    pub fn new(preferred_gpu: &str) -> Result<Self, String> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = match Self::named_adapter(&instance, preferred_gpu) {
            Some(a) => Some(a),
            None => {
                let power = power_preference(preferred_gpu);
                pollster::block_on(Self::request(&instance, power, false)).or_else(|| {
                    crate::log_warn!("Hardware adapter unavailable, trying software fallback");
                    pollster::block_on(Self::request(&instance, power, true))
                })
            }
        };
        let adapter = adapter.ok_or_else(|| "no GPU adapter available".to_string())?;
        pollster::block_on(Self::open(adapter))
    }

    fn named_adapter(instance: &wgpu::Instance, preferred_gpu: &str) -> Option<wgpu::Adapter> {
        if is_power_keyword(preferred_gpu) {
            return None;
        }
        let wanted = preferred_gpu.trim().to_lowercase();
        let found = instance
            .enumerate_adapters(wgpu::Backends::all())
            .into_iter()
            .find(|a| a.get_info().name.to_lowercase().contains(&wanted));
        if found.is_none() {
            crate::log_warn!("No adapter matches '{}', using the default choice", preferred_gpu);
        }
        found
    }

    async fn request(
        instance: &wgpu::Instance,
        power: wgpu::PowerPreference,
        force_fallback: bool,
    ) -> Option<wgpu::Adapter> {
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: power,
                compatible_surface: None,
                force_fallback_adapter: force_fallback,
            })
            .await
    }

    async fn open(adapter: wgpu::Adapter) -> Result<Self, String> {
        let info = adapter.get_info();
        let limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("MapForge compute"),
                    required_features: wgpu::Features::empty(),
                    // Storage textures plus large maps: take what the adapter
                    // offers for the 2D texture and compute dispatch limits.
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: limits.max_texture_dimension_2d,
                        max_compute_workgroup_size_x: limits.max_compute_workgroup_size_x,
                        max_compute_workgroup_size_y: limits.max_compute_workgroup_size_y,
                        max_compute_workgroups_per_dimension: limits.max_compute_workgroups_per_dimension,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                },
                None,
            )
            .await
            .map_err(|e| format!("device request on '{}' failed: {}", info.name, e))?;

        crate::log_info!(
            "GPU adapter: {} ({:?}, max texture {})",
            info.name,
            info.backend,
            limits.max_texture_dimension_2d
        );

        Ok(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: info.name,
            max_texture_dim: limits.max_texture_dimension_2d,
        })
    }

    pub fn supports_size(&self, width: u32, height: u32) -> bool {
        width <= self.max_texture_dim && height <= self.max_texture_dim
    }

    pub fn submit_one(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Run `f` inside an error scope of `filter`; a captured error becomes the
    /// returned `Err` string.
    pub fn scoped<T>(&self, filter: wgpu::ErrorFilter, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(filter);
        let value = f(&self.device);
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_keywords_are_not_adapter_names() {
        assert!(is_power_keyword(""));
        assert!(is_power_keyword("Integrated"));
        assert!(!is_power_keyword("radeon"));
        assert_eq!(power_preference("low power"), wgpu::PowerPreference::LowPower);
        assert_eq!(power_preference("nvidia"), wgpu::PowerPreference::HighPerformance);
    }
}

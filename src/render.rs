use cursorfx_core::{negotiate_formats, ActiveEffect, EffectBackend, FieldFormats, SolverMode};
use web_sys as web;

mod balls;
mod composite;
mod fluid;
mod helpers;
mod metaballs;
mod targets;

use balls::BallResources;
use composite::Composite;
use fluid::FluidResources;
use metaballs::MetaballResources;

/// Per-activation GPU state. Dropped (and so released) before the next
/// effect's resources are built.
pub enum EffectResources {
    Fluid(FluidResources),
    Balls(BallResources),
    Metaballs(MetaballResources),
}

/// wgpu backend for the effect controller: owns the device and the canvas
/// surface; effects only own what they draw with.
pub struct GpuBackend {
    canvas: web::HtmlCanvasElement,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    formats: FieldFormats,
    composite: Composite,
}

impl GpuBackend {
    pub async fn new(canvas: &web::HtmlCanvasElement) -> anyhow::Result<Self> {
        let width = canvas.width().max(1);
        let height = canvas.height().max(1);

        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(wgpu::SurfaceTarget::Canvas(canvas.clone()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No WebGPU adapter"))?;

        let formats = negotiate_formats(|kind| helpers::supports_field_format(&adapter, kind))
            .into_result()?;
        log::info!(
            "[gpu] field formats rgba={:?} rg={:?} r={:?}",
            formats.rgba,
            formats.rg,
            formats.r
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    // Use default limits on web to avoid passing unknown fields to older WebGPU impls
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| anyhow::anyhow!(format!("request_device error: {:?}", e)))?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Rgba8Unorm
                )
            })
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("surface reports no formats"))?;
        // the overlay must let the page show through
        let alpha_mode = if caps
            .alpha_modes
            .contains(&wgpu::CompositeAlphaMode::PreMultiplied)
        {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            caps.alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width,
            height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        let composite = Composite::new(&device, format);
        log::info!("[gpu] surface {}x{} {:?} {:?}", width, height, format, alpha_mode);

        Ok(Self {
            canvas: canvas.clone(),
            surface,
            device,
            queue,
            config,
            formats,
            composite,
        })
    }

    fn backing_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Match the surface to the canvas backing store. Returns true when the
    /// size changed.
    fn resize_if_needed(&mut self) -> bool {
        let width = self.canvas.width();
        let height = self.canvas.height();
        if width == 0 || height == 0 || (width, height) == self.backing_size() {
            return false;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        true
    }

    fn sync_resources(&mut self, resources: &mut EffectResources) {
        if let EffectResources::Balls(b) = resources {
            b.resize(&self.device, &self.composite, self.backing_size());
        }
    }

    fn hdr_format(&self) -> wgpu::TextureFormat {
        helpers::wgpu_format(self.formats.rgba)
    }
}

impl EffectBackend for GpuBackend {
    type Resources = EffectResources;

    /// Fluid fields live in textures here; the engine only queues work.
    fn fluid_solver(&self) -> SolverMode {
        SolverMode::External
    }

    fn create(
        &mut self,
        effect: &ActiveEffect,
        _width: u32,
        _height: u32,
    ) -> cursorfx_core::Result<EffectResources> {
        self.resize_if_needed();
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let resources = match effect {
            ActiveEffect::Fluid(f) => EffectResources::Fluid(FluidResources::new(
                &self.device,
                self.formats,
                self.config.format,
                f,
            )),
            ActiveEffect::Balls(b) => EffectResources::Balls(BallResources::new(
                &self.device,
                &self.composite,
                self.hdr_format(),
                self.backing_size(),
                b,
            )),
            ActiveEffect::Metaballs(m) => EffectResources::Metaballs(MetaballResources::new(
                &self.device,
                self.config.format,
                m,
            )),
        };
        // validation errors arrive asynchronously on the web
        let scope = self.device.pop_error_scope();
        let kind = effect.kind();
        wasm_bindgen_futures::spawn_local(async move {
            if let Some(e) = scope.await {
                log::error!("[gpu] {} resources invalid: {}", kind, e);
            }
        });
        log::info!("[gpu] created {} resources", kind);
        Ok(resources)
    }

    fn resize(&mut self, resources: &mut EffectResources, _width: u32, _height: u32) {
        if self.resize_if_needed() {
            self.sync_resources(resources);
        }
    }

    fn render(&mut self, resources: &mut EffectResources, effect: &mut ActiveEffect) {
        if self.resize_if_needed() {
            self.sync_resources(resources);
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        // the fluid steps even when there is no frame to show it on
        if let (EffectResources::Fluid(r), ActiveEffect::Fluid(f)) = (&mut *resources, &mut *effect) {
            r.simulate(&self.device, &self.queue, &mut encoder, f);
        }
        let frame = match self.surface.get_current_texture() {
            Ok(f) => f,
            Err(e) => {
                if matches!(e, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                    self.surface.configure(&self.device, &self.config);
                } else {
                    log::error!("[gpu] render error: {:?}", e);
                }
                self.queue.submit(Some(encoder.finish()));
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        match (&mut *resources, &*effect) {
            (EffectResources::Fluid(r), ActiveEffect::Fluid(_)) => r.draw(&self.device, &mut encoder, &view),
            (EffectResources::Balls(r), ActiveEffect::Balls(b)) => {
                r.draw(&self.queue, &self.composite, &mut encoder, &view, b)
            }
            (EffectResources::Metaballs(r), ActiveEffect::Metaballs(m)) => {
                r.draw(&self.queue, &mut encoder, &view, self.config.height, m)
            }
            (_, effect) => {
                log::error!("[gpu] resources do not match {}", effect.kind());
                return;
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
    }

    fn release(&mut self, resources: EffectResources) {
        let kind = match resources {
            EffectResources::Fluid(_) => "fluid",
            EffectResources::Balls(_) => "balls",
            EffectResources::Metaballs(_) => "metaballs",
        };
        drop(resources);
        log::info!("[gpu] released {} resources", kind);
    }
}

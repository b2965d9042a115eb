use super::helpers;
use crate::shaders;
use bytemuck::{Pod, Zeroable};
use cursorfx_core::{FieldFormats, FluidEngine, FluidOp, Splat};

/// Mirrors `Pass` in fluid.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
struct PassParams {
    texel: [f32; 2],
    point: [f32; 2],
    value: [f32; 4],
    radius: f32,
    aspect: f32,
    dt: f32,
    dissipation: f32,
    curl: f32,
    scale: f32,
    transparent: f32,
    _pad: f32,
}

const PASS_SIZE: u64 = std::mem::size_of::<PassParams>() as u64;

struct Field {
    tex: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Field {
    fn new(device: &wgpu::Device, label: &str, (w, h): (u32, u32), format: wgpu::TextureFormat) -> Self {
        let (tex, view) = helpers::create_color_texture(
            device,
            label,
            w,
            h,
            format,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        Self { tex, view }
    }

    fn size(&self) -> (u32, u32) {
        (self.tex.width(), self.tex.height())
    }
}

/// Read/write pair; `swap` after every pass that writes.
struct DoubleField {
    fields: [Field; 2],
    read: usize,
}

impl DoubleField {
    fn new(device: &wgpu::Device, label: &str, size: (u32, u32), format: wgpu::TextureFormat) -> Self {
        Self {
            fields: [
                Field::new(device, label, size, format),
                Field::new(device, label, size, format),
            ],
            read: 0,
        }
    }

    fn read(&self) -> &wgpu::TextureView {
        &self.fields[self.read].view
    }

    fn write(&self) -> &wgpu::TextureView {
        &self.fields[1 - self.read].view
    }

    fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    fn size(&self) -> (u32, u32) {
        self.fields[0].size()
    }
}

struct Pipelines {
    copy_rg: wgpu::RenderPipeline,
    copy_rgba: wgpu::RenderPipeline,
    splat_rg: wgpu::RenderPipeline,
    splat_rgba: wgpu::RenderPipeline,
    curl: wgpu::RenderPipeline,
    vorticity: wgpu::RenderPipeline,
    divergence: wgpu::RenderPipeline,
    scale: wgpu::RenderPipeline,
    pressure: wgpu::RenderPipeline,
    gradient: wgpu::RenderPipeline,
    advect_rg: wgpu::RenderPipeline,
    advect_rgba: wgpu::RenderPipeline,
    display: wgpu::RenderPipeline,
}

/// GPU-resident fluid fields and the passes that step them. The engine
/// only queues splats and steps; this side owns every field.
pub(crate) struct FluidResources {
    formats: FieldFormats,
    pipelines: Pipelines,
    uniform_bgl: wgpu::BindGroupLayout,
    textures_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniforms: wgpu::Buffer,
    uniform_bg: wgpu::BindGroup,
    stride: u64,
    capacity: u64,
    staging: Vec<u8>,
    display_offset: u32,
    velocity: DoubleField,
    dye: DoubleField,
    pressure: DoubleField,
    divergence: Field,
    curl: Field,
}

fn grid_extent((w, h): (usize, usize)) -> (u32, u32) {
    (w as u32, h as u32)
}

fn texel((w, h): (u32, u32)) -> [f32; 2] {
    [1.0 / w.max(1) as f32, 1.0 / h.max(1) as f32]
}

impl FluidResources {
    pub(crate) fn new(
        device: &wgpu::Device,
        formats: FieldFormats,
        surface_format: wgpu::TextureFormat,
        fluid: &FluidEngine,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("fluid_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::with_fullscreen(shaders::FLUID_WGSL).into()),
        });
        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fluid_uniform_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(PASS_SIZE),
                },
                count: None,
            }],
        });
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let textures_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("fluid_textures_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                texture_entry(1),
                texture_entry(2),
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("fluid_layout"),
            bind_group_layouts: &[&uniform_bgl, &textures_bgl],
            push_constant_ranges: &[],
        });

        let rg = helpers::wgpu_format(formats.rg);
        let r = helpers::wgpu_format(formats.r);
        let rgba = helpers::wgpu_format(formats.rgba);
        let make = |label: &str, entry: &str, format| {
            helpers::make_fullscreen_pipeline(device, label, &layout, &shader, entry, format, None)
        };
        let pipelines = Pipelines {
            copy_rg: make("fluid_copy_rg", "fs_copy", rg),
            copy_rgba: make("fluid_copy_rgba", "fs_copy", rgba),
            splat_rg: make("fluid_splat_rg", "fs_splat", rg),
            splat_rgba: make("fluid_splat_rgba", "fs_splat", rgba),
            curl: make("fluid_curl", "fs_curl", r),
            vorticity: make("fluid_vorticity", "fs_vorticity", rg),
            divergence: make("fluid_divergence", "fs_divergence", r),
            scale: make("fluid_scale", "fs_scale", r),
            pressure: make("fluid_pressure", "fs_pressure", r),
            gradient: make("fluid_gradient", "fs_gradient", rg),
            advect_rg: make("fluid_advect_rg", "fs_advect", rg),
            advect_rgba: make("fluid_advect_rgba", "fs_advect", rgba),
            display: make("fluid_display", "fs_display", surface_format),
        };

        let stride = PASS_SIZE.next_multiple_of(u64::from(
            device.limits().min_uniform_buffer_offset_alignment,
        ));
        let capacity = 64;
        let uniforms = helpers::create_uniform_buffer(device, "fluid_uniforms", stride * capacity);
        let uniform_bg = Self::uniform_bind_group(device, &uniform_bgl, &uniforms);

        let sim = grid_extent(fluid.sim_size());
        let dye = grid_extent(fluid.dye_size());
        log::info!(
            "[gpu] fluid fields: sim {}x{} {:?}/{:?}, dye {}x{} {:?}",
            sim.0,
            sim.1,
            formats.rg,
            formats.r,
            dye.0,
            dye.1,
            formats.rgba
        );
        Self {
            formats,
            pipelines,
            uniform_bgl,
            textures_bgl,
            sampler: helpers::create_linear_sampler(device),
            uniforms,
            uniform_bg,
            stride,
            capacity,
            staging: Vec::new(),
            display_offset: 0,
            velocity: DoubleField::new(device, "fluid_velocity", sim, rg),
            dye: DoubleField::new(device, "fluid_dye", dye, rgba),
            pressure: DoubleField::new(device, "fluid_pressure", sim, r),
            divergence: Field::new(device, "fluid_divergence", sim, r),
            curl: Field::new(device, "fluid_curl", sim, r),
        }
    }

    fn uniform_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fluid_uniform_bg"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(PASS_SIZE),
                }),
            }],
        })
    }

    /// Make room for `passes` parameter blocks this frame.
    fn reserve(&mut self, device: &wgpu::Device, passes: u64) {
        if passes <= self.capacity {
            return;
        }
        self.capacity = passes.next_power_of_two();
        self.uniforms = helpers::create_uniform_buffer(device, "fluid_uniforms", self.stride * self.capacity);
        self.uniform_bg = Self::uniform_bind_group(device, &self.uniform_bgl, &self.uniforms);
        log::debug!("[gpu] fluid uniform arena grown to {} passes", self.capacity);
    }

    /// New grid sizes after a viewport change: velocity and dye are
    /// resampled, the rest start from zero.
    fn resize_fields(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        arena: &mut Arena,
        sim: (u32, u32),
        dye: (u32, u32),
    ) {
        let rg = helpers::wgpu_format(self.formats.rg);
        let r = helpers::wgpu_format(self.formats.r);
        let rgba = helpers::wgpu_format(self.formats.rgba);
        if self.velocity.size() != sim {
            let velocity = DoubleField::new(device, "fluid_velocity", sim, rg);
            let offset = arena.push(PassParams::default());
            self.pass(
                device,
                encoder,
                &self.pipelines.copy_rg,
                velocity.read(),
                offset,
                self.velocity.read(),
                self.velocity.read(),
            );
            self.velocity = velocity;
            self.pressure = DoubleField::new(device, "fluid_pressure", sim, r);
            self.divergence = Field::new(device, "fluid_divergence", sim, r);
            self.curl = Field::new(device, "fluid_curl", sim, r);
        }
        if self.dye.size() != dye {
            let next = DoubleField::new(device, "fluid_dye", dye, rgba);
            let offset = arena.push(PassParams::default());
            self.pass(
                device,
                encoder,
                &self.pipelines.copy_rgba,
                next.read(),
                offset,
                self.dye.read(),
                self.dye.read(),
            );
            self.dye = next;
        }
        log::debug!("[gpu] fluid fields resized: sim {:?}, dye {:?}", sim, dye);
    }

    #[allow(clippy::too_many_arguments)]
    fn pass(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        target: &wgpu::TextureView,
        offset: u32,
        a: &wgpu::TextureView,
        b: &wgpu::TextureView,
    ) {
        let textures = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("fluid_textures_bg"),
            layout: &self.textures_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(a),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(b),
                },
            ],
        });
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fluid_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, &self.uniform_bg, &[offset]);
        rpass.set_bind_group(1, &textures, &[]);
        rpass.draw(0..3, 0..1);
    }

    fn splat(&mut self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, arena: &mut Arena, s: &Splat) {
        // texture rows run top-down; flip the y-up splat into that frame
        let point = [s.point.x, 1.0 - s.point.y];
        let base = PassParams {
            point,
            radius: s.radius,
            aspect: s.aspect,
            ..PassParams::default()
        };
        let offset = arena.push(PassParams {
            value: [s.force.x, -s.force.y, 0.0, 0.0],
            ..base
        });
        self.pass(
            device,
            encoder,
            &self.pipelines.splat_rg,
            self.velocity.write(),
            offset,
            self.velocity.read(),
            self.velocity.read(),
        );
        self.velocity.swap();

        let offset = arena.push(PassParams {
            value: [s.color[0], s.color[1], s.color[2], 0.0],
            ..base
        });
        self.pass(
            device,
            encoder,
            &self.pipelines.splat_rgba,
            self.dye.write(),
            offset,
            self.dye.read(),
            self.dye.read(),
        );
        self.dye.swap();
    }

    fn step(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        arena: &mut Arena,
        fluid: &FluidEngine,
        dt: f32,
    ) {
        let config = fluid.config();
        let base = PassParams {
            texel: texel(self.velocity.size()),
            dt,
            curl: config.curl,
            ..PassParams::default()
        };

        let offset = arena.push(base);
        self.pass(device, encoder, &self.pipelines.curl, &self.curl.view, offset, self.velocity.read(), self.velocity.read());
        self.pass(
            device,
            encoder,
            &self.pipelines.vorticity,
            self.velocity.write(),
            offset,
            self.velocity.read(),
            &self.curl.view,
        );
        self.velocity.swap();

        self.pass(
            device,
            encoder,
            &self.pipelines.divergence,
            &self.divergence.view,
            offset,
            self.velocity.read(),
            self.velocity.read(),
        );
        let scale = arena.push(PassParams {
            scale: config.pressure,
            ..base
        });
        self.pass(device, encoder, &self.pipelines.scale, self.pressure.write(), scale, self.pressure.read(), self.pressure.read());
        self.pressure.swap();
        for _ in 0..config.pressure_iterations {
            self.pass(
                device,
                encoder,
                &self.pipelines.pressure,
                self.pressure.write(),
                offset,
                self.pressure.read(),
                &self.divergence.view,
            );
            self.pressure.swap();
        }
        self.pass(
            device,
            encoder,
            &self.pipelines.gradient,
            self.velocity.write(),
            offset,
            self.pressure.read(),
            self.velocity.read(),
        );
        self.velocity.swap();

        let advect_velocity = arena.push(PassParams {
            dissipation: config.velocity_dissipation,
            ..base
        });
        self.pass(
            device,
            encoder,
            &self.pipelines.advect_rg,
            self.velocity.write(),
            advect_velocity,
            self.velocity.read(),
            self.velocity.read(),
        );
        self.velocity.swap();
        let advect_dye = arena.push(PassParams {
            dissipation: config.density_dissipation,
            ..base
        });
        self.pass(
            device,
            encoder,
            &self.pipelines.advect_rgba,
            self.dye.write(),
            advect_dye,
            self.velocity.read(),
            self.dye.read(),
        );
        self.dye.swap();
    }

    /// Run everything the engine queued since the last frame and stage the
    /// display pass parameters.
    pub(crate) fn simulate(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        fluid: &mut FluidEngine,
    ) {
        let ops = fluid.take_ops();
        let sim = grid_extent(fluid.sim_size());
        let dye = grid_extent(fluid.dye_size());
        let resized = self.velocity.size() != sim || self.dye.size() != dye;
        // splats need 2 blocks, steps 4, display 1, resampling 2
        let blocks = ops
            .iter()
            .map(|op| match op {
                FluidOp::Splat(_) => 2,
                FluidOp::Step(_) => 4,
            })
            .sum::<u64>()
            + 3;
        self.reserve(device, blocks);

        let mut arena = Arena::new(self.stride, std::mem::take(&mut self.staging));
        if resized {
            self.resize_fields(device, encoder, &mut arena, sim, dye);
        }
        for op in &ops {
            match op {
                FluidOp::Splat(s) => self.splat(device, encoder, &mut arena, s),
                FluidOp::Step(dt) => self.step(device, encoder, &mut arena, fluid, *dt),
            }
        }
        let config = fluid.config();
        let back = config.back_color;
        let display = arena.push(PassParams {
            value: [back[0], back[1], back[2], 1.0],
            transparent: if config.transparent { 1.0 } else { 0.0 },
            ..PassParams::default()
        });
        self.display_offset = display;
        queue.write_buffer(&self.uniforms, 0, arena.bytes());
        self.staging = arena.into_bytes();
    }

    pub(crate) fn draw(&self, device: &wgpu::Device, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        self.pass(
            device,
            encoder,
            &self.pipelines.display,
            target,
            self.display_offset,
            self.dye.read(),
            self.dye.read(),
        );
    }
}

/// Per-frame uniform blocks, one `stride` apart, uploaded in one write.
struct Arena {
    stride: u64,
    bytes: Vec<u8>,
    count: u64,
}

impl Arena {
    fn new(stride: u64, mut bytes: Vec<u8>) -> Self {
        bytes.clear();
        Self {
            stride,
            bytes,
            count: 0,
        }
    }

    /// Returns the dynamic offset of the pushed block.
    fn push(&mut self, params: PassParams) -> u32 {
        let offset = self.count * self.stride;
        self.bytes.resize(offset as usize, 0);
        self.bytes.extend_from_slice(bytemuck::bytes_of(&params));
        self.count += 1;
        offset as u32
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

use super::helpers;
use crate::constants::{MAX_GPU_SOURCES, METABALL_EDGE};
use crate::shaders;
use cursorfx_core::MetaballEngine;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FieldUniforms {
    sources: [[f32; 4]; MAX_GPU_SOURCES],
    colors: [[f32; 4]; MAX_GPU_SOURCES],
    params: [f32; 4],
}

/// One fullscreen pass evaluating the field per pixel.
pub(crate) struct MetaballResources {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl MetaballResources {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        metaballs: &MetaballEngine,
    ) -> Self {
        if metaballs.max_sources() > MAX_GPU_SOURCES {
            log::warn!(
                "[gpu] {} metaball sources requested; drawing the first {}",
                metaballs.max_sources(),
                MAX_GPU_SOURCES
            );
        }
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("metaballs_shader"),
            source: wgpu::ShaderSource::Wgsl(
                shaders::with_fullscreen(shaders::METABALLS_WGSL).into(),
            ),
        });
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("metaballs_bgl"),
            entries: &[helpers::uniform_layout_entry(0, wgpu::ShaderStages::FRAGMENT)],
        });
        let uniforms = helpers::create_uniform_buffer(
            device,
            "metaball_field",
            std::mem::size_of::<FieldUniforms>() as u64,
        );
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("metaballs_bg"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("metaballs_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = helpers::make_fullscreen_pipeline(
            device,
            "metaballs_pipeline",
            &layout,
            &shader,
            "fs_metaballs",
            surface_format,
            None,
        );
        Self {
            pipeline,
            uniforms,
            bind_group,
        }
    }

    pub(crate) fn draw(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        backing_height: u32,
        metaballs: &MetaballEngine,
    ) {
        let mut field: FieldUniforms = bytemuck::Zeroable::zeroed();
        let sources = metaballs.sources();
        let n = sources.len().min(MAX_GPU_SOURCES);
        for (i, s) in sources.iter().take(n).enumerate() {
            field.sources[i] = [s.position.x, s.position.y, s.radius, 0.0];
            field.colors[i] = [s.color[0], s.color[1], s.color[2], 1.0];
        }
        field.params = [
            n as f32,
            metaballs.config().threshold,
            METABALL_EDGE,
            backing_height.max(1) as f32,
        ];
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(&field));
        helpers::draw_fullscreen(encoder, "metaballs_pass", target, &self.pipeline, &self.bind_group);
    }
}

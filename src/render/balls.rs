use super::composite::Composite;
use super::helpers;
use super::targets::RenderTargets;
use crate::constants::{BALL_AMBIENT, BALL_LIGHT_DIR, BALL_SPECULAR};
use crate::shaders;
use cursorfx_core::BallEngine;
use wgpu::util::DeviceExt;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BallGlobals {
    view_proj: [[f32; 4]; 4],
    light_dir: [f32; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BallInstance {
    center_radius: [f32; 4],
    color: [f32; 4],
}

/// Instanced sphere impostors drawn into the HDR target, then tonemapped.
pub(crate) struct BallResources {
    pipeline: wgpu::RenderPipeline,
    globals: wgpu::Buffer,
    globals_bg: wgpu::BindGroup,
    instances: wgpu::Buffer,
    capacity: usize,
    scratch: Vec<BallInstance>,
    targets: RenderTargets,
    composite_bg: wgpu::BindGroup,
}

impl BallResources {
    pub(crate) fn new(
        device: &wgpu::Device,
        composite: &Composite,
        hdr_format: wgpu::TextureFormat,
        size: (u32, u32),
        balls: &BallEngine,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("balls_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BALLS_WGSL.into()),
        });
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("balls_bgl"),
            entries: &[helpers::uniform_layout_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let globals = helpers::create_uniform_buffer(
            device,
            "balls_globals",
            std::mem::size_of::<BallGlobals>() as u64,
        );
        let globals_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("balls_bg"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.as_entire_binding(),
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("balls_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let attributes = wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("balls_pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_ball"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<BallInstance>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: helpers::DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_ball"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: hdr_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            cache: None,
            multiview: None,
        });

        let capacity = balls.positions().len().max(1);
        let scratch = vec![<BallInstance as bytemuck::Zeroable>::zeroed(); capacity];
        let instances = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ball_instances"),
            contents: bytemuck::cast_slice(&scratch),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let targets = RenderTargets::new(device, hdr_format, size.0, size.1);
        let composite_bg = composite.bind(device, &targets.hdr_view);
        Self {
            pipeline,
            globals,
            globals_bg,
            instances,
            capacity,
            scratch,
            targets,
            composite_bg,
        }
    }

    pub(crate) fn resize(&mut self, device: &wgpu::Device, composite: &Composite, size: (u32, u32)) {
        if self.targets.size() == size {
            return;
        }
        self.targets.recreate(device, size.0, size.1);
        self.composite_bg = composite.bind(device, &self.targets.hdr_view);
    }

    pub(crate) fn draw(
        &mut self,
        queue: &wgpu::Queue,
        composite: &Composite,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        balls: &BallEngine,
    ) {
        let globals = BallGlobals {
            view_proj: balls.camera().view_proj().to_cols_array_2d(),
            light_dir: [BALL_LIGHT_DIR[0], BALL_LIGHT_DIR[1], BALL_LIGHT_DIR[2], 0.0],
            params: [BALL_AMBIENT, BALL_SPECULAR, 0.0, 0.0],
        };
        queue.write_buffer(&self.globals, 0, bytemuck::bytes_of(&globals));

        self.scratch.clear();
        for ((p, r), c) in balls
            .positions()
            .iter()
            .zip(balls.radii())
            .zip(balls.colors())
            .take(self.capacity)
        {
            self.scratch.push(BallInstance {
                center_radius: [p.x, p.y, p.z, *r],
                color: [c[0], c[1], c[2], 1.0],
            });
        }
        queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(&self.scratch));

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("balls_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.hdr_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.globals_bg, &[]);
            rpass.set_vertex_buffer(0, self.instances.slice(..));
            rpass.draw(0..6, 0..self.scratch.len() as u32);
        }

        helpers::draw_fullscreen(
            encoder,
            "balls_tonemap",
            target,
            &composite.tonemap_pipeline,
            &self.composite_bg,
        );
    }
}


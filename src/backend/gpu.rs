use futures::executor::block_on;
use tracing::{debug, info, warn};
use wgpu::InstanceDescriptor;

use super::Backend;
use crate::bucket::RenderBucket;
use crate::geometry::Vertex;
use crate::material::{BlendMode, Material, FRAGMENT_ENTRY_POINT, VERTEX_ENTRY_POINT};
use crate::Color;

/// Fullscreen triangle used to composite scene targets, no vertex buffer.
const COMPOSITE_WGSL: &str = r#"
struct QuadOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_quad(@builtin(vertex_index) vi: u32) -> QuadOutput {
    let uv = vec2<f32>(f32((vi << 1u) & 2u), f32(vi & 2u));
    var out: QuadOutput;
    out.position = vec4<f32>(uv * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(uv.x, 1.0 - uv.y);
    return out;
}

@group(0) @binding(0) var t_input: texture_2d<f32>;
@group(0) @binding(1) var s_input: sampler;

@fragment
fn fs_composite(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(t_input, s_input, uv);
}
"#;

/// Released targets kept for reuse.
const MAX_POOLED_TARGETS: usize = 8;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ViewportUniform {
    size: [f32; 2],
    _padding: [f32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ParamsUniform {
    tint: [f32; 4],
}

/// Construction options for [`GpuBackend`].
#[derive(Debug, Clone, Copy)]
pub struct GpuBackendOptions {
    /// Format of scene targets and of the screen.
    pub format: wgpu::TextureFormat,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for GpuBackendOptions {
    fn default() -> Self {
        Self {
            format: wgpu::TextureFormat::Rgba8Unorm,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

pub struct GpuPipeline {
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
}

pub struct GpuPipelineLayout {
    layout: wgpu::PipelineLayout,
}

impl GpuPipelineLayout {
    pub fn raw(&self) -> &wgpu::PipelineLayout {
        &self.layout
    }
}

/// Offscreen color target with its own viewport uniform and batch buffers.
pub struct GpuTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    viewport_buffer: wgpu::Buffer,
    vertex_buffer: Option<wgpu::Buffer>,
    index_buffer: Option<wgpu::Buffer>,
}

impl GpuTarget {
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

/// Where composited frames end up.
pub enum WgpuScreen {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// Headless screen, read back with [`GpuBackend::read_target`].
    Offscreen(GpuTarget),
}

/// wgpu implementation of [`Backend`].
pub struct GpuBackend {
    instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    material_bind_group_layout: wgpu::BindGroupLayout,
    composite_pipeline: wgpu::RenderPipeline,
    composite_bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    target_pool: Vec<GpuTarget>,
}

impl GpuBackend {
    /// Creates a backend without a surface. Returns `None` if no adapter is
    /// available, so callers on machines without a GPU can skip gracefully.
    pub async fn try_new_headless(options: GpuBackendOptions) -> Option<Self> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .ok()?;

        info!("headless gpu backend on {}", adapter.get_info().name);
        Some(Self::from_device(instance, device, queue, options.format))
    }

    /// Wraps an existing device, for callers that created their own surface.
    pub fn from_device(
        instance: wgpu::Instance,
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
    ) -> Self {
        let material_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("material_bgl"),
                entries: &[
                    uniform_layout_entry(0, wgpu::ShaderStages::VERTEX),
                    uniform_layout_entry(1, wgpu::ShaderStages::VERTEX_FRAGMENT),
                ],
            });
        let (composite_pipeline, composite_bind_group_layout) =
            compile_composite_pipeline(&device, format);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("composite_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            instance,
            device,
            queue,
            format,
            material_bind_group_layout,
            composite_pipeline,
            composite_bind_group_layout,
            sampler,
            target_pool: Vec::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn instance(&self) -> &wgpu::Instance {
        &self.instance
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Configures `surface` for this device and wraps it as a screen.
    pub fn surface_screen(
        &self,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> WgpuScreen {
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: self.format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
        };
        surface.configure(&self.device, &config);
        WgpuScreen::Surface { surface, config }
    }

    /// Headless screen of the given size.
    pub fn offscreen_screen(&mut self, width: u32, height: u32) -> Result<WgpuScreen, String> {
        self.create_target(width, height).map(WgpuScreen::Offscreen)
    }

    fn allocate_target(&self, width: u32, height: u32) -> Result<GpuTarget, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scene_target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: self.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        if let Some(error) = block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let viewport_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_target_viewport"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(
            &viewport_buffer,
            0,
            bytemuck::cast_slice(&[ViewportUniform {
                size: [width as f32, height as f32],
                _padding: [0.0; 2],
            }]),
        );

        Ok(GpuTarget {
            texture,
            view,
            width,
            height,
            viewport_buffer,
            vertex_buffer: None,
            index_buffer: None,
        })
    }

    fn clear_view(&self, view: &wgpu::TextureView, color: Color, label: &str) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn composite_into(&self, view: &wgpu::TextureView, clear: Color, targets: &[&GpuTarget]) {
        let bind_groups: Vec<wgpu::BindGroup> = targets
            .iter()
            .map(|target| {
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("composite_bg"),
                    layout: &self.composite_bind_group_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&target.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("composite_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.composite_pipeline);
            for bind_group in &bind_groups {
                pass.set_bind_group(0, bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Copies a target back to the CPU as tightly packed rows.
    pub fn read_target(&self, target: &GpuTarget) -> Result<Vec<u8>, String> {
        let (width, height) = target.size();
        let unpadded_bytes_per_row = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("target_readback"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("target_readback_encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            if sender.send(result).is_err() {
                warn!("readback receiver dropped before map completed");
            }
        });
        let _ = self.device.poll(wgpu::MaintainBase::Wait);
        receiver
            .recv()
            .map_err(|error| error.to_string())?
            .map_err(|error| error.to_string())?;

        let mapped = slice.get_mapped_range();
        let mut output = Vec::with_capacity((unpadded_bytes_per_row * height) as usize);
        for row in mapped.chunks(padded_bytes_per_row as usize) {
            output.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(output)
    }
}

fn uniform_layout_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn compile_composite_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("composite_shader"),
        source: wgpu::ShaderSource::Wgsl(COMPOSITE_WGSL.into()),
    });

    let input_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("composite_input_bgl"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("composite_pipeline_layout"),
        bind_group_layouts: &[&input_bgl],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("composite_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_quad"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_composite"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });

    (pipeline, input_bgl)
}

/// Writes `contents` into `slot`, reallocating only when the buffer is too small.
fn upsert_buffer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    slot: &mut Option<wgpu::Buffer>,
    contents: &[u8],
    usage: wgpu::BufferUsages,
    label: &str,
) {
    let required = contents.len() as u64;
    let should_reallocate = slot
        .as_ref()
        .map(|buffer| buffer.size() < required)
        .unwrap_or(true);
    if should_reallocate {
        *slot = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: required.next_power_of_two().max(64),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
    }
    if let Some(buffer) = slot {
        queue.write_buffer(buffer, 0, contents);
    }
}

impl Backend for GpuBackend {
    type Pipeline = GpuPipeline;
    type PipelineLayout = GpuPipelineLayout;
    type Target = GpuTarget;
    type Screen = WgpuScreen;

    fn create_pipeline(
        &mut self,
        material: &Material,
    ) -> Result<(GpuPipeline, GpuPipelineLayout), String> {
        let shader = material.shader();
        shader.validate()?;
        if !shader.binds_material_params() {
            debug!("shader '{}' ignores material params", shader.label);
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(shader.label.as_str()),
                source: wgpu::ShaderSource::Wgsl(shader.wgsl.as_ref().into()),
            });
        let layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(shader.label.as_str()),
                bind_group_layouts: &[&self.material_bind_group_layout],
                push_constant_ranges: &[],
            });
        let blend = match material.params().blend {
            BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
            BlendMode::Opaque => wgpu::BlendState::REPLACE,
        };
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(shader.label.as_str()),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some(VERTEX_ENTRY_POINT),
                    compilation_options: Default::default(),
                    buffers: &[Vertex::buffer_layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some(FRAGMENT_ENTRY_POINT),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });
        if let Some(error) = block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        let params_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("material_params"),
            size: std::mem::size_of::<ParamsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue.write_buffer(
            &params_buffer,
            0,
            bytemuck::cast_slice(&[ParamsUniform {
                tint: material.params().tint.normalize(),
            }]),
        );

        Ok((
            GpuPipeline {
                pipeline,
                params_buffer,
            },
            GpuPipelineLayout { layout },
        ))
    }

    fn destroy_pipeline(&mut self, pipeline: GpuPipeline, _layout: GpuPipelineLayout) {
        pipeline.params_buffer.destroy();
    }

    fn create_target(&mut self, width: u32, height: u32) -> Result<GpuTarget, String> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > limit || height > limit {
            return Err(format!(
                "{width}x{height} is outside the device limit of {limit}"
            ));
        }
        let found = self
            .target_pool
            .iter()
            .position(|target| target.width == width && target.height == height);
        match found {
            Some(index) => Ok(self.target_pool.swap_remove(index)),
            None => self.allocate_target(width, height),
        }
    }

    fn destroy_target(&mut self, target: GpuTarget) {
        self.target_pool.push(target);
        if self.target_pool.len() > MAX_POOLED_TARGETS {
            let evicted = self.target_pool.remove(0);
            evicted.texture.destroy();
        }
    }

    fn clear_target(&mut self, target: &mut GpuTarget, color: Color) {
        self.clear_view(&target.view, color, "scene_target_clear");
    }

    fn submit_bucket(&mut self, target: &mut GpuTarget, pipeline: &GpuPipeline, bucket: &RenderBucket) {
        if bucket.is_empty() {
            return;
        }
        upsert_buffer(
            &self.device,
            &self.queue,
            &mut target.vertex_buffer,
            bytemuck::cast_slice(&bucket.vertices),
            wgpu::BufferUsages::VERTEX,
            "bucket_vertices",
        );
        upsert_buffer(
            &self.device,
            &self.queue,
            &mut target.index_buffer,
            bytemuck::cast_slice(&bucket.indices),
            wgpu::BufferUsages::INDEX,
            "bucket_indices",
        );
        let (Some(vertex_buffer), Some(index_buffer)) = (&target.vertex_buffer, &target.index_buffer)
        else {
            return;
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bg"),
            layout: &self.material_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: target.viewport_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pipeline.params_buffer.as_entire_binding(),
                },
            ],
        });

        let vertex_bytes = std::mem::size_of_val(bucket.vertices.as_slice()) as u64;
        let index_bytes = std::mem::size_of_val(bucket.indices.as_slice()) as u64;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("bucket_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("bucket_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&pipeline.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertex_buffer.slice(..vertex_bytes));
            pass.set_index_buffer(index_buffer.slice(..index_bytes), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..bucket.indices.len() as u32, 0, 0..1);
        }
        // Submitted per bucket so the shared batch buffers can be rewritten
        // by the next bucket.
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn present(
        &mut self,
        screen: &mut WgpuScreen,
        clear: Color,
        targets: &[&GpuTarget],
    ) -> Result<(), String> {
        match screen {
            WgpuScreen::Surface { surface, .. } => {
                let frame = surface
                    .get_current_texture()
                    .map_err(|error| error.to_string())?;
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                self.composite_into(&view, clear, targets);
                frame.present();
            }
            WgpuScreen::Offscreen(target) => {
                self.composite_into(&target.view, clear, targets);
            }
        }
        Ok(())
    }

    fn resize_screen(&mut self, screen: &mut WgpuScreen, width: u32, height: u32) {
        match screen {
            WgpuScreen::Surface { surface, config } => {
                config.width = width.max(1);
                config.height = height.max(1);
                surface.configure(&self.device, config);
            }
            WgpuScreen::Offscreen(target) => match self.allocate_target(width, height) {
                Ok(resized) => *target = resized,
                Err(error) => warn!("failed to resize offscreen screen: {error}"),
            },
        }
    }
}

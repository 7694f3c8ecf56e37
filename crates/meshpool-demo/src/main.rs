//! Headless demo: packs a grid of meshes into one pool, churns it, and draws
//! every survivor into an offscreen texture.

mod shapes;

use std::cell::Cell;
use std::rc::Rc;

use anyhow::{Result, ensure};
use meshpool::device::{Gpu, GpuInit};
use meshpool::logging::{LoggingConfig, init_logging};
use meshpool::pool::{FlushReport, GpuPoolDevice, ModelPool, PoolConfig, VertexFormat};

use shapes::ColorVertex;

const GRID: u32 = 8;
const TARGET_SIZE: u32 = 256;
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let gpu = pollster::block_on(Gpu::new_headless(GpuInit::default()))?;
    let target_usages = gpu
        .adapter()
        .get_texture_format_features(TARGET_FORMAT)
        .allowed_usages;
    ensure!(
        target_usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT),
        "adapter cannot render to {TARGET_FORMAT:?}"
    );
    let format = ColorVertex::format()?;

    let device = GpuPoolDevice::new(gpu.device(), gpu.queue(), "demo vertex pool");
    let mut pool = ModelPool::new(
        device,
        format.clone(),
        PoolConfig::default().with_label("demo vertex pool"),
    )?;

    // ── fill ──────────────────────────────────────────────────────────────
    let half = 0.8 / GRID as f32;
    let mut handles = Vec::new();
    for (i, center) in shapes::grid(GRID).enumerate() {
        let shade = i as f32 / (GRID * GRID) as f32;
        let mesh = if i % 2 == 0 {
            Rc::new(shapes::quad(&format, center, half, [shade, 0.4, 1.0 - shade, 1.0])?)
        } else {
            Rc::new(shapes::triangle(&format, center, half, [1.0, shade, 0.2, 1.0])?)
        };
        handles.push(pool.alloc(mesh)?);
    }

    // Count how often the last model is rewritten as the pool churns.
    let rewrites = Rc::new(Cell::new(0u32));
    if let Some(&last) = handles.last() {
        let rewrites = rewrites.clone();
        pool.set_upload_callback(last, move |m| {
            rewrites.set(rewrites.get() + 1);
            log::debug!("last model now at vertex {}", m.first_vertex);
        });
    }

    log_report("initial", pool.flush()?);

    // ── churn ─────────────────────────────────────────────────────────────
    for &handle in handles.iter().step_by(3) {
        pool.delete(handle);
    }
    log_report("after deletions", pool.flush()?);

    for center in shapes::grid(2) {
        pool.alloc(Rc::new(shapes::quad(&format, center, 0.05, [1.0; 4])?))?;
    }
    log_report("after refill", pool.flush()?);
    log::info!("last model rewritten {} times", rewrites.get());

    // ── draw ──────────────────────────────────────────────────────────────
    let target = gpu.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("demo target"),
        size: wgpu::Extent3d {
            width: TARGET_SIZE,
            height: TARGET_SIZE,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let pipeline = create_pipeline(gpu.device(), &format);

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("demo encoder"),
        });
    {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("demo pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&pipeline);
        pool.device().bind(&mut rpass, 0);
        pool.draw_all(&mut rpass);
    }
    gpu.submit(encoder);

    log::info!(
        "drew {} models ({} vertices) from one {}-byte vertex buffer",
        pool.len(),
        pool.total_vertices(),
        pool.capacity()
    );

    pool.destroy();
    Ok(())
}

fn log_report(stage: &str, report: FlushReport) {
    log::info!(
        "{stage}: {:?} upload, {} models / {} bytes written, {} removed, capacity {}",
        report.upload,
        report.models_written,
        report.bytes_written,
        report.removed,
        report.capacity
    );
}

fn create_pipeline(device: &wgpu::Device, format: &VertexFormat) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("demo mesh shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("demo pipeline layout"),
        bind_group_layouts: &[],
        immediate_size: 0,
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("demo mesh pipeline"),
        layout: Some(&layout),

        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[format.layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: TARGET_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),

        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

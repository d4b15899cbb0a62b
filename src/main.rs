#[cfg(feature = "metal")]
use gfx_backend_metal as back;

#[cfg(feature = "vulkan")]
use gfx_backend_vulkan as back;

mod config;
mod renderer;
mod shader;

use config::Config;
use renderer::{GpuContext, Renderer, Swapchain};
use shader::{build_program, Driver, ShaderSourceBundle};

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use gfx_hal::{adapter::Adapter, prelude::*, window::Extent2D, Backend, Features};
use log::{debug, info, trace};
use winit::event::{Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::desktop::EventLoopExtDesktop;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::parse();

    let mut event_loop = EventLoop::new();
    let wb = winit::window::WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(winit::dpi::Size::Physical(winit::dpi::PhysicalSize::new(
            config.width,
            config.height,
        )))
        .with_min_inner_size(winit::dpi::Size::Logical(winit::dpi::LogicalSize::new(
            64.0, 64.0,
        )));
    let window = wb.build(&event_loop).context("failed to create window")?;

    let instance = back::Instance::create("gfx-shader-triangle", 1)
        .map_err(|_| anyhow!("graphics backend is not supported on this system"))?;
    let mut surface = unsafe { instance.create_surface(&window) }
        .map_err(|e| anyhow!("failed to create a surface: {:?}", e))?;
    let adapters = instance.enumerate_adapters();

    let result = draw::<back::Backend>(&config, &mut event_loop, &mut surface, adapters);

    unsafe {
        instance.destroy_surface(surface);
    }
    result
}

/// Builds the shader program and runs the render loop until the window closes.
fn draw<B: Backend>(
    config: &Config,
    event_loop: &mut EventLoop<()>,
    surface: &mut B::Surface,
    mut adapters: Vec<Adapter<B>>,
) -> anyhow::Result<()> {
    if adapters.is_empty() {
        bail!("no graphics adapter found");
    }
    let adapter = adapters.remove(0);
    info!(
        "using adapter {} ({:?})",
        adapter.info.name, adapter.info.device_type
    );

    let family = adapter
        .queue_families
        .iter()
        .find(|family| {
            surface.supports_queue_family(family) && family.queue_type().supports_graphics()
        })
        .context("no queue family can draw to the window surface")?;
    let mut gpu = unsafe {
        adapter
            .physical_device
            .open(&[(family, &[1.0])], Features::empty())
    }
    .map_err(|e| anyhow!("failed to open device: {:?}", e))?;

    let mut queue_group = gpu
        .queue_groups
        .pop()
        .context("device has no queue group")?;
    let device = gpu.device;

    let dims = Extent2D {
        width: config.width,
        height: config.height,
    };
    let swapchain = Swapchain::new(&device, surface, &adapter, dims)?;
    let mut context = GpuContext::new(&device, swapchain.format).map_err(anyhow::Error::msg)?;

    let bundle = ShaderSourceBundle::load(&config.shader_path)?;
    debug!("vertex source:\n{}", bundle.vertex);
    debug!("fragment source:\n{}", bundle.fragment);
    let program = build_program(&mut context, &bundle).with_context(|| {
        format!(
            "failed to build shader program from {}",
            config.shader_path.display()
        )
    })?;
    debug!(
        "{} stage object(s) and {} program(s) live after linking",
        context.live_shaders(),
        context.live_programs()
    );

    let mut renderer = Renderer::new(&device, &adapter, queue_group.family, swapchain)?;
    let queue = &mut queue_group.queues[0];
    let mut fps_counter = fps_counter::FPSCounter::new();
    let mut failure = None;

    info!("program {} running", program);
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested
                | WindowEvent::KeyboardInput {
                    input:
                        KeyboardInput {
                            virtual_keycode: Some(VirtualKeyCode::Escape),
                            ..
                        },
                    ..
                } => {
                    info!("closed");
                    *control_flow = ControlFlow::Exit;
                }
                WindowEvent::Resized(size) if size.width > 0 && size.height > 0 => {
                    let dims = Extent2D {
                        width: size.width,
                        height: size.height,
                    };
                    if let Err(e) = renderer.resize(dims) {
                        failure = Some(e);
                        *control_flow = ControlFlow::Exit;
                    }
                }
                _ => {}
            },
            Event::MainEventsCleared => match renderer.render(queue, &context, program) {
                Ok(()) => trace!("fps: {}", fps_counter.tick()),
                Err(e) => {
                    failure = Some(e);
                    *control_flow = ControlFlow::Exit;
                }
            },
            _ => {}
        }
    });

    drop(renderer);
    context.delete_program(program);

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

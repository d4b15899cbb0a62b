use gfx_hal::{
    adapter, buffer as b, command, image as i, pool,
    prelude::*,
    queue::{family::QueueFamilyId, Submission},
    window, Backend,
};
use log::{trace, warn};

use std::borrow::Borrow;
use std::error::Error;
use std::fmt;
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

mod buffer;
mod context;
mod memory;
mod pipeline;
mod spirv;
mod swapchain;
mod vertex;

pub use context::GpuContext;
pub use swapchain::Swapchain;

use buffer::Buffer;
use memory::Memory;
use vertex::{Vertex, TRIANGLE};

use crate::shader::ProgramHandle;

const FRAMES_IN_FLIGHT: usize = 2;
const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

#[derive(Debug)]
pub enum RenderError {
    Buffer(String),
    Memory(String),
    Swapchain(String),
    Device(String),
    /// The program handle names no linked pipeline.
    UnknownProgram(ProgramHandle),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Buffer(msg) => write!(f, "vertex buffer error: {}", msg),
            RenderError::Memory(msg) => write!(f, "memory error: {}", msg),
            RenderError::Swapchain(msg) => write!(f, "swapchain error: {}", msg),
            RenderError::Device(msg) => write!(f, "device error: {}", msg),
            RenderError::UnknownProgram(program) => {
                write!(f, "program {} is not a linked program", program)
            }
        }
    }
}

impl Error for RenderError {}

fn device_error<E: fmt::Debug>(what: &'static str) -> impl Fn(E) -> RenderError {
    move |e| RenderError::Device(format!("{}: {:?}", what, e))
}

/// Draws the triangle with whatever program the caller hands in.
pub struct Renderer<'a, B: Backend> {
    frame: usize,
    device: &'a B::Device,
    command_buffers: Vec<B::CommandBuffer>,
    submission_complete_semaphores: Vec<B::Semaphore>,
    submission_complete_fences: Vec<B::Fence>,
    command_pool: ManuallyDrop<B::CommandPool>,
    memory: ManuallyDrop<Memory<'a, B, Vertex>>,
    swapchain: ManuallyDrop<Swapchain<'a, B>>,
}

impl<'a, B> Renderer<'a, B>
where
    B: Backend,
{
    pub fn new(
        device: &'a B::Device,
        adapter: &'a adapter::Adapter<B>,
        family: QueueFamilyId,
        swapchain: Swapchain<'a, B>,
    ) -> Result<Self, RenderError> {
        let memory_types = adapter.physical_device.memory_properties().memory_types;
        let limits = adapter.physical_device.limits();

        let vertex_buffer = Buffer::new(device, &TRIANGLE, &limits)?;
        let memory = Memory::new(vertex_buffer, &memory_types)?;

        let mut command_pool = unsafe {
            device.create_command_pool(family, pool::CommandPoolCreateFlags::empty())
        }
        .map_err(device_error("can't create command pool"))?;

        let command_buffers = (0..FRAMES_IN_FLIGHT)
            .map(|_| unsafe { command_pool.allocate_one(command::Level::Primary) })
            .collect();
        let submission_complete_semaphores = (0..FRAMES_IN_FLIGHT)
            .map(|_| device.create_semaphore())
            .collect::<Result<Vec<_>, _>>()
            .map_err(device_error("can't create semaphore"))?;
        let submission_complete_fences = (0..FRAMES_IN_FLIGHT)
            .map(|_| device.create_fence(true))
            .collect::<Result<Vec<_>, _>>()
            .map_err(device_error("can't create fence"))?;

        Ok(Renderer {
            device,
            submission_complete_semaphores,
            submission_complete_fences,
            command_pool: ManuallyDrop::new(command_pool),
            memory: ManuallyDrop::new(memory),
            swapchain: ManuallyDrop::new(swapchain),
            command_buffers,
            frame: 0,
        })
    }

    pub fn resize(&mut self, dims: window::Extent2D) -> Result<(), RenderError> {
        self.swapchain.resize(dims)
    }

    pub fn render(
        &mut self,
        queue: &mut B::CommandQueue,
        context: &GpuContext<'a, B>,
        program: ProgramHandle,
    ) -> Result<(), RenderError> {
        let pipeline = context
            .pipeline(program)
            .ok_or(RenderError::UnknownProgram(program))?;

        let surface_image = match unsafe { self.swapchain.surface.acquire_image(!0) } {
            Ok((image, _)) => image,
            Err(e) => {
                warn!("failed to acquire swapchain image: {:?}", e);
                return self.swapchain.recreate();
            }
        };

        let frame_buffer = unsafe {
            self.device.create_framebuffer(
                context.render_pass(),
                iter::once(surface_image.borrow()),
                i::Extent {
                    width: self.swapchain.dims.width,
                    height: self.swapchain.dims.height,
                    depth: 1,
                },
            )
        }
        .map_err(device_error("can't create framebuffer"))?;

        let frame_idx = self.frame % FRAMES_IN_FLIGHT;

        unsafe {
            let fence = &self.submission_complete_fences[frame_idx];
            self.device
                .wait_for_fence(fence, !0)
                .map_err(device_error("can't wait for fence"))?;
            self.device
                .reset_fence(fence)
                .map_err(device_error("can't reset fence"))?;
            if frame_idx == 0 {
                self.command_pool.reset(false);
            }
        }

        let cmd_buffer = &mut self.command_buffers[frame_idx];
        unsafe {
            cmd_buffer.begin_primary(command::CommandBufferFlags::ONE_TIME_SUBMIT);
            cmd_buffer.set_viewports(0, &[self.swapchain.viewport.clone()]);
            cmd_buffer.set_scissors(0, &[self.swapchain.viewport.rect]);
            cmd_buffer.bind_graphics_pipeline(&pipeline.pipeline);
            cmd_buffer.bind_vertex_buffers(
                0,
                iter::once((&*self.memory.buffer.buf, b::SubRange::WHOLE)),
            );
            cmd_buffer.begin_render_pass(
                context.render_pass(),
                &frame_buffer,
                self.swapchain.viewport.rect,
                &[command::ClearValue {
                    color: command::ClearColor {
                        float32: CLEAR_COLOR,
                    },
                }],
                command::SubpassContents::Inline,
            );
            cmd_buffer.draw(0..TRIANGLE.len() as u32, 0..1);
            cmd_buffer.end_render_pass();
            cmd_buffer.finish();

            let submission = Submission {
                command_buffers: iter::once(&*cmd_buffer),
                wait_semaphores: None,
                signal_semaphores: iter::once(&self.submission_complete_semaphores[frame_idx]),
            };

            queue.submit(
                submission,
                Some(&self.submission_complete_fences[frame_idx]),
            );

            let result = queue.present_surface(
                &mut *self.swapchain.surface,
                surface_image,
                Some(&self.submission_complete_semaphores[frame_idx]),
            );

            self.device.destroy_framebuffer(frame_buffer);

            if let Err(e) = result {
                warn!("failed to present: {:?}", e);
                self.swapchain.recreate()?;
            }
        }

        trace!("frame {} submitted", self.frame);
        self.frame += 1;
        Ok(())
    }
}

impl<'a, B: Backend> Drop for Renderer<'a, B> {
    fn drop(&mut self) {
        let device = &self.device;
        if let Err(e) = device.wait_idle() {
            warn!("device did not go idle: {:?}", e);
        }
        unsafe {
            ManuallyDrop::drop(&mut self.memory);
            device.destroy_command_pool(ManuallyDrop::into_inner(ptr::read(&self.command_pool)));
            for s in self.submission_complete_semaphores.drain(..) {
                device.destroy_semaphore(s);
            }

            for f in self.submission_complete_fences.drain(..) {
                device.destroy_fence(f);
            }

            ManuallyDrop::drop(&mut self.swapchain);
        }
    }
}

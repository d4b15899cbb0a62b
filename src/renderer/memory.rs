use gfx_hal::{adapter::MemoryType, memory as m, prelude::*, Backend, MemoryTypeId};
use std::iter;
use std::mem::ManuallyDrop;
use std::ptr;

use super::buffer::Buffer;
use super::RenderError;

/// A buffer bound to CPU-visible memory holding a copy of its content.
pub struct Memory<'a, B: Backend, T> {
    pub buffer: ManuallyDrop<Buffer<'a, B, T>>,
    memory: ManuallyDrop<B::Memory>,
}

impl<'a, B: Backend, T> Memory<'a, B, T> {
    pub fn new(mut buffer: Buffer<'a, B, T>, memory_types: &[MemoryType]) -> Result<Self, RenderError> {
        let memory = Self::upload(&mut buffer, memory_types)?;
        Ok(Memory {
            buffer: ManuallyDrop::new(buffer),
            memory: ManuallyDrop::new(memory),
        })
    }

    fn upload(
        buffer: &mut Buffer<'a, B, T>,
        memory_types: &[MemoryType],
    ) -> Result<B::Memory, RenderError> {
        let device = buffer.device;
        let err = |e: &dyn std::fmt::Debug| RenderError::Memory(format!("{:?}", e));
        unsafe {
            let buffer_req = device.get_buffer_requirements(&buffer.buf);
            let upload_type = Self::upload_type(memory_types, &buffer_req).ok_or_else(|| {
                RenderError::Memory("no CPU-visible memory type for the vertex buffer".to_owned())
            })?;
            let memory = device
                .allocate_memory(upload_type, buffer_req.size)
                .map_err(|e| err(&e))?;

            let uploaded = device
                .bind_buffer_memory(&memory, 0, &mut buffer.buf)
                .map_err(|e| err(&e))
                .and_then(|()| device.map_memory(&memory, m::Segment::ALL).map_err(|e| err(&e)))
                .and_then(|mapping| {
                    ptr::copy_nonoverlapping(
                        buffer.content.as_ptr() as *const u8,
                        mapping,
                        buffer.len as usize,
                    );
                    let flushed = device
                        .flush_mapped_memory_ranges(iter::once((&memory, m::Segment::ALL)))
                        .map_err(|e| err(&e));
                    device.unmap_memory(&memory);
                    flushed
                });

            match uploaded {
                Ok(()) => Ok(memory),
                Err(e) => {
                    device.free_memory(memory);
                    Err(e)
                }
            }
        }
    }

    fn upload_type(properties: &[MemoryType], buffer_req: &m::Requirements) -> Option<MemoryTypeId> {
        properties
            .iter()
            .enumerate()
            .position(|(id, mem_type)| {
                buffer_req.type_mask & (1 << id) != 0
                    && mem_type.properties.contains(m::Properties::CPU_VISIBLE)
            })
            .map(MemoryTypeId::from)
    }
}

impl<'a, B: Backend, T> Drop for Memory<'a, B, T> {
    fn drop(&mut self) {
        let device = self.buffer.device;
        unsafe {
            ManuallyDrop::drop(&mut self.buffer);
            device.free_memory(ManuallyDrop::into_inner(ptr::read(&self.memory)))
        }
    }
}

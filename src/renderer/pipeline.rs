use gfx_hal::{pass::Subpass, prelude::*, pso, Backend};
use std::iter;
use std::mem::ManuallyDrop;
use std::ops::Range;
use std::ptr;

use super::vertex::Vertex;

const ENTRY_NAME: &str = "main";

/// A linked program: the graphics pipeline built from one vertex and one
/// fragment shader module.
pub struct Pipeline<'a, B: Backend> {
    device: &'a B::Device,
    pub pipeline: ManuallyDrop<B::GraphicsPipeline>,
    pub pipeline_layout: ManuallyDrop<B::PipelineLayout>,
}

impl<'a, B: Backend> Pipeline<'a, B> {
    pub fn new(
        device: &'a B::Device,
        vs_module: &B::ShaderModule,
        fs_module: &B::ShaderModule,
        render_pass: &B::RenderPass,
    ) -> Result<Self, String> {
        let pipeline_layout = unsafe {
            device.create_pipeline_layout(
                iter::empty::<&B::DescriptorSetLayout>(),
                iter::empty::<&(pso::ShaderStageFlags, Range<u32>)>(),
            )
        }
        .map_err(|e| format!("failed to create pipeline layout: {:?}", e))?;

        let shader_entries = pso::GraphicsShaderSet {
            vertex: pso::EntryPoint {
                entry: ENTRY_NAME,
                module: vs_module,
                specialization: pso::Specialization::default(),
            },
            hull: None,
            domain: None,
            geometry: None,
            fragment: Some(pso::EntryPoint {
                entry: ENTRY_NAME,
                module: fs_module,
                specialization: pso::Specialization::default(),
            }),
        };

        let subpass = Subpass {
            index: 0,
            main_pass: render_pass,
        };

        let mut pipeline_desc = pso::GraphicsPipelineDesc::new(
            shader_entries,
            pso::Primitive::TriangleList,
            pso::Rasterizer::FILL,
            &pipeline_layout,
            subpass,
        );
        pipeline_desc.blender.targets.push(pso::ColorBlendDesc {
            mask: pso::ColorMask::ALL,
            blend: Some(pso::BlendState::ALPHA),
        });
        pipeline_desc.vertex_buffers.push(Vertex::buffer_desc());
        pipeline_desc.attributes.extend(Vertex::attributes());

        let created = unsafe { device.create_graphics_pipeline(&pipeline_desc, None) };
        drop(pipeline_desc);

        match created {
            Ok(pipeline) => Ok(Pipeline {
                device,
                pipeline: ManuallyDrop::new(pipeline),
                pipeline_layout: ManuallyDrop::new(pipeline_layout),
            }),
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(pipeline_layout) };
                Err(format!("failed to create graphics pipeline: {:?}", e))
            }
        }
    }
}

impl<'a, B: Backend> Drop for Pipeline<'a, B> {
    fn drop(&mut self) {
        unsafe {
            self.device
                .destroy_graphics_pipeline(ManuallyDrop::into_inner(ptr::read(&self.pipeline)));
            self.device
                .destroy_pipeline_layout(ManuallyDrop::into_inner(ptr::read(
                    &self.pipeline_layout,
                )));
        }
    }
}

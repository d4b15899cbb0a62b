use gfx_hal::{format as f, image as i, pass, prelude::*, Backend};
use log::{debug, warn};
use std::collections::HashMap;
use std::mem::ManuallyDrop;
use std::ptr;

use super::pipeline::Pipeline;
use super::spirv::compile_glsl;
use crate::shader::{next_handle_id, Driver, ProgramHandle, StageHandle, StageKind};

struct Stage<M> {
    kind: StageKind,
    source: String,
    module: Option<M>,
    info_log: String,
}

impl<M> Stage<M> {
    fn new(kind: StageKind) -> Self {
        Stage {
            kind,
            source: String::new(),
            module: None,
            info_log: String::new(),
        }
    }
}

/// A stage as recorded by `attach_shader`. The kind is kept so the program
/// can still be checked after the stage object itself is deleted.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Attached {
    handle: StageHandle,
    kind: StageKind,
}

/// The one stage of `kind` among `attached`, which must be compiled.
fn attached_module<'s, M>(
    stages: &'s HashMap<StageHandle, Stage<M>>,
    attached: &[Attached],
    kind: StageKind,
) -> Result<&'s M, String> {
    let handle = single_stage(attached, kind)?;
    let stage = stages
        .get(&handle)
        .ok_or_else(|| format!("{} stage {} was deleted", kind, handle))?;
    stage
        .module
        .as_ref()
        .ok_or_else(|| format!("{} stage {} is not compiled", kind, handle))
}

fn single_stage(attached: &[Attached], kind: StageKind) -> Result<StageHandle, String> {
    let mut found = attached.iter().filter(|a| a.kind == kind);
    let first = found
        .next()
        .ok_or_else(|| format!("no {} stage attached", kind))?;
    if found.next().is_some() {
        return Err(format!("more than one {} stage attached", kind));
    }
    Ok(first.handle)
}

/// A runnable program has exactly one vertex and one fragment stage.
fn check_attachments(attached: &[Attached]) -> Result<(), String> {
    for &kind in &StageKind::ALL {
        single_stage(attached, kind)?;
    }
    Ok(())
}

struct Program<'a, B: Backend> {
    attached: Vec<Attached>,
    pipeline: Option<Pipeline<'a, B>>,
    validated: bool,
    info_log: String,
}

/// Rendering context of one device and one surface format.
///
/// Shader stages and programs live in handle tables here, so the shader
/// pipeline only ever sees [`StageHandle`]s and [`ProgramHandle`]s.
pub struct GpuContext<'a, B: Backend> {
    device: &'a B::Device,
    render_pass: ManuallyDrop<B::RenderPass>,
    stages: HashMap<StageHandle, Stage<B::ShaderModule>>,
    programs: HashMap<ProgramHandle, Program<'a, B>>,
    next_id: u32,
}

impl<'a, B: Backend> GpuContext<'a, B> {
    pub fn new(device: &'a B::Device, format: f::Format) -> Result<Self, String> {
        let render_pass = Self::create_render_pass(device, format)?;
        Ok(GpuContext {
            device,
            render_pass,
            stages: HashMap::new(),
            programs: HashMap::new(),
            next_id: 0,
        })
    }

    pub fn render_pass(&self) -> &B::RenderPass {
        &self.render_pass
    }

    /// The graphics pipeline of a linked program.
    pub fn pipeline(&self, program: ProgramHandle) -> Option<&Pipeline<'a, B>> {
        self.programs
            .get(&program)
            .and_then(|p| p.pipeline.as_ref())
    }

    fn create_render_pass(
        device: &B::Device,
        format: f::Format,
    ) -> Result<ManuallyDrop<B::RenderPass>, String> {
        let attachment = pass::Attachment {
            format: Some(format),
            samples: 1,
            ops: pass::AttachmentOps::new(
                pass::AttachmentLoadOp::Clear,
                pass::AttachmentStoreOp::Store,
            ),
            stencil_ops: pass::AttachmentOps::DONT_CARE,
            layouts: i::Layout::Undefined..i::Layout::Present,
        };

        let subpass = pass::SubpassDesc {
            colors: &[(0, i::Layout::ColorAttachmentOptimal)],
            depth_stencil: None,
            inputs: &[],
            resolves: &[],
            preserves: &[],
        };

        unsafe { device.create_render_pass(&[attachment], &[subpass], &[]) }
            .map(ManuallyDrop::new)
            .map_err(|e| format!("failed to create render pass: {:?}", e))
    }

    fn link(&self, attached: &[Attached]) -> Result<Pipeline<'a, B>, String> {
        let vs = attached_module(&self.stages, attached, StageKind::Vertex)?;
        let fs = attached_module(&self.stages, attached, StageKind::Fragment)?;
        Pipeline::new(self.device, vs, fs, &*self.render_pass)
    }
}

impl<'a, B: Backend> Driver for GpuContext<'a, B> {
    fn create_shader(&mut self, kind: StageKind) -> Option<StageHandle> {
        let handle = StageHandle::new(next_handle_id(&mut self.next_id)?);
        self.stages.insert(handle, Stage::new(kind));
        Some(handle)
    }

    fn shader_source(&mut self, shader: StageHandle, source: &str) {
        match self.stages.get_mut(&shader) {
            Some(stage) => stage.source = source.to_owned(),
            None => warn!("shader_source: unknown stage {}", shader),
        }
    }

    fn compile_shader(&mut self, shader: StageHandle) {
        let device = self.device;
        let stage = match self.stages.get_mut(&shader) {
            Some(stage) => stage,
            None => {
                warn!("compile_shader: unknown stage {}", shader);
                return;
            }
        };

        if let Some(module) = stage.module.take() {
            unsafe { device.destroy_shader_module(module) };
        }
        let compiled = compile_glsl(stage.kind, &stage.source).and_then(|spirv| {
            debug!("{} stage {}: {} SPIR-V words", stage.kind, shader, spirv.len());
            unsafe { device.create_shader_module(&spirv) }
                .map_err(|e| format!("failed to create shader module: {:?}", e))
        });
        match compiled {
            Ok(module) => {
                stage.module = Some(module);
                stage.info_log.clear();
            }
            Err(log) => stage.info_log = log,
        }
    }

    fn compile_status(&self, shader: StageHandle) -> bool {
        self.stages
            .get(&shader)
            .map_or(false, |stage| stage.module.is_some())
    }

    fn shader_info_log(&self, shader: StageHandle) -> String {
        self.stages
            .get(&shader)
            .map(|stage| stage.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: StageHandle) {
        if let Some(stage) = self.stages.remove(&shader) {
            if let Some(module) = stage.module {
                unsafe { self.device.destroy_shader_module(module) };
            }
        }
    }

    fn create_program(&mut self) -> Option<ProgramHandle> {
        let handle = ProgramHandle::new(next_handle_id(&mut self.next_id)?);
        self.programs.insert(
            handle,
            Program {
                attached: Vec::new(),
                pipeline: None,
                validated: false,
                info_log: String::new(),
            },
        );
        Some(handle)
    }

    fn attach_shader(&mut self, program: ProgramHandle, shader: StageHandle) {
        let kind = match self.stages.get(&shader) {
            Some(stage) => stage.kind,
            None => {
                warn!("attach_shader: unknown stage {}", shader);
                return;
            }
        };
        let attached = Attached {
            handle: shader,
            kind,
        };
        match self.programs.get_mut(&program) {
            Some(p) if !p.attached.contains(&attached) => p.attached.push(attached),
            Some(_) => {}
            None => warn!("attach_shader: unknown program {}", program),
        }
    }

    fn link_program(&mut self, program: ProgramHandle) {
        let attached = match self.programs.get(&program) {
            Some(p) => p.attached.clone(),
            None => {
                warn!("link_program: unknown program {}", program);
                return;
            }
        };
        let linked = self.link(&attached);

        if let Some(p) = self.programs.get_mut(&program) {
            p.validated = false;
            match linked {
                Ok(pipeline) => {
                    p.pipeline = Some(pipeline);
                    p.info_log.clear();
                }
                Err(log) => {
                    p.pipeline = None;
                    p.info_log = log;
                }
            }
        }
    }

    fn link_status(&self, program: ProgramHandle) -> bool {
        self.pipeline(program).is_some()
    }

    fn validate_program(&mut self, program: ProgramHandle) {
        if let Some(p) = self.programs.get_mut(&program) {
            let checked = if p.pipeline.is_some() {
                check_attachments(&p.attached)
            } else {
                Err(format!("program {} is not linked", program))
            };
            p.validated = checked.is_ok();
            if let Err(log) = checked {
                p.info_log = log;
            }
        }
    }

    fn validate_status(&self, program: ProgramHandle) -> bool {
        self.programs.get(&program).map_or(false, |p| p.validated)
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        self.programs
            .get(&program)
            .map(|p| p.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
    }

    fn live_shaders(&self) -> usize {
        self.stages.len()
    }

    fn live_programs(&self) -> usize {
        self.programs.len()
    }
}

impl<'a, B: Backend> Drop for GpuContext<'a, B> {
    fn drop(&mut self) {
        self.programs.clear();
        for (_, stage) in self.stages.drain() {
            if let Some(module) = stage.module {
                unsafe { self.device.destroy_shader_module(module) };
            }
        }
        unsafe {
            self.device
                .destroy_render_pass(ManuallyDrop::into_inner(ptr::read(&self.render_pass)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;

    fn handle(id: u32) -> StageHandle {
        StageHandle::new(NonZeroU32::new(id).unwrap())
    }

    fn attached(id: u32, kind: StageKind) -> Attached {
        Attached {
            handle: handle(id),
            kind,
        }
    }

    fn compiled(kind: StageKind, module: u32) -> Stage<u32> {
        Stage {
            module: Some(module),
            ..Stage::new(kind)
        }
    }

    #[test]
    fn finds_the_compiled_module_of_each_kind() {
        let mut stages = HashMap::new();
        stages.insert(handle(1), compiled(StageKind::Vertex, 10));
        stages.insert(handle(2), compiled(StageKind::Fragment, 20));
        let list = [attached(1, StageKind::Vertex), attached(2, StageKind::Fragment)];

        assert_eq!(attached_module(&stages, &list, StageKind::Vertex), Ok(&10));
        assert_eq!(attached_module(&stages, &list, StageKind::Fragment), Ok(&20));
    }

    #[test]
    fn missing_stage_kind_does_not_link() {
        let mut stages = HashMap::new();
        stages.insert(handle(1), compiled(StageKind::Vertex, 10));
        let list = [attached(1, StageKind::Vertex)];

        let err = attached_module(&stages, &list, StageKind::Fragment).unwrap_err();
        assert_eq!(err, "no fragment stage attached");
    }

    #[test]
    fn duplicate_stage_kind_does_not_link() {
        let mut stages = HashMap::new();
        stages.insert(handle(1), compiled(StageKind::Vertex, 10));
        stages.insert(handle(2), compiled(StageKind::Vertex, 11));
        let list = [attached(1, StageKind::Vertex), attached(2, StageKind::Vertex)];

        let err = attached_module(&stages, &list, StageKind::Vertex).unwrap_err();
        assert_eq!(err, "more than one vertex stage attached");
    }

    #[test]
    fn uncompiled_stage_does_not_link() {
        let mut stages = HashMap::new();
        stages.insert(handle(1), Stage::<u32>::new(StageKind::Vertex));
        let list = [attached(1, StageKind::Vertex)];

        let err = attached_module(&stages, &list, StageKind::Vertex).unwrap_err();
        assert_eq!(err, "vertex stage 1 is not compiled");
    }

    #[test]
    fn deleted_stage_does_not_link() {
        let stages: HashMap<StageHandle, Stage<u32>> = HashMap::new();
        let list = [attached(3, StageKind::Fragment)];

        let err = attached_module(&stages, &list, StageKind::Fragment).unwrap_err();
        assert_eq!(err, "fragment stage 3 was deleted");
    }

    #[test]
    fn stage_attached_after_linking_fails_validation() {
        let mut list = vec![attached(1, StageKind::Vertex), attached(2, StageKind::Fragment)];
        assert_eq!(check_attachments(&list), Ok(()));

        list.push(attached(3, StageKind::Fragment));
        assert_eq!(
            check_attachments(&list),
            Err("more than one fragment stage attached".to_owned())
        );
    }
}

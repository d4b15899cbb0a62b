use std::fmt;
use std::num::NonZeroU32;

use super::source::StageKind;

/// Names one compiled (or compiling) shader stage object owned by a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageHandle(NonZeroU32);

/// Names one program object owned by a [`Driver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(NonZeroU32);

macro_rules! handle_impls {
    ($handle:ident) => {
        impl $handle {
            pub fn new(id: NonZeroU32) -> Self {
                $handle(id)
            }

            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $handle {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.get())
            }
        }
    };
}

handle_impls!(StageHandle);
handle_impls!(ProgramHandle);

/// Advances `counter` and returns it as a handle id, or `None` once `u32`
/// ids are used up. Ids start at 1.
pub fn next_handle_id(counter: &mut u32) -> Option<NonZeroU32> {
    let id = NonZeroU32::new(counter.checked_add(1)?)?;
    *counter = id.get();
    Some(id)
}

/// Shader object primitives of a GPU driver.
///
/// An implementation is the rendering context itself, so holding `&mut` to
/// it is what makes driver calls legal. Status queries report the outcome of
/// the most recent compile, link or validate request on that object. Calls
/// with a handle the driver no longer knows are ignored and report failure.
/// `create_*` return `None` once the driver cannot name another object.
pub trait Driver {
    fn create_shader(&mut self, kind: StageKind) -> Option<StageHandle>;
    fn shader_source(&mut self, shader: StageHandle, source: &str);
    fn compile_shader(&mut self, shader: StageHandle);
    fn compile_status(&self, shader: StageHandle) -> bool;
    fn shader_info_log(&self, shader: StageHandle) -> String;
    fn delete_shader(&mut self, shader: StageHandle);

    fn create_program(&mut self) -> Option<ProgramHandle>;
    fn attach_shader(&mut self, program: ProgramHandle, shader: StageHandle);
    fn link_program(&mut self, program: ProgramHandle);
    fn link_status(&self, program: ProgramHandle) -> bool;
    fn validate_program(&mut self, program: ProgramHandle);
    fn validate_status(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn delete_program(&mut self, program: ProgramHandle);

    /// Number of stage objects not yet deleted.
    fn live_shaders(&self) -> usize;
    /// Number of program objects not yet deleted.
    fn live_programs(&self) -> usize;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct Shader {
        kind: Option<StageKind>,
        source: String,
        compiled: bool,
        log: String,
    }

    #[derive(Debug, Default)]
    struct Program {
        attached: Vec<StageKind>,
        linked: bool,
        validated: bool,
        log: String,
    }

    /// In-memory driver. A stage compiles when its source defines `main`;
    /// a program links when one compiled vertex and one compiled fragment
    /// stage are attached.
    #[derive(Debug, Default)]
    pub struct MockDriver {
        pub next_id: u32,
        shaders: HashMap<StageHandle, Shader>,
        programs: HashMap<ProgramHandle, Program>,
        pub fail_link: Option<String>,
        pub fail_validate: Option<String>,
        pub shaders_created: usize,
    }

    impl MockDriver {
        pub fn new() -> Self {
            Self::default()
        }

        fn next(&mut self) -> Option<NonZeroU32> {
            next_handle_id(&mut self.next_id)
        }
    }

    impl Driver for MockDriver {
        fn create_shader(&mut self, kind: StageKind) -> Option<StageHandle> {
            let handle = StageHandle::new(self.next()?);
            self.shaders_created += 1;
            self.shaders.insert(
                handle,
                Shader {
                    kind: Some(kind),
                    ..Shader::default()
                },
            );
            Some(handle)
        }

        fn shader_source(&mut self, shader: StageHandle, source: &str) {
            if let Some(s) = self.shaders.get_mut(&shader) {
                s.source = source.to_owned();
            }
        }

        fn compile_shader(&mut self, shader: StageHandle) {
            if let Some(s) = self.shaders.get_mut(&shader) {
                s.compiled = s.source.contains("void main(");
                s.log = if s.compiled {
                    String::new()
                } else {
                    "ERROR: 0:1: '' : function main is not defined\n".to_owned()
                };
            }
        }

        fn compile_status(&self, shader: StageHandle) -> bool {
            self.shaders.get(&shader).map_or(false, |s| s.compiled)
        }

        fn shader_info_log(&self, shader: StageHandle) -> String {
            self.shaders
                .get(&shader)
                .map(|s| s.log.clone())
                .unwrap_or_default()
        }

        fn delete_shader(&mut self, shader: StageHandle) {
            self.shaders.remove(&shader);
        }

        fn create_program(&mut self) -> Option<ProgramHandle> {
            let handle = ProgramHandle::new(self.next()?);
            self.programs.insert(handle, Program::default());
            Some(handle)
        }

        fn attach_shader(&mut self, program: ProgramHandle, shader: StageHandle) {
            let shader = match self.shaders.get(&shader) {
                Some(s) if s.compiled => s,
                _ => return,
            };
            if let (Some(p), Some(kind)) = (self.programs.get_mut(&program), shader.kind) {
                p.attached.push(kind);
            }
        }

        fn link_program(&mut self, program: ProgramHandle) {
            let fail_link = self.fail_link.clone();
            if let Some(p) = self.programs.get_mut(&program) {
                let count = |kind| p.attached.iter().filter(|k| **k == kind).count();
                let complete = count(StageKind::Vertex) == 1 && count(StageKind::Fragment) == 1;
                p.linked = complete && fail_link.is_none();
                p.log = match (complete, fail_link) {
                    (false, _) => "ERROR: program needs one vertex and one fragment stage\n".to_owned(),
                    (true, Some(log)) => log,
                    (true, None) => String::new(),
                };
            }
        }

        fn link_status(&self, program: ProgramHandle) -> bool {
            self.programs.get(&program).map_or(false, |p| p.linked)
        }

        fn validate_program(&mut self, program: ProgramHandle) {
            let fail_validate = self.fail_validate.clone();
            if let Some(p) = self.programs.get_mut(&program) {
                p.validated = p.linked && fail_validate.is_none();
                if let Some(log) = fail_validate {
                    p.log = log;
                }
            }
        }

        fn validate_status(&self, program: ProgramHandle) -> bool {
            self.programs.get(&program).map_or(false, |p| p.validated)
        }

        fn program_info_log(&self, program: ProgramHandle) -> String {
            self.programs
                .get(&program)
                .map(|p| p.log.clone())
                .unwrap_or_default()
        }

        fn delete_program(&mut self, program: ProgramHandle) {
            self.programs.remove(&program);
        }

        fn live_shaders(&self) -> usize {
            self.shaders.len()
        }

        fn live_programs(&self) -> usize {
            self.programs.len()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_ids_start_at_one() {
        let mut counter = 0;
        assert_eq!(next_handle_id(&mut counter).map(NonZeroU32::get), Some(1));
        assert_eq!(next_handle_id(&mut counter).map(NonZeroU32::get), Some(2));
    }

    #[test]
    fn handle_ids_stop_at_u32_max() {
        let mut counter = u32::MAX - 1;
        assert_eq!(next_handle_id(&mut counter).map(NonZeroU32::get), Some(u32::MAX));
        assert_eq!(next_handle_id(&mut counter), None);
        assert_eq!(counter, u32::MAX);
    }
}

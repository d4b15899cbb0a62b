use gfx_hal::pso;
use std::io::{Cursor, Read};

use crate::shader::StageKind;

/// Compiles GLSL to SPIR-V words with glslang. The error is glslang's
/// diagnostic output.
pub fn compile_glsl(kind: StageKind, source: &str) -> Result<Vec<u32>, String> {
    let ty = match kind {
        StageKind::Vertex => glsl_to_spirv::ShaderType::Vertex,
        StageKind::Fragment => glsl_to_spirv::ShaderType::Fragment,
    };
    let mut file = glsl_to_spirv::compile(source, ty)?;

    let mut bytes = vec![];
    file.read_to_end(&mut bytes)
        .map_err(|e| format!("failed to read SPIR-V output: {}", e))?;
    pso::read_spirv(Cursor::new(&bytes[..])).map_err(|e| format!("invalid SPIR-V: {}", e))
}

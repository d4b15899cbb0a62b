use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use super::source::StageKind;

#[derive(Debug)]
pub enum ShaderError {
    /// The shader source file could not be opened or read.
    Unreadable { path: PathBuf, source: io::Error },
    /// The driver has no handle left for another object of this kind.
    Allocation(&'static str),
    /// The source file has no section for this stage.
    MissingStage(StageKind),
    /// The driver rejected a stage; `log` is the driver's diagnostic text.
    Compile { stage: StageKind, log: String },
    Link { log: String },
    Validate { log: String },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::Unreadable { path, .. } => {
                write!(f, "failed to read shader source {}", path.display())
            }
            ShaderError::Allocation(object) => {
                write!(f, "driver could not allocate a {} object", object)
            }
            ShaderError::MissingStage(stage) => {
                write!(f, "shader source has no {} section", stage)
            }
            ShaderError::Compile { stage, log } => {
                write!(f, "failed to compile {} shader:\n{}", stage, log.trim_end())
            }
            ShaderError::Link { log } => write!(f, "failed to link program:\n{}", log.trim_end()),
            ShaderError::Validate { log } => {
                write!(f, "program failed validation:\n{}", log.trim_end())
            }
        }
    }
}

impl Error for ShaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ShaderError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}

//! Shader source ingestion and program construction.
//!
//! `#shader`-annotated source files are split per stage by [`source`], each
//! stage is compiled by [`compiler`], and [`linker`] joins them into one
//! program. All GPU work goes through a [`Driver`].

mod compiler;
mod driver;
mod error;
mod linker;
mod source;

pub use driver::{next_handle_id, Driver, ProgramHandle, StageHandle};
pub use error::ShaderError;
pub use linker::build_program;
pub use source::{ShaderSourceBundle, StageKind};

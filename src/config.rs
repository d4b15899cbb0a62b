use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_SHADER_PATH: &str = "res/shaders/Basic.shader";

/// Draws a triangle with the vertex and fragment shaders of one source file.
///
/// Sections of the file start with `#shader vertex` or `#shader fragment`.
/// Set RUST_LOG=info to see compiler output.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Combined shader source file
    #[arg(value_name = "SHADER_PATH", default_value = DEFAULT_SHADER_PATH)]
    pub shader_path: PathBuf,
    /// Window title
    #[arg(long, default_value = "triangle")]
    pub title: String,
    /// Initial window width in physical pixels
    #[arg(long, default_value_t = 1024)]
    pub width: u32,
    /// Initial window height in physical pixels
    #[arg(long, default_value_t = 768)]
    pub height: u32,
}

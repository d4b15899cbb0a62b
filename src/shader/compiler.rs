use log::{error, info};

use super::driver::{Driver, StageHandle};
use super::error::ShaderError;
use super::source::StageKind;

/// Compiles one stage. On failure the stage object is deleted before the
/// driver's diagnostic log is returned.
pub fn compile_stage<D: Driver + ?Sized>(
    driver: &mut D,
    kind: StageKind,
    source: &str,
) -> Result<StageHandle, ShaderError> {
    let shader = driver
        .create_shader(kind)
        .ok_or(ShaderError::Allocation("shader"))?;
    driver.shader_source(shader, source);
    driver.compile_shader(shader);

    if !driver.compile_status(shader) {
        let log = driver.shader_info_log(shader);
        driver.delete_shader(shader);
        error!("failed to compile {} shader\n{}", kind, log.trim_end());
        return Err(ShaderError::Compile { stage: kind, log });
    }

    info!("{} shader compiled", kind);
    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::driver::mock::MockDriver;

    #[test]
    fn returns_live_handle_on_success() {
        let mut driver = MockDriver::new();
        let shader = compile_stage(&mut driver, StageKind::Vertex, "void main() {}\n").unwrap();
        assert!(driver.compile_status(shader));
        assert_eq!(driver.live_shaders(), 1);
    }

    #[test]
    fn failure_carries_stage_and_log_and_releases_object() {
        let mut driver = MockDriver::new();
        let err = compile_stage(&mut driver, StageKind::Fragment, "void mian() {}\n").unwrap_err();
        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected Compile, got {:?}", other),
        }
        assert_eq!(driver.shaders_created, 1);
        assert_eq!(driver.live_shaders(), 0);
    }

    #[test]
    fn exhausted_handles_are_an_error() {
        let mut driver = MockDriver::new();
        driver.next_id = u32::MAX;
        let err = compile_stage(&mut driver, StageKind::Vertex, "void main() {}\n").unwrap_err();
        assert!(matches!(err, ShaderError::Allocation("shader")));
        assert_eq!(driver.live_shaders(), 0);
    }
}

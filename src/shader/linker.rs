use log::{error, info};

use super::compiler::compile_stage;
use super::driver::{Driver, ProgramHandle};
use super::error::ShaderError;
use super::source::{ShaderSourceBundle, StageKind};

pub fn build_program<D: Driver + ?Sized>(
    driver: &mut D,
    bundle: &ShaderSourceBundle,
) -> Result<ProgramHandle, ShaderError> {
    create_program(
        driver,
        bundle.stage(StageKind::Vertex),
        bundle.stage(StageKind::Fragment),
    )
}

/// Compiles both stages, links and validates them into one program.
///
/// Intermediate stage objects are deleted on every path. The returned
/// program belongs to the caller, who deletes it at shutdown.
pub fn create_program<D: Driver + ?Sized>(
    driver: &mut D,
    vertex: &str,
    fragment: &str,
) -> Result<ProgramHandle, ShaderError> {
    for &(kind, source) in &[(StageKind::Vertex, vertex), (StageKind::Fragment, fragment)] {
        if source.trim().is_empty() {
            error!("no {} shader source", kind);
            return Err(ShaderError::MissingStage(kind));
        }
    }

    let program = driver
        .create_program()
        .ok_or(ShaderError::Allocation("program"))?;

    let vs = match compile_stage(driver, StageKind::Vertex, vertex) {
        Ok(vs) => vs,
        Err(e) => {
            driver.delete_program(program);
            return Err(e);
        }
    };
    let fs = match compile_stage(driver, StageKind::Fragment, fragment) {
        Ok(fs) => fs,
        Err(e) => {
            driver.delete_shader(vs);
            driver.delete_program(program);
            return Err(e);
        }
    };

    driver.attach_shader(program, vs);
    driver.attach_shader(program, fs);
    info!("shaders attached to program {}", program);

    driver.link_program(program);
    let linked = driver.link_status(program);
    let validated = linked && {
        driver.validate_program(program);
        driver.validate_status(program)
    };

    driver.delete_shader(vs);
    driver.delete_shader(fs);

    if !validated {
        let log = driver.program_info_log(program);
        driver.delete_program(program);
        error!("program {} rejected\n{}", program, log.trim_end());
        return Err(if linked {
            ShaderError::Validate { log }
        } else {
            ShaderError::Link { log }
        });
    }

    info!("program {} linked and validated", program);
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::driver::mock::MockDriver;

    const VERTEX: &str = "layout(location = 0) in vec2 position;\nvoid main() {}\n";
    const FRAGMENT: &str = "layout(location = 0) out vec4 color;\nvoid main() {}\n";

    fn init_log() {
        let _ = env_logger::Builder::from_default_env()
            .is_test(true)
            .try_init();
    }

    #[test]
    fn builds_program_and_releases_stages() {
        init_log();
        let mut driver = MockDriver::new();
        let baseline = driver.live_shaders();

        let program = create_program(&mut driver, VERTEX, FRAGMENT).unwrap();

        assert_ne!(program.get(), 0);
        assert!(driver.link_status(program));
        assert!(driver.validate_status(program));
        assert_eq!(driver.shaders_created, 2);
        assert_eq!(driver.live_shaders(), baseline);
        assert_eq!(driver.live_programs(), 1);
    }

    #[test]
    fn builds_from_bundle() {
        let mut driver = MockDriver::new();
        let bundle = ShaderSourceBundle {
            vertex: VERTEX.to_owned(),
            fragment: FRAGMENT.to_owned(),
        };
        let program = build_program(&mut driver, &bundle).unwrap();
        assert!(driver.validate_status(program));
    }

    #[test]
    fn compile_failure_aborts_before_linking() {
        init_log();
        let mut driver = MockDriver::new();

        let err = create_program(&mut driver, VERTEX, "out vec4 color;\n").unwrap_err();

        match err {
            ShaderError::Compile { stage, log } => {
                assert_eq!(stage, StageKind::Fragment);
                assert!(!log.is_empty());
            }
            other => panic!("expected Compile, got {:?}", other),
        }
        assert_eq!(driver.live_shaders(), 0);
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn vertex_failure_skips_fragment() {
        let mut driver = MockDriver::new();
        let err = create_program(&mut driver, "garbage\n", FRAGMENT).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: StageKind::Vertex, .. }));
        assert_eq!(driver.shaders_created, 1);
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn empty_stage_is_missing() {
        let mut driver = MockDriver::new();
        let err = create_program(&mut driver, VERTEX, "  \n").unwrap_err();
        assert!(matches!(err, ShaderError::MissingStage(StageKind::Fragment)));
        assert_eq!(driver.shaders_created, 0);
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn exhausted_handles_fail_before_compiling() {
        let mut driver = MockDriver::new();
        driver.next_id = u32::MAX;
        let err = create_program(&mut driver, VERTEX, FRAGMENT).unwrap_err();
        assert!(matches!(err, ShaderError::Allocation("program")));
        assert_eq!(driver.shaders_created, 0);
    }

    #[test]
    fn link_failure_is_reported() {
        let mut driver = MockDriver::new();
        driver.fail_link = Some("ERROR: varying mismatch\n".to_owned());

        let err = create_program(&mut driver, VERTEX, FRAGMENT).unwrap_err();

        match err {
            ShaderError::Link { log } => assert_eq!(log, "ERROR: varying mismatch\n"),
            other => panic!("expected Link, got {:?}", other),
        }
        assert_eq!(driver.live_shaders(), 0);
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn validate_failure_is_reported() {
        let mut driver = MockDriver::new();
        driver.fail_validate = Some("program not executable in current state".to_owned());

        let err = create_program(&mut driver, VERTEX, FRAGMENT).unwrap_err();

        assert!(matches!(err, ShaderError::Validate { .. }));
        assert_eq!(driver.live_shaders(), 0);
        assert_eq!(driver.live_programs(), 0);
    }
}

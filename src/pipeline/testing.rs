//! Scripted stand-in for the CIVET toolchain, shared by pipeline tests.
//!
//! Geometric tools write a tetrahedron surface and advance a per-surface
//! stage; measurement tools write per-vertex values chosen by the script for
//! that stage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::error::ExtractionError;
use super::qc::polygon::tests::TETRAHEDRON;
use super::shell::{CommandOutput, CommandRunner, CommandStatus, ToolCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    MarchingCubes,
    Subsampled,
    Interpolated,
    Smoothed,
}

/// QC values reported for a stage. With the tetrahedron and curvature
/// `[0, c, 0, 0]`, mean(smtherr) = c / 2 and max(smtherr) = c.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StageQc {
    pub disterr: f32,
    pub curvature: f32,
}

impl StageQc {
    pub fn new(disterr: f32, curvature: f32) -> Self {
        Self { disterr, curvature }
    }
}

pub(crate) struct FakeCivet {
    pub marching_cubes: StageQc,
    pub subsampled: StageQc,
    pub interpolated: StageQc,
    pub smoothed: StageQc,
    /// Any command with an argument containing this substring exits 1.
    pub fail_on: Option<&'static str>,
    pub(crate) commands: Mutex<Vec<String>>,
    pub(crate) stages: Mutex<HashMap<PathBuf, Stage>>,
}

impl Default for FakeCivet {
    fn default() -> Self {
        Self {
            marching_cubes: StageQc::new(0.5, 0.4),
            subsampled: StageQc::new(0.4, 0.4),
            interpolated: StageQc::new(0.5, 0.2),
            smoothed: StageQc::new(0.5, 0.1),
            fail_on: None,
            commands: Mutex::new(Vec::new()),
            stages: Mutex::new(HashMap::new()),
        }
    }
}

impl FakeCivet {
    /// Every command line run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn commands_of(&self, program: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(program))
            .collect()
    }

    fn stage_of(&self, surface: &Path) -> Stage {
        *self
            .stages
            .lock()
            .unwrap()
            .get(surface)
            .expect("surface measured before it was created")
    }

    fn set_stage(&self, surface: &Path, stage: Stage) {
        self.stages.lock().unwrap().insert(surface.to_path_buf(), stage);
    }

    fn qc_for(&self, surface: &Path) -> StageQc {
        match self.stage_of(surface) {
            Stage::MarchingCubes => self.marching_cubes,
            Stage::Subsampled => self.subsampled,
            Stage::Interpolated => self.interpolated,
            Stage::Smoothed => self.smoothed,
        }
    }

    fn simulate(&self, command: &ToolCommand) -> std::io::Result<()> {
        let args: Vec<String> = (0..command.get_args().len())
            .filter_map(|i| command.arg_str(i))
            .collect();
        let last = PathBuf::from(args.last().cloned().unwrap_or_default());

        match command.program_name().as_str() {
            "sphere_mesh" => {
                std::fs::write(&last, TETRAHEDRON)?;
                let stage = if args.iter().any(|a| a == "-subsample") {
                    Stage::Subsampled
                } else {
                    Stage::MarchingCubes
                };
                self.set_stage(&last, stage);
            }
            "mincmorph" => {
                std::fs::copy(&args[args.len() - 2], &last)?;
            }
            "adapt_object_mesh" => {
                let surface = Path::new(&args[0]);
                if self.stage_of(surface) == Stage::Interpolated {
                    self.set_stage(surface, Stage::Smoothed);
                }
            }
            "interpolate_with_sphere" => {
                let surface = args
                    .iter()
                    .find(|a| !a.starts_with('-'))
                    .expect("interpolate_with_sphere without a surface");
                self.set_stage(Path::new(surface), Stage::Interpolated);
            }
            "chamfer.sh" => std::fs::write(&last, b"chamfer")?,
            "volume_object_evaluate" => {
                let qc = self.qc_for(Path::new(&args[2]));
                let d = qc.disterr;
                std::fs::write(&last, format!("{d}\n{}\n0\n0\n", -d / 2.0))?;
            }
            "depth_potential" if args[0] == "-mean_curvature" => {
                let c = self.qc_for(Path::new(&args[1])).curvature;
                std::fs::write(&last, format!("0\n{c}\n0\n0\n"))?;
            }
            "depth_potential" if args[0] == "-smooth" => {
                std::fs::copy(&args[2], &last)?;
            }
            other => panic!("unexpected tool {other}"),
        }
        Ok(())
    }
}

impl CommandRunner for FakeCivet {
    fn run(&self, command: &ToolCommand) -> Result<CommandOutput, ExtractionError> {
        self.commands.lock().unwrap().push(command.to_string());

        let fails = self.fail_on.is_some_and(|needle| {
            command
                .get_args()
                .iter()
                .any(|a| a.to_string_lossy().contains(needle))
        });
        if fails {
            return Ok(CommandOutput {
                status: CommandStatus::Exited(1),
                output: b"simulated failure\n".to_vec(),
            });
        }

        self.simulate(command)?;
        Ok(CommandOutput {
            status: CommandStatus::Exited(0),
            output: format!("{} ok\n", command.program_name()).into_bytes(),
        })
    }
}

/// Write a placeholder mask file.
pub(crate) fn write_mask(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"mask volume").unwrap();
}

use super::clip::{ClipPipeline, ClipReport, ClipStage, FailureReason};
use crate::{
    codec::{
        motion_npz::MotionNpzCodec,
        retargeted_npz::{output_file, RetargetedNpzWriter, OUTPUT_SUFFIX, REST_POSE_STEM},
    },
    error::{InputError, InputResult, PipelineError, PipelineResult, SinkError},
};
use log::{error, info, warn};
use retarget_utils::io::FileType;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Cloneable flag checked between clips. Cancelling never interrupts a clip
/// that is already running.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

fn is_motion_file(path: &Path) -> bool {
    FileType::from_path(path) == FileType::Npz
        && !path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.ends_with(OUTPUT_SUFFIX) || stem == REST_POSE_STEM)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> InputResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| InputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let path = entry
            .map_err(|source| InputError::Io {
                path: dir.to_path_buf(),
                source,
            })?
            .path();
        if path.is_dir() {
            walk(&path, found)?;
        } else if is_motion_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

/// A single ``.npz`` file, or every ``.npz`` below a directory in sorted
/// order. Files written by this crate (``*_retargeted.npz`` and
/// ``target_reference.npz``) are never picked up as inputs.
///
/// # Errors
/// ``Io`` when ``path`` does not exist or a directory cannot be listed
pub fn discover_inputs(path: &Path, limit: Option<usize>) -> InputResult<Vec<PathBuf>> {
    if !path.exists() {
        return Err(InputError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file or directory"),
        });
    }
    let mut found = Vec::new();
    if path.is_dir() {
        walk(path, &mut found)?;
        found.sort();
    } else {
        found.push(path.to_path_buf());
    }
    if let Some(limit) = limit {
        found.truncate(limit);
    }
    Ok(found)
}

#[derive(Clone, Debug)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
}

#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// not attempted because the batch was cancelled
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
    pub reports: Vec<ClipReport>,
}

impl BatchSummary {
    pub fn exit_code(&self) -> i32 {
        i32::from(self.failed > 0)
    }
}

enum Outcome {
    Done(ClipReport),
    Failed(PathBuf, ClipReport),
    Skipped,
}

fn clip_name(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("clip")
}

/// Runs one ``ClipPipeline`` over many files. Every file is loaded, retargeted
/// and written on its own, a failing file is logged and the batch carries on.
pub struct BatchRunner {
    pipeline: ClipPipeline,
    parallel_clips: bool,
    input_root: Option<PathBuf>,
}

impl BatchRunner {
    pub fn new(pipeline: ClipPipeline) -> Self {
        Self {
            pipeline,
            parallel_clips: true,
            input_root: None,
        }
    }
    #[must_use]
    pub fn with_parallel_clips(mut self, enabled: bool) -> Self {
        self.parallel_clips = enabled;
        self
    }
    /// Folder the inputs were discovered under. With an output folder, each
    /// output keeps the input's subfolder below ``root``.
    #[must_use]
    pub fn with_input_root(mut self, root: &Path) -> Self {
        self.input_root = Some(root.to_path_buf());
        self
    }
    pub fn pipeline(&self) -> &ClipPipeline {
        &self.pipeline
    }

    /// Folder the output of ``path`` is written to
    pub fn output_dir(&self, path: &Path, out_dir: Option<&Path>) -> PathBuf {
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let Some(out_dir) = out_dir else {
            return if parent.as_os_str().is_empty() {
                PathBuf::from(".")
            } else {
                parent.to_path_buf()
            };
        };
        self.input_root
            .as_deref()
            .and_then(|root| parent.strip_prefix(root).ok())
            .map_or_else(|| out_dir.to_path_buf(), |sub| out_dir.join(sub))
    }

    /// File the output of ``path`` is written to
    pub fn output_path(&self, path: &Path, out_dir: Option<&Path>) -> PathBuf {
        output_file(&self.output_dir(path, out_dir), clip_name(path))
    }

    /// Loads, retargets and writes one file, next to its input or into
    /// ``out_dir`` when given
    ///
    /// # Errors
    /// Any ``PipelineError`` of loading, retargeting or writing
    pub fn process_file(&self, path: &Path, out_dir: Option<&Path>) -> PipelineResult<ClipReport> {
        let options = self.pipeline.options();
        let clip = MotionNpzCodec::from_file(path, options.default_frame_rate)?;
        let dir = self.output_dir(path, out_dir);
        let mut writer = RetargetedNpzWriter::new(&dir)
            .with_joint_positions(options.write_joint_positions)
            .protecting(path);
        self.pipeline.run(&clip, &mut writer)
    }

    /// For every file whose output path was already claimed by an earlier
    /// file, the earlier file
    fn claimed_outputs(&self, files: &[PathBuf], out_dir: Option<&Path>) -> Vec<Option<(PathBuf, PathBuf)>> {
        let mut owners: HashMap<PathBuf, &PathBuf> = HashMap::new();
        files
            .iter()
            .map(|path| {
                let output = self.output_path(path, out_dir);
                match owners.get(&output) {
                    Some(first) => Some((output, (*first).clone())),
                    None => {
                        owners.insert(output, path);
                        None
                    }
                }
            })
            .collect()
    }

    fn process_one(
        &self,
        idx: usize,
        total: usize,
        path: &Path,
        out_dir: Option<&Path>,
        claimed: Option<&(PathBuf, PathBuf)>,
        cancel: &CancelToken,
    ) -> Outcome {
        if cancel.is_cancelled() {
            return Outcome::Skipped;
        }
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("?");
        info!("[{}/{total}] processing {name}", idx + 1);
        let result = match claimed {
            Some((output, first)) => Err(PipelineError::from(SinkError::DuplicateOutput {
                path: output.clone(),
                first: first.clone(),
            })),
            None => self.process_file(path, out_dir),
        };
        match result {
            Ok(report) => Outcome::Done(report),
            Err(err) => {
                match err.location() {
                    (Some(frame), Some(joint)) => error!("{name}: {err} (frame {frame}, joint {joint})"),
                    (Some(frame), None) => error!("{name}: {err} (frame {frame})"),
                    _ => error!("{name}: {err}"),
                }
                Outcome::Failed(path.to_path_buf(), ClipReport::failed(name, &err))
            }
        }
    }

    /// Processes ``files`` and writes one output each. Two files that would
    /// write the same output path are never both run: the later one fails
    /// with ``DuplicateOutput`` before any work starts.
    pub fn run(&self, files: &[PathBuf], out_dir: Option<&Path>, cancel: &CancelToken) -> BatchSummary {
        let total = files.len();
        let claimed = self.claimed_outputs(files, out_dir);
        let process = |(idx, path): (usize, &PathBuf)| self.process_one(idx, total, path, out_dir, claimed[idx].as_ref(), cancel);

        let outcomes: Vec<Outcome> = {
            #[cfg(feature = "parallel")]
            {
                if self.parallel_clips {
                    use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
                    files.par_iter().enumerate().map(process).collect()
                } else {
                    files.iter().enumerate().map(process).collect()
                }
            }
            #[cfg(not(feature = "parallel"))]
            {
                files.iter().enumerate().map(process).collect()
            }
        };

        let mut summary = BatchSummary::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Done(report) => {
                    summary.processed += 1;
                    summary.succeeded += 1;
                    summary.reports.push(report);
                }
                Outcome::Failed(path, report) => {
                    summary.processed += 1;
                    summary.failed += 1;
                    if let ClipStage::Failed(reason) = &report.stage {
                        summary.failures.push(BatchFailure {
                            path,
                            reason: reason.clone(),
                        });
                    }
                    summary.reports.push(report);
                }
                Outcome::Skipped => summary.skipped += 1,
            }
        }
        if summary.skipped > 0 {
            warn!("batch cancelled, {} file(s) skipped", summary.skipped);
        }
        info!(
            "batch done: {} processed, {} succeeded, {} failed, {} skipped",
            summary.processed, summary.succeeded, summary.failed, summary.skipped
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::retarget_options::RetargetOptions;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("retarget_core_batch_{}_{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn discovery_is_sorted_recursive_and_limited() {
        let dir = temp_dir("discover");
        std::fs::create_dir_all(dir.join("sub")).unwrap();
        for name in ["b.npz", "a.npz", "sub/c.npz", "notes.txt", "a_retargeted.npz", "target_reference.npz"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }
        let found = discover_inputs(&dir, None).unwrap();
        let names: Vec<&str> = found.iter().filter_map(|p| p.file_name()?.to_str()).collect();
        assert_eq!(names, ["a.npz", "b.npz", "c.npz"]);
        assert_eq!(discover_inputs(&dir, Some(2)).unwrap().len(), 2);
        assert_eq!(discover_inputs(&dir.join("a.npz"), None).unwrap().len(), 1);
        assert!(discover_inputs(&dir.join("missing"), None).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn output_paths_follow_the_input_root() {
        let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap());
        let input = Path::new("/data/amass/a/walk.npz");
        let out = Path::new("/out");
        assert_eq!(runner.output_path(input, None), PathBuf::from("/data/amass/a/walk_retargeted.npz"));
        assert_eq!(runner.output_path(input, Some(out)), PathBuf::from("/out/walk_retargeted.npz"));
        assert_eq!(runner.output_path(Path::new("walk.npz"), None), PathBuf::from("./walk_retargeted.npz"));

        let runner = runner.with_input_root(Path::new("/data/amass"));
        assert_eq!(runner.output_path(input, Some(out)), PathBuf::from("/out/a/walk_retargeted.npz"));
        assert_eq!(runner.output_path(Path::new("/elsewhere/walk.npz"), Some(out)), PathBuf::from("/out/walk_retargeted.npz"));
        assert_eq!(runner.output_path(input, None), PathBuf::from("/data/amass/a/walk_retargeted.npz"));
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancelled_batch_skips_everything() {
        let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap());
        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = runner.run(&[PathBuf::from("a.npz"), PathBuf::from("b.npz")], None, &cancel);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn unreadable_file_fails_without_stopping_the_batch() {
        let dir = temp_dir("broken");
        let broken = dir.join("broken.npz");
        std::fs::write(&broken, b"not an archive").unwrap();
        let runner = BatchRunner::new(ClipPipeline::smplh(None, RetargetOptions::default()).unwrap())
            .with_parallel_clips(false);
        let summary = runner.run(&[broken.clone(), dir.join("missing.npz")], None, &CancelToken::new());
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.failures[0].path, broken);
        assert_eq!(summary.exit_code(), 1);
        std::fs::remove_dir_all(&dir).ok();
    }
}

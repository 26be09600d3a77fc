use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use filetime::FileTime;
use tracing::{debug, info, warn};

use crate::config::SiteConfig;
use crate::pipeline::{RenderContext, RenderError};
use crate::queue::{Job, JobKind, JobQueue};
use crate::walker::TreeWalker;

const MAX_WORKERS: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Source directory not specified")]
    MissingSourceDir,
    #[error("Output directory not specified")]
    MissingOutputDir,
    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot start build worker: {0}")]
    WorkerSpawn(#[source] io::Error),
    #[error("{0} build worker(s) panicked")]
    WorkerPanicked(usize),
    #[error(transparent)]
    Setup(#[from] RenderError),
}

/// Why a single job was abandoned. Never aborts the build.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("copy {} -> {} failed: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("render {} failed: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: RenderError,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub copied: usize,
    pub rendered: usize,
    /// Files left alone because their output was already fresh
    pub skipped: usize,
    pub failed: usize,
}

impl BuildReport {
    /// Number of files written by this build.
    pub fn written(&self) -> usize {
        self.copied + self.rendered
    }
}

impl AddAssign for BuildReport {
    fn add_assign(&mut self, rhs: Self) {
        self.copied += rhs.copied;
        self.rendered += rhs.rendered;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

/// Detected processor count, clamped to `1..=128`.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS)
}

pub struct SiteBuilder {
    source_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    workers: usize,
    config: SiteConfig,
}

impl Default for SiteBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteBuilder {
    pub fn new() -> Self {
        Self {
            source_dir: None,
            output_dir: None,
            workers: default_workers(),
            config: SiteConfig::default(),
        }
    }

    pub fn source_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.source_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Worker thread count. Zero is treated as one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn site_config(mut self, config: SiteConfig) -> Self {
        self.config = config;
        self
    }

    /// Walks the source tree and processes every stale file on the worker
    /// pool. Returns once every worker has drained the queue.
    pub fn build(self) -> Result<BuildReport, BuildError> {
        let source_dir = self.source_dir.ok_or(BuildError::MissingSourceDir)?;
        let output_dir = self.output_dir.ok_or(BuildError::MissingOutputDir)?;

        fs::create_dir_all(&output_dir).map_err(|source| BuildError::OutputDir {
            path: output_dir.clone(),
            source,
        })?;

        let context = Arc::new(RenderContext::from_config(&source_dir, &self.config)?);
        let queue = Arc::new(JobQueue::new());

        info!(
            "Building {} into {} with {} worker(s)",
            source_dir.display(),
            output_dir.display(),
            self.workers
        );

        let pool = WorkerPool::spawn(self.workers, &queue, &context)?;

        let walker = TreeWalker::new(&source_dir, &output_dir);
        let stats = walker.walk(|job| {
            if let Err(rejected) = queue.push(job) {
                warn!("Dropping {}: {}", rejected.0.source.display(), rejected);
            }
        });
        queue.close();
        debug!(
            "Walk queued {} job(s), {} still pending, {} up to date",
            stats.jobs,
            queue.pending(),
            stats.skipped
        );

        let mut report = pool.join()?;
        report.skipped += stats.skipped;

        info!(
            "Built {}: {} rendered, {} copied, {} up to date, {} failed",
            output_dir.display(),
            report.rendered,
            report.copied,
            report.skipped,
            report.failed
        );
        Ok(report)
    }
}

/// Builds `source_dir` into `output_dir` with the given number of workers.
pub fn build_site(
    config: &SiteConfig,
    source_dir: &Path,
    output_dir: &Path,
    workers: usize,
) -> Result<BuildReport, BuildError> {
    SiteBuilder::new()
        .source_dir(source_dir)
        .output_dir(output_dir)
        .workers(workers)
        .site_config(config.clone())
        .build()
}

struct WorkerPool {
    handles: Vec<JoinHandle<BuildReport>>,
}

impl WorkerPool {
    fn spawn(count: usize, queue: &Arc<JobQueue>, context: &Arc<RenderContext>) -> Result<Self, BuildError> {
        let mut handles = Vec::with_capacity(count);

        for i in 0..count {
            let worker_queue = Arc::clone(queue);
            let worker_context = Arc::clone(context);
            let spawned = thread::Builder::new()
                .name(format!("huap-worker-{i}"))
                .spawn(move || run_worker(&worker_queue, &worker_context));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Release the workers already started before bailing out.
                    queue.close();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(BuildError::WorkerSpawn(e));
                }
            }
        }

        Ok(Self { handles })
    }

    fn join(self) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        let mut panicked = 0;

        for handle in self.handles {
            match handle.join() {
                Ok(stats) => report += stats,
                Err(_) => panicked += 1,
            }
        }

        if panicked > 0 {
            return Err(BuildError::WorkerPanicked(panicked));
        }
        Ok(report)
    }
}

fn run_worker(queue: &JobQueue, context: &RenderContext) -> BuildReport {
    let mut report = BuildReport::default();

    while let Some(job) = queue.pop() {
        match process(&job, context) {
            Ok(()) => {
                debug!("Wrote {}", job.destination.display());
                match job.kind {
                    JobKind::Copy => report.copied += 1,
                    JobKind::Render => report.rendered += 1,
                }
            }
            Err(e) => {
                warn!("{}", e);
                report.failed += 1;
            }
        }
    }

    report
}

fn process(job: &Job, context: &RenderContext) -> Result<(), JobError> {
    match job.kind {
        JobKind::Copy => copy_file(&job.source, &job.destination),
        JobKind::Render => {
            let page = context.render_file(&job.source).map_err(|source| JobError::Render {
                path: job.source.clone(),
                source,
            })?;
            let write_err = |source| JobError::Write {
                path: job.destination.clone(),
                source,
            };
            fs::write(&job.destination, page.as_bytes()).map_err(write_err)?;
            preserve_metadata(&job.source, &job.destination).map_err(write_err)
        }
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), JobError> {
    let copy_err = |source| JobError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    fs::copy(from, to).map_err(copy_err)?;
    preserve_metadata(from, to).map_err(copy_err)
}

/// Gives `to` the permission bits and access/modification times of `from`,
/// so later staleness checks compare against the source's own timestamp.
fn preserve_metadata(from: &Path, to: &Path) -> io::Result<()> {
    let meta = fs::metadata(from)?;
    fs::set_permissions(to, meta.permissions())?;
    filetime::set_file_times(
        to,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )
}

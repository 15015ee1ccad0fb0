//! Where pipeline units run.

/// One unit of pipeline work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs jobs, now or later, on this thread or another.
pub trait Spawner: Send + Sync {
    fn spawn(&self, job: Job);
}

/// Runs each job on the rayon global pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonSpawner;

impl Spawner for RayonSpawner {
    fn spawn(&self, job: Job) {
        rayon::spawn(job);
    }
}

/// Runs each job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct Inline;

impl Spawner for Inline {
    fn spawn(&self, job: Job) {
        job();
    }
}

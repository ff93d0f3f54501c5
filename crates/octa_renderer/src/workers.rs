//! Multi-threaded rendering by row ranges.
//!
//! A render runs in three phases: primary rays, critical pixel detection
//! and antialiasing. The primary and antialiasing phases start `threads`
//! workers on a rayon pool. Each worker claims `rowstep` rows at a time
//! from a shared cursor, renders them into its own [`RowBlock`], and hands
//! its blocks back when the cursor runs past the last row. Blocks are
//! applied to the image only after every worker has joined, so no two
//! workers ever write the same row.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use octa_core::RenderSettings;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{RenderError, RenderResult};
use crate::image::{CriticalMap, ImageBuffer, RowBlock};
use crate::scene::Scene;

/// The stages of a full render, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Primary,
    Critical,
    Antialias,
}

impl Phase {
    fn index(self) -> u64 {
        match self {
            Phase::Primary => 0,
            Phase::Critical => 1,
            Phase::Antialias => 2,
        }
    }
}

/// Lock a mutex, carrying on with the data if a worker panicked while
/// holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Last row each worker finished in the current phase.
///
/// Only for observers such as progress displays.
#[derive(Debug)]
pub struct RenderProgress {
    slots: Vec<Mutex<Option<u32>>>,
}

impl RenderProgress {
    pub fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn update(&self, worker: usize, row: u32) {
        if let Some(slot) = self.slots.get(worker) {
            *lock(slot) = Some(row);
        }
    }

    fn reset(&self) {
        for slot in &self.slots {
            *lock(slot) = None;
        }
    }

    /// One entry per worker; `None` until the worker finishes its first
    /// rows.
    pub fn snapshot(&self) -> Vec<Option<u32>> {
        self.slots.iter().map(|slot| *lock(slot)).collect()
    }
}

/// Clears the running flag when a phase ends, however it ends.
struct PhaseGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Fixed set of render workers.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    threads: usize,
    rowstep: u32,
    seed: u64,
    running: AtomicBool,
    progress: RenderProgress,
}

impl WorkerPool {
    pub fn new(threads: usize, rowstep: u32, seed: u64) -> RenderResult<Self> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("octa-worker-{}", i))
            .build()?;

        Ok(Self {
            pool,
            threads,
            rowstep: rowstep.max(1),
            seed,
            running: AtomicBool::new(false),
            progress: RenderProgress::new(threads),
        })
    }

    pub fn from_settings(settings: &RenderSettings) -> RenderResult<Self> {
        Self::new(settings.threads, settings.rowstep, settings.seed)
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn progress(&self) -> &RenderProgress {
        &self.progress
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the pool for one phase. A second request while a phase runs
    /// is dropped, not queued.
    fn begin_phase(&self, phase: Phase) -> RenderResult<PhaseGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("{:?} phase requested while another phase is running, ignoring", phase);
            return Err(RenderError::Busy);
        }
        Ok(PhaseGuard {
            running: &self.running,
        })
    }

    /// Run all three phases and return the finished image.
    pub fn render_all(&self, scene: &Scene) -> RenderResult<ImageBuffer> {
        let start = Instant::now();

        let mut image = self.render_primary(scene)?;
        let critical = self.find_critical(scene, &image)?;
        if scene.settings.aa_rays > 0 {
            self.render_antialias(scene, &mut image, &critical)?;
        }

        log::info!("Render finished in {:.2?}", start.elapsed());
        Ok(image)
    }

    /// Primary rays for every pixel.
    pub fn render_primary(&self, scene: &Scene) -> RenderResult<ImageBuffer> {
        let _guard = self.begin_phase(Phase::Primary)?;
        let start = Instant::now();
        log::info!(
            "Rendering {}x{} with {} threads",
            scene.width(),
            scene.height(),
            self.threads
        );

        let blocks = self.run_rows(scene.height(), Phase::Primary, |y, rows, rng| {
            scene.render_rows(y, rows, rng)
        });

        let mut image = ImageBuffer::new(scene.width(), scene.height());
        for block in &blocks {
            image.write_block(block);
        }

        log::info!("Primary pass done in {:.2?}", start.elapsed());
        Ok(image)
    }

    /// Mark the pixels that need antialiasing.
    pub fn find_critical(&self, scene: &Scene, image: &ImageBuffer) -> RenderResult<CriticalMap> {
        let _guard = self.begin_phase(Phase::Critical)?;
        let critical = scene.find_critical_pixels(image);
        log::info!(
            "{} of {} pixels are critical",
            critical.count(),
            image.pixels.len()
        );
        Ok(critical)
    }

    /// Add `aa_rays` samples to every critical pixel of `image`.
    pub fn render_antialias(
        &self,
        scene: &Scene,
        image: &mut ImageBuffer,
        critical: &CriticalMap,
    ) -> RenderResult<()> {
        let _guard = self.begin_phase(Phase::Antialias)?;
        let start = Instant::now();
        log::info!("Antialiasing with {} rays", scene.settings.aa_rays);

        let blocks = self.run_rows(scene.height(), Phase::Antialias, |y, rows, rng| {
            scene.render_rows_antialiased(y, rows, critical, rng)
        });
        for block in &blocks {
            image.merge_block(block);
        }

        log::info!("Antialiasing done in {:.2?}", start.elapsed());
        Ok(())
    }

    /// Workers claim rows from a shared cursor until none are left.
    fn run_rows<F>(&self, height: u32, phase: Phase, work: F) -> Vec<RowBlock>
    where
        F: Fn(u32, u32, &mut StdRng) -> RowBlock + Sync,
    {
        let cursor = Mutex::new(0u32);
        let finished = Mutex::new(Vec::new());
        let rowstep = self.rowstep;
        self.progress.reset();

        self.pool.scope(|s| {
            for id in 0..self.threads {
                let cursor = &cursor;
                let finished = &finished;
                let work = &work;

                s.spawn(move |_| {
                    let mut rng = worker_rng(self.seed, phase, id);
                    let mut blocks = Vec::new();

                    loop {
                        let start = {
                            let mut next = lock(cursor);
                            if *next >= height {
                                break;
                            }
                            let start = *next;
                            *next = next.saturating_add(rowstep);
                            start
                        };

                        let block = work(start, rowstep, &mut rng);
                        self.progress.update(id, start + block.rows());
                        blocks.push(block);
                    }

                    log::debug!("Worker {} finished {} blocks", id, blocks.len());
                    lock(finished).extend(blocks);
                });
            }
        });

        finished.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-worker generator, distinct for every seed, phase and worker.
fn worker_rng(seed: u64, phase: Phase, worker: usize) -> StdRng {
    let stream = (phase.index() << 32) | worker as u64;
    StdRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraDesc;
    use crate::image::Pixel;
    use crate::scene::{ObjectDesc, SceneDescription};
    use octa_core::{Color, MaterialDesc};
    use octa_math::Vec3;

    /// Unlit white sphere on black; fully deterministic.
    fn sphere_scene(width: u32, height: u32, aa_rays: u32) -> Scene {
        let mut settings = RenderSettings::default()
            .with_size(width, height)
            .with_aa_rays(aa_rays);
        settings.no_lighting = true;

        SceneDescription::new(CameraDesc {
            origin: Vec3::new(0.0, 0.0, 4.0),
            ..Default::default()
        })
        .with_settings(settings)
        .with_material(MaterialDesc::uniform("white", Color::ONE))
        .with_object(ObjectDesc::sphere(Vec3::ZERO, 1.0, "white"))
        .prepare()
        .unwrap()
    }

    #[test]
    fn test_rows_covered_exactly_once() {
        let height = 17;
        for threads in 1..=5 {
            for rowstep in [1, 3, 6, 40] {
                let pool = WorkerPool::new(threads, rowstep, 42).unwrap();
                let blocks = pool.run_rows(height, Phase::Primary, |y, rows, _| {
                    let rows = rows.min(height - y);
                    RowBlock::new(y, 2, rows, Pixel::new(Color::ONE))
                });

                let mut seen = vec![0; height as usize];
                for block in &blocks {
                    for row in block.y_offset..block.y_offset + block.rows() {
                        seen[row as usize] += 1;
                    }
                }
                assert!(
                    seen.iter().all(|&n| n == 1),
                    "threads {} rowstep {}: {:?}",
                    threads,
                    rowstep,
                    seen
                );
            }
        }
    }

    #[test]
    fn test_parallel_matches_serial() {
        let _ = env_logger::builder().is_test(true).try_init();
        let scene = sphere_scene(24, 18, 4);
        let mut rng = StdRng::seed_from_u64(42);

        let mut serial = ImageBuffer::new(24, 18);
        serial.write_block(&scene.render_rows(0, 18, &mut rng));
        let critical = scene.find_critical_pixels(&serial);
        assert!(critical.count() > 0);
        serial.merge_block(&scene.render_rows_antialiased(0, 18, &critical, &mut rng));

        for threads in 1..=4 {
            let pool = WorkerPool::new(threads, 5, 7).unwrap();
            let image = pool.render_all(&scene).unwrap();
            assert_eq!(image, serial, "threads {}", threads);
        }
    }

    #[test]
    fn test_no_antialiasing_without_rays() {
        let scene = sphere_scene(16, 16, 0);
        let pool = WorkerPool::new(2, 4, 0).unwrap();
        let image = pool.render_all(&scene).unwrap();

        assert!(image.pixels.iter().all(|p| p.samples == 1));
        assert_eq!(image.color(8, 8), Color::ONE);
        assert_eq!(image.color(0, 0), Color::ZERO);
    }

    #[test]
    fn test_second_phase_refused_while_running() {
        let scene = sphere_scene(8, 8, 0);
        let pool = WorkerPool::new(2, 2, 0).unwrap();

        {
            let _guard = pool.begin_phase(Phase::Primary).unwrap();
            assert!(pool.is_running());
            assert!(matches!(pool.render_primary(&scene), Err(RenderError::Busy)));
            assert!(matches!(pool.begin_phase(Phase::Antialias), Err(RenderError::Busy)));
        }

        assert!(!pool.is_running());
        assert!(pool.render_primary(&scene).is_ok());
        assert!(!pool.is_running());
    }

    #[test]
    fn test_progress() {
        let scene = sphere_scene(8, 10, 0);
        let pool = WorkerPool::new(3, 4, 0).unwrap();
        assert_eq!(pool.progress().snapshot(), vec![None; 3]);

        pool.render_primary(&scene).unwrap();
        let done = pool.progress().snapshot();
        assert_eq!(done.len(), 3);
        // Whoever took the last block reached the bottom
        assert!(done.iter().flatten().any(|&row| row == 10));
    }

    #[test]
    fn test_worker_rngs_differ() {
        use rand::RngCore;

        let a = worker_rng(1, Phase::Primary, 0).next_u64();
        let b = worker_rng(1, Phase::Primary, 1).next_u64();
        let c = worker_rng(1, Phase::Antialias, 0).next_u64();
        let d = worker_rng(2, Phase::Primary, 0).next_u64();
        assert!(a != b && a != c && a != d);
        assert_eq!(a, worker_rng(1, Phase::Primary, 0).next_u64());
    }
}

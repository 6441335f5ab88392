//! # Chunk Scheduler
//!
//! Drives every chunk from request to screen, one step per tick.
//!
//! ## Per-Chunk State Machine
//!
//! ```text
//! Requested ──► HeightmapPending ──► MeshPending ──► Placed
//!     │               │                   │
//!     └── destroy / superseded: token cancelled, result discarded
//! ```
//!
//! ## Tick Phases
//!
//! 1. **Generation**: dequeue requests (up to the per-tick budget), start
//!    or skip their pipelines, issue a placement ticket for each.
//! 2. **Hand-off** (only once the generation queue is empty): move queued
//!    tickets to the active placement list, which drains the placement
//!    queue and releases a waiting batch. Active tickets keep waiting on
//!    their own pipelines, so a stalled chunk holds back nothing else.
//! 3. **Pipelines**: poll heightmap jobs, start meshes for finished ones.
//! 4. **Placement**: every ticket whose mesh has both flags set gets a
//!    pool slot and is pushed to the backend.
//!
//! ## Versioning
//!
//! Each launched pipeline gets a fresh generation number, stored on the
//! node. Tickets and results carry the number they were issued for and are
//! dropped on mismatch, so a superseded build can never be shown.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use horizon_core::{
    CancellationToken, ChunkCoord, ChunkObjectPool, ChunkStore, LodLevel, PoolError, WorkerPool,
};
use horizon_procedural::{
    ErodedFractalField, Heightmap, HeightmapGenerator, HeightmapJob, HeightmapOutcome, MeshArtifact,
    MeshBuilder, NoiseField,
};

use crate::backend::RenderBackend;
use crate::config::StreamingConfig;
use crate::error::StreamingResult;

/// One chunk the planner wants, at one LOD.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkRequest {
    /// Chunk coordinate.
    pub coord: ChunkCoord,
    /// Requested level of detail.
    pub lod: LodLevel,
}

impl ChunkRequest {
    /// Creates a request.
    #[inline]
    #[must_use]
    pub const fn new(coord: ChunkCoord, lod: LodLevel) -> Self {
        Self { coord, lod }
    }
}

/// Cached state of one chunk.
#[derive(Debug, Default)]
pub struct ChunkNode {
    lod: Option<LodLevel>,
    generation: u64,
    heightmap: Option<Arc<Heightmap>>,
    mesh: Option<MeshArtifact>,
}

impl ChunkNode {
    /// LOD last requested for this chunk.
    #[must_use]
    pub const fn lod(&self) -> Option<LodLevel> {
        self.lod
    }

    /// Generation number of the newest pipeline launched for this chunk.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Cached heightmap, if generated.
    #[must_use]
    pub fn heightmap(&self) -> Option<&Arc<Heightmap>> {
        self.heightmap.as_ref()
    }

    /// Current mesh, finished or building.
    #[must_use]
    pub fn mesh(&self) -> Option<&MeshArtifact> {
        self.mesh.as_ref()
    }

    /// Drops the cached artifacts and cancels any build still feeding them.
    fn release_artifacts(&mut self) {
        if let Some(mesh) = self.mesh.take() {
            mesh.release();
        }
        self.heightmap = None;
    }
}

/// Counters for everything the scheduler decided.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Pipelines launched.
    pub generated: u64,
    /// Chunks pushed to the backend.
    pub placed: u64,
    /// Pool slots freed by `destroy`.
    pub released: u64,
    /// Placements dropped because every slot was busy.
    pub pool_exhausted: u64,
    /// Results or tickets dropped for a superseded generation.
    pub stale_results: u64,
    /// Pipelines cancelled by `destroy` or supersession.
    pub cancelled: u64,
    /// Requests served from the cached mesh.
    pub regenerations_skipped: u64,
    /// Idle nodes removed from the store.
    pub nodes_pruned: u64,
    /// Background jobs that died without reporting.
    pub lost_tasks: u64,
}

/// A queued generation request.
#[derive(Clone, Copy, Debug)]
struct GenerationTask {
    coord: ChunkCoord,
    lod: LodLevel,
}

/// A placement waiting for its mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PlacementTicket {
    coord: ChunkCoord,
    generation: u64,
}

enum Stage {
    Heightmap(HeightmapJob),
    Mesh(MeshArtifact),
}

/// One in-flight heightmap → mesh chain.
struct Pipeline {
    lod: LodLevel,
    generation: u64,
    token: CancellationToken,
    stage: Stage,
}

/// What happened to a ticket this tick.
enum PlacementStep {
    Waiting,
    Placed,
    Dropped,
}

/// Runs chunk pipelines and places their results into pooled slots.
///
/// # Thread Safety
///
/// The scheduler is NOT thread-safe. All methods run on the tick thread;
/// only the compute kernels run on workers.
pub struct ChunkScheduler<B: RenderBackend> {
    config: StreamingConfig,
    backend: B,
    pool: ChunkObjectPool<B::Handle>,
    store: ChunkStore<ChunkNode>,
    workers: WorkerPool,
    heightmaps: HeightmapGenerator,
    meshes: MeshBuilder,
    generation_queue: VecDeque<GenerationTask>,
    placement_queue: VecDeque<PlacementTicket>,
    placements: Vec<PlacementTicket>,
    pipelines: HashMap<ChunkCoord, Pipeline>,
    pending_batch: Option<Vec<ChunkRequest>>,
    next_generation: u64,
    stats: SchedulerStats,
}

impl<B: RenderBackend> ChunkScheduler<B> {
    /// Creates a scheduler with threaded workers and the configured
    /// eroded-fractal terrain.
    ///
    /// # Errors
    ///
    /// Invalid configuration, or workers that fail to start.
    pub fn new(config: StreamingConfig, backend: B) -> StreamingResult<Self> {
        config.validate()?;
        let workers = WorkerPool::new(config.worker_threads)?;
        let field = Arc::new(ErodedFractalField::with_params(
            config.noise.world_seed(),
            config.noise.erosion(),
        ));
        Self::with_parts(config, backend, workers, field)
    }

    /// Creates a scheduler from explicit parts.
    ///
    /// # Errors
    ///
    /// [`crate::StreamingError::InvalidConfig`] if `config` does not validate.
    pub fn with_parts(
        config: StreamingConfig,
        mut backend: B,
        workers: WorkerPool,
        field: Arc<dyn NoiseField>,
    ) -> StreamingResult<Self> {
        config.validate()?;

        let capacity = config.pool_capacity();
        let pool = ChunkObjectPool::with_capacity(capacity, |index| {
            let handle = backend.instantiate_render_slot(index);
            backend.set_active(&handle, false);
            handle
        });

        tracing::info!(
            capacity,
            max_lod = config.max_lod,
            inline = workers.is_inline(),
            "chunk object pool created"
        );

        let heightmaps = HeightmapGenerator::new(field, config.chunk_size, config.noise.resolution_adjustment);
        let meshes = MeshBuilder::new(workers.clone());

        Ok(Self {
            config,
            backend,
            pool,
            store: ChunkStore::new(),
            workers,
            heightmaps,
            meshes,
            generation_queue: VecDeque::new(),
            placement_queue: VecDeque::new(),
            placements: Vec::new(),
            pipelines: HashMap::new(),
            pending_batch: None,
            next_generation: 1,
            stats: SchedulerStats::default(),
        })
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Queues one chunk for generation.
    pub fn request(&mut self, request: ChunkRequest) {
        self.generation_queue.push_back(GenerationTask {
            coord: request.coord,
            lod: request.lod,
        });
    }

    /// Replaces the outstanding work with `batch`.
    ///
    /// Clears the generation queue. The batch is queued right away if the
    /// placement queue is empty; otherwise it waits for the next hand-off,
    /// so no ticket of the batch is queued behind an older one. A newer
    /// batch replaces a waiting one.
    pub fn generate_batch(&mut self, batch: Vec<ChunkRequest>) {
        self.generation_queue.clear();

        if self.placement_queue.is_empty() {
            tracing::debug!(chunks = batch.len(), "batch queued");
            self.enqueue_batch(batch);
        } else {
            tracing::debug!(
                chunks = batch.len(),
                queued = self.placement_queue.len(),
                active = self.placements.len(),
                "batch waiting for placements to drain"
            );
            self.pending_batch = Some(batch);
        }
    }

    /// Withdraws a chunk: drops its queued work, cancels its pipeline and
    /// frees its pool slot.
    ///
    /// # Errors
    ///
    /// [`PoolError::StaleMatch`] if no slot showed the chunk. Everything
    /// else has still been cleaned up.
    pub fn destroy(&mut self, coord: ChunkCoord) -> StreamingResult<()> {
        self.generation_queue.retain(|task| task.coord != coord);
        self.placement_queue.retain(|ticket| ticket.coord != coord);
        self.placements.retain(|ticket| ticket.coord != coord);

        if let Some(pipeline) = self.pipelines.remove(&coord) {
            pipeline.token.cancel();
            self.stats.cancelled += 1;

            if let Some(node) = self.store.node_mut(coord) {
                if node.mesh.as_ref().is_some_and(|mesh| !mesh.is_complete()) {
                    node.release_artifacts();
                }
            }
        }

        match self.pool.release(coord) {
            Ok(slot) => {
                if let Some(handle) = self.pool.handle(slot) {
                    self.backend.set_active(handle, false);
                }
                self.stats.released += 1;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%coord, "{err}");
                Err(err.into())
            }
        }
    }

    /// Removes idle nodes farther than `radius` chunks from `center`.
    ///
    /// Nodes with queued work, a running pipeline or a pool slot are kept.
    pub fn prune_nodes(&mut self, center: ChunkCoord, radius: u32) -> usize {
        let busy: HashSet<ChunkCoord> = self
            .generation_queue
            .iter()
            .map(|task| task.coord)
            .chain(self.placement_queue.iter().map(|ticket| ticket.coord))
            .chain(self.placements.iter().map(|ticket| ticket.coord))
            .chain(self.pipelines.keys().copied())
            .chain(self.pool.occupied().map(|(_, coord, _)| coord))
            .collect();

        let pruned = self.store.evict_where(|coord, node| {
            let evict = coord.chebyshev_distance(center) > radius && !busy.contains(&coord);
            if evict {
                if let Some(mesh) = &node.mesh {
                    mesh.release();
                }
            }
            evict
        });

        if pruned > 0 {
            tracing::debug!(pruned, %center, radius, remaining = self.store.len(), "pruned chunk nodes");
        }
        self.stats.nodes_pruned += pruned as u64;
        pruned
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Advances every queue and pipeline by one step. Never blocks.
    pub fn tick(&mut self) {
        self.process_generation_queue();

        if self.generation_queue.is_empty() {
            self.placements.extend(self.placement_queue.drain(..));

            if let Some(batch) = self.pending_batch.take() {
                tracing::debug!(chunks = batch.len(), waiting = self.placements.len(), "waiting batch queued");
                self.enqueue_batch(batch);
            }
        }

        self.advance_pipelines();
        self.advance_placements();
    }

    fn placements_drained(&self) -> bool {
        self.placement_queue.is_empty() && self.placements.is_empty()
    }

    fn enqueue_batch(&mut self, batch: Vec<ChunkRequest>) {
        self.generation_queue.extend(batch.into_iter().map(|request| GenerationTask {
            coord: request.coord,
            lod: request.lod,
        }));
    }

    fn process_generation_queue(&mut self) {
        let budget = self.config.max_generation_per_tick.unwrap_or(usize::MAX);

        for _ in 0..budget {
            let Some(task) = self.generation_queue.pop_front() else {
                break;
            };
            self.process_generation_task(task);
        }
    }

    fn process_generation_task(&mut self, task: GenerationTask) {
        let GenerationTask { coord, lod } = task;
        let node = self.store.locate_mut(coord);

        let in_flight = self.pipelines.get(&coord).is_some_and(|pipeline| pipeline.lod == lod);
        let reusable = node.lod == Some(lod)
            && (in_flight
                || node
                    .mesh
                    .as_ref()
                    .is_some_and(|mesh| !mesh.is_cancelled() && !mesh.is_failed()));

        if reusable {
            self.stats.regenerations_skipped += 1;
        } else {
            if let Some(previous) = self.pipelines.remove(&coord) {
                previous.token.cancel();
                self.stats.cancelled += 1;
            }
            node.release_artifacts();

            let generation = self.next_generation;
            self.next_generation += 1;
            node.generation = generation;

            let token = CancellationToken::new();
            let job = self.heightmaps.generate(&self.workers, coord, lod.scale(), token.clone());
            self.pipelines.insert(
                coord,
                Pipeline {
                    lod,
                    generation,
                    token,
                    stage: Stage::Heightmap(job),
                },
            );
            self.stats.generated += 1;
        }

        node.lod = Some(lod);
        self.placement_queue.push_back(PlacementTicket {
            coord,
            generation: node.generation,
        });
    }

    fn advance_pipelines(&mut self) {
        let mut finished = Vec::new();
        let mut failed = Vec::new();
        let mut ready = Vec::new();

        for (&coord, pipeline) in &mut self.pipelines {
            match &mut pipeline.stage {
                Stage::Heightmap(job) => {
                    if job.next() == Some(false) {
                        continue;
                    }
                    match job.take_outcome() {
                        Some(HeightmapOutcome::Ready(heightmap)) => ready.push((coord, heightmap)),
                        Some(HeightmapOutcome::Cancelled) => {
                            tracing::debug!(%coord, "heightmap cancelled");
                            finished.push(coord);
                        }
                        Some(HeightmapOutcome::Lost) | None => {
                            tracing::warn!(%coord, "heightmap job lost");
                            self.stats.lost_tasks += 1;
                            finished.push(coord);
                        }
                    }
                }
                Stage::Mesh(artifact) => {
                    if artifact.is_failed() {
                        tracing::warn!(%coord, "mesh job lost");
                        self.stats.lost_tasks += 1;
                        failed.push(coord);
                    } else if artifact.is_complete() || artifact.is_cancelled() {
                        finished.push(coord);
                    }
                }
            }
        }

        for coord in finished {
            self.pipelines.remove(&coord);
        }
        for coord in failed {
            self.pipelines.remove(&coord);
            if let Some(node) = self.store.node_mut(coord) {
                node.release_artifacts();
            }
        }
        for (coord, heightmap) in ready {
            self.start_mesh(coord, heightmap);
        }
    }

    fn start_mesh(&mut self, coord: ChunkCoord, heightmap: Arc<Heightmap>) {
        let Some(pipeline) = self.pipelines.get_mut(&coord) else {
            return;
        };

        let current = self
            .store
            .node_mut(coord)
            .filter(|node| node.generation == pipeline.generation && !pipeline.token.is_cancelled());
        let Some(node) = current else {
            tracing::debug!(%coord, "stale heightmap dropped");
            self.stats.stale_results += 1;
            self.pipelines.remove(&coord);
            return;
        };

        let scale = pipeline.lod.scale();
        let chunk_size = self.config.chunk_size;
        let size = [chunk_size * scale.x as f32, chunk_size * scale.y as f32];

        node.heightmap = Some(Arc::clone(&heightmap));
        let artifact = self.meshes.build(
            heightmap,
            size,
            scale,
            self.config.height_scale,
            pipeline.token.clone(),
        );
        node.mesh = Some(artifact.clone());

        if artifact.is_complete() {
            self.pipelines.remove(&coord);
        } else {
            pipeline.stage = Stage::Mesh(artifact);
        }
    }

    fn advance_placements(&mut self) {
        let tickets = std::mem::take(&mut self.placements);
        for ticket in tickets {
            if let PlacementStep::Waiting = self.try_place(ticket) {
                self.placements.push(ticket);
            }
        }
    }

    fn try_place(&mut self, ticket: PlacementTicket) -> PlacementStep {
        let PlacementTicket { coord, generation } = ticket;

        let Some(node) = self.store.node_mut(coord) else {
            return PlacementStep::Dropped;
        };

        if node.generation != generation {
            tracing::debug!(%coord, generation, current = node.generation, "stale placement dropped");
            self.stats.stale_results += 1;
            return PlacementStep::Dropped;
        }

        let Some(mesh) = node.mesh.clone() else {
            if self.pipelines.contains_key(&coord) {
                return PlacementStep::Waiting;
            }
            tracing::debug!(%coord, "placement has no mesh to show");
            return PlacementStep::Dropped;
        };

        if mesh.is_cancelled() || mesh.is_failed() {
            return PlacementStep::Dropped;
        }
        if !mesh.is_complete() {
            return PlacementStep::Waiting;
        }
        let Some(geometry) = mesh.geometry() else {
            return PlacementStep::Dropped;
        };

        let slot = match self.pool.acquire(coord) {
            Ok(slot) => slot,
            Err(err @ PoolError::Exhausted { .. }) => {
                tracing::warn!(%coord, "{err}");
                self.stats.pool_exhausted += 1;
                node.release_artifacts();
                return PlacementStep::Dropped;
            }
            Err(err) => {
                tracing::warn!(%coord, "{err}");
                return PlacementStep::Dropped;
            }
        };
        let Some(handle) = self.pool.handle(slot) else {
            return PlacementStep::Dropped;
        };

        self.backend.set_active(handle, true);
        if mesh.scale().is_finest() {
            self.backend.set_collision_enabled(handle, true);
            if let Some(shape) = mesh.collision() {
                self.backend.set_collision_shape(handle, shape);
            }
        } else {
            self.backend.set_collision_enabled(handle, false);
        }
        self.backend.assign_mesh(handle, geometry);
        self.backend
            .set_world_position(handle, coord.world_origin(self.config.chunk_size));
        self.backend.set_label(handle, &coord.to_string());

        self.stats.placed += 1;
        PlacementStep::Placed
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// The render backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The render backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The render slot pool.
    #[must_use]
    pub const fn pool(&self) -> &ChunkObjectPool<B::Handle> {
        &self.pool
    }

    /// The chunk store.
    #[must_use]
    pub const fn store(&self) -> &ChunkStore<ChunkNode> {
        &self.store
    }

    /// Cached state of one chunk.
    #[must_use]
    pub fn node(&self, coord: ChunkCoord) -> Option<&ChunkNode> {
        self.store.node(coord)
    }

    /// The worker pool.
    #[must_use]
    pub const fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Requests not yet started.
    #[must_use]
    pub fn queued_generations(&self) -> usize {
        self.generation_queue.len()
    }

    /// Tickets queued plus tickets waiting for their mesh.
    #[must_use]
    pub fn outstanding_placements(&self) -> usize {
        self.placement_queue.len() + self.placements.len()
    }

    /// Pipelines still computing.
    #[must_use]
    pub fn pipelines_in_flight(&self) -> usize {
        self.pipelines.len()
    }

    /// True while a batch waits for placements to drain.
    #[must_use]
    pub const fn has_pending_batch(&self) -> bool {
        self.pending_batch.is_some()
    }

    /// True when nothing is queued, waiting or computing.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.generation_queue.is_empty()
            && self.placements_drained()
            && self.pipelines.is_empty()
            && self.pending_batch.is_none()
    }
}

//! Editing session orchestration.
//!
//! One [`EditorSession`] walks an ordered photo collection. Each photo is
//! resolved into a working copy, edited through committed transforms and a
//! filter choice, then committed: the shareable preview is produced
//! synchronously, the print master is queued for later, and both leave as
//! patches through the caller's [`RecordStore`]. Between photos the session
//! crossfades, keeping the outgoing frame alive until the fade completes.
//!
//! State machine:
//! `Idle -> Resolving -> Ready -> Committing -> Switching -> Crossfading`
//! back to `Ready`, or to `Done` after the last photo.

mod resolve;
mod store;
mod transition;

pub use resolve::WorkingCopyResolver;
pub use store::{MemoryStore, RecordStore, StoreError};
pub use transition::{Crossfade, CrossfadeFrame, CrossfadeOpacity, TransitionState};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::compositor::{FilterCompositor, RenderCanvas, SoftwareCanvas};
use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::export::ExportPipeline;
use crate::filters;
use crate::geometry;
use crate::gesture::SurfaceGeometry;
use crate::queue::ExportQueue;
use crate::types::{
    CropRect, EditPatch, EditState, ExportArtifact, OutputArtifacts, PhotoEdits, PhotoRecord,
    SourceAsset, Transform, Viewport, WorkingCopy,
};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Resolving,
    Ready,
    Committing,
    Switching,
    Crossfading,
    Done,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Resolving => "resolving",
            SessionState::Ready => "ready",
            SessionState::Committing => "committing",
            SessionState::Switching => "switching",
            SessionState::Crossfading => "crossfading",
            SessionState::Done => "done",
        }
    }
}

/// Drives one editing pass over a photo collection.
pub struct EditorSession {
    config: Config,
    photos: Vec<PhotoRecord>,
    current: usize,
    state: SessionState,
    /// Per-photo edit state, keyed by asset id. Survives photo switches so
    /// revisited photos restore exactly what was left behind.
    edits: HashMap<String, EditState>,
    current_copy: Option<WorkingCopy>,
    transition: TransitionState,
    resolver: WorkingCopyResolver,
    exporter: ExportPipeline,
    compositor: Arc<FilterCompositor>,
    queue: ExportQueue,
    store: Arc<dyn RecordStore>,
    ui_persist: mpsc::Sender<(String, EditPatch)>,
}

impl EditorSession {
    /// Session with the default CPU render canvas.
    pub fn new(config: Config, photos: Vec<PhotoRecord>, store: Arc<dyn RecordStore>) -> Self {
        Self::with_canvas(config, photos, store, Arc::new(SoftwareCanvas))
    }

    /// Session baking filters through a caller-supplied render surface.
    pub fn with_canvas(
        config: Config,
        photos: Vec<PhotoRecord>,
        store: Arc<dyn RecordStore>,
        canvas: Arc<dyn RenderCanvas>,
    ) -> Self {
        let resolver = WorkingCopyResolver::new(&config);
        let exporter = ExportPipeline::new(&config);
        let compositor = Arc::new(FilterCompositor::with_canvas(
            config.compositor.clone(),
            canvas,
        ));
        let ui_persist = store::spawn_ui_persist(
            Arc::clone(&store),
            Duration::from_millis(config.editor.ui_debounce_ms),
        );
        Self {
            config,
            photos,
            current: 0,
            state: SessionState::Idle,
            edits: HashMap::new(),
            current_copy: None,
            transition: TransitionState::Idle,
            resolver,
            exporter,
            compositor,
            queue: ExportQueue::new(),
            store,
            ui_persist,
        }
    }

    /// Open the first photo. An empty collection finishes immediately.
    pub async fn start(&mut self) -> Result<()> {
        if self.photos.is_empty() {
            tracing::debug!("empty collection, nothing to edit");
            self.state = SessionState::Done;
            return Ok(());
        }
        self.open(0).await
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn current_record(&self) -> Option<&PhotoRecord> {
        self.photos.get(self.current)
    }

    /// Edit state of the current photo, if it has been opened.
    pub fn current_edit(&self) -> Option<&EditState> {
        let record = self.photos.get(self.current)?;
        self.edits.get(&record.asset.id)
    }

    pub fn working_copy(&self) -> Option<&WorkingCopy> {
        self.current_copy.as_ref()
    }

    /// Crossfade frames, when a switch is in progress.
    pub fn transition(&self) -> &TransitionState {
        &self.transition
    }

    /// The deferred export queue (pause, resume, clear).
    pub fn queue(&self) -> &ExportQueue {
        &self.queue
    }

    /// Geometry for a gesture surface over the current working copy.
    pub fn surface_geometry(&self) -> Option<SurfaceGeometry> {
        self.current_copy
            .as_ref()
            .map(|copy| SurfaceGeometry::for_working_copy(copy, &self.config.editor))
    }

    /// Record a committed transform from the gesture surface.
    ///
    /// The transform is clamped against the current working copy's geometry
    /// and persisted through the debounced write-behind path.
    pub fn apply_transform(&mut self, transform: Transform) -> Result<()> {
        self.ensure_ready("apply a transform")?;
        let Some(surface) = self.surface_geometry() else {
            return Err(SessionError::InvalidState {
                operation: "apply a transform",
                state: "resolving",
            }
            .into());
        };
        let clamped = surface.clamp(transform);
        let id = self.current_asset_id();
        let entry = self.edits.entry(id.clone()).or_default();
        entry.transform = clamped;
        self.persist_ui_state(&id);
        Ok(())
    }

    /// Choose a filter from the built-in catalog for the current photo.
    pub fn select_filter(&mut self, filter_id: &str) -> Result<()> {
        self.ensure_ready("select a filter")?;
        if filters::find(filter_id).is_none() {
            return Err(SessionError::UnknownFilter {
                id: filter_id.to_string(),
            }
            .into());
        }
        let id = self.current_asset_id();
        let entry = self.edits.entry(id.clone()).or_default();
        entry.filter_id = filter_id.to_string();
        self.persist_ui_state(&id);
        Ok(())
    }

    /// Commit the current photo and move on.
    ///
    /// The synchronous half exports the preview, bakes the filter if one is
    /// selected, patches the record, and enqueues the print job. On success
    /// the session crossfades to the next photo and lands in `Ready`, or in
    /// `Done` after the last one. On failure the photo stays open in `Ready`
    /// so the caller can retry.
    pub async fn commit_and_advance(&mut self) -> Result<SessionState> {
        self.ensure_ready("commit")?;
        self.state = SessionState::Committing;
        if let Err(e) = self.commit_current().await {
            self.state = SessionState::Ready;
            return Err(e);
        }

        let next = self.current + 1;
        if next >= self.photos.len() {
            tracing::debug!("last photo committed, session done");
            self.state = SessionState::Done;
            return Ok(self.state);
        }
        self.switch_to(next).await;
        Ok(self.state)
    }

    /// Wait for the deferred export queue to drain.
    pub async fn wait_for_exports(&self) {
        self.queue.wait_idle().await;
    }

    // ── Internals ──

    async fn open(&mut self, index: usize) -> Result<()> {
        if index >= self.photos.len() {
            return Err(SessionError::OutOfRange {
                index,
                len: self.photos.len(),
            }
            .into());
        }
        self.state = SessionState::Resolving;
        self.current = index;
        let record = self.photos[index].clone();
        tracing::debug!("opening photo {} ({})", index, record.asset.id);

        let copy = self.resolver.resolve(&record.asset).await;
        // First visit restores saved edits verbatim; in-session edits win on
        // revisits.
        self.edits.entry(record.asset.id.clone()).or_insert_with(|| {
            record
                .edits
                .as_ref()
                .map(|e| e.to_edit_state())
                .unwrap_or_default()
        });
        self.current_copy = Some(copy);
        self.state = SessionState::Ready;
        Ok(())
    }

    async fn commit_current(&mut self) -> Result<()> {
        let start = std::time::Instant::now();
        let record = self.photos[self.current].clone();
        let asset = record.asset;
        let Some(copy) = self.current_copy.clone() else {
            return Err(SessionError::InvalidState {
                operation: "commit",
                state: "resolving",
            }
            .into());
        };

        // Clamp once more against the geometry the user actually saw.
        let surface = SurfaceGeometry::for_working_copy(&copy, &self.config.editor);
        let edit = self.edits.get(&asset.id).cloned().unwrap_or_default();
        let committed = surface.clamp(edit.transform);
        self.edits.insert(
            asset.id.clone(),
            EditState {
                transform: committed,
                filter_id: edit.filter_id.clone(),
            },
        );

        let viewport = surface.viewport;
        let window = surface.window;
        let crop =
            geometry::map_to_source_rect(asset.width, asset.height, viewport, window, committed);
        tracing::debug!("committing {} with crop {:?}", asset.id, crop);

        // Synchronous half: the shareable preview. Failure fails the commit.
        let mut preview = self
            .exporter
            .export_preview(&copy, &asset, crop)
            .await
            .map_err(|e| SessionError::Commit {
                id: asset.id.clone(),
                source: e,
            })?;

        let filter = filters::find(&edit.filter_id).unwrap_or(filters::original());
        if !filter.is_identity() {
            let baked_path = self.exporter.artifact_path(&asset.id, "preview_baked");
            match self
                .compositor
                .bake_file(
                    &preview.uri,
                    filter,
                    &baked_path,
                    self.config.export.preview_quality,
                )
                .await
            {
                Some(baked) => {
                    preview = ExportArtifact {
                        uri: baked.path,
                        width: baked.width,
                        height: baked.height,
                    };
                }
                None => tracing::warn!(
                    "filter bake unavailable for {}, keeping unfiltered preview",
                    asset.id
                ),
            }
        }

        let committed_edit = EditState {
            transform: committed,
            filter_id: edit.filter_id.clone(),
        };
        let patch = self.build_patch(
            &committed_edit,
            Some(crop),
            OutputArtifacts {
                preview: Some(preview),
                print: None,
            },
            true,
        );
        self.store
            .apply_patch(&asset.id, patch)
            .await
            .map_err(|e| SessionError::Store {
                id: asset.id.clone(),
                message: e.to_string(),
            })?;

        // Deferred half: the print master, recomputed from the original.
        self.enqueue_print(&asset, committed, &edit.filter_id);
        tracing::debug!("committed {} in {:?}", asset.id, start.elapsed());
        Ok(())
    }

    fn enqueue_print(&self, asset: &SourceAsset, transform: Transform, filter_id: &str) {
        let exporter = self.exporter.clone();
        let compositor = Arc::clone(&self.compositor);
        let store = Arc::clone(&self.store);
        let asset = asset.clone();
        let filter_id = filter_id.to_string();
        let viewport = Viewport::new(
            self.config.editor.viewport_width,
            self.config.editor.viewport_height,
        );
        let window = self.config.editor.window_size;
        let frame_rect = geometry::frame_rect(viewport, window);
        let print_quality = self.config.export.print_quality;
        let label = format!("print:{}", asset.id);

        self.queue.enqueue(label, async move {
            let mut artifact = exporter
                .export_print(&asset, viewport, window, transform)
                .await?;

            let filter = filters::find(&filter_id).unwrap_or(filters::original());
            if !filter.is_identity() {
                let baked_path = exporter.artifact_path(&asset.id, "print_baked");
                match compositor
                    .bake_file(&artifact.uri, filter, &baked_path, print_quality)
                    .await
                {
                    Some(baked) => {
                        artifact = ExportArtifact {
                            uri: baked.path,
                            width: baked.width,
                            height: baked.height,
                        };
                    }
                    None => tracing::warn!(
                        "filter bake unavailable for {} print, keeping unfiltered master",
                        asset.id
                    ),
                }
            }

            let crop = geometry::map_to_source_rect(
                asset.width,
                asset.height,
                viewport,
                window,
                transform,
            );
            let patch = EditPatch {
                edits: PhotoEdits {
                    crop: Some(crop),
                    filter_id: filter.id.to_string(),
                    filter_params: (!filter.is_identity()).then(|| filter.params()),
                    ui: transform,
                    committed: true,
                },
                output: OutputArtifacts {
                    preview: None,
                    print: Some(artifact),
                },
                frame_rect,
                viewport,
            };
            // Print-stage record failures are logged, not surfaced.
            if let Err(e) = store.apply_patch(&asset.id, patch).await {
                tracing::warn!("print record update failed for {}: {e}", asset.id);
            }
            Ok(())
        });
    }

    async fn switch_to(&mut self, next: usize) {
        self.state = SessionState::Switching;
        let next_record = self.photos[next].clone();
        tracing::debug!(
            "switching {} -> {}",
            self.photos[self.current].asset.id,
            next_record.asset.id
        );

        // Resolve the incoming photo while the outgoing frame stays up.
        let incoming_copy = self.resolver.resolve(&next_record.asset).await;
        let incoming_edit = self
            .edits
            .get(&next_record.asset.id)
            .cloned()
            .or_else(|| next_record.edits.as_ref().map(|e| e.to_edit_state()))
            .unwrap_or_default();

        if let Some(outgoing_copy) = self.current_copy.clone() {
            let outgoing_id = self.photos[self.current].asset.id.clone();
            self.transition = TransitionState::Crossfading {
                outgoing: CrossfadeFrame {
                    index: self.current,
                    working_copy: outgoing_copy,
                    edit_state: self.edits.get(&outgoing_id).cloned().unwrap_or_default(),
                },
                incoming: CrossfadeFrame {
                    index: next,
                    working_copy: incoming_copy.clone(),
                    edit_state: incoming_edit.clone(),
                },
            };
            self.state = SessionState::Crossfading;
            self.run_crossfade().await;
            // The outgoing frame is released only here, after the fade has
            // fully completed.
            self.transition = TransitionState::Idle;
        }

        self.current = next;
        self.current_copy = Some(incoming_copy);
        self.edits
            .entry(next_record.asset.id)
            .or_insert(incoming_edit);
        self.state = SessionState::Ready;
    }

    async fn run_crossfade(&mut self) {
        let duration = Duration::from_millis(self.config.crossfade.duration_ms);
        let frame = Duration::from_millis(self.config.crossfade.frame_ms);
        let mut fade = Crossfade::new(duration);
        while !fade.is_complete() {
            tokio::time::sleep(frame).await;
            let opacity = fade.tick(frame);
            tracing::trace!(
                "crossfade outgoing {:.2} incoming {:.2}",
                opacity.outgoing,
                opacity.incoming
            );
        }
    }

    fn build_patch(
        &self,
        edit: &EditState,
        crop: Option<CropRect>,
        output: OutputArtifacts,
        committed: bool,
    ) -> EditPatch {
        let filter = filters::find(&edit.filter_id).unwrap_or(filters::original());
        let viewport = Viewport::new(
            self.config.editor.viewport_width,
            self.config.editor.viewport_height,
        );
        EditPatch {
            edits: PhotoEdits {
                crop,
                filter_id: edit.filter_id.clone(),
                filter_params: (!filter.is_identity()).then(|| filter.params()),
                ui: edit.transform,
                committed,
            },
            output,
            frame_rect: geometry::frame_rect(viewport, self.config.editor.window_size),
            viewport,
        }
    }

    fn persist_ui_state(&self, asset_id: &str) {
        let Some(edit) = self.edits.get(asset_id) else {
            return;
        };
        let patch = self.build_patch(edit, None, OutputArtifacts::default(), false);
        if self
            .ui_persist
            .try_send((asset_id.to_string(), patch))
            .is_err()
        {
            tracing::debug!("ui persist channel full, dropping intermediate state");
        }
    }

    fn current_asset_id(&self) -> String {
        self.photos[self.current].asset.id.clone()
    }

    fn ensure_ready(&self, operation: &'static str) -> Result<()> {
        if self.state != SessionState::Ready {
            return Err(SessionError::InvalidState {
                operation,
                state: self.state.as_str(),
            }
            .into());
        }
        Ok(())
    }
}

//! Tilepress Core - Embeddable photo tile editing and export engine.
//!
//! Tilepress turns a collection of photos into square print tiles: each photo
//! is opened against a bounded working copy, framed through a pan/zoom crop
//! window, optionally filtered, and committed into two artifacts (a fast
//! shareable preview and a deferred full-resolution print master).
//!
//! # Architecture
//!
//! ```text
//! Photo → Working copy → Gesture surface → Commit ┬→ Preview (sync)
//!                                                 └→ Print (queued)
//! ```
//!
//! Every committed change leaves the engine as an [`EditPatch`] through the
//! caller's [`RecordStore`]; the engine itself owns no database.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tilepress_core::{Config, EditorSession, MemoryStore, SessionState};
//!
//! #[tokio::main]
//! async fn main() -> tilepress_core::Result<()> {
//!     let config = Config::load()?;
//!     let store = Arc::new(MemoryStore::new());
//!     let mut session = EditorSession::new(config, photos, store);
//!
//!     session.start().await?;
//!     while session.state() != SessionState::Done {
//!         session.commit_and_advance().await?;
//!     }
//!     session.wait_for_exports().await;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod compositor;
pub mod config;
pub mod error;
pub mod export;
pub mod filters;
pub mod geometry;
pub mod gesture;
pub mod queue;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use compositor::{BakeRequest, BakedImage, FilterCompositor, RenderCanvas, SoftwareCanvas};
pub use config::Config;
pub use error::{
    ConfigError, ExportError, ExportResult, Result, SessionError, TilepressError,
};
pub use export::{oriented_dimensions, ExportPipeline};
pub use filters::{FilterDefinition, FilterParams};
pub use geometry::{FrameRect, PlacedRect};
pub use gesture::{GestureEvent, GestureSurface, LayerPlan, SurfaceGeometry};
pub use queue::ExportQueue;
pub use session::{
    EditorSession, MemoryStore, RecordStore, SessionState, StoreError, TransitionState,
    WorkingCopyResolver,
};
pub use types::{
    CropRect, EditPatch, EditState, ExportArtifact, OutputArtifacts, PhotoEdits, PhotoRecord,
    SourceAsset, Transform, Viewport, WorkingCopy,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

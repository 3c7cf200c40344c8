pub mod animate;
pub mod autoplay;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compose;
pub mod config;
pub mod ease;
pub mod error;
pub mod generation;
pub mod graph;
pub mod ir;
pub mod parser;
pub mod playback;
pub mod render;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod stage;
pub mod theme;
pub mod timeline;
pub mod timeline_dump;
pub mod waves;

pub use animate::{DiagramProgram, plan};
#[cfg(feature = "cli")]
pub use cli::run;
pub use compose::{compose_roots, compose_sequential, compose_tracers, compose_waves, rotate, schedule_from_graph};
pub use config::{AnimateConfig, AutoplayConfig, Config, DrawConfig, TracerConfig, load_config};
pub use error::{AnimateError, RenderError, StageError};
pub use graph::{Graph, RootFallback};
pub use ir::{ConnectorId, DiagramKind, NodeId, RawEdge, TargetId};
pub use render::{DiagramRenderer, RenderedDiagram, TextRenderer};
pub use autoplay::AutoplayState;
pub use runtime::{AutoplayHandle, Event, Program, Runtime};
pub use stage::{MemoryStage, Stage};
pub use timeline::{Effect, Instruction, Timeline};
pub use waves::{Wave, decompose};

//! surveil-core: Pure decode, tracking and conflict-detection library.
//!
//! No async, no network I/O, just algorithms. `surveil-server` wraps these
//! in a scheduler, an HTTP boundary and the resolution collaborator.

pub mod catalogue;
pub mod config;
pub mod conflict;
pub mod decode;
pub mod encode;
pub mod frame;
pub mod geo;
pub mod predict;
pub mod sites;
pub mod tracker;
pub mod types;

// Re-export commonly used types at crate root
pub use conflict::{
    ConflictDetector, ConflictRecord, ConflictStatistics, ConflictStatus, ConflictType,
    CycleReport, ResolutionOption, Severity,
};
pub use decode::{decode, decode_burst, BurstDecode, SurveillanceRecord};
pub use predict::{Predictor, TrajectoryPrediction};
pub use sites::{RadarSite, SiteProvider, SiteRegistry};
pub use tracker::{Track, TrackStore, TrackUpdate, Velocity};
pub use types::*;

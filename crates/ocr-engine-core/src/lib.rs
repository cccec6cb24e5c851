//! Shared runtime substrate for the OCR pipeline: the bounded-parallel
//! executor, its adaptive tuner, a cached ONNX inference runner, the
//! log-book they all report to, and the relief-map/geometry primitives the
//! detector and recognizer stages build on.

pub mod clock;
pub mod executor;
pub mod geometry;
pub mod inference_runner;
pub mod logbook;
pub mod relief_map;
pub mod tuner;

pub use clock::MonotonicClock;
pub use executor::{CancelToken, CompletionHandle, Executor};
pub use geometry::{
    convex_hull, crop_oriented_rectangle, dilate_polygon, identify_corners, min_area_rectangle,
    oriented_to_aa,
};
pub use inference_runner::{InferenceRunner, RunHandle, RunOutput};
pub use logbook::{LogBook, Summary, Token};
pub use relief_map::ReliefMap;
pub use tuner::{Tunable, Tuner, TunerHandle};

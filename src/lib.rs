//! # Route Sanitizer
//!
//! De-identification engine for connected-vehicle GPS trajectories.
//!
//! This library provides:
//! - A quad-tree spatial index over a road network
//! - Map matching of raw GPS samples onto network edges
//! - Feature detectors for privacy-sensitive trajectory regions
//!   (trip start/end, stops, turn-arounds, busy intersections)
//! - Privacy-interval expansion with configurable stopping rules
//! - De-identification with per-trajectory statistics
//!
//! ## Features
//!
//! - **`parallel`** - Enable rayon-based batch processing
//!
//! ## Quick Start
//!
//! ```rust
//! use route_sanitizer::{
//!     Bounds, Entity, ExpansionThresholds, Location, Point, PrivacyIntervalConfig, Quad,
//!     RoadNetwork, Sanitizer, SanitizerConfig, StoppingMode, Trajectory, TrajectoryPoint,
//!     Vertex, WayType,
//! };
//!
//! // Index a one-edge road network.
//! let mut network = RoadNetwork::new();
//! network.add_vertex(Vertex::new(35.952500, -83.932434, 1));
//! network.add_vertex(Vertex::new(35.948878, -83.928081, 2));
//! let edge = network.add_edge(1, 1, 2, WayType::Secondary)?;
//!
//! let mut quad = Quad::new(Bounds::new(
//!     Point::new(35.948378, -83.936072),
//!     Point::new(35.953811, -83.928997),
//! ));
//! quad.insert(Entity::Edge(edge));
//!
//! // Sanitize a short drive along the edge.
//! let mut raw = Trajectory::new();
//! for i in 0..60 {
//!     let loc = Location::new(35.952500, -83.932434).project_position(136.0, 8.0 * i as f64);
//!     raw.push(TrajectoryPoint::new(loc, i as f64, 136.0, 8.0, i, format!("r-{}", i)));
//! }
//!
//! // Redact roughly 60 m around the trip endpoints.
//! let window = ExpansionThresholds {
//!     max_direct_distance: 60.0,
//!     max_manhattan_distance: 100.0,
//!     max_out_degree: 10,
//! };
//! let config = SanitizerConfig {
//!     privacy: PrivacyIntervalConfig {
//!         forward: window,
//!         backward: window,
//!         mode: StoppingMode::Any,
//!     },
//!     ..SanitizerConfig::default()
//! };
//!
//! let sanitizer = Sanitizer::new(&quad, &network, config);
//! let outcome = sanitizer.sanitize(&raw)?;
//! println!(
//!     "kept {} of {} points",
//!     outcome.trajectory.len(),
//!     outcome.counter.n_points
//! );
//! # Ok::<(), route_sanitizer::SanitizeError>(())
//! ```

// Unified error handling
pub mod error;
pub use error::{Result, SanitizeError};

// Geodesic primitives and spherical math
pub mod geo;
pub use geo::{
    bearing, distance, distance_haversine, distance_manhattan, heading_delta, Location, Point,
    EARTH_RADIUS_M,
};

// Geometric shapes and the polymorphic entity set
pub mod shapes;
pub use shapes::{Area, Bounds, Circle, Entity, Grid};

// Road-network model (vertices, edges, way types)
pub mod network;
pub use network::{Edge, RoadNetwork, Vertex, WayType};

// Quad-tree spatial index
pub mod quad;
pub use quad::{Quad, QuadConfig};

// Trajectories and labeled intervals
pub mod trajectory;
pub use trajectory::{FitState, Interval, Trajectory, TrajectoryPoint};

// Point statistics accounting
pub mod instrument;
pub use instrument::PointCounter;

// Explicit and implicit map fitting
pub mod fitting;
pub use fitting::{ImplicitFitterConfig, ImplicitMapFitter, MapFitter, MapFitterConfig};

// Critical-region feature detectors
pub mod detectors;
pub use detectors::{
    IntersectionCounter, StartEndIntervals, StopConfig, StopDetector, TurnAroundConfig,
    TurnAroundDetector,
};

// Interval marking and privacy-interval expansion
pub mod intervals;
pub use intervals::{
    ExpansionThresholds, IntervalMarker, PrivacyIntervalConfig, PrivacyIntervalFinder,
    PrivacyIntervalMarker, StoppingMode,
};

// De-identification and raw-point error correction
pub mod deidentify;
pub use deidentify::{DeIdentifier, ErrorCorrector};

// End-to-end pipeline driver
pub mod pipeline;
pub use pipeline::{SanitizeOutcome, Sanitizer, SanitizerConfig};

// Parallel batch processing across trajectories
pub mod batch;
pub use batch::run_parallel;
#[cfg(feature = "parallel")]
pub use batch::run_parallel_rayon;

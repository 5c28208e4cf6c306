pub mod ecpm;
pub mod error;
pub mod geom;
pub mod io;
pub mod network;

// Prelude
pub use ecpm::{EcpmConfig, EcpmReport, mapdfn_ecpm};
pub use error::{MapDfnError, Result};
pub use geom::point::Point;
pub use geom::polygon::PlanarPolygon;
pub use geom::vector::Vector;
pub use network::{Fracture, FractureNetwork};

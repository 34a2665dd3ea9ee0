pub mod clock;
pub mod config;
pub mod error;
pub mod funnel;
pub mod metrics;
pub mod outcome;
pub mod ring;
pub mod rng;
pub mod simulator;
pub mod window;

pub use clock::*;
pub use config::*;
pub use error::{FunnelError, Result};
pub use funnel::*;
pub use metrics::*;
pub use outcome::*;
pub use ring::*;
pub use rng::*;
pub use simulator::*;
pub use window::*;

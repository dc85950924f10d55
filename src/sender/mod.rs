pub mod client;
pub mod params;
pub mod stats;
pub mod transmission;

pub use client::{ClientConfig, ClientError, Endpoints, MatomoClient};
pub use params::{HitParams, SiteContext};
pub use stats::{ClientStats, StatsSnapshot};
pub use transmission::{HitTransmitter, TransmissionError, TransmissionResult};

pub mod autorun;
pub mod graph;
pub mod registry;
pub mod simulation;

pub use autorun::{AutorunController, AutorunEvent, AutorunExit};
pub use graph::CommunicationGraph;
pub use registry::AgentRegistry;
pub use simulation::{EngineConfig, RunHandle, Simulation};

use clap::Subcommand;

use super::config::ConfigArgs;
use super::replay::ReplayArgs;
use super::resolve::ResolveArgs;
use super::simulate::SimulateArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Feed recorded probe payloads (one JSON message per line) through a capture session
    Replay(ReplayArgs),

    /// Run the username heuristics over saved page snapshots
    Resolve(ResolveArgs),

    /// Drive probe, bridge and engine from a scripted page timeline
    Simulate(SimulateArgs),

    /// Manage SessionCap configuration
    Config(ConfigArgs),

    /// Show version and effective settings
    Info,
}

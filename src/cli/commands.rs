use clap::Subcommand;

use super::config::ConfigArgs;
use super::fingerprint::FingerprintArgs;
use super::ticks::TicksArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Build the replay tick timeline of a recorded session
    Ticks(TicksArgs),

    /// Learn page-state fingerprints from labelled session windows
    Fingerprint(FingerprintArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}

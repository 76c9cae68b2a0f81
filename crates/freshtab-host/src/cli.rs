use clap::Parser;

/// Freshtab demo host for the new-tab page subsystem.
#[derive(Parser, Debug)]
#[command(name = "freshtab", version, about)]
pub struct Args {
    /// Prefs file path override.
    #[arg(long)]
    pub prefs: Option<String>,

    /// Log directive override (e.g. "freshtab=debug").
    #[arg(long)]
    pub log_level: Option<String>,

    /// Serve the remote new-tab page instead of the local one.
    #[arg(long)]
    pub remote: bool,

    /// Update channel reported to the remote location (release, beta, ...).
    #[arg(long, default_value = "release")]
    pub channel: String,
}

pub fn parse() -> Args {
    Args::parse()
}

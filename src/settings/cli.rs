use super::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Mock auth server and token-refreshing HTTP client")]
pub struct Cli {
    /// Path to a settings file; defaults to `settings/dev.toml` in debug builds.
    #[arg(long)]
    pub settings: Option<String>,
}

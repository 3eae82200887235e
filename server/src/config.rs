use clap::Parser;
use shared::DEFAULT_PORT;
use std::path::PathBuf;
use std::time::Duration;

/// Draw-and-guess game server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Word list file, one word per line
    #[arg(short, long)]
    pub words: Option<PathBuf>,

    /// End a round nobody has guessed after this many seconds
    #[arg(long)]
    pub round_timeout: Option<u64>,

    /// Maximum number of connected players
    #[arg(short, long, default_value = "32")]
    pub max_players: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            words: None,
            round_timeout: None,
            max_players: 32,
        }
    }
}

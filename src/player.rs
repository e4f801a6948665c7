/// External media player hand-off.
use tokio::process::Command;
use tracing::info;

use crate::{
    config::AppConfig,
    error::{KinoError, Result},
};

pub struct Player {
    program: String,
    args: Vec<String>,
}

impl Player {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            program: config.player_path.clone(),
            args: config.player_args.clone(),
        }
    }

    /// Run the player on `url` and wait for it to exit.
    pub async fn play(&self, url: &str) -> Result<()> {
        info!("Launching {} for {url}", self.program);
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(url)
            .status()
            .await
            .map_err(|e| KinoError::Player(format!("spawn {}: {e}", self.program)))?;

        if !status.success() {
            return Err(KinoError::Player(format!(
                "{} exited with status {}",
                self.program,
                status.code().unwrap_or(-1)
            )));
        }
        Ok(())
    }
}

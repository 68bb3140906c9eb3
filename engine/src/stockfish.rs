use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use chess::{AnalysisScore, Position};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};

use crate::uci::{parse_uci_message, UciMessage};
use crate::{EngineError, Evaluation, Evaluator, SearchBudget};

/// Maximum time the engine gets to answer `uci` and `isready` at start-up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Time granted to the process to exit after `quit` before it is killed.
const QUIT_GRACE: Duration = Duration::from_secs(1);

const ENV_STOCKFISH_PATH: &str = "STOCKFISH_PATH";
const ENV_ENGINE_THREADS: &str = "ANNOTATOR_ENGINE_THREADS";
const ENV_ENGINE_HASH_MB: &str = "ANNOTATOR_ENGINE_HASH_MB";

/// Configuration for engine performance tuning.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Explicit binary; searched for in common locations when `None`.
    pub path: Option<PathBuf>,
    pub threads: Option<u32>,
    pub hash_mb: Option<u32>,
}

impl EngineConfig {
    /// Build a config from the environment.
    ///
    /// Priority per field:
    /// 1. `STOCKFISH_PATH`, `ANNOTATOR_ENGINE_THREADS`, `ANNOTATOR_ENGINE_HASH_MB` if set
    ///    (numeric values that fail to parse are ignored)
    /// 2. engine defaults
    pub fn from_env() -> Self {
        Self {
            path: std::env::var(ENV_STOCKFISH_PATH).ok().map(PathBuf::from),
            threads: std::env::var(ENV_ENGINE_THREADS)
                .ok()
                .and_then(|v| v.parse().ok()),
            hash_mb: std::env::var(ENV_ENGINE_HASH_MB)
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// Async UCI session with a single engine process.
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn and initialise an engine: `uci`, options, `isready`.
    #[tracing::instrument(level = "info")]
    pub async fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        let path = match &config.path {
            Some(path) => path.clone(),
            None => find_stockfish_path().ok_or(EngineError::NotFound)?,
        };
        tracing::info!(path = %path.display(), "Spawning engine");

        let mut process = tokio::process::Command::new(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                tracing::error!("Failed to spawn engine: {}", e);
                EngineError::Spawn(e)
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or(EngineError::Protocol("engine has no stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or(EngineError::Protocol("engine has no stdout".to_string()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout: BufReader::new(stdout),
        };

        engine.send("uci").await?;
        tokio::time::timeout(HANDSHAKE_TIMEOUT, engine.wait_for(|msg| matches!(msg, UciMessage::UciOk)))
            .await
            .map_err(|_| {
                tracing::error!("Timeout waiting for uciok");
                EngineError::Timeout("uciok")
            })??;

        if let Some(threads) = config.threads {
            let threads = threads.clamp(1, 16);
            tracing::info!("Setting Threads to {}", threads);
            engine
                .send(&format!("setoption name Threads value {}", threads))
                .await?;
        }

        if let Some(hash_mb) = config.hash_mb {
            let hash_mb = hash_mb.clamp(1, 2048);
            tracing::info!("Setting Hash to {} MB", hash_mb);
            engine
                .send(&format!("setoption name Hash value {}", hash_mb))
                .await?;
        }

        engine.sync().await?;
        tracing::info!("Engine spawned and initialized successfully");
        Ok(engine)
    }

    /// `isready` / `readyok` round trip.
    async fn sync(&mut self) -> Result<(), EngineError> {
        self.send("isready").await?;
        tokio::time::timeout(HANDSHAKE_TIMEOUT, self.wait_for(|msg| matches!(msg, UciMessage::ReadyOk)))
            .await
            .map_err(|_| EngineError::Timeout("readyok"))?
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        tracing::trace!("UCI >> {}", cmd);
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<Option<UciMessage>, EngineError> {
        let mut line = String::new();
        let read = self.stdout.read_line(&mut line).await?;
        if read == 0 {
            tracing::warn!("Engine stdout EOF - engine closed");
            return Err(EngineError::Closed);
        }
        let trimmed = line.trim();
        tracing::trace!("UCI << {}", trimmed);
        Ok(parse_uci_message(trimmed).ok())
    }

    async fn wait_for(&mut self, done: impl Fn(&UciMessage) -> bool) -> Result<(), EngineError> {
        loop {
            if let Some(msg) = self.read_message().await? {
                if done(&msg) {
                    return Ok(());
                }
            }
        }
    }

    /// Search `position` within `budget` and return the last reported score.
    #[tracing::instrument(level = "debug", skip(self, position), fields(fen = %position.fen()))]
    pub async fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError> {
        self.send(&format!("position fen {}", position.fen())).await?;
        self.send(&format!("go {}", budget.go_args())).await?;

        let mut score: Option<AnalysisScore> = None;
        let mut depth = None;

        loop {
            match self.read_message().await? {
                Some(UciMessage::Info(info)) => {
                    // Only the principal line counts when MultiPV is on.
                    if info.multipv.is_some_and(|n| n > 1) {
                        continue;
                    }
                    if let Some(s) = info.score {
                        score = Some(s);
                        depth = info.depth.or(depth);
                    }
                }
                Some(UciMessage::BestMove { mv: None, .. }) => {
                    tracing::debug!("Engine reported no legal move");
                    return Err(EngineError::NoScore(position.fen()));
                }
                Some(UciMessage::BestMove { .. }) => break,
                _ => {}
            }
        }

        let score = score.ok_or_else(|| EngineError::NoScore(position.fen()))?;
        tracing::debug!(score = %score, ?depth, "Evaluation finished");
        Ok(Evaluation {
            score,
            perspective: position.side_to_move(),
            depth,
        })
    }

    /// Send `quit`, wait briefly, then kill the process.
    pub async fn quit(mut self) {
        let _ = self.send("quit").await;
        if tokio::time::timeout(QUIT_GRACE, self.process.wait())
            .await
            .is_err()
        {
            tracing::warn!("Engine did not exit after quit, killing it");
            let _ = self.process.kill().await;
        }
    }
}

/// Blocking [`Evaluator`] that owns its engine process and a private runtime.
///
/// Acquire once per analysis run; the process is released by [`shutdown`]
/// or, on any other exit path, when the value is dropped. Must not be used
/// from inside another tokio runtime.
///
/// [`shutdown`]: StockfishEvaluator::shutdown
pub struct StockfishEvaluator {
    runtime: tokio::runtime::Runtime,
    engine: Option<StockfishEngine>,
}

impl StockfishEvaluator {
    pub fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let engine = runtime.block_on(StockfishEngine::spawn(config))?;
        Ok(Self {
            runtime,
            engine: Some(engine),
        })
    }

    pub fn shutdown(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(engine) = self.engine.take() {
            tracing::info!("Shutting down engine");
            self.runtime.block_on(engine.quit());
        }
    }
}

impl Evaluator for StockfishEvaluator {
    fn evaluate(
        &mut self,
        position: &Position,
        budget: SearchBudget,
    ) -> Result<Evaluation, EngineError> {
        let engine = self.engine.as_mut().ok_or(EngineError::Closed)?;
        self.runtime.block_on(engine.evaluate(position, budget))
    }
}

impl Drop for StockfishEvaluator {
    fn drop(&mut self) {
        self.release();
    }
}

/// Find Stockfish executable in common locations
fn find_stockfish_path() -> Option<PathBuf> {
    let paths = [
        "/usr/local/bin/stockfish",
        "/usr/bin/stockfish",
        "/opt/homebrew/bin/stockfish",
        "/usr/games/stockfish",
    ];

    if let Some(found) = paths.iter().map(Path::new).find(|p| p.exists()) {
        return Some(found.to_path_buf());
    }

    // Fall back to PATH lookup.
    std::env::var_os("PATH").and_then(|path| {
        std::env::split_paths(&path)
            .map(|dir| dir.join("stockfish"))
            .find(|candidate| candidate.is_file())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_fails_to_spawn() {
        let config = EngineConfig {
            path: Some(PathBuf::from("/nonexistent/engine-binary")),
            ..Default::default()
        };
        let result = StockfishEvaluator::spawn(config);
        assert!(matches!(result, Err(EngineError::Spawn(_))));
    }

    #[test]
    fn engine_config_defaults_are_unset() {
        let config = EngineConfig::default();
        assert!(config.path.is_none());
        assert!(config.threads.is_none());
        assert!(config.hash_mb.is_none());
    }
}

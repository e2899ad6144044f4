//! Audio output devices.
//!
//! A sink holds at most one loaded clip. Each `start` returns a generation
//! number; when playback of that generation reaches its end the sink sends
//! the number on its ended channel.

use crate::error::{Result, SavorError};
use crate::speech::AudioClip;
use std::io::Write;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Sender half of a sink's ended notifications.
pub type EndedSender = mpsc::UnboundedSender<u64>;

/// Receiver half of a sink's ended notifications.
pub type EndedReceiver = mpsc::UnboundedReceiver<u64>;

/// A playback device holding a single source.
pub trait AudioSink: Send {
    /// Replace the loaded source. Stops anything that is playing.
    fn load(&mut self, clip: &AudioClip) -> Result<()>;

    /// Play the loaded source from the beginning.
    fn start(&mut self) -> Result<u64>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    /// Stop playback, keeping the source loaded.
    fn stop(&mut self) -> Result<()>;

    fn is_loaded(&self) -> bool;
}

struct RunningPlayer {
    pid: Option<u32>,
    /// Set once the process has been reaped. Its pid may be reused after that.
    exited: Arc<AtomicBool>,
    kill: oneshot::Sender<()>,
}

/// Plays clips through an external player process.
pub struct CommandSink {
    program: String,
    args: Vec<String>,
    ended: EndedSender,
    source: Option<NamedTempFile>,
    player: Option<RunningPlayer>,
    generation: u64,
}

impl CommandSink {
    pub fn new(program: &str, args: &[String], ended: EndedSender) -> Self {
        Self {
            program: program.to_string(),
            args: args.to_vec(),
            ended,
            source: None,
            player: None,
            generation: 0,
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> Result<()> {
        let Some(player) = self.player.as_ref() else {
            return Ok(());
        };
        if player.exited.load(Ordering::SeqCst) {
            return Ok(());
        }
        let Some(pid) = player.pid else {
            return Ok(());
        };
        let pid = libc::pid_t::try_from(pid)
            .map_err(|_| SavorError::Playback(format!("Invalid player pid {}", pid)))?;
        // SAFETY: kill(2) only sends a signal to the player process we spawned.
        let rc = unsafe { libc::kill(pid, signal) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            // The player finished on its own; its end is reported separately.
            if err.raw_os_error() == Some(libc::ESRCH) {
                debug!("Player {} already exited", pid);
                return Ok(());
            }
            return Err(SavorError::Playback(format!(
                "Failed to signal player: {}",
                err
            )));
        }
        Ok(())
    }
}

impl AudioSink for CommandSink {
    fn load(&mut self, clip: &AudioClip) -> Result<()> {
        self.stop()?;

        let mut file = tempfile::Builder::new()
            .prefix("savor-")
            .suffix(&format!(".{}", clip.extension()))
            .tempfile()?;
        file.write_all(&clip.bytes)?;
        file.flush()?;

        debug!("Loaded {} bytes into {:?}", clip.bytes.len(), file.path());
        self.source = Some(file);
        Ok(())
    }

    fn start(&mut self) -> Result<u64> {
        self.stop()?;

        let path = self
            .source
            .as_ref()
            .map(|f| f.path().to_path_buf())
            .ok_or_else(|| SavorError::Playback("No audio loaded".to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SavorError::Playback(format!("Failed to start {}: {}", self.program, e)))?;

        self.generation += 1;
        let generation = self.generation;
        let pid = child.id();
        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let ended = self.ended.clone();
        let exited = Arc::new(AtomicBool::new(false));
        let reaped = exited.clone();

        tokio::spawn(async move {
            let killed = tokio::select! {
                status = child.wait() => {
                    reaped.store(true, Ordering::SeqCst);
                    if let Err(e) = status {
                        warn!("Player wait failed: {}", e);
                    }
                    false
                }
                _ = kill_rx => true,
            };
            if killed {
                let _ = child.kill().await;
            } else {
                let _ = ended.send(generation);
            }
        });

        self.player = Some(RunningPlayer {
            pid,
            exited,
            kill: kill_tx,
        });
        Ok(generation)
    }

    #[cfg(unix)]
    fn pause(&mut self) -> Result<()> {
        self.signal(libc::SIGSTOP)
    }

    #[cfg(not(unix))]
    fn pause(&mut self) -> Result<()> {
        Err(SavorError::Playback(
            "Pausing is not supported on this platform".to_string(),
        ))
    }

    #[cfg(unix)]
    fn resume(&mut self) -> Result<()> {
        self.signal(libc::SIGCONT)
    }

    #[cfg(not(unix))]
    fn resume(&mut self) -> Result<()> {
        Err(SavorError::Playback(
            "Resuming is not supported on this platform".to_string(),
        ))
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(player) = self.player.take() {
            let _ = player.kill.send(());
        }
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.source.is_some()
    }
}

impl Drop for CommandSink {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// A sink that plays nothing and ends immediately.
pub struct NullSink {
    ended: EndedSender,
    loaded: bool,
    generation: u64,
}

impl NullSink {
    pub fn new(ended: EndedSender) -> Self {
        Self {
            ended,
            loaded: false,
            generation: 0,
        }
    }
}

impl AudioSink for NullSink {
    fn load(&mut self, _clip: &AudioClip) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn start(&mut self) -> Result<u64> {
        if !self.loaded {
            return Err(SavorError::Playback("No audio loaded".to_string()));
        }
        self.generation += 1;
        let _ = self.ended.send(self.generation);
        Ok(self.generation)
    }

    fn pause(&mut self) -> Result<()> {
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

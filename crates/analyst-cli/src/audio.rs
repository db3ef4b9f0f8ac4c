//! Saving and playing the spoken reply

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

/// Write `audio` to `output` and hand it to `player`, if one is configured.
///
/// `player` is a command line split on whitespace; the file path is appended.
pub async fn save_and_play(audio: &[u8], output: &Path, player: Option<&str>) -> Result<()> {
    tokio::fs::write(output, audio)
        .await
        .with_context(|| format!("Failed to write audio to {}", output.display()))?;
    debug!(path = %output.display(), bytes = audio.len(), "Saved speech audio");

    let mut words = player.unwrap_or_default().split_whitespace();
    let Some(program) = words.next() else {
        return Ok(());
    };

    let status = Command::new(program)
        .args(words)
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .with_context(|| format!("Failed to run audio player '{}'", program))?;

    if !status.success() {
        warn!(player = program, ?status, "Audio player exited with an error");
    }

    Ok(())
}

/// Save and play the reply audio, logging failures instead of returning them.
///
/// Returns whether the audio was written and the player (if any) ran.
pub async fn play_reply(audio: &[u8], output: &Path, player: Option<&str>) -> bool {
    match save_and_play(audio, output, player).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Could not play reply audio");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_saves_audio_without_player() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.mp3");

        save_and_play(b"ID3", &path, None).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"ID3");
    }

    #[tokio::test]
    async fn test_empty_player_only_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.mp3");

        save_and_play(b"ID3", &path, Some("  ")).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_unwritable_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("output.mp3");

        let err = save_and_play(b"ID3", &path, None).await.unwrap_err();
        assert!(err.to_string().contains("Failed to write audio"));

        assert!(!play_reply(b"ID3", &path, None).await);
    }

    #[tokio::test]
    async fn test_missing_player_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.mp3");

        let err = save_and_play(b"ID3", &path, Some("definitely-not-a-player-binary"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("audio player"));

        // The reply path only logs the failure; the file is still written
        assert!(!play_reply(b"ID3", &path, Some("definitely-not-a-player-binary")).await);
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_player_with_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.mp3");

        save_and_play(b"ID3", &path, Some("true")).await.unwrap();
        assert!(path.exists());
    }
}

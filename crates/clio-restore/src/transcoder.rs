//! Image transcoding through GraphicsMagick and gifsicle.
//!
//! Images are piped through the tools' stdin/stdout; nothing touches disk.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use clio_core::defaults::JPEG_QUALITY;
use clio_core::{Error, ImageKind, ImageTranscoder, Result};

use crate::config::TranscoderConfig;

pub struct GmTranscoder {
    config: TranscoderConfig,
}

impl GmTranscoder {
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    fn color_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(profile) = &self.config.srgb_profile {
            args.push("-profile".to_string());
            args.push(profile.clone());
        }
        args.push("-auto-orient".to_string());
        args.push("-quality".to_string());
        args.push(JPEG_QUALITY.to_string());
        args
    }

    /// `gm` arguments of an EXIF reorientation.
    pub fn reorient_args(&self) -> Vec<String> {
        let mut args = vec!["convert".to_string(), "-".to_string()];
        args.extend(self.color_args());
        args.push("jpeg:-".to_string());
        args
    }

    /// `gm` arguments of an exact-size resize.
    pub fn resize_args(&self, kind: ImageKind, width: u32, height: u32) -> Vec<String> {
        let mut args = vec![
            "convert".to_string(),
            "-".to_string(),
            "-resize".to_string(),
            format!("{}x{}!", width, height),
        ];
        args.extend(self.color_args());
        args.push(format!("{}:-", kind.gm_format()));
        args
    }

    /// `gifsicle` arguments of an animated GIF resize.
    pub fn gif_args(width: u32, height: u32) -> Vec<String> {
        vec![
            "--resize".to_string(),
            format!("{}x{}", width, height),
            "-O3".to_string(),
        ]
    }
}

/// Feed `input` to a command's stdin and return its stdout.
async fn run_cmd_with_timeout(program: &str, args: &[String], input: &[u8], timeout: Duration) -> Result<Vec<u8>> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Transcode(format!("Failed to execute {}: {}", program, e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Internal("child stdin not captured".to_string()))?;
    let input = input.to_vec();
    let writer = tokio::spawn(async move {
        // A tool that exits early closes the pipe; its exit status reports that.
        let _ = stdin.write_all(&input).await;
    });

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| {
            Error::Transcode(format!(
                "{} timed out after {}s",
                program,
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Transcode(format!("{}: {}", program, e)))?;
    let _ = writer.await;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Transcode(format!(
            "{} failed (exit {}): {}",
            program,
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

#[async_trait]
impl ImageTranscoder for GmTranscoder {
    async fn reorient(&self, data: &[u8]) -> Result<Vec<u8>> {
        debug!(subsystem = "transcode", component = "gm", op = "reorient", size_bytes = data.len());
        run_cmd_with_timeout(&self.config.gm_path, &self.reorient_args(), data, self.config.timeout)
            .await
    }

    async fn resize(&self, data: &[u8], kind: ImageKind, width: u32, height: u32) -> Result<Vec<u8>> {
        debug!(
            subsystem = "transcode",
            component = "gm",
            op = "resize",
            width,
            height,
            size_bytes = data.len()
        );
        match kind {
            ImageKind::Gif => {
                run_cmd_with_timeout(
                    &self.config.gifsicle_path,
                    &Self::gif_args(width, height),
                    data,
                    self.config.timeout,
                )
                .await
            }
            _ => {
                run_cmd_with_timeout(
                    &self.config.gm_path,
                    &self.resize_args(kind, width, height),
                    data,
                    self.config.timeout,
                )
                .await
            }
        }
    }
}

use anyhow::{Context, Result, bail};
use log::info;
use std::fs;
use std::path::Path;
use std::process::Command;

/// Stream selection handed to yt-dlp. Prefers an mp4 container so the
/// extraction stage never has to remux.
const FORMAT_SELECTOR: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best";

/// Downloads the submitted video by shelling out to yt-dlp.
#[derive(Debug, Clone)]
pub struct VideoFetcher {
    bin: String,
}

impl VideoFetcher {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Fetch the media at `url` into `output`. Playlists are refused so a
    /// playlist URL yields exactly one file.
    pub fn fetch(&self, url: &str, output: &Path) -> Result<()> {
        let output_str = output.to_string_lossy();
        let result = Command::new(&self.bin)
            .args([
                "-f",
                FORMAT_SELECTOR,
                "--no-playlist",
                "--quiet",
                "--no-warnings",
                "-o",
                &*output_str,
                url,
            ])
            .output()
            .context(format!(
                "failed to spawn {} for download of {:?}",
                self.bin, url
            ))?;

        if !result.status.success() {
            bail!(
                "{} failed for {:?} with status code {:?}: {}",
                self.bin,
                url,
                result.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&result.stderr).trim()
            );
        }

        let size = fs::metadata(output).map(|meta| meta.len()).unwrap_or(0);
        if size == 0 {
            bail!("downloaded file is missing or empty: {:?}", output);
        }

        info!("Downloaded {} bytes to {:?}", size, output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_binary_reports_spawn_failure() {
        let dir = tempdir().unwrap();
        let fetcher = VideoFetcher::new("/nonexistent/yt-dlp");
        let err = fetcher
            .fetch("https://example.com/clip", &dir.path().join("out.mp4"))
            .unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::*;
        use crate::background::processors::test_support::fake_tool;

        #[test]
        fn successful_download_writes_output() {
            let dir = tempdir().unwrap();
            let bin = fake_tool(
                dir.path(),
                "yt-dlp",
                r#"while [ "$#" -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
printf 'video-bytes' > "$out""#,
            );
            let output = dir.path().join("video.mp4");

            let fetcher = VideoFetcher::new(bin);
            fetcher.fetch("https://example.com/clip", &output).unwrap();
            assert_eq!(fs::read(&output).unwrap(), b"video-bytes");
        }

        #[test]
        fn nonzero_exit_carries_stderr_detail() {
            let dir = tempdir().unwrap();
            let bin = fake_tool(
                dir.path(),
                "yt-dlp",
                r#"echo 'ERROR: unsupported URL' >&2
exit 1"#,
            );

            let fetcher = VideoFetcher::new(bin);
            let err = fetcher
                .fetch("https://example.com/clip", &dir.path().join("out.mp4"))
                .unwrap_err();
            let message = err.to_string();
            assert!(message.contains("status code 1"), "{}", message);
            assert!(message.contains("ERROR: unsupported URL"), "{}", message);
        }

        #[test]
        fn silent_success_without_output_is_an_error() {
            let dir = tempdir().unwrap();
            let bin = fake_tool(dir.path(), "yt-dlp", "exit 0");

            let fetcher = VideoFetcher::new(bin);
            let err = fetcher
                .fetch("https://example.com/clip", &dir.path().join("out.mp4"))
                .unwrap_err();
            assert!(err.to_string().contains("missing or empty"));
        }

        #[test]
        fn empty_output_file_is_an_error() {
            let dir = tempdir().unwrap();
            let bin = fake_tool(
                dir.path(),
                "yt-dlp",
                r#"while [ "$#" -gt 0 ]; do
  if [ "$1" = "-o" ]; then out="$2"; fi
  shift
done
: > "$out""#,
            );

            let fetcher = VideoFetcher::new(bin);
            let err = fetcher
                .fetch("https://example.com/clip", &dir.path().join("out.mp4"))
                .unwrap_err();
            assert!(err.to_string().contains("missing or empty"));
        }
    }
}

use env_logger::{Builder, WriteStyle};
use log::kv::Key;
use log::{error, info};
use regex::Regex;
use std::io::Write;
use std::process::Command;
use std::sync::LazyLock;

use crate::config::AppConfig;

static REGEX_VERSION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+\.\d+(?:\.\d+)*").unwrap());

/// Pull the first dotted version number out of a tool's version banner.
/// Handles both `ffmpeg version 7.1 Copyright ...` and yt-dlp's bare
/// `2025.01.15` style.
pub fn parse_tool_version(banner: &str) -> Option<&str> {
    REGEX_VERSION_NUMBER
        .find(banner)
        .map(|matched| matched.as_str())
}

/// Check that the download and extraction tools respond on PATH. A missing
/// tool is logged, not fatal: the pipeline reports the failure per task.
pub fn check_external_tools(config: &AppConfig) {
    let tools = [
        (config.ytdlp_bin.as_str(), "--version"),
        (config.ffmpeg_bin.as_str(), "-version"),
    ];
    for (command, version_arg) in tools {
        match Command::new(command).arg(version_arg).output() {
            Ok(output) if output.status.success() => {
                let banner = String::from_utf8_lossy(&output.stdout);
                let version_number = parse_tool_version(&banner).unwrap_or("Unknown");
                info!("{} version: {}", command, version_number);
            }
            Ok(_) => {
                error!(
                    "`{}` command was found, but it returned an error. Please ensure it's correctly installed.",
                    command
                );
            }
            Err(_) => {
                error!(
                    "`{}` is not installed or not available in PATH. Please install it before running the application.",
                    command
                );
            }
        }
    }
}

/// Initialize the logger: INFO+ globally, WARN+ for Rocket's own chatter.
/// Records carrying a `duration` key get it appended to the line.
pub fn initialize_logger() {
    Builder::new()
        .write_style(WriteStyle::Always)
        .format(|buf, record| {
            let ts = buf.timestamp();

            let level_style = buf.default_level_style(record.level());
            let lvl = format!(
                "{}{}{}",
                level_style.render(),
                record.level(),
                level_style.render_reset()
            );

            let duration = record
                .key_values()
                .get(Key::from("duration"))
                .map(|value| format!(" ({})", value))
                .unwrap_or_default();

            writeln!(
                buf,
                "{} {} {} {}{}",
                ts,
                lvl,
                record.target(),
                record.args(),
                duration
            )
        })
        .filter(None, log::LevelFilter::Info)
        .filter(Some("rocket"), log::LevelFilter::Warn)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_ffmpeg_banner() {
        let banner = "ffmpeg version 7.1 Copyright (c) 2000-2024 the FFmpeg developers";
        assert_eq!(parse_tool_version(banner), Some("7.1"));
    }

    #[test]
    fn parses_a_bare_date_version() {
        assert_eq!(parse_tool_version("2025.01.15\n"), Some("2025.01.15"));
    }

    #[test]
    fn parses_a_three_part_version() {
        let banner = "ffmpeg version 6.1.1-3ubuntu5 Copyright";
        assert_eq!(parse_tool_version(banner), Some("6.1.1"));
    }

    #[test]
    fn reports_nothing_for_an_unversioned_banner() {
        assert_eq!(parse_tool_version("command not found"), None);
    }
}

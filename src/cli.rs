use clap::Parser;
use std::path::PathBuf;

use crate::config::Settings;

/// Multi-window image sequence viewer
///
/// Items are globs (`shots/a_%04d.exr`, `~/renders/*.png`, `-` for stdin)
/// or layout words: `nv` new view, `np` new player, `nw` new window.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Sequence globs and layout words (nv, np, nw)
    #[arg(value_name = "ITEM")]
    pub items: Vec<String>,

    /// Enable debug logging to file (default: seqview.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Texture over-fetch margin in pixels
    #[arg(long = "margin", value_name = "N")]
    pub margin: Option<i32>,

    /// Disable the shared decode cache
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Do not reload images changed on disk
    #[arg(long = "no-watch")]
    pub no_watch: bool,

    /// Playback speed
    #[arg(long = "fps", value_name = "FPS")]
    pub fps: Option<f32>,

    /// Resolve the sequences, print them and exit (no window)
    #[arg(long = "list")]
    pub list: bool,
}

impl Args {
    /// Command-line values take priority over the settings file.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(margin) = self.margin {
            settings.texture_margin = margin.max(0);
        }
        if self.no_cache {
            settings.cache_enabled = false;
        }
        if self.no_watch {
            settings.watch_files = false;
        }
        if let Some(fps) = self.fps {
            settings.fps = fps.max(0.1);
        }
    }

    /// Logging level for the `-v` count
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbosity {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_and_layout_words() {
        let args = Args::parse_from(["seqview", "a/*.png", "nv", "b/%04d.exr", "-vv"]);
        assert_eq!(args.items, vec!["a/*.png", "nv", "b/%04d.exr"]);
        assert_eq!(args.log_level(), log::LevelFilter::Debug);
    }

    /// Test: CLI overrides
    /// Validates: Flags replace settings values, absent flags keep them
    #[test]
    fn test_apply_overrides() {
        let args = Args::parse_from(["seqview", "--margin", "32", "--no-cache", "--fps", "12"]);
        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.texture_margin, 32);
        assert!(!settings.cache_enabled);
        assert!(settings.watch_files);
        assert_eq!(settings.fps, 12.0);
    }

    #[test]
    fn test_log_flag_optional_value() {
        let args = Args::parse_from(["seqview", "-l"]);
        assert_eq!(args.log_file, Some(None));
        let args = Args::parse_from(["seqview", "--log", "x.log"]);
        assert_eq!(args.log_file, Some(Some(PathBuf::from("x.log"))));
    }
}

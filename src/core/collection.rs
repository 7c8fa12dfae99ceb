//! Ordered image identifiers resolved from a glob pattern
//!
//! Resolution expands `~`, converts printf-style frame tokens (`%04d`) into
//! digit classes, keeps only regular files and sorts the result naturally so
//! `frame2` comes before `frame10`. The pattern `"-"` (stdin) survives as a
//! single entry even though nothing on disk matches it.

use std::cmp::Ordering;
use std::path::PathBuf;

use log::{debug, warn};
use regex::Regex;

use crate::core::decode::STDIN_ID;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageCollection {
    pattern: String,
    filenames: Vec<String>,
}

impl ImageCollection {
    /// Expand `pattern` into a naturally sorted list of files.
    pub fn resolve(pattern: &str) -> Self {
        let expanded = expand_frame_tokens(&expand_tilde(pattern));
        let mut filenames = glob_files(&expanded);

        if filenames.is_empty() && pattern == STDIN_ID {
            filenames.push(STDIN_ID.to_string());
        }
        filenames.sort_by(|a, b| natural_cmp(a, b));

        debug!("Resolved '{}' -> {} file(s)", pattern, filenames.len());
        Self {
            pattern: pattern.to_string(),
            filenames,
        }
    }

    /// Build from explicit identifiers (kept in natural order).
    pub fn from_filenames(pattern: &str, mut filenames: Vec<String>) -> Self {
        filenames.sort_by(|a, b| natural_cmp(a, b));
        Self {
            pattern: pattern.to_string(),
            filenames,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }

    /// Identifier of 1-based `frame`
    pub fn get(&self, frame: usize) -> Option<&str> {
        frame
            .checked_sub(1)
            .and_then(|i| self.filenames.get(i))
            .map(String::as_str)
    }

    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }
}

fn glob_files(pattern: &str) -> Vec<String> {
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Invalid glob '{}': {}", pattern, e);
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                debug!("Glob entry error: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .map(|path| path.to_string_lossy().into_owned())
        .collect()
}

/// Replace a leading `~` with the home directory.
pub fn expand_tilde(pattern: &str) -> String {
    let rest = match pattern.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return pattern.to_string(),
    };
    match dirs_next::home_dir() {
        Some(home) => {
            let mut out = home.to_string_lossy().into_owned();
            out.push_str(rest);
            out
        }
        None => pattern.to_string(),
    }
}

/// Turn `%0Nd` into N `[0-9]` classes (`%d` matches one or more digits as `*`).
pub fn expand_frame_tokens(pattern: &str) -> String {
    let re = match Regex::new(r"%0?(\d*)d") {
        Ok(re) => re,
        Err(e) => {
            warn!("Frame token regex error: {}", e);
            return pattern.to_string();
        }
    };
    re.replace_all(pattern, |caps: &regex::Captures| {
        match caps[1].parse::<usize>() {
            Ok(width) if width > 0 => "[0-9]".repeat(width),
            _ => "*".to_string(),
        }
    })
    .into_owned()
}

/// Alphanumeric-aware ordering: digit runs compare by value.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();

    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) if ca.is_ascii_digit() && cb.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ta = na.trim_start_matches('0');
                let tb = nb.trim_start_matches('0');
                let ord = ta.len().cmp(&tb.len()).then_with(|| ta.cmp(tb));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    return ca.cmp(&cb);
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied().filter(char::is_ascii_digit) {
        s.push(c);
        it.next();
    }
    s
}

/// Paths of a collection, for the file watcher
pub fn watch_paths(collection: &ImageCollection) -> Vec<PathBuf> {
    collection
        .filenames()
        .iter()
        .filter(|f| f.as_str() != STDIN_ID)
        .map(PathBuf::from)
        .collect()
}

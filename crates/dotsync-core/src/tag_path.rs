//! Typed mapping between local paths and dotted tag titles.
//!
//! Every tracked directory under home is mirrored by a tag whose title is the
//! reserved root (`dotfiles`) followed by one `.`-separated segment per
//! directory. A `.` or `\` inside a segment is escaped with `\`, so
//! `~/.config/fish` maps to `dotfiles.\.config.fish` and maps back exactly.
//!
//! # Examples
//! ```
//! use dotsync_core::tag_path::{TagPath, TrackedPath};
//! use std::path::Path;
//!
//! let home = Path::new("/home/jo");
//! let tracked = TrackedPath::from_local(Path::new("/home/jo/.config/fish/config.fish"), home).unwrap();
//! assert_eq!(tracked.tag().title(), r"dotfiles.\.config.fish");
//! assert_eq!(tracked.note_title(), "config.fish");
//!
//! let parsed: TagPath = r"dotfiles.\.config.fish".parse().unwrap();
//! assert_eq!(parsed.to_dir(home), Path::new("/home/jo/.config/fish"));
//! ```

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Title of the reserved root tag every tracked tag lives under.
pub const DOTFILES_TAG: &str = "dotfiles";

const SEPARATOR: char = '.';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagPathError {
    #[error("{0}")]
    Configuration(&'static str),

    #[error("path {} is not within home directory {}", path.display(), home.display())]
    OutsideHome { path: PathBuf, home: PathBuf },

    #[error("invalid tag title {title:?}: {reason}")]
    InvalidTitle { title: String, reason: &'static str },

    #[error("invalid path segment {segment:?}: {reason}")]
    InvalidSegment { segment: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, TagPathError>;

/// A directory below home, expressed as tag segments under the root tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagPath {
    segments: Vec<String>,
}

impl TagPath {
    /// The root tag, mirroring home itself.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Append one directory segment.
    pub fn join(&self, segment: &str) -> Result<Self> {
        validate_segment(segment)?;
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `other` is this tag or lies below it.
    pub fn contains(&self, other: &TagPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Every tag from the root down to and including this one.
    pub fn chain(&self) -> Vec<Self> {
        (0..=self.segments.len())
            .map(|n| Self {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// Rendered tag title, e.g. `dotfiles.\.config.fish`.
    pub fn title(&self) -> String {
        let mut title = DOTFILES_TAG.to_string();
        for segment in &self.segments {
            title.push(SEPARATOR);
            for c in segment.chars() {
                if c == SEPARATOR || c == ESCAPE {
                    title.push(ESCAPE);
                }
                title.push(c);
            }
        }
        title
    }

    /// True if `title` names the root tag or a tag below it.
    ///
    /// Only checks the prefix; use `parse` to validate the rest.
    pub fn is_tracked_title(title: &str) -> bool {
        match title.strip_prefix(DOTFILES_TAG) {
            Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
            None => false,
        }
    }

    /// Map a directory at or below `home` to its tag.
    pub fn from_dir(dir: &Path, home: &Path) -> Result<Self> {
        Ok(Self {
            segments: relative_segments(dir, home)?,
        })
    }

    /// Directory this tag mirrors.
    pub fn to_dir(&self, home: &Path) -> PathBuf {
        let mut dir = home.to_path_buf();
        dir.extend(&self.segments);
        dir
    }
}

impl Display for TagPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

impl FromStr for TagPath {
    type Err = TagPathError;

    fn from_str(title: &str) -> Result<Self> {
        let invalid = |reason| TagPathError::InvalidTitle {
            title: title.to_string(),
            reason,
        };

        let rest = title
            .strip_prefix(DOTFILES_TAG)
            .ok_or_else(|| invalid("not under the dotfiles tag"))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let rest = rest
            .strip_prefix(SEPARATOR)
            .ok_or_else(|| invalid("not under the dotfiles tag"))?;

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = rest.chars();
        while let Some(c) = chars.next() {
            match c {
                ESCAPE => match chars.next() {
                    Some(escaped @ (SEPARATOR | ESCAPE)) => current.push(escaped),
                    _ => return Err(invalid("dangling escape")),
                },
                SEPARATOR => segments.push(std::mem::take(&mut current)),
                other => current.push(other),
            }
        }
        segments.push(current);

        for segment in &segments {
            validate_segment(segment)?;
        }
        Ok(Self { segments })
    }
}

/// A tracked file: the tag of its directory plus the note title (file name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackedPath {
    tag: TagPath,
    note_title: String,
}

impl TrackedPath {
    pub fn new(tag: TagPath, note_title: &str) -> Result<Self> {
        validate_segment(note_title)?;
        Ok(Self {
            tag,
            note_title: note_title.to_string(),
        })
    }

    pub(crate) fn from_validated(tag: TagPath, note_title: &str) -> Self {
        Self {
            tag,
            note_title: note_title.to_string(),
        }
    }

    /// Map a file below `home` to its tag and note title.
    pub fn from_local(path: &Path, home: &Path) -> Result<Self> {
        let mut segments = relative_segments(path, home)?;
        let note_title = segments.pop().ok_or_else(|| TagPathError::InvalidSegment {
            segment: path.display().to_string(),
            reason: "home directory is not a file",
        })?;
        Ok(Self {
            tag: TagPath { segments },
            note_title,
        })
    }

    pub fn tag(&self) -> &TagPath {
        &self.tag
    }

    pub fn note_title(&self) -> &str {
        &self.note_title
    }

    pub fn local_path(&self, home: &Path) -> PathBuf {
        self.tag.to_dir(home).join(&self.note_title)
    }

    /// `/`-separated path relative to home, e.g. `.config/fish/config.fish`.
    pub fn home_relative(&self) -> String {
        let mut parts: Vec<&str> = self.tag.segments.iter().map(String::as_str).collect();
        parts.push(&self.note_title);
        parts.join("/")
    }
}

/// `/`-separated form of `path` relative to `home` (empty for home itself).
pub fn home_relative(path: &Path, home: &Path) -> Result<String> {
    Ok(relative_segments(path, home)?.join("/"))
}

/// Tag title for a directory at or below `home`.
pub fn path_to_tag_title(local_dir: &Path, home: &Path) -> Result<String> {
    if home.as_os_str().is_empty() {
        return Err(TagPathError::Configuration("home directory required"));
    }
    Ok(TagPath::from_dir(local_dir, home)?.title())
}

/// Directory for a tag title, and whether it is home itself.
pub fn tag_title_to_path(title: &str, home: &Path) -> Result<(PathBuf, bool)> {
    if home.as_os_str().is_empty() {
        return Err(TagPathError::Configuration("home directory required"));
    }
    if title.is_empty() {
        return Err(TagPathError::Configuration("tag title required"));
    }
    let tag: TagPath = title.parse()?;
    Ok((tag.to_dir(home), tag.is_root()))
}

fn relative_segments(path: &Path, home: &Path) -> Result<Vec<String>> {
    let outside = || TagPathError::OutsideHome {
        path: path.to_path_buf(),
        home: home.to_path_buf(),
    };
    if home.as_os_str().is_empty() {
        return Err(TagPathError::Configuration("home directory required"));
    }
    let relative = path.strip_prefix(home).map_err(|_| outside())?;

    relative
        .components()
        .map(|component| match component {
            Component::Normal(os) => {
                let segment = os.to_str().ok_or_else(|| TagPathError::InvalidSegment {
                    segment: os.to_string_lossy().into_owned(),
                    reason: "not valid UTF-8",
                })?;
                validate_segment(segment)?;
                Ok(segment.to_string())
            }
            _ => Err(outside()),
        })
        .collect()
}

fn validate_segment(segment: &str) -> Result<()> {
    let invalid = |reason| {
        Err(TagPathError::InvalidSegment {
            segment: segment.to_string(),
            reason,
        })
    };
    if segment.is_empty() {
        return invalid("empty segment");
    }
    if segment == "." || segment == ".." {
        return invalid("relative segment");
    }
    if segment.contains('/') {
        return invalid("contains a path separator");
    }
    if segment.chars().any(|c| c.is_control()) {
        return invalid("contains a control character");
    }
    Ok(())
}

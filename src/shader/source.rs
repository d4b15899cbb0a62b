use log::{debug, warn};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use super::error::ShaderError;

const DIRECTIVE: &str = "#shader";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub const ALL: [StageKind; 2] = [StageKind::Vertex, StageKind::Fragment];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
        }
    }

    // First keyword found on a directive line wins.
    fn from_directive(line: &str) -> Option<StageKind> {
        StageKind::ALL
            .iter()
            .copied()
            .find(|kind| line.contains(kind.name()))
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the parser routes non-directive lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Unassigned,
    Stage(StageKind),
}

/// Per-stage source text split out of a single `#shader`-annotated file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderSourceBundle {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSourceBundle {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ShaderError> {
        let path = path.as_ref();
        let unreadable = |source| ShaderError::Unreadable {
            path: path.to_owned(),
            source,
        };

        let file = File::open(path).map_err(unreadable)?;
        let bundle = Self::parse(BufReader::new(file)).map_err(unreadable)?;
        debug!(
            "loaded {}: {} vertex bytes, {} fragment bytes",
            path.display(),
            bundle.vertex.len(),
            bundle.fragment.len()
        );
        Ok(bundle)
    }

    /// Splits `reader` into stage blocks.
    ///
    /// A line containing `#shader` selects the stage named on it and is
    /// dropped. Every other line goes, terminator included, to the most
    /// recently selected stage; a final line without one gets `\n`. Lines
    /// before the first directive have no stage and are discarded.
    pub fn parse<R: BufRead>(mut reader: R) -> io::Result<Self> {
        let mut bundle = ShaderSourceBundle::default();
        let mut section = Section::Unassigned;
        let mut dropped = 0usize;
        let mut line = String::new();
        let mut number = 0usize;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            number += 1;

            if line.contains(DIRECTIVE) {
                match StageKind::from_directive(&line) {
                    Some(kind) => section = Section::Stage(kind),
                    None => warn!(
                        "line {}: unknown shader stage in {:?}, keeping previous section",
                        number,
                        line.trim_end()
                    ),
                }
                continue;
            }

            match section {
                Section::Unassigned => dropped += 1,
                Section::Stage(kind) => {
                    let block = bundle.stage_mut(kind);
                    block.push_str(&line);
                    if !line.ends_with('\n') {
                        block.push('\n');
                    }
                }
            }
        }

        if dropped > 0 {
            warn!(
                "discarded {} line(s) before the first {} directive",
                dropped, DIRECTIVE
            );
        }
        Ok(bundle)
    }

    pub fn stage(&self, kind: StageKind) -> &str {
        match kind {
            StageKind::Vertex => &self.vertex,
            StageKind::Fragment => &self.fragment,
        }
    }

    fn stage_mut(&mut self, kind: StageKind) -> &mut String {
        match kind {
            StageKind::Vertex => &mut self.vertex,
            StageKind::Fragment => &mut self.fragment,
        }
    }
}

//! Metadata probes: where raw width, height and orientation come from.
//!
//! `ProbeKind::File` streams the output of `file(1)` for the whole batch
//! and scrapes each line; `ProbeKind::Exif` reads image headers in-process.
//! Both yield one [`ProbedFile`] per input, in enumeration order.

use crate::classify::UNKNOWN_ORIENTATION;
use crate::error::FitError;
use clap::ValueEnum;
use log::{debug, warn};
use regex::Regex;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::LazyLock;
use std::thread::{self, JoinHandle};

const FILE_PROGRAM: &str = "file";

// Last match wins: `file` reports the JFIF density (e.g. 300x300) before
// the pixel size.
static DIMENSIONS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3,}) ?x ?(\d{3,})\b").unwrap());
static FILE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?\.(?i:jpe?g|png)):\s").unwrap());
static ORIENTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"orientation=([\w-]+)").unwrap());

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ProbeKind {
    /// Scrape the output of the `file` utility
    File,
    /// Read dimensions and the EXIF Orientation tag directly
    Exif,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageMetadata {
    pub raw_width: u32,
    pub raw_height: u32,
    pub orientation: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbedFile {
    pub path: PathBuf,
    pub metadata: ImageMetadata,
}

pub type Records = Box<dyn Iterator<Item = Result<ProbedFile, FitError>> + Send>;

/// Start probing `files`. The records iterator can be handed to another
/// thread; the collaborator, if any, must be finished by the caller.
pub fn open(kind: ProbeKind, files: Vec<PathBuf>) -> Result<(Records, Option<Collaborator>), FitError> {
    match kind {
        ProbeKind::File => {
            let mut command = Command::new(FILE_PROGRAM);
            command.args(&files);
            let (collaborator, lines) = Collaborator::spawn(FILE_PROGRAM, command)?;
            Ok((file_records(FILE_PROGRAM, lines), Some(collaborator)))
        }
        ProbeKind::Exif => {
            let records = files.into_iter().map(|path| {
                let metadata = read_metadata(&path)?;
                Ok(ProbedFile { path, metadata })
            });
            Ok((Box::new(records), None))
        }
    }
}

/// Parse collaborator output lines as they arrive. A failed read ends the
/// stream with an error rather than silently.
fn file_records(program: &'static str, lines: Receiver<io::Result<String>>) -> Records {
    Box::new(lines.into_iter().map(move |line| {
        let line = line.map_err(|source| FitError::ProbeOutput { program, source })?;
        debug!("{line}");
        parse_file_line(&line)
    }))
}

/// A running `file` process and the threads draining its output.
pub struct Collaborator {
    program: &'static str,
    child: Child,
    readers: Vec<JoinHandle<()>>,
}

impl Collaborator {
    fn spawn(
        program: &'static str,
        mut command: Command,
    ) -> Result<(Self, Receiver<io::Result<String>>), FitError> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FitError::ProbeSpawn { program, source })?;

        // stdout and stderr share one channel, like a merged stream.
        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, tx));
        }

        Ok((
            Self {
                program,
                child,
                readers,
            },
            rx,
        ))
    }

    /// Wait for the process to exit. When the batch failed the process is
    /// killed first so a blocked pipe cannot hang the run.
    pub fn finish(mut self, batch_ok: bool) -> Result<(), FitError> {
        let program = self.program;
        if !batch_ok {
            if let Err(e) = self.child.kill() {
                warn!("Failed to stop '{program}': {e}");
            }
        }
        for reader in self.readers.drain(..) {
            if reader.join().is_err() {
                warn!("'{program}' output reader panicked");
            }
        }
        let status = self
            .child
            .wait()
            .map_err(|source| FitError::io(program, source))?;
        if batch_ok && !status.success() {
            return Err(FitError::ProbeFailed { program, status });
        }
        Ok(())
    }
}

fn forward_lines<R: Read + Send + 'static>(
    pipe: R,
    tx: Sender<io::Result<String>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for line in BufReader::new(pipe).lines() {
            let failed = line.is_err();
            // Receiver gone: the batch stopped.
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    })
}

/// Parse one line of `file` output, e.g.
/// `/pics/a.jpg: JPEG image data, Exif standard: [TIFF image data, big-endian,
/// direntries=10, orientation=lower-left], baseline, precision 8, 4000x3000, components 3`.
pub fn parse_file_line(line: &str) -> Result<ProbedFile, FitError> {
    let path = FILE_PATH
        .captures(line)
        .map(|caps| PathBuf::from(&caps[1]))
        .ok_or_else(|| FitError::MissingFilePath {
            line: line.to_string(),
        })?;

    let caps = DIMENSIONS
        .captures_iter(line)
        .last()
        .ok_or_else(|| FitError::MissingDimensions {
            line: line.to_string(),
        })?;
    let raw_width = parse_dimension(&caps[1], line)?;
    let raw_height = parse_dimension(&caps[2], line)?;

    let orientation = ORIENTATION
        .captures(line)
        .map(|caps| caps[1].to_string())
        .unwrap_or_else(|| UNKNOWN_ORIENTATION.to_string());

    Ok(ProbedFile {
        path,
        metadata: ImageMetadata {
            raw_width,
            raw_height,
            orientation,
        },
    })
}

fn parse_dimension(token: &str, line: &str) -> Result<u32, FitError> {
    match token.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(FitError::InvalidDimension {
            token: token.to_string(),
            line: line.to_string(),
        }),
    }
}

/// Read raw dimensions from the image header and the EXIF Orientation tag,
/// named the way `file` names it.
pub fn read_metadata(path: &Path) -> Result<ImageMetadata, FitError> {
    let (raw_width, raw_height) =
        image::image_dimensions(path).map_err(|source| FitError::Metadata {
            path: path.to_path_buf(),
            source,
        })?;

    let orientation = read_exif_orientation(path)
        .map(|value| orientation_name(value).to_string())
        .unwrap_or_else(|| UNKNOWN_ORIENTATION.to_string());

    Ok(ImageMetadata {
        raw_width,
        raw_height,
        orientation,
    })
}

fn read_exif_orientation(path: &Path) -> Option<u32> {
    let file = std::fs::File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

/// `file(1)` wording for EXIF Orientation values 1-8.
pub fn orientation_name(value: u32) -> &'static str {
    match value {
        1 => "upper-left",
        2 => "upper-right",
        3 => "lower-right",
        4 => "lower-left",
        5 => "left-top",
        6 => "right-top",
        7 => "right-bottom",
        8 => "left-bottom",
        _ => UNKNOWN_ORIENTATION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_pixel_size_over_density() {
        let line = "/path/xxx/Pictures/file-01.jpg: JPEG image data, JFIF standard 1.01, \
                    resolution (DPI), density 300x300, segment length 16, Exif Standard: \
                    [TIFF image data, little-endian, direntries=7], baseline, precision 8, \
                    5828x3891, components 3";
        let probed = parse_file_line(line).unwrap();
        assert_eq!(probed.path, PathBuf::from("/path/xxx/Pictures/file-01.jpg"));
        assert_eq!(probed.metadata.raw_width, 5828);
        assert_eq!(probed.metadata.raw_height, 3891);
        assert_eq!(probed.metadata.orientation, UNKNOWN_ORIENTATION);
    }

    #[test]
    fn reads_orientation_tag() {
        let line = "/pics/IMG_0001.JPEG: JPEG image data, Exif standard: [TIFF image data, \
                    big-endian, direntries=10, orientation=lower-left, xresolution=156], \
                    baseline, precision 8, 4000x3000, components 3";
        let probed = parse_file_line(line).unwrap();
        assert_eq!(probed.path, PathBuf::from("/pics/IMG_0001.JPEG"));
        assert_eq!(probed.metadata.orientation, "lower-left");
        assert_eq!(
            (probed.metadata.raw_width, probed.metadata.raw_height),
            (4000, 3000)
        );
    }

    #[test]
    fn accepts_png_wording() {
        let line = "/pics/shot.png: PNG image data, 1920 x 1080, 8-bit/color RGBA, non-interlaced";
        let probed = parse_file_line(line).unwrap();
        assert_eq!(
            (probed.metadata.raw_width, probed.metadata.raw_height),
            (1920, 1080)
        );
    }

    #[test]
    fn malformed_lines_are_errors() {
        assert!(matches!(
            parse_file_line("/pics/a.jpg: cannot open `/pics/a.jpg' (No such file or directory)"),
            Err(FitError::MissingDimensions { .. })
        ));
        assert!(matches!(
            parse_file_line("/pics/notes.txt: ASCII text, 1920x1080"),
            Err(FitError::MissingFilePath { .. })
        ));
        assert!(matches!(
            parse_file_line("/pics/a.jpg: JPEG image data, 000x600"),
            Err(FitError::InvalidDimension { .. })
        ));
        assert!(matches!(
            parse_file_line("/pics/a.jpg: JPEG image data, 99999999999x600"),
            Err(FitError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn orientation_names_follow_file_wording() {
        assert_eq!(orientation_name(1), "upper-left");
        assert_eq!(orientation_name(2), "upper-right");
        assert_eq!(orientation_name(4), "lower-left");
        assert_eq!(orientation_name(8), "left-bottom");
        assert_eq!(orientation_name(0), UNKNOWN_ORIENTATION);
    }

    #[test]
    fn exif_source_without_tag_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.png");
        image::RgbImage::new(320, 240).save(&path).unwrap();

        let (records, collaborator) = open(ProbeKind::Exif, vec![path.clone()]).unwrap();
        assert!(collaborator.is_none());
        let probed: Vec<_> = records.collect::<Result<_, _>>().unwrap();
        assert_eq!(
            probed,
            vec![ProbedFile {
                path,
                metadata: ImageMetadata {
                    raw_width: 320,
                    raw_height: 240,
                    orientation: UNKNOWN_ORIENTATION.to_string(),
                },
            }]
        );
    }

    #[test]
    fn exif_source_reports_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        let (mut records, _) = open(ProbeKind::Exif, vec![path]).unwrap();
        assert!(matches!(records.next(), Some(Err(FitError::Metadata { .. }))));
    }

    fn sh(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.args(["-c", script]);
        command
    }

    #[test]
    fn undecodable_output_line_is_an_error() {
        let (tx, rx) = mpsc::channel();
        let pipe = io::Cursor::new(
            b"/p/caf\xe9.jpg: JPEG image data, 1920x1080\n/p/b.jpg: JPEG image data, 1920x1080\n"
                .to_vec(),
        );
        forward_lines(pipe, tx).join().unwrap();

        let mut records = file_records(FILE_PROGRAM, rx);
        assert!(matches!(
            records.next(),
            Some(Err(FitError::ProbeOutput { .. }))
        ));
        assert!(records.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn collaborator_lines_arrive_in_order() {
        let (collaborator, lines) = Collaborator::spawn(
            "sh",
            sh("printf '%s\\n' '/p/a.jpg: JPEG image data, 1920x1080' \
                '/p/b.jpg: JPEG image data, [orientation=lower-left], 4000x3000'"),
        )
        .unwrap();

        let probed: Vec<_> = file_records("sh", lines)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(probed.len(), 2);
        assert_eq!(probed[0].path, PathBuf::from("/p/a.jpg"));
        assert_eq!(probed[1].path, PathBuf::from("/p/b.jpg"));
        assert_eq!(probed[1].metadata.orientation, "lower-left");
        collaborator.finish(true).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn collaborator_stderr_joins_the_stream() {
        let (collaborator, lines) =
            Collaborator::spawn("sh", sh("echo 'cannot open directory' >&2")).unwrap();

        let mut records = file_records("sh", lines);
        assert!(matches!(
            records.next(),
            Some(Err(FitError::MissingFilePath { .. }))
        ));
        drop(records);
        collaborator.finish(false).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn collaborator_exit_status_is_checked() {
        let (collaborator, lines) = Collaborator::spawn(
            "sh",
            sh("echo '/p/a.jpg: JPEG image data, 1920x1080'; exit 3"),
        )
        .unwrap();

        assert_eq!(file_records("sh", lines).filter(Result::is_ok).count(), 1);
        assert!(matches!(
            collaborator.finish(true),
            Err(FitError::ProbeFailed { program: "sh", .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn failed_batch_stops_a_running_collaborator() {
        let (collaborator, lines) =
            Collaborator::spawn("sh", sh("echo 'garbage'; exec sleep 30")).unwrap();

        let mut records = file_records("sh", lines);
        assert!(records.next().unwrap().is_err());
        drop(records);

        let start = std::time::Instant::now();
        collaborator.finish(false).unwrap();
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }
}

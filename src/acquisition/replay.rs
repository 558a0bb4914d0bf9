//! Frame replay source.
//!
//! Replays pre-recorded amplitude frames, one per tick. The file format is
//! one frame per line of comma-separated byte magnitudes; blank lines and
//! lines starting with `#` are skipped. Every frame must have the length of
//! the first one.

use async_trait::async_trait;
use std::path::PathBuf;

use super::{check_frame_len, AcquisitionError, AcquisitionSource};

/// Where the replay frames come from.
enum ReplayInput {
    File(PathBuf),
    Frames(Vec<Vec<u8>>),
}

/// Replays recorded frames, optionally looping at the end.
pub struct ReplaySource {
    input: ReplayInput,
    frames: Vec<Vec<u8>>,
    cursor: usize,
    looping: bool,
    ready: bool,
    released: bool,
}

impl ReplaySource {
    /// Replay frames from a file; parsed when the source becomes ready.
    pub fn from_file(path: impl Into<PathBuf>, looping: bool) -> Self {
        Self::with_input(ReplayInput::File(path.into()), looping)
    }

    /// Replay in-memory frames.
    pub fn from_frames(frames: Vec<Vec<u8>>, looping: bool) -> Self {
        Self::with_input(ReplayInput::Frames(frames), looping)
    }

    fn with_input(input: ReplayInput, looping: bool) -> Self {
        Self {
            input,
            frames: Vec::new(),
            cursor: 0,
            looping,
            ready: false,
            released: false,
        }
    }

    /// Number of frames loaded.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Parse the replay text format.
pub fn parse_frames(text: &str) -> Result<Vec<Vec<u8>>, AcquisitionError> {
    let mut frames: Vec<Vec<u8>> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let frame = line
            .split(',')
            .map(|field| {
                field.trim().parse::<u8>().map_err(|e| AcquisitionError::Parse {
                    line: line_no,
                    message: format!("'{}': {e}", field.trim()),
                })
            })
            .collect::<Result<Vec<u8>, _>>()?;

        if let Some(first) = frames.first() {
            if first.len() != frame.len() {
                return Err(AcquisitionError::Parse {
                    line: line_no,
                    message: format!("expected {} bins, found {}", first.len(), frame.len()),
                });
            }
        }
        frames.push(frame);
    }

    Ok(frames)
}

fn validate_frames(frames: &[Vec<u8>]) -> Result<(), AcquisitionError> {
    let Some(first) = frames.first() else {
        return Err(AcquisitionError::Unavailable("replay contains no frames".to_string()));
    };
    if first.is_empty() {
        return Err(AcquisitionError::Unavailable("replay frames have no bins".to_string()));
    }
    if let Some(bad) = frames.iter().find(|f| f.len() != first.len()) {
        return Err(AcquisitionError::FrameLength {
            expected: first.len(),
            actual: bad.len(),
        });
    }
    Ok(())
}

#[async_trait]
impl AcquisitionSource for ReplaySource {
    async fn ready(&mut self) -> Result<(), AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released);
        }
        if self.ready {
            return Ok(());
        }

        let frames = match &mut self.input {
            ReplayInput::File(path) => {
                let text = tokio::fs::read_to_string(path.as_path()).await?;
                parse_frames(&text)?
            }
            ReplayInput::Frames(frames) => std::mem::take(frames),
        };
        validate_frames(&frames)?;

        tracing::info!(frames = frames.len(), bins = frames[0].len(), looping = self.looping, "Replay source ready");
        self.frames = frames;
        self.ready = true;
        Ok(())
    }

    fn bin_count(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    fn read_frame(&mut self, frame: &mut [u8]) -> Result<(), AcquisitionError> {
        if self.released {
            return Err(AcquisitionError::Released);
        }
        if !self.ready {
            return Err(AcquisitionError::NotReady);
        }
        check_frame_len(self.bin_count(), frame)?;

        if self.cursor >= self.frames.len() {
            if !self.looping {
                return Err(AcquisitionError::Exhausted);
            }
            self.cursor = 0;
        }
        frame.copy_from_slice(&self.frames[self.cursor]);
        self.cursor += 1;
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.frames.clear();
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let frames = parse_frames("# recorded\n0,0,0,0\n\n 99, 99 ,99,99\n").unwrap();
        assert_eq!(frames, vec![vec![0, 0, 0, 0], vec![99, 99, 99, 99]]);
    }

    #[test]
    fn test_parse_reports_bad_value_line() {
        let err = parse_frames("1,2\n3,300\n").unwrap_err();
        assert!(matches!(err, AcquisitionError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_parse_rejects_ragged_frames() {
        let err = parse_frames("1,2,3\n4,5\n").unwrap_err();
        assert!(matches!(err, AcquisitionError::Parse { line: 2, .. }));
    }

    #[tokio::test]
    async fn test_file_replay_reads_in_order_and_loops() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1,1\n2,2").unwrap();

        let mut source = ReplaySource::from_file(file.path(), true);
        source.ready().await.unwrap();
        assert_eq!(source.bin_count(), 2);

        let mut frame = [0u8; 2];
        let mut seen = Vec::new();
        for _ in 0..3 {
            source.read_frame(&mut frame).unwrap();
            seen.push(frame[0]);
        }
        assert_eq!(seen, vec![1, 2, 1]);
    }

    #[tokio::test]
    async fn test_non_looping_replay_exhausts() {
        let mut source = ReplaySource::from_frames(vec![vec![5, 5]], false);
        source.ready().await.unwrap();
        let mut frame = [0u8; 2];
        source.read_frame(&mut frame).unwrap();
        assert!(matches!(source.read_frame(&mut frame), Err(AcquisitionError::Exhausted)));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let mut source = ReplaySource::from_file("/nonexistent/frames.txt", false);
        assert!(matches!(source.ready().await, Err(AcquisitionError::Io(_))));
    }

    #[tokio::test]
    async fn test_empty_replay_is_unavailable() {
        let mut source = ReplaySource::from_frames(Vec::new(), true);
        assert!(matches!(source.ready().await, Err(AcquisitionError::Unavailable(_))));
    }
}

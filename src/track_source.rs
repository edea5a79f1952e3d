// src/track_source.rs
//
// Tracker output as JSON lines, one frame per line:
//   {"frame": 12, "detections": [{"bbox": [x1, y1, x2, y2], "id": 3, "class": 0}]}
// A line that is not JSON is skipped with a warning. Within a line each
// detection is decoded on its own: one that lacks a four-element `bbox` or
// an integer `id` is dropped, the rest of the frame is kept. Non-numeric
// coordinates become NaN so the counter reports them as malformed boxes.

use crate::types::{BoundingBox, FrameTracks, TrackedDetection};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

const TRACK_EXTENSIONS: [&str; 2] = ["jsonl", "ndjson"];

/// `input` itself when it is a file, otherwise every track file under it,
/// sorted by path.
pub fn find_track_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("Input {} does not exist", input.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(input)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if TRACK_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
                files.push(path.to_path_buf());
            }
        }
    }
    files.sort();

    info!("Found {} track files in {}", files.len(), input.display());
    Ok(files)
}

/// Frame line with detections left undecoded.
#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "frame", default)]
    frame_index: Option<u64>,
    #[serde(default)]
    detections: Vec<Value>,
}

pub struct TrackReader<R: BufRead> {
    reader: R,
    line_no: usize,
    malformed: usize,
    dropped_detections: usize,
}

impl TrackReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open track file {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TrackReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            malformed: 0,
            dropped_detections: 0,
        }
    }

    /// Lines skipped because they did not parse.
    pub fn malformed(&self) -> usize {
        self.malformed
    }

    /// Detections dropped from otherwise valid lines.
    pub fn dropped_detections(&self) -> usize {
        self.dropped_detections
    }

    fn decode_frame(&mut self, raw: RawFrame) -> FrameTracks {
        let mut detections = Vec::with_capacity(raw.detections.len());
        for (i, value) in raw.detections.iter().enumerate() {
            match decode_detection(value) {
                Ok(det) => detections.push(det),
                Err(reason) => {
                    warn!(
                        "Line {}: dropping detection {}: {}",
                        self.line_no, i, reason
                    );
                    self.dropped_detections += 1;
                }
            }
        }
        FrameTracks {
            frame_index: raw.frame_index,
            detections,
        }
    }
}

impl<R: BufRead> Iterator for TrackReader<R> {
    type Item = Result<FrameTracks>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(Err(e).with_context(|| {
                        format!("Failed to read line {}", self.line_no + 1)
                    }))
                }
            }
            self.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let text = non_finite_as_null(trimmed);
            match serde_json::from_str::<RawFrame>(&text) {
                Ok(raw) => return Some(Ok(self.decode_frame(raw))),
                Err(e) => {
                    warn!("Skipping malformed line {}: {}", self.line_no, e);
                    self.malformed += 1;
                }
            }
        }
    }
}

fn decode_detection(value: &Value) -> std::result::Result<TrackedDetection, String> {
    let coords = value
        .get("bbox")
        .and_then(Value::as_array)
        .ok_or("missing bbox")?;
    if coords.len() != 4 {
        return Err(format!("bbox has {} values, expected 4", coords.len()));
    }
    let c: Vec<f32> = coords
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32).unwrap_or(f32::NAN))
        .collect();

    let identity = value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or("missing or non-integer id")?;
    let class_id = match value.get("class") {
        None | Some(Value::Null) => 0,
        Some(v) => v.as_i64().ok_or("non-integer class")?,
    };

    Ok(TrackedDetection::new(
        BoundingBox::new(c[0], c[1], c[2], c[3]),
        identity,
        class_id,
    ))
}

/// Python's `json` module writes non-finite floats as bare `NaN`,
/// `Infinity` and `-Infinity`, which are not JSON. Replace them with `null`
/// outside string literals.
fn non_finite_as_null(line: &str) -> Cow<'_, str> {
    if !line.contains("NaN") && !line.contains("Infinity") {
        return Cow::Borrowed(line);
    }
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut in_string = false;
    let mut escaped = false;
    while let Some(c) = rest.chars().next() {
        if !in_string {
            if let Some(token) = ["-Infinity", "Infinity", "NaN"]
                .iter()
                .find(|t| rest.starts_with(**t))
            {
                out.push_str("null");
                rest = &rest[token.len()..];
                continue;
            }
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoxDefect;
    use std::io::Cursor;

    fn read_all(input: &str) -> (Vec<FrameTracks>, TrackReader<Cursor<&str>>) {
        let mut reader = TrackReader::new(Cursor::new(input));
        let frames = reader.by_ref().map(|f| f.unwrap()).collect();
        (frames, reader)
    }

    #[test]
    fn test_reads_frames_and_skips_bad_lines() {
        let input = r#"{"frame": 0, "detections": [{"bbox": [10, 20, 30, 80], "id": 4, "class": 0}]}

not json
{"detections": []}
{"frame": 2, "detections": [{"bbox": [1, 2, 3, 4], "id": 9}]}
"#;
        let (frames, reader) = read_all(input);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].frame_index, Some(0));
        assert_eq!(frames[0].detections[0].identity, 4);
        assert_eq!(frames[0].detections[0].bbox.y2, 80.0);
        assert_eq!(frames[1].frame_index, None);
        assert!(frames[1].detections.is_empty());
        assert_eq!(frames[2].detections[0].class_id, 0, "class defaults to 0");
        assert_eq!(reader.malformed(), 1);
        assert_eq!(reader.dropped_detections(), 0);
    }

    #[test]
    fn test_bad_detection_keeps_rest_of_frame() {
        let input = r#"{"frame": 3, "detections": [{"bbox": [10, 20, 30, 80], "id": 1}, {"bbox": [NaN, 2, 3, 4], "id": 2}]}
{"frame": 4, "detections": [{"bbox": [10, 22, 30, 82], "id": 1}, {"bbox": [1, 2, 3], "id": 2}, {"bbox": [1, 2, 3, 4]}]}
{"frame": 5, "detections": [{"bbox": [10, "x", 30, null], "id": 1, "class": 2}]}
"#;
        let (frames, reader) = read_all(input);
        assert_eq!(frames.len(), 3, "no line is lost to a bad detection");
        assert_eq!(reader.malformed(), 0);

        assert_eq!(frames[0].detections.len(), 2);
        assert_eq!(frames[0].detections[0].bbox.defect(), None);
        assert_eq!(
            frames[0].detections[1].bbox.defect(),
            Some(BoxDefect::NonFinite),
            "NaN coordinates reach the counter as malformed boxes"
        );

        assert_eq!(frames[1].detections.len(), 1);
        assert_eq!(frames[1].detections[0].identity, 1);
        assert_eq!(reader.dropped_detections(), 2);

        assert_eq!(frames[2].detections[0].class_id, 2);
        assert_eq!(
            frames[2].detections[0].bbox.defect(),
            Some(BoxDefect::NonFinite)
        );
    }

    #[test]
    fn test_non_finite_tokens_outside_strings_only() {
        assert_eq!(
            non_finite_as_null(r#"{"a": [NaN, -Infinity, Infinity], "b": "NaN \" Infinity"}"#),
            r#"{"a": [null, null, null], "b": "NaN \" Infinity"}"#
        );
        assert!(matches!(non_finite_as_null("[1, 2]"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        assert!(find_track_files(Path::new("/definitely/not/here")).is_err());
    }
}

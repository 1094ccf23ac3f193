//! Line-delimited JSON frames for driving a [`Monitor`] from a stream
//!
//! Each input line is one [`Frame`]: either a tick of live readings or an
//! operator command. Each frame produces exactly one [`Response`] line.
//!
//! ```text
//! {"type":"readings","values":{"StandpipePressure":152.0,"Rop":48.5}}
//! {"type":"start_capture","ticks":60}
//! {"type":"apply_calibration","policy":"percentile"}
//! ```

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::warn;

use crate::baseline::{BaselineSummary, CaptureLimit};
use crate::boundary::BoundarySet;
use crate::calibration::{CalibrationPolicy, CalibrationReport};
use crate::monitor::{Monitor, MonitorError, MonitorSnapshot, TickReport};
use crate::types::Readings;

// ============================================================================
// Frames
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// One tick of live values
    Readings { values: Readings },
    /// Start a capture; without a limit the configured one is used
    StartCapture {
        #[serde(default)]
        ticks: Option<usize>,
        #[serde(default)]
        seconds: Option<i64>,
    },
    StopCapture,
    ApplyCalibration {
        #[serde(default)]
        policy: Option<CalibrationPolicy>,
    },
    SetPolicy { policy: CalibrationPolicy },
    ShowBoundaries,
    ResetBoundaries,
    ResetSequence,
    ShowHistory,
    Snapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Tick(TickReport),
    Calibration(CalibrationReport),
    Snapshot(MonitorSnapshot),
    Boundaries { boundaries: BoundarySet },
    History { entries: Vec<BaselineSummary> },
    Ack { action: String },
    Error { message: String },
}

impl Response {
    fn ack(action: &str) -> Self {
        Response::Ack { action: action.to_string() }
    }

    fn error(e: impl std::fmt::Display) -> Self {
        Response::Error { message: e.to_string() }
    }
}

/// Apply one frame to the monitor.
pub fn handle_frame(monitor: &mut Monitor, frame: Frame) -> Response {
    match frame {
        Frame::Readings { values } => Response::Tick(monitor.tick(&values)),
        Frame::StartCapture { ticks, seconds } => {
            let result = match (ticks, seconds) {
                (Some(n), _) => monitor.start_capture_with(CaptureLimit::Ticks(n)),
                (None, Some(s)) => CaptureLimit::seconds(s)
                    .map_err(MonitorError::from)
                    .and_then(|limit| monitor.start_capture_with(limit)),
                (None, None) => monitor.start_capture(),
            };
            result.map_or_else(Response::error, |()| Response::ack("start_capture"))
        }
        Frame::StopCapture => match monitor.stop_capture() {
            Ok(Some(report)) => Response::Calibration(report),
            Ok(None) => Response::ack("stop_capture"),
            Err(e) => Response::error(e),
        },
        Frame::ApplyCalibration { policy } => {
            monitor.apply_calibration(policy).map_or_else(Response::error, Response::Calibration)
        }
        Frame::SetPolicy { policy } => {
            monitor.set_policy(policy);
            Response::ack("set_policy")
        }
        Frame::ShowBoundaries => Response::Boundaries { boundaries: monitor.boundaries().clone() },
        Frame::ResetBoundaries => monitor
            .reset_boundaries()
            .map_or_else(Response::error, |()| Response::Boundaries { boundaries: monitor.boundaries().clone() }),
        Frame::ResetSequence => {
            monitor.reset_sequence();
            Response::ack("reset_sequence")
        }
        Frame::ShowHistory => Response::History { entries: monitor.baseline_history() },
        Frame::Snapshot => Response::Snapshot(monitor.snapshot()),
    }
}

// ============================================================================
// Frame Reader
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FrameEvent {
    Frame(Frame),
    Eof,
}

/// Longest accepted frame line, newline excluded.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// Reads frames from any buffered async reader (stdin in the binary).
/// Blank, malformed and over-long lines are skipped.
pub struct FrameReader<R> {
    reader: R,
    line_buffer: Vec<u8>,
    max_line_bytes: usize,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line_buffer: Vec::with_capacity(512), max_line_bytes: MAX_FRAME_BYTES }
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub async fn next_frame(&mut self) -> std::io::Result<FrameEvent> {
        loop {
            self.line_buffer.clear();
            // one byte of slack to tell "exactly at the limit" from "over it"
            let limit = self.max_line_bytes as u64 + 1;
            let bytes = (&mut self.reader).take(limit).read_until(b'\n', &mut self.line_buffer).await?;
            if bytes == 0 {
                return Ok(FrameEvent::Eof);
            }
            if bytes as u64 == limit && self.line_buffer.last() != Some(&b'\n') {
                let dropped = bytes + self.skip_rest_of_line().await?;
                warn!(bytes = dropped, max = self.max_line_bytes, "Skipping over-long frame");
                continue;
            }
            if self.line_buffer.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Frame>(&self.line_buffer) {
                Ok(frame) => return Ok(FrameEvent::Frame(frame)),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed frame");
                }
            }
        }
    }

    /// Discard input up to and including the next newline.
    async fn skip_rest_of_line(&mut self) -> std::io::Result<usize> {
        let mut skipped = 0;
        loop {
            let (consumed, done) = {
                let buf = self.reader.fill_buf().await?;
                if buf.is_empty() {
                    return Ok(skipped);
                }
                match buf.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (buf.len(), false),
                }
            };
            self.reader.consume(consumed);
            skipped += consumed;
            if done {
                return Ok(skipped);
            }
        }
    }
}

//! Session-window to buffer-offset reconciliation.
//!
//! A replay buffer is a rolling recording whose *end* lines up with the
//! save event, while requests address moments in session-relative time.
//! This module maps a requested window onto physical offsets inside the
//! saved file by re-expressing both window bounds as distances before the
//! save event and subtracting those from the probed duration.
//!
//! Pure and deterministic; no I/O.

use clipcast_models::TrimRequest;

/// Minimum viable clip length in seconds.
///
/// Degenerate and inverted windows widen to this floor instead of reaching
/// the transcoder as zero or negative-length requests.
pub const MIN_CLIP_SECONDS: f64 = 1.0;

/// Physical offsets into the buffer file for one extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferOffsets {
    /// Trim start, seconds from the start of the file
    pub in_seconds: f64,
    /// Trim end, seconds from the start of the file
    pub out_seconds: f64,
    /// Clip length (`out_seconds - in_seconds`)
    pub duration_seconds: f64,
}

/// Map a session-relative window onto offsets inside the buffer file.
///
/// With a usable probed duration and wall-clock anchors, each bound is
/// re-expressed as its distance before the save event and subtracted from
/// the file duration. Without them the raw session-relative window is
/// trusted as-is (degraded mode).
///
/// Guarantees for any input: `0 <= in < out`, `out <= probed_duration`
/// whenever `probed_duration > 0`, and a positive clip length.
pub fn compute_offsets(request: &TrimRequest, probed_duration: f64) -> BufferOffsets {
    let (raw_in, raw_out) = if probed_duration > 0.0 && request.timing_known() {
        (
            probed_duration - offset_from_end(request, request.requested_start),
            probed_duration - offset_from_end(request, request.requested_end),
        )
    } else {
        // No duration or no anchors to reconcile against
        (request.requested_start, request.requested_end)
    };

    clamp_window(raw_in, raw_out, probed_duration)
}

/// Distance in seconds between a session-relative moment and the save event.
fn offset_from_end(request: &TrimRequest, session_seconds: f64) -> f64 {
    let absolute_ms = request.session_started_at_epoch_ms as f64 + session_seconds * 1000.0;
    (request.buffer_saved_at_epoch_ms as f64 - absolute_ms) / 1000.0
}

fn clamp_window(raw_in: f64, raw_out: f64, probed_duration: f64) -> BufferOffsets {
    let upper = if probed_duration > 0.0 {
        probed_duration
    } else {
        f64::INFINITY
    };

    let mut in_seconds = raw_in.clamp(0.0, upper);
    let mut out_seconds = raw_out.clamp(0.0, upper);

    // Degenerate or inverted after clamping: widen forward to the floor
    // length, then pull the start back so the clip never runs past the file.
    if out_seconds - in_seconds < MIN_CLIP_SECONDS {
        out_seconds = (in_seconds + MIN_CLIP_SECONDS).min(upper);
        in_seconds = (out_seconds - MIN_CLIP_SECONDS).max(0.0);
    }

    BufferOffsets {
        in_seconds,
        out_seconds,
        duration_seconds: out_seconds - in_seconds,
    }
}

//! Synthetic recordings for the demo session

use std::f32::consts::TAU;

use vr_engine::playback::{LoadError, RawFrame, RawPerformances, RonFileStorage};

/// Capture rate of the generated recordings
const SAMPLE_RATE: f32 = 90.0;

/// Performers circling the room centre, each at its own speed
pub fn demo_recording(room: usize, performers: usize, frames: usize) -> RawPerformances {
    (0..performers)
        .map(|performer| {
            let radius = 0.6 + performer as f32 * 0.4;
            let speed = 0.25 + (room + performer) as f32 * 0.05;
            (0..frames)
                .map(|frame| {
                    let angle = TAU * speed * frame as f32 / SAMPLE_RATE;
                    performer_frame(radius, angle)
                })
                .collect()
        })
        .collect()
}

fn performer_frame(radius: f32, angle: f32) -> RawFrame {
    let (sin, cos) = angle.sin_cos();
    let (x, z) = (radius * cos, radius * sin);
    // Yaw so the performer faces along its path
    let (qy, qw) = ((-angle * 0.5).sin(), (-angle * 0.5).cos());
    let bob = 0.05 * (angle * 4.0).sin();
    [
        [x, 1.6 + bob, z, 0.0, qy, 0.0, qw],
        [x - 0.3 * sin, 1.1 - bob, z + 0.3 * cos, 0.0, qy, 0.0, qw],
        [x + 0.3 * sin, 1.1 + bob, z - 0.3 * cos, 0.0, qy, 0.0, qw],
    ]
}

/// Write `rooms` recordings and return their identifiers
pub fn write_demo_recordings(
    storage: &RonFileStorage,
    rooms: usize,
    performers: usize,
    frames: usize,
) -> Result<Vec<String>, LoadError> {
    (0..rooms)
        .map(|room| {
            let id = format!("take-{:02}", room + 1);
            let path = storage.save(&id, &demo_recording(room, performers, frames))?;
            log::debug!("Wrote {}", path.display());
            Ok(id)
        })
        .collect()
}

//! Rough resource estimates shown before capturing and before dumping.

/// RAM needed per frame set (one depth, one infrared and one color frame).
pub const RAM_MB_PER_FRAME_SET: f32 = 4.8;

/// Disk needed per frame set once every artifact is written.
pub const DISK_MB_PER_FRAME_SET: f32 = 8.5;

pub fn ram_mb(capacity: usize) -> f32 {
    capacity as f32 * RAM_MB_PER_FRAME_SET
}

pub fn disk_mb(depth_frames: usize) -> f32 {
    depth_frames as f32 * DISK_MB_PER_FRAME_SET
}

const BYTES_PER_MB: f32 = 1024.0 * 1024.0;

/// Estimate plus the exact size of the preallocated frame pools.
pub fn ram_line(capacity: usize, pool_bytes: usize) -> String {
    format!(
        "RAM required: {:.1} MB (estimate), frame pools: {:.1} MB",
        ram_mb(capacity),
        pool_bytes as f32 / BYTES_PER_MB
    )
}

pub fn disk_line(depth_frames: usize) -> String {
    format!("Disk storage required: {:.1} MB (estimate)", disk_mb(depth_frames))
}

/// Hint printed when the user declines the dump.
pub fn disk_rate_hint(fps: u32) -> String {
    format!(
        "Use -n <num_seconds> to capture less; each second takes around {:.1} MB of disk",
        DISK_MB_PER_FRAME_SET * fps as f32
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimates_scale_linearly() {
        assert!((ram_mb(1800) - 8640.0).abs() < 0.5);
        assert!((disk_mb(900) - 7650.0).abs() < 0.5);
        assert_eq!(ram_mb(0), 0.0);
    }

    #[test]
    fn test_lines() {
        assert_eq!(
            ram_line(10, 3 * 1024 * 1024),
            "RAM required: 48.0 MB (estimate), frame pools: 3.0 MB"
        );
        assert_eq!(disk_line(2), "Disk storage required: 17.0 MB (estimate)");
        assert!(disk_rate_hint(30).ends_with("255.0 MB of disk"));
    }
}

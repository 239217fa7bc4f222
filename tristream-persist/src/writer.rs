//! Frame writers.
//!
//! Persistence runs only after every capture loop has joined, so the pools
//! are read-only here and the three streams can be written in parallel.

use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::thread::{self, ScopedJoinHandle};

use image::{EncodableLayout, ImageBuffer, Luma, Pixel, PixelWithColorType};
use tracing::{debug, info};
use tristream_capture::{SessionCapture, StatusBoard};
use tristream_color::{CoordinateMapper, DecodedColor, Reprojector};
use tristream_data::{FramePool, MatchKind, Modality, nearest_preceding_depth};

use crate::PersistError;
use crate::layout::{Artifact, DumpLayout};
use crate::timetable::TimeTable;

/// Knobs for writing a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistOptions {
    /// Log every artifact path at `info` instead of `debug`.
    pub verbose: bool,
}

impl PersistOptions {
    fn wrote(&self, path: &Path) {
        if self.verbose {
            info!(path = %path.display(), "Wrote");
        } else {
            debug!(path = %path.display(), "Wrote");
        }
    }
}

/// Color frames written, and how many of them also got depth-space images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorWritten {
    pub frames: usize,
    pub mapped: usize,
}

/// Frames written per stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub depth: usize,
    pub infrared: usize,
    pub color: ColorWritten,
}

fn write_error(path: &Path, source: io::Error) -> PersistError {
    PersistError::WriteFile {
        path: path.to_path_buf(),
        source,
    }
}

fn save<P, C>(
    image: &ImageBuffer<P, C>,
    path: PathBuf,
    options: PersistOptions,
) -> Result<(), PersistError>
where
    P: Pixel + PixelWithColorType,
    [P::Subpixel]: EncodableLayout,
    C: Deref<Target = [P::Subpixel]>,
{
    image
        .save(&path)
        .map_err(|e| PersistError::Encode {
            path: path.clone(),
            source: e,
        })?;
    options.wrote(&path);
    Ok(())
}

/// Write a depth or infrared pool as 16-bit TIFFs plus its timestamp table.
///
/// Returns the number of frames written.
pub fn write_gray16_stream(
    pool: &FramePool<u16>,
    layout: &DumpLayout,
    status: &StatusBoard,
    options: PersistOptions,
) -> Result<usize, PersistError> {
    let modality = pool.modality();
    let artifact = Artifact::raw(modality);
    let resolution = pool.resolution();
    let times_path = layout.times_path(modality);
    let mut table = TimeTable::create(&times_path)?;

    for frame in pool.frames() {
        let path = layout.frame_path(artifact, frame.index);
        let image = ImageBuffer::<Luma<u16>, &[u16]>::from_raw(
            resolution.width,
            resolution.height,
            frame.samples,
        )
        .ok_or_else(|| {
            write_error(
                &path,
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    "frame does not match its resolution",
                ),
            )
        })?;
        save(&image, path, options)?;
        table
            .push(frame.index, frame.timestamp)
            .map_err(|e| write_error(&times_path, e))?;
    }

    let written = table.rows();
    table.finish().map_err(|e| write_error(&times_path, e))?;
    status.report(format!("{} frames written: {}", modality.label(), written));
    Ok(written)
}

/// Write the color pool: raw YUY2, decoded gray and RGB, and the depth-space
/// images for every frame with a depth correspondence.
pub fn write_color_stream<M>(
    color: &FramePool<u8>,
    depth: &FramePool<u16>,
    mapper: &M,
    layout: &DumpLayout,
    status: &StatusBoard,
    options: PersistOptions,
) -> Result<ColorWritten, PersistError>
where
    M: CoordinateMapper + ?Sized,
{
    let resolution = color.resolution();
    let times_path = layout.times_path(Modality::Color);
    let mut table = TimeTable::create(&times_path)?;
    let mut reprojector = Reprojector::new(depth.resolution());
    let mut mapped = 0;

    for frame in color.frames() {
        let raw_path = layout.frame_path(Artifact::Yuyv, frame.index);
        std::fs::write(&raw_path, frame.samples).map_err(|e| write_error(&raw_path, e))?;
        options.wrote(&raw_path);

        let decoded = DecodedColor::decode(frame.samples, resolution)?;
        save(&decoded.gray, layout.frame_path(Artifact::Gray, frame.index), options)?;
        save(&decoded.rgb, layout.frame_path(Artifact::Rgb, frame.index), options)?;

        if let Some(found) = nearest_preceding_depth(depth.timestamps(), frame.timestamp) {
            if found.kind == MatchKind::LastFrameFallback {
                debug!(
                    index = frame.index,
                    depth = found.index,
                    "No depth frame precedes color frame, using the last one"
                );
            }
            if let Some(samples) = depth.samples(found.index) {
                let aligned = reprojector.reproject(mapper, samples, &decoded)?;
                let index = frame.index;
                save(&aligned.gray, layout.frame_path(Artifact::GrayMapped, index), options)?;
                save(&aligned.rgb, layout.frame_path(Artifact::RgbMapped, index), options)?;
                mapped += 1;
            }
        }

        table
            .push(frame.index, frame.timestamp)
            .map_err(|e| write_error(&times_path, e))?;
    }

    let frames = table.rows();
    table.finish().map_err(|e| write_error(&times_path, e))?;
    status.report(format!("{} frames written: {}", Modality::Color.label(), frames));
    Ok(ColorWritten { frames, mapped })
}

fn join_writer<T>(
    handle: ScopedJoinHandle<'_, Result<T, PersistError>>,
    modality: Modality,
) -> Result<T, PersistError> {
    handle
        .join()
        .unwrap_or(Err(PersistError::ThreadPanicked(modality)))
}

/// Write a finished capture into `layout`, one thread per stream.
///
/// The dump directory is created first. All three writers run to completion
/// before the first error, in depth, infrared, color order, is returned.
pub fn persist_session<M>(
    capture: &SessionCapture,
    mapper: &M,
    layout: &DumpLayout,
    status: &StatusBoard,
    options: PersistOptions,
) -> Result<PersistReport, PersistError>
where
    M: CoordinateMapper + ?Sized,
{
    layout.create()?;
    info!(path = %layout.root().display(), "Persisting capture session");

    thread::scope(|s| {
        let depth =
            s.spawn(move || write_gray16_stream(&capture.depth.pool, layout, status, options));
        let infrared =
            s.spawn(move || write_gray16_stream(&capture.infrared.pool, layout, status, options));
        let color = s.spawn(move || {
            write_color_stream(
                &capture.color.pool,
                &capture.depth.pool,
                mapper,
                layout,
                status,
                options,
            )
        });

        let depth = join_writer(depth, Modality::Depth);
        let infrared = join_writer(infrared, Modality::Infrared);
        let color = join_writer(color, Modality::Color);

        Ok(PersistReport {
            depth: depth?,
            infrared: infrared?,
            color: color?,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tristream_capture::{LoopStats, StopReason, StreamCapture};
    use tristream_color::AffineMapper;
    use tristream_data::{Resolution, Ticks};

    const DEPTH: Resolution = Resolution {
        width: 4,
        height: 2,
    };
    const COLOR: Resolution = Resolution {
        width: 8,
        height: 4,
    };

    fn captured<T: bytemuck::Pod>(pool: FramePool<T>) -> StreamCapture<T> {
        StreamCapture {
            pool,
            stop_reason: StopReason::SessionStopped,
            stats: LoopStats::default(),
        }
    }

    fn gray16_pool(modality: Modality, times: &[i64]) -> FramePool<u16> {
        let mut pool = FramePool::allocate(modality, DEPTH, 4).unwrap();
        for (i, &t) in times.iter().enumerate() {
            let samples: Vec<u16> = (1..=8).map(|s| s * 100 + i as u16).collect();
            pool.write(i, &samples, Ticks::new(t));
        }
        pool.seal(times.len());
        pool
    }

    /// White YUY2 frames at the given times.
    fn color_pool(times: &[i64]) -> FramePool<u8> {
        let mut pool = FramePool::with_guard_slot(Modality::Color, COLOR, 4).unwrap();
        let white: Vec<u8> = [235u8, 128].repeat(COLOR.area());
        for (i, &t) in times.iter().enumerate() {
            pool.write(i, &white, Ticks::new(t));
        }
        pool.seal(times.len());
        pool
    }

    fn session(depth_times: &[i64], color_times: &[i64]) -> SessionCapture {
        SessionCapture {
            depth: captured(gray16_pool(Modality::Depth, depth_times)),
            infrared: captured(gray16_pool(Modality::Infrared, &[110, 210])),
            color: captured(color_pool(color_times)),
        }
    }

    fn dump() -> (TempDir, DumpLayout) {
        let dir = tempfile::tempdir().unwrap();
        let layout = DumpLayout::new(dir.path().join("session"));
        (dir, layout)
    }

    #[test]
    fn test_persist_writes_every_artifact() {
        let (_dir, layout) = dump();
        let status = StatusBoard::in_memory();
        let capture = session(&[100, 200, 300], &[50, 250]);
        let mapper = AffineMapper::stretch(DEPTH, COLOR);

        let report =
            persist_session(&capture, &mapper, &layout, &status, PersistOptions::default())
                .unwrap();

        assert_eq!(report.depth, 3);
        assert_eq!(report.infrared, 2);
        assert_eq!(report.color, ColorWritten { frames: 2, mapped: 2 });

        for name in [
            "depth00000002.tiff",
            "infra00000001.tiff",
            "yuyv00000001.yuv",
            "gray00000000.tiff",
            "rgb00000001.tiff",
            "grayMapped00000000.tiff",
            "rgbMapped00000001.tiff",
        ] {
            assert!(layout.root().join(name).is_file(), "missing {name}");
        }
        assert!(!layout.root().join("depth00000003.tiff").exists());

        let lines = status.lines();
        assert!(lines.contains(&"Depth frames written: 3".to_string()));
        assert!(lines.contains(&"Infra frames written: 2".to_string()));
        assert!(lines.contains(&"Color frames written: 2".to_string()));
    }

    #[test]
    fn test_depth_tiff_round_trips_raw_samples() {
        let (_dir, layout) = dump();
        layout.create().unwrap();
        let pool = gray16_pool(Modality::Depth, &[100, 200]);

        write_gray16_stream(&pool, &layout, &StatusBoard::in_memory(), PersistOptions::default())
            .unwrap();

        let image = image::open(layout.frame_path(Artifact::Depth, 1)).unwrap();
        assert_eq!(image.width(), 4);
        assert_eq!(image.into_luma16().into_raw(), pool.samples(1).unwrap());

        let table = fs::read_to_string(layout.times_path(Modality::Depth)).unwrap();
        assert_eq!(table, "frame_idx\tRelativeTime\n0\t100\n1\t200\n");
    }

    #[test]
    fn test_color_outputs() {
        let (_dir, layout) = dump();
        layout.create().unwrap();
        let depth = gray16_pool(Modality::Depth, &[100]);
        let color = color_pool(&[150]);
        let mapper = AffineMapper::stretch(DEPTH, COLOR);

        let written = write_color_stream(
            &color,
            &depth,
            &mapper,
            &layout,
            &StatusBoard::in_memory(),
            PersistOptions { verbose: true },
        )
        .unwrap();
        assert_eq!(written, ColorWritten { frames: 1, mapped: 1 });

        let raw = fs::read(layout.frame_path(Artifact::Yuyv, 0)).unwrap();
        assert_eq!(raw, color.bytes(0).unwrap());

        let rgb = image::open(layout.frame_path(Artifact::Rgb, 0)).unwrap().into_rgb8();
        assert_eq!(rgb.dimensions(), (8, 4));
        assert!(rgb.pixels().all(|p| p.0 == [255, 255, 255]));

        let mapped = image::open(layout.frame_path(Artifact::GrayMapped, 0))
            .unwrap()
            .into_luma8();
        assert_eq!(mapped.dimensions(), (4, 2));
        assert!(mapped.pixels().all(|p| p.0 == [235]));

        let table = fs::read_to_string(layout.times_path(Modality::Color)).unwrap();
        assert_eq!(table, "frame_idx\tRelativeTime\n0\t150\n");
    }

    #[test]
    fn test_color_without_depth_is_not_mapped() {
        let (_dir, layout) = dump();
        let capture = session(&[], &[50, 250]);
        let mapper = AffineMapper::stretch(DEPTH, COLOR);

        let report = persist_session(
            &capture,
            &mapper,
            &layout,
            &StatusBoard::in_memory(),
            PersistOptions::default(),
        )
        .unwrap();

        assert_eq!(report.depth, 0);
        assert_eq!(report.color, ColorWritten { frames: 2, mapped: 0 });
        assert!(layout.root().join("gray00000001.tiff").is_file());
        assert!(!layout.root().join("grayMapped00000000.tiff").exists());
    }

    #[test]
    fn test_mapping_failure_is_fatal() {
        let (_dir, layout) = dump();
        let capture = session(&[100], &[150]);
        let wrong = AffineMapper::stretch(Resolution::new(2, 2), COLOR);

        let result = persist_session(
            &capture,
            &wrong,
            &layout,
            &StatusBoard::in_memory(),
            PersistOptions::default(),
        );
        assert!(matches!(result, Err(PersistError::Mapping(_))));
    }

    #[test]
    fn test_uncreatable_dump_dir_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"not a directory").unwrap();
        let layout = DumpLayout::new(blocker.join("session"));

        let result = persist_session(
            &session(&[100], &[150]),
            &AffineMapper::stretch(DEPTH, COLOR),
            &layout,
            &StatusBoard::in_memory(),
            PersistOptions::default(),
        );
        assert!(matches!(result, Err(PersistError::CreateDirectory { .. })));
    }
}

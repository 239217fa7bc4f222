//! Preallocated frame storage for one stream.
//!
//! A [`FramePool`] is an arena of fixed-size slots addressed by index. All
//! sample memory and the parallel timestamp array are reserved once, before
//! capture starts, and zero-initialized. Slots below [`FramePool::count`] are
//! valid frames; everything at or above it is unwritten.

use std::mem::size_of;

use bytemuck::Pod;
use thiserror::Error;
use tracing::debug;

use crate::types::{Modality, Resolution, Ticks};

/// Errors raised while allocating a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("{modality} samples are {bytes_per_pixel} bytes per pixel, not a multiple of {element_size}-byte elements")]
    ElementSize {
        modality: Modality,
        bytes_per_pixel: usize,
        element_size: usize,
    },

    #[error("{modality} pool of {slots} frames at {resolution} overflows the address space")]
    Overflow {
        modality: Modality,
        slots: usize,
        resolution: Resolution,
    },

    #[error("unable to reserve {bytes} bytes for the {modality} pool")]
    OutOfMemory { modality: Modality, bytes: usize },
}

/// A valid frame borrowed from a pool.
#[derive(Debug, Clone, Copy)]
pub struct FrameRef<'a, T> {
    pub index: usize,
    pub timestamp: Ticks,
    pub samples: &'a [T],
}

/// Fixed-capacity sample and timestamp storage for one stream.
#[derive(Debug)]
pub struct FramePool<T: Pod> {
    modality: Modality,
    resolution: Resolution,
    samples_per_frame: usize,
    capacity: usize,
    slots: usize,
    data: Vec<T>,
    timestamps: Vec<Ticks>,
    count: usize,
    sealed: bool,
}

impl<T: Pod> FramePool<T> {
    /// Reserve `capacity` zeroed slots for `modality` at `resolution`.
    pub fn allocate(
        modality: Modality,
        resolution: Resolution,
        capacity: usize,
    ) -> Result<Self, PoolError> {
        Self::with_slots(modality, resolution, capacity, capacity)
    }

    /// Like [`allocate`](Self::allocate), with one extra guard slot past the
    /// nominal capacity.
    ///
    /// The guard keeps `slot(count)` addressable when a stream stops exactly
    /// at its capacity, so [`seal`](Self::seal) can always invalidate the tail.
    pub fn with_guard_slot(
        modality: Modality,
        resolution: Resolution,
        capacity: usize,
    ) -> Result<Self, PoolError> {
        Self::with_slots(modality, resolution, capacity, capacity + 1)
    }

    fn with_slots(
        modality: Modality,
        resolution: Resolution,
        capacity: usize,
        slots: usize,
    ) -> Result<Self, PoolError> {
        let element_size = size_of::<T>();
        let bytes_per_pixel = modality.bytes_per_pixel();
        if element_size == 0 || bytes_per_pixel % element_size != 0 {
            return Err(PoolError::ElementSize {
                modality,
                bytes_per_pixel,
                element_size,
            });
        }

        let samples_per_frame = resolution.area() * (bytes_per_pixel / element_size);
        let total = samples_per_frame
            .checked_mul(slots)
            .ok_or(PoolError::Overflow {
                modality,
                slots,
                resolution,
            })?;

        let mut data = Vec::new();
        data.try_reserve_exact(total)
            .map_err(|_| PoolError::OutOfMemory {
                modality,
                bytes: total.saturating_mul(element_size),
            })?;
        data.resize(total, T::zeroed());

        let mut timestamps = Vec::new();
        timestamps
            .try_reserve_exact(slots)
            .map_err(|_| PoolError::OutOfMemory {
                modality,
                bytes: slots.saturating_mul(size_of::<Ticks>()),
            })?;
        timestamps.resize(slots, Ticks::ZERO);

        debug!(
            stream = %modality,
            capacity,
            slots,
            bytes = total * element_size,
            "Allocated frame pool"
        );

        Ok(Self {
            modality,
            resolution,
            samples_per_frame,
            capacity,
            slots,
            data,
            timestamps,
            count: 0,
            sealed: false,
        })
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Nominal number of frames the stream may capture.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of physically allocated slots (capacity plus any guard).
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Number of elements of `T` in one frame.
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// Frames actually written.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.capacity
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Copy `samples` into slot `index` and record its timestamp.
    ///
    /// # Panics
    ///
    /// Writing at or beyond capacity, out of arrival order, into a sealed pool
    /// or with a sample of the wrong length is a programming error.
    pub fn write(&mut self, index: usize, samples: &[T], timestamp: Ticks) {
        assert_eq!(
            samples.len(),
            self.samples_per_frame,
            "{} sample length mismatch",
            self.modality
        );
        self.slot_mut(index).copy_from_slice(samples);
        self.commit(index, timestamp);
    }

    /// Mutable access to the slot the next frame will be written into.
    ///
    /// Hardware copies land here directly; the frame only becomes valid once
    /// [`commit`](Self::commit) is called with the same index.
    pub fn slot_mut(&mut self, index: usize) -> &mut [T] {
        self.check_writable(index);
        let start = index * self.samples_per_frame;
        &mut self.data[start..start + self.samples_per_frame]
    }

    /// Byte view of [`slot_mut`](Self::slot_mut).
    pub fn slot_bytes_mut(&mut self, index: usize) -> &mut [u8] {
        bytemuck::cast_slice_mut(self.slot_mut(index))
    }

    /// Mark slot `index` as a valid frame captured at `timestamp`.
    pub fn commit(&mut self, index: usize, timestamp: Ticks) {
        self.check_writable(index);
        self.timestamps[index] = timestamp;
        self.count = index + 1;
    }

    fn check_writable(&self, index: usize) {
        assert!(!self.sealed, "{} pool written after seal", self.modality);
        assert!(
            index < self.capacity,
            "{} frame index {index} beyond capacity {}",
            self.modality,
            self.capacity
        );
        assert_eq!(
            index, self.count,
            "{} frames must be written in arrival order",
            self.modality
        );
    }

    /// Freeze the pool at `final_count` frames.
    ///
    /// Slot `final_count`, if allocated, may hold a partially copied frame;
    /// it is zeroed so nothing downstream can mistake it for valid data.
    pub fn seal(&mut self, final_count: usize) {
        assert!(
            final_count <= self.count,
            "{} pool sealed at {final_count} but only {} frames written",
            self.modality,
            self.count
        );
        if final_count < self.slots {
            let start = final_count * self.samples_per_frame;
            self.data[start..start + self.samples_per_frame].fill(T::zeroed());
            self.timestamps[final_count] = Ticks::ZERO;
            debug!(stream = %self.modality, slot = final_count, "Invalidated tail slot");
        }
        self.count = final_count;
        self.sealed = true;
    }

    /// Samples of a valid frame.
    pub fn samples(&self, index: usize) -> Option<&[T]> {
        if index >= self.count {
            return None;
        }
        let start = index * self.samples_per_frame;
        Some(&self.data[start..start + self.samples_per_frame])
    }

    /// Raw bytes of a valid frame.
    pub fn bytes(&self, index: usize) -> Option<&[u8]> {
        self.samples(index).map(bytemuck::cast_slice)
    }

    /// Timestamp of a valid frame.
    pub fn timestamp(&self, index: usize) -> Option<Ticks> {
        (index < self.count).then(|| self.timestamps[index])
    }

    /// Timestamps of all valid frames, in arrival order.
    pub fn timestamps(&self) -> &[Ticks] {
        &self.timestamps[..self.count]
    }

    pub fn frame(&self, index: usize) -> Option<FrameRef<'_, T>> {
        Some(FrameRef {
            index,
            timestamp: self.timestamp(index)?,
            samples: self.samples(index)?,
        })
    }

    /// Iterate over valid frames in arrival order.
    pub fn frames(&self) -> impl Iterator<Item = FrameRef<'_, T>> + '_ {
        (0..self.count).filter_map(move |i| self.frame(i))
    }

    /// Raw slot contents regardless of validity. Test and diagnostics only.
    pub fn raw_slot(&self, index: usize) -> Option<&[T]> {
        if index >= self.slots {
            return None;
        }
        let start = index * self.samples_per_frame;
        Some(&self.data[start..start + self.samples_per_frame])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_pool(capacity: usize) -> FramePool<u16> {
        FramePool::allocate(Modality::Depth, Resolution::new(2, 2), capacity).unwrap()
    }

    #[test]
    fn test_allocate_is_zeroed() {
        let pool = depth_pool(3);
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.samples_per_frame(), 4);
        for i in 0..3 {
            assert_eq!(pool.raw_slot(i).unwrap(), &[0, 0, 0, 0]);
        }
        assert!(pool.timestamps().is_empty());
    }

    #[test]
    fn test_color_pool_stores_packed_bytes() {
        let pool: FramePool<u8> =
            FramePool::allocate(Modality::Color, Resolution::new(4, 2), 1).unwrap();
        assert_eq!(pool.samples_per_frame(), 16);
    }

    #[test]
    fn test_wide_element_is_rejected() {
        let result: Result<FramePool<u32>, _> =
            FramePool::allocate(Modality::Depth, Resolution::new(2, 2), 1);
        assert!(matches!(result, Err(PoolError::ElementSize { .. })));
    }

    #[test]
    fn test_write_and_read_back() {
        let mut pool = depth_pool(2);
        pool.write(0, &[1, 2, 3, 4], Ticks::new(100));
        pool.write(1, &[5, 6, 7, 8], Ticks::new(200));

        assert_eq!(pool.count(), 2);
        assert!(pool.is_full());
        assert_eq!(pool.samples(1).unwrap(), &[5, 6, 7, 8]);
        assert_eq!(pool.timestamps(), &[Ticks::new(100), Ticks::new(200)]);

        let indices: Vec<usize> = pool.frames().map(|f| f.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_unwritten_frames_are_not_visible() {
        let mut pool = depth_pool(3);
        pool.write(0, &[1, 1, 1, 1], Ticks::new(1));
        assert!(pool.samples(1).is_none());
        assert!(pool.timestamp(1).is_none());
        assert!(pool.frame(2).is_none());
    }

    #[test]
    fn test_byte_view_matches_samples() {
        let mut pool = depth_pool(1);
        pool.slot_bytes_mut(0).copy_from_slice(&[1, 0, 2, 0, 3, 0, 4, 0]);
        pool.commit(0, Ticks::new(7));
        assert_eq!(pool.samples(0).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "beyond capacity")]
    fn test_write_beyond_capacity_panics() {
        let mut pool = depth_pool(1);
        pool.write(0, &[0; 4], Ticks::new(1));
        pool.write(1, &[0; 4], Ticks::new(2));
    }

    #[test]
    #[should_panic(expected = "arrival order")]
    fn test_out_of_order_write_panics() {
        let mut pool = depth_pool(3);
        pool.write(1, &[0; 4], Ticks::new(1));
    }

    #[test]
    fn test_guard_slot_is_invalidated_on_seal() {
        let mut pool: FramePool<u8> =
            FramePool::with_guard_slot(Modality::Color, Resolution::new(2, 1), 3).unwrap();
        assert_eq!(pool.slots(), 4);

        pool.write(0, &[9, 9, 9, 9], Ticks::new(10));
        // A partial copy into the next slot that never got committed.
        pool.slot_bytes_mut(1).copy_from_slice(&[7, 7, 7, 7]);
        pool.seal(1);

        assert!(pool.is_sealed());
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.raw_slot(1).unwrap(), &[0, 0, 0, 0]);
        assert_eq!(pool.samples(0).unwrap(), &[9, 9, 9, 9]);
    }

    #[test]
    fn test_seal_at_capacity_uses_guard() {
        let mut pool: FramePool<u8> =
            FramePool::with_guard_slot(Modality::Color, Resolution::new(2, 1), 1).unwrap();
        pool.write(0, &[1, 2, 3, 4], Ticks::new(10));
        pool.seal(1);
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.raw_slot(1).unwrap(), &[0, 0, 0, 0]);
    }

    #[test]
    fn test_seal_without_guard_at_capacity() {
        let mut pool = depth_pool(1);
        pool.write(0, &[1, 2, 3, 4], Ticks::new(10));
        pool.seal(1);
        assert_eq!(pool.samples(0).unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    #[should_panic(expected = "after seal")]
    fn test_write_after_seal_panics() {
        let mut pool = depth_pool(2);
        pool.seal(0);
        pool.write(0, &[0; 4], Ticks::new(1));
    }
}

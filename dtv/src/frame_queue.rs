/*!
    Bounded circular frame queue.

    The queue owns a fixed ring of [`Frame`] slots. The producer reserves the
    next free slot, fills it in place and publishes it; the worker reads the
    oldest published slot and releases it back. Frames are never moved or
    reallocated between the two sides, only handed over.
*/

use std::ops::{Deref, DerefMut};

use log::debug;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::{EncoderError, Frame, FrameRequest};

struct QueueState {
    /// Published frames waiting for the reader.
    length: usize,
    /// Slots handed to the writer but not yet published.
    reserved: usize,
    read_index: usize,
    stopped: bool,
    error: Option<EncoderError>,
}

/**
    Thread-safe bounded ring of reusable frames.

    One writer and one reader. Each slot sits behind its own mutex; the queue
    protocol guarantees at most one side ever touches a slot, so those locks
    are never contended in correct use.
*/
pub struct FrameQueue {
    slots: Box<[Mutex<Frame>]>,
    state: Mutex<QueueState>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl FrameQueue {
    /**
        Create a queue with `capacity` empty slots.

        Panics if `capacity` is zero.
    */
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame queue capacity must be positive");
        Self {
            slots: (0..capacity).map(|_| Mutex::new(Frame::new())).collect(),
            state: Mutex::new(QueueState {
                length: 0,
                reserved: 0,
                read_index: 0,
                stopped: false,
                error: None,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of published frames not yet released by the reader.
    pub fn len(&self) -> usize {
        self.state.lock().length
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
        Reserve the next writable slot, sized for `request`.

        When every slot is published or reserved, a non-blocking call returns
        `None` immediately. A blocking call waits for the reader to release a
        slot, and returns `None` only if the queue is stopped while still full.
    */
    pub fn acquire_for_write(
        &self,
        request: &FrameRequest,
        blocking: bool,
    ) -> Option<FrameWriteGuard<'_>> {
        let capacity = self.capacity();
        let mut state = self.state.lock();

        while state.length + state.reserved >= capacity {
            if !blocking || state.stopped {
                return None;
            }
            self.not_full.wait(&mut state);
        }

        let index = (state.read_index + state.length + state.reserved) % capacity;
        state.reserved += 1;
        drop(state);

        let mut frame = self.slots[index].lock();
        if frame.reserve(request) {
            debug!(
                "slot {index} grown to {}x{} with {} audio samples",
                frame.max_width(),
                frame.max_height(),
                frame.audio_capacity()
            );
        }

        Some(FrameWriteGuard { frame })
    }

    /**
        Hand the oldest reserved slot to the reader.

        Panics if no slot is reserved.
    */
    pub fn publish(&self) {
        let mut state = self.state.lock();
        assert!(state.reserved > 0, "publish without a reserved frame");
        state.reserved -= 1;
        state.length += 1;
        drop(state);
        self.not_empty.notify_one();
    }

    /**
        Wait for the oldest published frame.

        Returns `None` once the queue is stopped and drained.
    */
    pub fn acquire_for_read(&self) -> Option<FrameReadGuard<'_>> {
        let mut state = self.state.lock();

        while state.length == 0 && !state.stopped {
            self.not_empty.wait(&mut state);
        }

        if state.length == 0 {
            return None;
        }

        let index = state.read_index;
        drop(state);

        Some(FrameReadGuard {
            frame: self.slots[index].lock(),
        })
    }

    /**
        Retire the oldest published frame, freeing its slot for the writer.

        Panics if nothing is published.
    */
    pub fn release(&self) {
        let mut state = self.state.lock();
        assert!(state.length > 0, "release without a published frame");
        state.length -= 1;
        state.read_index = (state.read_index + 1) % self.slots.len();
        drop(state);
        self.not_full.notify_one();
    }

    /**
        Stop the queue and wake every waiter.

        Frames already published stay readable until drained.
    */
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.stopped = true;
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    /**
        Record a session error and stop the queue.

        Only the first error is kept. Returns true if `error` was the one
        recorded.
    */
    pub fn record_error(&self, error: EncoderError) -> bool {
        let mut state = self.state.lock();
        let first = state.error.is_none();
        if first {
            state.error = Some(error);
        }
        state.stopped = true;
        drop(state);
        self.not_full.notify_all();
        self.not_empty.notify_all();
        first
    }

    pub fn error(&self) -> Option<EncoderError> {
        self.state.lock().error
    }

    /**
        Free every slot buffer.

        Consuming the queue means no guard can still be borrowing a slot.
    */
    pub fn teardown(self) {
        let state = self.state.into_inner();
        debug!(
            "tearing down frame queue: {} slots, {} frames unread",
            self.slots.len(),
            state.length
        );
    }
}

impl std::fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FrameQueue")
            .field("capacity", &self.slots.len())
            .field("length", &state.length)
            .field("reserved", &state.reserved)
            .field("stopped", &state.stopped)
            .finish_non_exhaustive()
    }
}

/**
    Writer access to a reserved slot.

    Drop the guard, then [`FrameQueue::publish`] to hand the frame over.
*/
pub struct FrameWriteGuard<'a> {
    frame: MutexGuard<'a, Frame>,
}

impl Deref for FrameWriteGuard<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}

impl DerefMut for FrameWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Frame {
        &mut self.frame
    }
}

/**
    Reader access to the oldest published frame.

    Drop the guard, then [`FrameQueue::release`] to recycle the slot.
*/
pub struct FrameReadGuard<'a> {
    frame: MutexGuard<'a, Frame>,
}

impl Deref for FrameReadGuard<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.frame
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn request(width: u32) -> FrameRequest {
        FrameRequest {
            width,
            height: 2,
            stride: width as usize * 3,
            audio_samples: 0,
            channels: 2,
        }
    }

    #[test]
    fn non_blocking_write_refuses_when_full() {
        let queue = FrameQueue::new(2);
        assert!(queue.acquire_for_write(&request(4), false).is_some());
        assert!(queue.acquire_for_write(&request(4), false).is_some());
        assert!(queue.acquire_for_write(&request(4), false).is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn frames_are_read_in_publish_order() {
        let queue = FrameQueue::new(3);
        for pts in 0..3 {
            let mut frame = queue.acquire_for_write(&request(4), false).unwrap();
            frame.set_pts(pts);
            drop(frame);
            queue.publish();
        }
        assert_eq!(queue.len(), 3);

        for pts in 0..3 {
            let frame = queue.acquire_for_read().unwrap();
            assert_eq!(frame.pts(), pts);
            drop(frame);
            queue.release();
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn released_slots_are_reused_without_reallocation() {
        let queue = FrameQueue::new(2);
        let mut pointers = Vec::new();

        for _ in 0..6 {
            let frame = queue.acquire_for_write(&request(8), false).unwrap();
            pointers.push(frame.pixels().as_ptr() as usize);
            drop(frame);
            queue.publish();

            drop(queue.acquire_for_read().unwrap());
            queue.release();
        }

        // Two slots alternate for the whole run
        assert_eq!(pointers[0], pointers[2]);
        assert_eq!(pointers[1], pointers[3]);
        assert_eq!(pointers[2], pointers[4]);
        assert_ne!(pointers[0], pointers[1]);
    }

    #[test]
    fn stopped_queue_drains_then_ends() {
        let queue = FrameQueue::new(2);
        drop(queue.acquire_for_write(&request(4), false).unwrap());
        queue.publish();
        queue.stop();

        assert!(queue.acquire_for_read().is_some());
        queue.release();
        assert!(queue.acquire_for_read().is_none());
    }

    #[test]
    fn stop_wakes_blocked_writer() {
        let queue = Arc::new(FrameQueue::new(1));
        drop(queue.acquire_for_write(&request(4), false).unwrap());
        queue.publish();

        let writer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.acquire_for_write(&request(4), true).is_none())
        };

        thread::sleep(Duration::from_millis(20));
        queue.stop();
        assert!(writer.join().unwrap());
    }

    #[test]
    fn release_wakes_blocked_writer() {
        let queue = Arc::new(FrameQueue::new(1));
        drop(queue.acquire_for_write(&request(4), false).unwrap());
        queue.publish();

        let writer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.acquire_for_write(&request(4), true).is_some())
        };

        thread::sleep(Duration::from_millis(20));
        drop(queue.acquire_for_read().unwrap());
        queue.release();
        assert!(writer.join().unwrap());
    }

    #[test]
    fn reader_blocks_until_publish() {
        let queue = Arc::new(FrameQueue::new(2));
        let reader = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.acquire_for_read().map(|frame| frame.width()))
        };

        thread::sleep(Duration::from_millis(20));
        drop(queue.acquire_for_write(&request(16), false).unwrap());
        queue.publish();
        assert_eq!(reader.join().unwrap(), Some(16));
    }

    #[test]
    fn first_error_wins() {
        let queue = FrameQueue::new(2);
        assert!(queue.record_error(EncoderError::CouldNotEncodeFrame));
        assert!(!queue.record_error(EncoderError::CouldNotWriteTrailer));
        assert_eq!(queue.error(), Some(EncoderError::CouldNotEncodeFrame));
        assert!(queue.is_stopped());
    }

    #[test]
    #[should_panic(expected = "release without a published frame")]
    fn release_on_empty_queue_panics() {
        FrameQueue::new(2).release();
    }

    #[test]
    #[should_panic(expected = "publish without a reserved frame")]
    fn publish_without_reservation_panics() {
        FrameQueue::new(2).publish();
    }
}

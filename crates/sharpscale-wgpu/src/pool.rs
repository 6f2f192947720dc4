//! Double-buffered render target pool
//!
//! The upscale pass writes each frame into one image of a small ring. The
//! ring must be sized larger than the number of frames the caller's
//! submission pipeline can have in flight; the pool itself never blocks and
//! does not enforce that contract. The backing store cannot resize an image
//! in place, so a resolution change marks every slot dirty and each slot is
//! destroyed and recreated lazily the next time the cursor reaches it.

use tracing::debug;

#[derive(Debug)]
enum Slot<T> {
    /// Needs (re)allocation before it can be handed out
    Dirty,
    /// Backing target is valid at the pool's current extent
    Ready(T),
}

/// Fixed ring of lazily (re)allocated render targets
///
/// Generic over the target type so the ring and invalidation logic stay
/// independent of the backing allocator: the caller injects allocation as a
/// closure on [`acquire`](TargetPool::acquire), and tests drive the pool with
/// plain values instead of GPU images.
#[derive(Debug)]
pub struct TargetPool<T> {
    slots: Vec<Slot<T>>,
    cursor: usize,
    extent: (u32, u32),
}

impl<T> TargetPool<T> {
    /// Creates a pool of `ring_size` slots, all initially dirty
    ///
    /// # Panics
    /// Panics if `ring_size` is zero.
    pub fn new(ring_size: usize) -> Self {
        assert!(ring_size > 0, "target pool needs at least one slot");
        Self {
            slots: (0..ring_size).map(|_| Slot::Dirty).collect(),
            cursor: 0,
            extent: (0, 0),
        }
    }

    /// Number of slots in the ring
    pub fn ring_size(&self) -> usize {
        self.slots.len()
    }

    /// The extent the pool's targets are currently sized for
    pub fn extent(&self) -> (u32, u32) {
        self.extent
    }

    /// Returns the next target in round-robin order, sized to `extent`
    ///
    /// `create` is called with the slot index and extent whenever the
    /// selected slot needs (re)allocation. An allocation error propagates
    /// unchanged and leaves the slot dirty, so the next acquisition retries.
    ///
    /// The returned reference is only valid for the current frame: the pool
    /// keeps ownership and destroys the backing target on the next resize.
    pub fn acquire<E>(
        &mut self,
        extent: (u32, u32),
        create: impl FnOnce(usize, (u32, u32)) -> Result<T, E>,
    ) -> Result<&T, E> {
        if extent != self.extent {
            // A new output resolution invalidates every previously sized
            // target, not just the slot about to be handed out.
            for slot in &mut self.slots {
                *slot = Slot::Dirty;
            }
            self.extent = extent;
        }

        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.slots.len();

        if let Slot::Dirty = self.slots[index] {
            debug!(
                slot = index,
                width = extent.0,
                height = extent.1,
                "allocating pooled render target"
            );
            self.slots[index] = Slot::Ready(create(index, extent)?);
        }
        match &self.slots[index] {
            Slot::Ready(target) => Ok(target),
            Slot::Dirty => unreachable!("slot was just allocated"),
        }
    }
}

use parking_lot::RwLock;
use std::mem;

struct Sides<T> {
    front: T,
    back: T,
}

/// Two values whose front/back roles can be swapped atomically.
///
/// `with_front` and `with_back` share the read side of the lock, so any
/// number of them run at once. `flip` takes the write side and waits for
/// them to drain; the swap itself is O(1).
pub struct FlippingBuffer<T> {
    sides: RwLock<Sides<T>>,
}

impl<T> FlippingBuffer<T> {
    pub fn new(front: T, back: T) -> Self {
        Self {
            sides: RwLock::new(Sides { front, back }),
        }
    }

    pub fn with_front<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.sides.read().front)
    }

    pub fn with_back<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.sides.read().back)
    }

    /// Swap front and back if `predicate(front, back)` holds. Returns
    /// whether a swap happened.
    pub fn flip(&self, predicate: impl FnOnce(&T, &T) -> bool) -> bool {
        let mut sides = self.sides.write();
        if !predicate(&sides.front, &sides.back) {
            return false;
        }
        let Sides { front, back } = &mut *sides;
        mem::swap(front, back);
        true
    }

    pub fn into_inner(self) -> (T, T) {
        let Sides { front, back } = self.sides.into_inner();
        (front, back)
    }
}

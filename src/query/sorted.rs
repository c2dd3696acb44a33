//! Two-pointer set operations over sorted, duplicate-free slices.

use std::cmp::Ordering;

/// Write `a ∩ b` into `out`, replacing its contents
pub fn intersect_into<T: Ord + Copy>(a: &[T], b: &[T], out: &mut Vec<T>) {
    out.clear();
    out.reserve(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
}

/// Write `a ∪ b` into `out`, replacing its contents
pub fn union_into<T: Ord + Copy>(a: &[T], b: &[T], out: &mut Vec<T>) {
    out.clear();
    out.reserve(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
}

pub fn intersect<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::new();
    intersect_into(a, b, &mut out);
    out
}

pub fn union<T: Ord + Copy>(a: &[T], b: &[T]) -> Vec<T> {
    let mut out = Vec::new();
    union_into(a, b, &mut out);
    out
}

/// Folds operands left to right, ping-ponging between two scratch buffers.
pub struct SetFolder<T> {
    acc: Vec<T>,
    scratch: Vec<T>,
}

impl<T: Ord + Copy> SetFolder<T> {
    pub fn new(first: Vec<T>) -> Self {
        Self {
            acc: first,
            scratch: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.acc.is_empty()
    }

    pub fn intersect(&mut self, other: &[T]) {
        intersect_into(&self.acc, other, &mut self.scratch);
        std::mem::swap(&mut self.acc, &mut self.scratch);
    }

    pub fn union(&mut self, other: &[T]) {
        union_into(&self.acc, other, &mut self.scratch);
        std::mem::swap(&mut self.acc, &mut self.scratch);
    }

    pub fn finish(self) -> Vec<T> {
        self.acc
    }
}

//! Arena-backed doubly-linked recency list.
//!
//! Values live in a slot vector and are linked by index; freed slots are
//! recycled through a free list. The head is the most recently used value,
//! the tail the least recently used. All link maintenance is centralised in
//! [`RecencyList::link_front`] and [`RecencyList::unlink`].

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Ordered collection with O(1) push-front, remove and move-to-front.
///
/// Indices returned by [`RecencyList::push_front`] stay valid until the value
/// is removed.
#[derive(Debug)]
pub struct RecencyList<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl<T> RecencyList<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the most recently used value.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Index of the least recently used value.
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx).and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx).and_then(|s| s.value.as_mut())
    }

    /// Inserts `value` as the most recently used entry and returns its index.
    pub fn push_front(&mut self, value: T) -> usize {
        let slot = Slot {
            value: Some(value),
            prev: None,
            next: None,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };

        self.link_front(idx);
        self.len += 1;
        idx
    }

    /// Removes the value at `idx`, re-anchoring head and tail as needed.
    ///
    /// Returns `None` if `idx` does not hold a live value.
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        if self.get(idx).is_none() {
            return None;
        }

        self.unlink(idx);
        let value = self.slots[idx].value.take();
        self.free.push(idx);
        self.len -= 1;
        value
    }

    /// Removes and returns the least recently used value.
    pub fn pop_back(&mut self) -> Option<T> {
        let idx = self.tail?;
        self.remove(idx)
    }

    /// Promotes the value at `idx` to most recently used.
    pub fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) || self.get(idx).is_none() {
            return;
        }
        self.unlink(idx);
        self.link_front(idx);
    }

    /// Iterates from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Walks the chain in both directions and checks it covers every live
    /// slot exactly once.
    pub fn is_consistent(&self) -> bool {
        let live = self.slots.iter().filter(|s| s.value.is_some()).count();
        if live != self.len {
            return false;
        }

        let mut forward = 0;
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let slot = &self.slots[idx];
            if slot.value.is_none() || slot.prev != prev || forward > self.len {
                return false;
            }
            forward += 1;
            prev = Some(idx);
            cursor = slot.next;
        }
        if forward != self.len || prev != self.tail {
            return false;
        }

        let mut backward = 0;
        let mut cursor = self.tail;
        let mut last = None;
        while let Some(idx) = cursor {
            backward += 1;
            if backward > self.len {
                return false;
            }
            last = Some(idx);
            cursor = self.slots[idx].prev;
        }

        backward == self.len && last == self.head
    }

    fn link_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;

        match self.head {
            Some(old_head) => self.slots[old_head].prev = Some(idx),
            None => self.tail = Some(idx),
        }
        self.head = Some(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.slots[idx].prev.take();
        let next = self.slots[idx].next.take();

        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
    }
}

/// Iterator over a [`RecencyList`] from most to least recently used.
pub struct Iter<'a, T> {
    list: &'a RecencyList<T>,
    cursor: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let slot = &self.list.slots[idx];
        self.cursor = slot.next;
        slot.value.as_ref().map(|v| (idx, v))
    }
}

use std::collections::BTreeMap;

/// One row of the cross-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// An ordinary in-use indirect object, located at a byte offset in
    /// the file (classic xref) or, when read from an xref stream,
    /// still recorded with the byte offset the reader resolved it to.
    Normal { offset: u32, generation: u16 },
    /// An object packed into an object stream: `container` is the
    /// object number of the `/Type /ObjStm` stream, `index` the row
    /// within it.
    Compressed { container: u32, index: u16 },
    /// A free slot, carrying the next free object number in the
    /// circular free list and the generation a future object at this
    /// slot would be allocated with.
    Free { next: u32, generation: u16 },
    /// A free slot whose generation has saturated at 65535 and can
    /// never be reused.
    UnusableFree,
}

impl XrefEntry {
    pub fn is_normal(&self) -> bool {
        matches!(self, XrefEntry::Normal { .. })
    }

    pub fn is_free(&self) -> bool {
        matches!(self, XrefEntry::Free { .. } | XrefEntry::UnusableFree)
    }
}

/// The cross-reference table: a map from object number to entry, plus
/// the trailer's declared `/Size`.
#[derive(Debug, Clone, Default)]
pub struct Xref {
    pub entries: BTreeMap<u32, XrefEntry>,
    pub size: u32,
}

impl Xref {
    pub fn new(size: u32) -> Self {
        Xref { entries: BTreeMap::new(), size }
    }

    pub fn get(&self, obj_num: u32) -> Option<&XrefEntry> {
        self.entries.get(&obj_num)
    }

    pub fn insert(&mut self, obj_num: u32, entry: XrefEntry) {
        self.entries.insert(obj_num, entry);
    }

    pub fn max_id(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Merge entries from an earlier section of the trailer chain: an
    /// object number already present (from a later update) shadows the
    /// older one, so only previously-unseen numbers are inserted.
    pub fn merge(&mut self, other: Xref) {
        for (id, entry) in other.entries {
            self.entries.entry(id).or_insert(entry);
        }
        if other.size > self.size {
            self.size = other.size;
        }
    }

    /// Extend, preferring the incoming entries — used when building a
    /// table bottom-up rather than merging an older trailer chain link.
    pub fn extend(&mut self, other: Xref) {
        self.entries.extend(other.entries);
        if other.size > self.size {
            self.size = other.size;
        }
    }

    /// Walk the free list starting at object 0, returning the object
    /// numbers visited in order. Returns `None` if the list does not
    /// close back on object 0 within `size` hops (a malformed or
    /// cyclic-but-not-rooted free list).
    pub fn free_list(&self) -> Option<Vec<u32>> {
        let mut visited = Vec::new();
        let mut current = 0u32;
        let limit = self.entries.len() + 1;
        loop {
            visited.push(current);
            match self.entries.get(&current) {
                Some(XrefEntry::Free { next, .. }) => {
                    if *next == 0 {
                        return Some(visited);
                    }
                    current = *next;
                }
                None if current == 0 => return Some(visited),
                _ => return None,
            }
            if visited.len() > limit {
                return None;
            }
        }
    }

    pub fn allocate(&mut self) -> u32 {
        if let Some(XrefEntry::Free { next, .. }) = self.entries.get(&0).copied() {
            if next != 0 {
                if let Some(XrefEntry::Free { next: next_next, generation }) = self.entries.get(&next).copied() {
                    self.entries.insert(0, XrefEntry::Free { next: next_next, generation: 65535 });
                    self.entries.insert(next, XrefEntry::Normal { offset: 0, generation });
                    return next;
                }
            }
        }
        let id = self.size.max(1);
        self.size = id + 1;
        id
    }

    pub fn free(&mut self, obj_num: u32) {
        let generation = match self.entries.get(&obj_num) {
            Some(XrefEntry::Normal { generation, .. }) => generation.saturating_add(1),
            _ => 1,
        };
        let head_next = match self.entries.get(&0) {
            Some(XrefEntry::Free { next, .. }) => *next,
            _ => 0,
        };
        if generation >= 65535 {
            self.entries.insert(obj_num, XrefEntry::UnusableFree);
            return;
        }
        self.entries.insert(obj_num, XrefEntry::Free { next: head_next, generation });
        let head_generation = match self.entries.get(&0) {
            Some(XrefEntry::Free { generation, .. }) => *generation,
            _ => 65535,
        };
        self.entries.insert(0, XrefEntry::Free { next: obj_num, generation: head_generation });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rooted_table() -> Xref {
        let mut xref = Xref::new(1);
        xref.insert(0, XrefEntry::Free { next: 0, generation: 65535 });
        xref
    }

    #[test]
    fn free_list_starts_and_ends_at_zero() {
        let xref = rooted_table();
        assert_eq!(xref.free_list(), Some(vec![0]));
    }

    #[test]
    fn allocate_prefers_free_list_head() {
        let mut xref = rooted_table();
        xref.free(3);
        let allocated = xref.allocate();
        assert_eq!(allocated, 3);
        assert!(matches!(xref.get(3), Some(XrefEntry::Normal { .. })));
    }

    #[test]
    fn free_increments_generation_and_retires_at_max() {
        let mut xref = rooted_table();
        xref.insert(5, XrefEntry::Normal { offset: 10, generation: 65534 });
        xref.free(5);
        assert_eq!(xref.get(5), Some(&XrefEntry::UnusableFree));
    }

    #[test]
    fn merge_lets_later_updates_shadow_earlier_ones() {
        let mut newer = rooted_table();
        newer.insert(7, XrefEntry::Normal { offset: 100, generation: 0 });
        let mut older = Xref::new(1);
        older.insert(7, XrefEntry::Normal { offset: 5, generation: 0 });
        newer.merge(older);
        assert_eq!(newer.get(7), Some(&XrefEntry::Normal { offset: 100, generation: 0 }));
    }
}

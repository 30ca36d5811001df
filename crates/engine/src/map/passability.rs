use std::collections::HashSet;

/// The tile ids one map instance designates as walkable. Movement checks
/// are pure membership: an id outside the set is impassable, and id 0
/// (empty) gets no special treatment in either direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassableSet {
    ids: HashSet<u32>,
}

impl PassableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma-separated id list, the format carried by map-level
    /// walkability properties. Blank or non-numeric entries are ignored.
    pub fn from_id_list(raw: &str) -> Self {
        Self {
            ids: raw
                .split(',')
                .filter_map(|token| token.trim().parse::<u32>().ok())
                .collect(),
        }
    }

    pub fn insert(&mut self, id: u32) -> bool {
        self.ids.insert(id)
    }

    pub fn is_passable(&self, tile_id: u32) -> bool {
        self.ids.contains(&tile_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FromIterator<u32> for PassableSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_the_whole_contract() {
        let set: PassableSet = [1u32, 2, 3].into_iter().collect();
        assert!(!set.is_passable(0));
        assert!(set.is_passable(2));
        assert!(!PassableSet::new().is_passable(5));
    }

    #[test]
    fn empty_tile_id_can_be_made_walkable() {
        let mut set = PassableSet::new();
        assert!(!set.is_passable(0));
        set.insert(0);
        assert!(set.is_passable(0));
    }

    #[test]
    fn id_list_parsing_skips_junk_entries() {
        let set = PassableSet::from_id_list(" 1, 2,, x7 ,3 ");
        assert_eq!(set.len(), 3);
        assert!(set.is_passable(1));
        assert!(set.is_passable(3));
        assert!(!set.is_passable(7));
    }
}

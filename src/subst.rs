// SPDX-License-Identifier: Apache-2.0

//! Net substitution map used by the rewrite passes.
//!
//! Passes record "every reference to net N now reads R" entries while
//! scanning, then apply the whole batch in one sweep over the netlist. The
//! map is kept chain-free as entries are added, so application is a single
//! lookup per reference.

use ahash::AHashMap;

use crate::ir::{BitRef, NetId};

#[derive(Debug, Clone, Default)]
pub struct SubstitutionMap {
    map: AHashMap<NetId, BitRef>,
}

impl SubstitutionMap {
    pub fn new() -> Self {
        Self {
            map: AHashMap::new(),
        }
    }

    /// Adds a substitution. If `to` is itself a substituted net, the entry is
    /// resolved through the existing mapping; existing entries targeting
    /// `from` are redirected, so no lookup ever needs to chase a chain.
    pub fn add(&mut self, from: NetId, to: BitRef) {
        let resolved = match to {
            BitRef::Net(n) => self.map.get(&n).copied().unwrap_or(to),
            c => c,
        };
        assert!(
            resolved != BitRef::Net(from),
            "substitution of {} with itself",
            from
        );
        for value in self.map.values_mut() {
            if *value == BitRef::Net(from) {
                *value = resolved;
            }
        }
        self.map.insert(from, resolved);
    }

    pub fn get(&self, net: NetId) -> Option<BitRef> {
        self.map.get(&net).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NetId, &BitRef)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Lv;

    #[test]
    fn test_add_resolves_forward_chain() {
        let mut s = SubstitutionMap::new();
        s.add(NetId(1), BitRef::Const(Lv::Zero));
        s.add(NetId(2), BitRef::Net(NetId(1)));
        assert_eq!(s.get(NetId(2)), Some(BitRef::Const(Lv::Zero)));
    }

    #[test]
    fn test_add_redirects_backward_chain() {
        let mut s = SubstitutionMap::new();
        s.add(NetId(2), BitRef::Net(NetId(1)));
        s.add(NetId(1), BitRef::Const(Lv::One));
        assert_eq!(s.get(NetId(2)), Some(BitRef::Const(Lv::One)));
        assert_eq!(s.get(NetId(1)), Some(BitRef::Const(Lv::One)));
    }

    #[test]
    #[should_panic]
    fn test_self_substitution_panics() {
        let mut s = SubstitutionMap::new();
        s.add(NetId(2), BitRef::Net(NetId(1)));
        // 1 -> 2 resolves through 2 -> 1 back to itself.
        s.add(NetId(1), BitRef::Net(NetId(2)));
    }
}

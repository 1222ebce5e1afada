// DpSim: Data-Plane Simulator written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Binary trie over the address bits of a prefix. The node at depth `d` stores the routes of the
//! prefix of length `d` whose address bits equal the path from the root.

use std::{collections::BTreeSet, net::Ipv4Addr};

use crate::{
    route::Route,
    types::{ip_bit, Prefix, MAX_PREFIX_LENGTH},
};

#[derive(Debug, Clone, Default)]
struct TrieNode {
    routes: BTreeSet<Route>,
    children: [Option<Box<TrieNode>>; 2],
}

#[derive(Debug, Clone, Default)]
pub(super) struct RouteTrie {
    root: TrieNode,
}

impl RouteTrie {
    /// Get the routes stored for exactly this prefix, creating all nodes along the way.
    pub(super) fn entry(&mut self, prefix: Prefix) -> &mut BTreeSet<Route> {
        let mut node = &mut self.root;
        for i in 0..prefix.len() {
            let child = &mut node.children[prefix.bit(i) as usize];
            node = child.get_or_insert_with(Default::default);
        }
        &mut node.routes
    }

    /// Get the routes stored for exactly this prefix.
    pub(super) fn get(&self, prefix: Prefix) -> Option<&BTreeSet<Route>> {
        let mut node = &self.root;
        for i in 0..prefix.len() {
            node = node.children[prefix.bit(i) as usize].as_deref()?;
        }
        Some(&node.routes)
    }

    /// Follow the bits of `ip` and return the routes of the deepest non-empty node on the path.
    pub(super) fn longest_prefix_match(&self, ip: Ipv4Addr) -> Option<&BTreeSet<Route>> {
        let mut node = &self.root;
        let mut best = (!node.routes.is_empty()).then_some(&node.routes);
        for i in 0..MAX_PREFIX_LENGTH {
            match node.children[ip_bit(ip, i) as usize].as_deref() {
                Some(child) => node = child,
                None => break,
            }
            if !node.routes.is_empty() {
                best = Some(&node.routes);
            }
        }
        best
    }

    /// Iterate over all routes in depth-first order (shorter prefixes first, `0` before `1`).
    pub(super) fn iter(&self) -> TrieIter<'_> {
        TrieIter {
            stack: vec![&self.root],
            current: None,
        }
    }
}

pub(super) struct TrieIter<'a> {
    stack: Vec<&'a TrieNode>,
    current: Option<std::collections::btree_set::Iter<'a, Route>>,
}

impl<'a> Iterator for TrieIter<'a> {
    type Item = &'a Route;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.current.as_mut().and_then(|it| it.next()) {
                return Some(r);
            }
            let node = self.stack.pop()?;
            // push `1` first such that `0` is visited first
            self.stack
                .extend(node.children.iter().rev().filter_map(|c| c.as_deref()));
            self.current = Some(node.routes.iter());
        }
    }
}

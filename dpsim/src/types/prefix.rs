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

//! This module contains the definition of an IPv4 network prefix.

use std::{
    fmt::{Debug, Display},
    net::Ipv4Addr,
    str::FromStr,
};

use ipnet::{AddrParseError, Ipv4Net, PrefixLenError};
use serde::{de::Error, Deserialize, Serialize};

/// Number of address bits of an IPv4 address.
pub const MAX_PREFIX_LENGTH: u8 = 32;

/// IPv4 network prefix. The host bits are always cleared, so `10.0.0.1/8` and `10.0.0.0/8` are the
/// same prefix. Prefixes are totally ordered by their address, and then by their length.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default)]
pub struct Prefix(Ipv4Net);

impl Prefix {
    /// Create a new prefix from an address and a prefix length. Any host bits of `addr` are
    /// cleared.
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self, PrefixLenError> {
        Ipv4Net::new(addr, len).map(Self::from)
    }

    /// Create the host prefix (`/32`) of an address.
    pub fn host(addr: Ipv4Addr) -> Self {
        Self(Ipv4Net::from(addr))
    }

    /// Network address of the prefix.
    pub fn address(&self) -> Ipv4Addr {
        self.0.network()
    }

    /// Last address covered by the prefix.
    pub fn end_address(&self) -> Ipv4Addr {
        self.0.broadcast()
    }

    /// Length of the prefix (number of fixed leading bits).
    pub fn len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// Returns `true` for the default route `0.0.0.0/0`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the address is part of this network.
    pub fn contains_ip(&self, ip: &Ipv4Addr) -> bool {
        self.0.contains(ip)
    }

    /// Check if `self` contains `other`, or `self` is equal to `other`.
    pub fn contains_prefix(&self, other: &Prefix) -> bool {
        self.0.contains(&other.0)
    }

    /// Returns `true` if `self` is strictly more specific than `other` and contained in it.
    pub fn more_specific_than(&self, other: &Prefix) -> bool {
        self.len() > other.len() && other.contains_prefix(self)
    }

    /// Get the `i`-th bit of the network address, counted from the most significant bit.
    pub(crate) fn bit(&self, i: u8) -> bool {
        ip_bit(self.address(), i)
    }
}

/// Get the `i`-th bit of an address, counted from the most significant bit.
pub(crate) fn ip_bit(ip: Ipv4Addr, i: u8) -> bool {
    (u32::from(ip) >> (31 - i as u32)) & 1 == 1
}

impl Serialize for Prefix {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4Net::from_str(&s)
            .map_err(|s| D::Error::custom(format!("Expected IP Network, found {s}")))
            .map(Self::from)
    }
}

impl FromStr for Prefix {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ipv4Net::from_str(s).map(Self::from)
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<Ipv4Net> for Prefix {
    fn from(value: Ipv4Net) -> Self {
        Self(value.trunc())
    }
}

impl From<Prefix> for Ipv4Net {
    fn from(value: Prefix) -> Self {
        value.0
    }
}

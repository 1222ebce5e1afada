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

//! Procedural macros to write IPv4 literals that are checked at compile time.

use proc_macro::TokenStream;

mod ip;
use ip::{AddrInput, PrefixInput};
use syn::parse_macro_input;

/// Create a prefix from an [`ipnet::Ipv4Net`] string. If you provide an `as`, you can
/// specify to which type the resulting `Ipv4Net` will be casted. If you omit the type parameter
/// after `as`, then the macro will simply invoke `.into()` on the generated `Ipv4Net`.
///
/// ```
/// # use dpsim_macros::*;
/// # use ipnet::Ipv4Net as P;
/// // `p` will be an `Ipv4Net`
/// let p = prefix!("192.168.0.0/24");
///
/// // `p` will have type `P`, but `P` must implement `From<Ipv4Net>`.
/// let p = prefix!("192.168.0.0/24" as P);
/// let p: P = prefix!("192.168.0.0/24" as);
/// ```
///
/// Interface addresses keep their host bits, so `prefix!("10.0.0.1/30")` is the address
/// `10.0.0.1` on the network `10.0.0.0/30`. Converting it into a `dpsim::types::Prefix`
/// truncates it to the network.
#[proc_macro]
pub fn prefix(input: TokenStream) -> TokenStream {
    parse_macro_input!(input as PrefixInput).quote()
}

/// Create a [`std::net::Ipv4Addr`] from a string literal.
///
/// ```
/// # use dpsim_macros::*;
/// let ip = ip!("10.0.0.1");
/// assert_eq!(ip, std::net::Ipv4Addr::new(10, 0, 0, 1));
/// ```
#[proc_macro]
pub fn ip(input: TokenStream) -> TokenStream {
    parse_macro_input!(input as AddrInput).quote()
}

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

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    LitStr, Result, Token, Type,
};

/// Parse the four dotted bytes of an IPv4 address.
fn parse_octets(input: ParseStream, ip: &str) -> Result<[u8; 4]> {
    let bytes = ip
        .trim()
        .split('.')
        .enumerate()
        .map(|(i, x)| {
            x.parse::<u8>().map_err(|_| {
                input.error(format!(
                    "Cannot parse the {} byte of the IP address as an u8: {}",
                    match i {
                        0 => "first".to_string(),
                        1 => "second".to_string(),
                        2 => "third".to_string(),
                        3 => "fourth".to_string(),
                        i => format!("{}th", i + 1),
                    },
                    x
                ))
            })
        })
        .collect::<Result<Vec<u8>>>()?;
    match bytes.as_slice() {
        [a, b, c, d] => Ok([*a, *b, *c, *d]),
        _ => Err(input.error("The IP address must contain 4 parts.")),
    }
}

/// A plain IPv4 address, like `"10.0.0.1"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct AddrInput {
    pub octets: [u8; 4],
}

impl Parse for AddrInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let str: LitStr = input.parse()?;
        let s = str.value();
        if s.contains('/') {
            return Err(input.error("An IP address must not contain a netmask. Use `prefix!`."));
        }
        Ok(Self {
            octets: parse_octets(input, &s)?,
        })
    }
}

impl AddrInput {
    pub fn quote(&self) -> TokenStream {
        let [a, b, c, d] = self.octets;
        quote! { ::std::net::Ipv4Addr::new(#a, #b, #c, #d) }.into()
    }
}

/// An IPv4 network, like `"10.0.0.0/8"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct PrefixInputNoCast {
    pub octets: [u8; 4],
    pub prefix_len: u8,
}

impl Parse for PrefixInputNoCast {
    fn parse(input: ParseStream) -> Result<Self> {
        let str: LitStr = input.parse()?;
        let s = str.value();
        let (ip, mask) = s.trim().split_once('/').ok_or_else(|| {
            input.error(
                "Expected a `/` in the string literal of the IP address containing the mask.",
            )
        })?;
        let prefix_len = mask
            .parse::<u8>()
            .map_err(|_| input.error("Cannot parse the netmask as a number!"))?;
        if prefix_len > 32 {
            return Err(input.error("The prefix length must be between 0 and 32!"));
        }

        Ok(Self {
            octets: parse_octets(input, ip)?,
            prefix_len,
        })
    }
}

impl PrefixInputNoCast {
    pub fn quote(&self) -> proc_macro2::TokenStream {
        let [a, b, c, d] = self.octets;
        let prefix_len = self.prefix_len;
        quote! {
            ::ipnet::Ipv4Net::new(::std::net::Ipv4Addr::new(#a, #b, #c, #d), #prefix_len).unwrap()
        }
    }
}

pub(crate) struct PrefixInput {
    pub prefix: PrefixInputNoCast,
    pub cast: bool,
    pub target_type: Option<Type>,
}

impl Parse for PrefixInput {
    fn parse(input: ParseStream) -> Result<Self> {
        let prefix = input.parse()?;
        let mut cast = false;
        let mut target_type = None;
        if input.parse::<Token![as]>().is_ok() {
            cast = true;
            target_type = input.parse::<Type>().ok();
        }

        Ok(Self {
            prefix,
            cast,
            target_type,
        })
    }
}

impl PrefixInput {
    pub fn quote(&self) -> TokenStream {
        let Self {
            prefix,
            cast,
            target_type,
        } = self;
        let prefix = prefix.quote();
        match (cast, target_type) {
            (false, _) => prefix,
            (true, None) => quote! { #prefix.into() },
            (true, Some(ty)) => quote! { #ty::from(#prefix) },
        }
        .into()
    }
}

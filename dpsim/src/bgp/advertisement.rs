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

//! BGP advertisements injected from outside the modeled network.

use std::{
    collections::{BTreeMap, BTreeSet},
    net::Ipv4Addr,
};

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    route::{RouteBuilder, RoutingProtocol},
    router::VirtualRouter,
    types::{AsId, NetworkError, Prefix},
};

use super::{propagation::Session, DEFAULT_LOCAL_PREF};

/// Kind of an external advertisement, seen from the modeled router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdvertisementType {
    /// The route was already received (and accepted) over eBGP.
    EbgpReceived,
    /// The route is sent by an eBGP peer, and still needs to be imported.
    EbgpSent,
    /// The route was already received (and accepted) over iBGP.
    IbgpReceived,
    /// The route is sent by an iBGP peer, and still needs to be imported.
    IbgpSent,
}

impl AdvertisementType {
    /// Returns `true` for advertisements of an eBGP session.
    pub fn is_ebgp(&self) -> bool {
        matches!(self, Self::EbgpReceived | Self::EbgpSent)
    }

    /// Returns `true` if the advertisement is installed without applying the import policy.
    pub fn is_received(&self) -> bool {
        matches!(self, Self::EbgpReceived | Self::IbgpReceived)
    }
}

/// A BGP route advertised by a router outside of the modeled network.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BgpAdvertisement {
    /// Type of the advertisement
    #[serde(rename = "type")]
    pub adv_type: AdvertisementType,
    /// Advertised network
    pub network: Prefix,
    /// Next-hop of the advertised route
    pub next_hop_ip: Option<Ipv4Addr>,
    /// Device that sends the advertisement (not part of the modeled network)
    #[serde(default)]
    pub src_node: Option<String>,
    /// Address of the sender
    pub src_ip: Ipv4Addr,
    /// Protocol from which the sender learned the route
    #[serde(default)]
    pub src_protocol: Option<RoutingProtocol>,
    /// Receiving device
    pub dst_node: String,
    /// Receiving VRF
    #[serde(default = "default_vrf")]
    pub dst_vrf: String,
    /// Address of the receiver
    pub dst_ip: Ipv4Addr,
    /// AS path
    #[serde(default)]
    pub as_path: Vec<AsId>,
    /// Communities
    #[serde(default)]
    pub communities: BTreeSet<u32>,
    /// Local preference
    #[serde(default = "default_local_pref")]
    pub local_pref: u32,
    /// Multi-exit discriminator
    #[serde(default)]
    pub med: u32,
    /// Originator ID
    #[serde(default)]
    pub originator_ip: Option<Ipv4Addr>,
    /// Cluster list
    #[serde(default)]
    pub cluster_list: BTreeSet<u32>,
}

fn default_vrf() -> String {
    crate::config::DEFAULT_VRF_NAME.to_string()
}

fn default_local_pref() -> u32 {
    DEFAULT_LOCAL_PREF
}

impl BgpAdvertisement {
    /// Create an advertisement for `network` sent from `src_ip` to `dst_node` at `dst_ip`.
    pub fn new(
        adv_type: AdvertisementType,
        network: Prefix,
        src_ip: Ipv4Addr,
        dst_node: impl Into<String>,
        dst_ip: Ipv4Addr,
    ) -> Self {
        Self {
            adv_type,
            network,
            next_hop_ip: Some(src_ip),
            src_node: None,
            src_ip,
            src_protocol: None,
            dst_node: dst_node.into(),
            dst_vrf: default_vrf(),
            dst_ip,
            as_path: Vec::new(),
            communities: BTreeSet::new(),
            local_pref: DEFAULT_LOCAL_PREF,
            med: 0,
            originator_ip: None,
            cluster_list: BTreeSet::new(),
        }
    }

    /// Set the AS path
    pub fn as_path<A>(mut self, path: A) -> Self
    where
        A: IntoIterator,
        A::Item: Into<AsId>,
    {
        self.as_path = path.into_iter().map(|x| x.into()).collect();
        self
    }

    /// Set the local preference
    pub fn local_pref(mut self, local_pref: u32) -> Self {
        self.local_pref = local_pref;
        self
    }

    /// Set the MED
    pub fn med(mut self, med: u32) -> Self {
        self.med = med;
        self
    }

    /// Add a community
    pub fn community(mut self, community: u32) -> Self {
        self.communities.insert(community);
        self
    }
}

impl VirtualRouter {
    /// Seed the base eBGP and iBGP RIBs from the external advertisements destined to this
    /// instance. Advertisements towards an address that is not owned by this device, or from an
    /// address that is not a configured neighbor, are ignored.
    pub(crate) fn init_base_bgp_ribs(
        &mut self,
        adverts: &[BgpAdvertisement],
        ip_owners: &BTreeMap<Ipv4Addr, BTreeSet<String>>,
    ) -> Result<(), NetworkError> {
        let Some(process) = self.vrf.bgp.as_ref() else {
            return Ok(());
        };

        let mut ebgp = Vec::new();
        let mut ibgp = Vec::new();
        for advert in adverts
            .iter()
            .filter(|a| a.dst_node == self.hostname && a.dst_vrf == self.vrf_name)
        {
            let owned = ip_owners
                .get(&advert.dst_ip)
                .map(|o| o.contains(&self.hostname))
                .unwrap_or(false);
            if !owned {
                debug!(
                    "{}: ignore advertisement for {}: {} is not owned by the device",
                    self.hostname, advert.network, advert.dst_ip
                );
                continue;
            }
            let Some(neighbor) = process.neighbors.get(&advert.src_ip) else {
                debug!(
                    "{}: ignore advertisement for {}: {} is no neighbor",
                    self.hostname, advert.network, advert.src_ip
                );
                continue;
            };

            let is_ebgp = advert.adv_type.is_ebgp();
            let protocol = if is_ebgp {
                RoutingProtocol::Bgp
            } else {
                RoutingProtocol::Ibgp
            };

            let mut b = RouteBuilder::new(advert.network, protocol);
            b.as_path = advert.as_path.clone();
            b.communities = advert.communities.clone();
            b.metric = advert.med;
            b.next_hop_ip = advert.next_hop_ip;
            b.originator_ip = advert.originator_ip;

            let route = if advert.adv_type.is_received() {
                b.cluster_list = advert.cluster_list.clone();
                b.local_pref = advert.local_pref;
                b.src_protocol = advert.src_protocol;
                b.build()
            } else {
                b.local_pref = if is_ebgp {
                    DEFAULT_LOCAL_PREF
                } else {
                    advert.local_pref
                };
                b.src_protocol = advert.src_protocol;
                let outgoing = b.build();
                let local_as = neighbor.local_as.or(process.local_as).ok_or_else(|| {
                    NetworkError::MissingLocalAs(self.hostname.clone(), advert.src_ip)
                })?;
                let session = Session {
                    addr: advert.src_ip,
                    neighbor,
                    local_as,
                    ebgp: is_ebgp,
                };
                match self.receive_bgp_route(&session, &outgoing, outgoing.next_hop_ip) {
                    Some(r) => r,
                    None => continue,
                }
            };

            if is_ebgp {
                ebgp.push(route);
            } else {
                ibgp.push(route);
            }
        }

        self.base_ebgp_rib.extend(ebgp);
        self.base_ibgp_rib.extend(ibgp);
        Ok(())
    }
}

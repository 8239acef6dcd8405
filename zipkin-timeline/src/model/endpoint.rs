use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::net::{Ipv4Addr, Ipv6Addr};
use typed_builder::TypedBuilder;

/// The network context of a node in the service graph.
#[derive(TypedBuilder, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Lower-case label of this node in the service graph, such as "frontend".
    #[builder(setter(into, strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// IPv4 address of this host.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,
    /// IPv6 address of this host.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,
    /// Listen port of this host.
    #[builder(setter(strip_option), default)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl Endpoint {
    /// Returns `true` when no field is set. Empty endpoints are treated as absent.
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none()
            && self.ipv4.is_none()
            && self.ipv6.is_none()
            && self.port.is_none()
    }

    /// Returns `true` if `other` does not contradict any field set on both sides.
    pub(crate) fn is_compatible(&self, other: &Endpoint) -> bool {
        fn agree<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
        }
        agree(&self.service_name, &other.service_name)
            && agree(&self.ipv4, &other.ipv4)
            && agree(&self.ipv6, &other.ipv6)
            && agree(&self.port, &other.port)
    }

    /// Fills fields missing on `self` from `other`. Fields already set win.
    pub(crate) fn absorb(&mut self, other: &Endpoint) {
        if self.service_name.is_none() {
            self.service_name.clone_from(&other.service_name);
        }
        self.ipv4 = self.ipv4.or(other.ipv4);
        self.ipv6 = self.ipv6.or(other.ipv6);
        self.port = self.port.or(other.port);
    }
}

/// Returns `true` if both endpoints carry the same IPv6 or the same IPv4 address.
///
/// IPv6 is checked first. An endpoint without an address never matches, so two
/// spans without network context are never considered to be on the same host.
pub fn ips_match(a: Option<&Endpoint>, b: Option<&Endpoint>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };
    if let (Some(a), Some(b)) = (a.ipv6, b.ipv6) {
        if a == b {
            return true;
        }
    }
    matches!((a.ipv4, b.ipv4), (Some(a), Some(b)) if a == b)
}

/// Orders endpoints so that absent ones come first, then by service name and addresses.
pub(crate) fn compare_endpoints(a: Option<&Endpoint>, b: Option<&Endpoint>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .service_name
            .cmp(&b.service_name)
            .then_with(|| a.ipv4.cmp(&b.ipv4))
            .then_with(|| a.ipv6.cmp(&b.ipv6)),
    }
}

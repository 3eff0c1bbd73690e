//! Resource naming
//!
//! Names are the idempotency key of every resource, so every name the
//! planner emits is derived here.

use crate::model::InstanceDescriptor;

const INDEX_PLACEHOLDER: &str = "%d";

/// Expand an instance descriptor into one name per replica
///
/// `%d` is replaced by the 1-based replica index. A template without a
/// placeholder gets `-<index>` appended when more than one replica is
/// requested. With `zone_qualified` the zone name is appended as well.
pub fn expand_instance_names(
    descriptor: &InstanceDescriptor,
    zone: &str,
    zone_qualified: bool,
) -> Vec<String> {
    (1..=descriptor.quantity)
        .map(|index| {
            let base = if descriptor.name.contains(INDEX_PLACEHOLDER) {
                descriptor
                    .name
                    .replacen(INDEX_PLACEHOLDER, &index.to_string(), 1)
            } else if descriptor.quantity > 1 {
                format!("{}-{}", descriptor.name, index)
            } else {
                descriptor.name.clone()
            };

            if zone_qualified {
                format!("{}-{}", base, zone)
            } else {
                base
            }
        })
        .collect()
}

/// One public gateway per zone per VPC
pub fn public_gateway_name(vpc: &str, zone: &str) -> String {
    format!("{}-{}-gw", vpc, zone)
}

pub fn address_prefix_name(zone: &str) -> String {
    format!("{}-address-prefix", zone)
}

pub fn floating_ip_name(instance: &str) -> String {
    format!("{}-fip", instance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, quantity: u32) -> InstanceDescriptor {
        InstanceDescriptor {
            name: name.to_string(),
            quantity,
            template: "web".to_string(),
            security_group: None,
            floating_ip: false,
            lb_pools: Vec::new(),
        }
    }

    #[test]
    fn test_expand_placeholder() {
        let names = expand_instance_names(&descriptor("web-%d", 3), "us-south-1", false);
        assert_eq!(names, vec!["web-1", "web-2", "web-3"]);
    }

    #[test]
    fn test_expand_zone_qualified() {
        let names = expand_instance_names(&descriptor("web-%d", 2), "us-south-1", true);
        assert_eq!(names, vec!["web-1-us-south-1", "web-2-us-south-1"]);
    }

    #[test]
    fn test_expand_without_placeholder() {
        assert_eq!(
            expand_instance_names(&descriptor("bastion", 1), "z", false),
            vec!["bastion"]
        );
        assert_eq!(
            expand_instance_names(&descriptor("app", 2), "z", false),
            vec!["app-1", "app-2"]
        );
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(public_gateway_name("acme-vpc", "us-south-1"), "acme-vpc-us-south-1-gw");
        assert_eq!(address_prefix_name("us-south-2"), "us-south-2-address-prefix");
        assert_eq!(floating_ip_name("web-1"), "web-1-fip");
    }
}

use orbiter_types::{Node, Pack, RuntimeTag, Service};

/// Nodes the scheduler may place this service's pods on: online, running a
/// compatible runtime, tolerating every one of the node's taints, matching
/// the service's node-selector labels, and with spare pod capacity.
pub fn eligible_nodes<'a>(nodes: &'a [Node], service: &Service, pack: &Pack) -> Vec<&'a Node> {
    nodes
        .iter()
        .filter(|n| n.is_online())
        .filter(|n| runtime_compatible(pack.runtime_tag, n.runtime_type))
        .filter(|n| tolerates(service, n))
        .filter(|n| matches_selector(service, n))
        .filter(|n| n.allocated.pods < n.allocatable.pods)
        .collect()
}

fn runtime_compatible(tag: RuntimeTag, runtime: orbiter_types::RuntimeType) -> bool {
    match tag {
        RuntimeTag::Universal => true,
        RuntimeTag::Node => runtime == orbiter_types::RuntimeType::Node,
        RuntimeTag::Browser => runtime == orbiter_types::RuntimeType::Browser,
    }
}

fn tolerates(service: &Service, node: &Node) -> bool {
    node.taints
        .iter()
        .all(|(key, value)| service.tolerations.get(key) == Some(value))
}

fn matches_selector(service: &Service, node: &Node) -> bool {
    service
        .labels
        .iter()
        .all(|(key, value)| node.labels.get(key) == Some(value))
}

/// Picks the least-loaded eligible node for one new pod, ties broken by
/// node id so scheduling is deterministic given identical load.
pub fn select_least_loaded<'a>(eligible: &[&'a Node]) -> Option<&'a Node> {
    eligible
        .iter()
        .min_by(|a, b| {
            let ratio_a = a.allocated.pod_load_ratio(&a.allocatable);
            let ratio_b = b.allocated.pod_load_ratio(&b.allocatable);
            ratio_a
                .partial_cmp(&ratio_b)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id().cmp(&b.id()))
        })
        .copied()
}

use crate::models::{TargetMarketplace, VisualMatch};

/// Loose substring check on `source` and `link`. A link that merely mentions
/// the marketplace in a path or query parameter also counts.
pub fn is_target_marketplace(item: &VisualMatch, marketplace: TargetMarketplace) -> bool {
    let token = marketplace.token();
    let source = item.source().unwrap_or("").to_lowercase();
    let link = item.link().unwrap_or("").to_lowercase();
    source.contains(token) || link.contains(token)
}

/// Target-marketplace subset, in provider order.
pub fn partition_target(
    matches: &[VisualMatch],
    marketplace: TargetMarketplace,
) -> Vec<&VisualMatch> {
    matches
        .iter()
        .filter(|item| is_target_marketplace(item, marketplace))
        .collect()
}

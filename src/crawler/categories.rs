//! Category tree discovery
//!
//! The marketplace exposes each category's children through a JSON endpoint;
//! the whole tree is walked from the root id 0 with an explicit worklist.

use crate::crawler::fetcher::SiteClient;
use crate::crawler::parser::parse_category_children;
use crate::storage::Storage;
use crate::SweepError;
use std::collections::HashSet;

/// Id the marketplace uses for the root of the tree
pub const ROOT_CATEGORY_ID: i64 = 0;

/// Totals for one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoverySummary {
    /// Categories seen in the tree
    pub discovered: usize,
    /// Categories not already stored
    pub inserted: usize,
    /// Nodes whose children could not be fetched or parsed
    pub failed_nodes: usize,
}

/// Discovers the category tree and stores every node
///
/// Children of the root get no parent. A node whose children cannot be
/// fetched or parsed is logged and treated as a leaf; only a failure at the
/// root is an error.
pub async fn discover_categories<S>(
    client: &SiteClient,
    storage: &mut S,
) -> Result<DiscoverySummary, SweepError>
where
    S: Storage + ?Sized,
{
    let mut summary = DiscoverySummary::default();
    let mut visited = HashSet::from([ROOT_CATEGORY_ID]);
    let mut worklist = vec![(ROOT_CATEGORY_ID, 0usize)];

    while let Some((parent_id, depth)) = worklist.pop() {
        let children = match fetch_children(client, parent_id).await {
            Ok(children) => children,
            Err(e) if parent_id == ROOT_CATEGORY_ID => return Err(e),
            Err(e) => {
                tracing::warn!("Failed to load children of category {}: {}", parent_id, e);
                summary.failed_nodes += 1;
                continue;
            }
        };

        let parent = (parent_id != ROOT_CATEGORY_ID).then_some(parent_id);
        let mut next = Vec::with_capacity(children.len());
        for (id, name) in children {
            if !visited.insert(id) {
                tracing::debug!("Category {} already visited, skipping", id);
                continue;
            }

            tracing::info!("{}{} (ID: {})", "  ".repeat(depth), name, id);
            summary.discovered += 1;
            if storage.insert_category(id, &name, parent)? {
                summary.inserted += 1;
            }
            next.push((id, depth + 1));
        }

        // Reversed so children are visited in page order
        worklist.extend(next.into_iter().rev());
    }

    tracing::info!(
        "Discovered {} categories ({} new)",
        summary.discovered,
        summary.inserted
    );
    Ok(summary)
}

async fn fetch_children(client: &SiteClient, id: i64) -> Result<Vec<(i64, String)>, SweepError> {
    let mut url = client.url("index.php")?;
    url.query_pairs_mut()
        .append_pair("page", "cat_ajax")
        .append_pair("id", &id.to_string());

    let page = client.get(&url).await?;
    parse_category_children(&page.body).map_err(|source| SweepError::Json {
        url: url.to_string(),
        source,
    })
}

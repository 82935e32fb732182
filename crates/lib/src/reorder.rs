use std::collections::HashMap;

use crate::record::Item;

/// Restores the caller's id order, one item per requested id. Ids with no
/// fetched item are dropped.
#[must_use]
pub fn reorder(ids: &[String], items: Vec<Item>) -> Vec<Item> {
    let by_id = items
        .into_iter()
        .map(|item| (item.id.clone(), item))
        .collect::<HashMap<_, _>>();

    ids.iter().filter_map(|id| by_id.get(id).cloned()).collect()
}

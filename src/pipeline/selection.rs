use std::collections::HashSet;

use serde::Deserialize;
use tracing::{info, warn};

use super::{
    prompts,
    types::{RestaurantMenu, SelectedItem, SelectedItems},
    Pipeline, PipelineError,
};
use crate::survey::context::UserContext;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectionReply {
    #[serde(default)]
    selected_menu_items: SelectedItems,
}

fn keep_known(items: &mut Vec<SelectedItem>, known: &HashSet<i64>) -> usize {
    let before = items.len();
    items.retain(|i| i.item_id.map_or(true, |id| known.contains(&id)));
    before - items.len()
}

/// Stage 3. Items citing an id that is not on any fetched menu are dropped.
pub async fn select_items(
    p: &Pipeline,
    ctx: &UserContext,
    menus: &[RestaurantMenu],
) -> Result<SelectedItems, PipelineError> {
    let request = prompts::select_items(ctx, menus);
    let reply: SelectionReply = p.chat_json(&request, "select-items").await?;
    let mut selected = reply.selected_menu_items;

    let known: HashSet<i64> = menus
        .iter()
        .flat_map(|m| m.items.iter().map(|i| i.id))
        .collect();
    let dropped = keep_known(&mut selected.breakfast, &known)
        + keep_known(&mut selected.lunch, &known)
        + keep_known(&mut selected.dinner, &known);
    if dropped > 0 {
        warn!(dropped, "model selected items that are not on any menu");
    }
    info!(stage = "selection", selected = selected.total(), "menu items selected");
    Ok(selected)
}

use std::collections::BTreeMap;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use super::{
    fallback::unverified,
    types::{DataSource, MealType, SelectedItem, SelectedItems, VerifiedItem},
    Pipeline, PipelineError,
};

async fn verify(p: &Pipeline, id: i64, item: SelectedItem, meal_type: MealType) -> VerifiedItem {
    match p.clients.menus.menu_item_nutrition(id).await {
        Ok(Some(nutrition)) => VerifiedItem {
            item,
            meal_type,
            nutrition: Some(nutrition),
            data_source: DataSource::Verified,
        },
        Ok(None) => unverified(item, meal_type),
        Err(e) => {
            warn!(item_id = id, error = %e, "nutrition lookup failed");
            unverified(item, meal_type)
        }
    }
}

/// Stage 4. Lookups run in parallel; items without an id are dropped and a
/// failed lookup keeps the item as `unavailable`.
pub async fn verify_nutrition(
    p: &Pipeline,
    selected: &SelectedItems,
) -> Result<Vec<VerifiedItem>, PipelineError> {
    let lookups = MealType::ALL.into_iter().flat_map(|meal| {
        selected
            .for_meal(meal)
            .iter()
            .filter_map(move |item| match item.item_id {
                Some(id) => Some(verify(p, id, item.clone(), meal)),
                None => {
                    debug!(title = %item.item_title, "selected item has no id; dropped");
                    None
                }
            })
    });
    let verified = join_all(lookups).await;
    let confirmed = verified
        .iter()
        .filter(|v| v.data_source == DataSource::Verified)
        .count();
    info!(
        stage = "nutrition",
        items = verified.len(),
        confirmed,
        "nutrition verified"
    );
    Ok(verified)
}

pub fn group_by_meal(items: &[VerifiedItem]) -> BTreeMap<MealType, Vec<&VerifiedItem>> {
    let mut groups: BTreeMap<MealType, Vec<&VerifiedItem>> = BTreeMap::new();
    for item in items {
        groups.entry(item.meal_type).or_default().push(item);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::{fake::FakeMenus, Clients},
        config::PipelineConfig,
        pipeline::types::VerifiedNutrition,
    };
    use std::sync::Arc;

    fn selected(id: Option<i64>, title: &str) -> SelectedItem {
        SelectedItem {
            item_id: id,
            item_title: title.into(),
            restaurant: "Chipotle".into(),
            reasoning: None,
        }
    }

    #[tokio::test]
    async fn drops_idless_items_and_tags_failures() {
        let mut menus = FakeMenus::default();
        menus.nutrition.insert(
            1,
            VerifiedNutrition {
                calories: 500.0,
                protein: 35.0,
                carbs: 40.0,
                fat: 18.0,
                fiber: None,
                sodium: None,
            },
        );
        menus.failing_ids.push(2);
        let mut clients = Clients::fake();
        clients.menus = Arc::new(menus);
        let p = Pipeline::new(clients, PipelineConfig::default());

        let picks = SelectedItems {
            breakfast: vec![selected(None, "Mystery Muffin")],
            lunch: vec![selected(Some(1), "Burrito Bowl"), selected(Some(2), "Tacos")],
            dinner: vec![selected(Some(3), "Salad")],
        };
        let verified = verify_nutrition(&p, &picks).await.unwrap();

        assert_eq!(verified.len(), 3);
        assert_eq!(verified[0].data_source, DataSource::Verified);
        assert_eq!(verified[0].nutrition.as_ref().unwrap().calories, 500.0);
        assert_eq!(verified[1].data_source, DataSource::Unavailable);
        assert!(verified[1].nutrition.is_none());
        assert_eq!(verified[2].data_source, DataSource::Unavailable);

        let groups = group_by_meal(&verified);
        assert!(!groups.contains_key(&MealType::Breakfast));
        assert_eq!(groups[&MealType::Lunch].len(), 2);
        assert_eq!(groups[&MealType::Dinner].len(), 1);
    }
}

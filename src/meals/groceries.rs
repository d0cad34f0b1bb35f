//! Shopping list for the week's home-cooked options.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::pipeline::{
    restrictions::{mentions, words},
    types::{MealType, OptionType, WeeklyMealPlan, Weekday},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroceryCategory {
    Proteins,
    Vegetables,
    Grains,
    Dairy,
    PantryStaples,
    Snacks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Perishability {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryUsage {
    pub day: Weekday,
    pub meal: MealType,
    pub dish_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryItem {
    pub name: String,
    pub quantity: String,
    pub category: GroceryCategory,
    pub used_in_meals: Vec<GroceryUsage>,
    pub first_use_day: Weekday,
    pub perishability: Perishability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroceryList {
    pub proteins: Vec<GroceryItem>,
    pub vegetables: Vec<GroceryItem>,
    pub grains: Vec<GroceryItem>,
    pub dairy: Vec<GroceryItem>,
    pub pantry_staples: Vec<GroceryItem>,
    pub snacks: Vec<GroceryItem>,
    pub total_items: usize,
}

impl GroceryList {
    fn bucket_mut(&mut self, category: GroceryCategory) -> &mut Vec<GroceryItem> {
        match category {
            GroceryCategory::Proteins => &mut self.proteins,
            GroceryCategory::Vegetables => &mut self.vegetables,
            GroceryCategory::Grains => &mut self.grains,
            GroceryCategory::Dairy => &mut self.dairy,
            GroceryCategory::PantryStaples => &mut self.pantry_staples,
            GroceryCategory::Snacks => &mut self.snacks,
        }
    }
}

const CATEGORIES: &[(GroceryCategory, &[&str])] = &[
    (
        GroceryCategory::Proteins,
        &[
            "chicken", "chicken breast", "beef", "ground beef", "pork", "turkey", "ground turkey",
            "salmon", "tuna", "cod", "shrimp", "fish", "tofu", "tempeh", "egg", "lentils",
            "chickpeas", "black beans", "beans",
        ],
    ),
    (
        GroceryCategory::Vegetables,
        &[
            "spinach", "lettuce", "mixed greens", "kale", "broccoli", "carrot", "zucchini",
            "tomato", "cucumber", "mushroom", "bell pepper", "onion", "garlic", "potato",
            "sweet potato", "avocado", "banana", "berries", "strawberries", "apple", "lemon",
            "lime", "cilantro", "parsley", "basil",
        ],
    ),
    (
        GroceryCategory::Grains,
        &[
            "rice", "brown rice", "pasta", "oats", "rolled oats", "quinoa", "bread", "tortilla",
            "noodles", "couscous", "flour",
        ],
    ),
    (
        GroceryCategory::Dairy,
        &["milk", "cheese", "yogurt", "greek yogurt", "butter", "cream", "feta", "parmesan"],
    ),
    (
        GroceryCategory::Snacks,
        &[
            "almonds", "nuts", "walnuts", "granola", "peanut butter", "almond butter", "hummus",
            "dark chocolate",
        ],
    ),
    (
        GroceryCategory::PantryStaples,
        &[
            "olive oil", "vegetable oil", "soy sauce", "vinegar", "honey", "maple syrup", "salt",
            "pepper", "spices", "canned tomatoes", "coconut milk", "broth", "stock",
        ],
    ),
];

const PERISHABILITY: &[(Perishability, &[&str])] = &[
    (
        Perishability::High,
        &[
            "chicken", "beef", "fish", "salmon", "shrimp", "ground beef", "ground turkey",
            "cilantro", "parsley", "basil", "berries", "strawberries", "lettuce", "spinach",
            "mixed greens", "avocado", "banana", "milk", "cream", "yogurt",
        ],
    ),
    (
        Perishability::Medium,
        &[
            "egg", "cheese", "tofu", "bell pepper", "broccoli", "carrot", "zucchini", "tomato",
            "cucumber", "mushroom", "apple", "butter", "bread",
        ],
    ),
];

const UNITS: &[(&str, &str)] = &[
    ("cup", "cup"),
    ("cups", "cup"),
    ("tbsp", "tbsp"),
    ("tablespoon", "tbsp"),
    ("tablespoons", "tbsp"),
    ("tsp", "tsp"),
    ("teaspoon", "tsp"),
    ("teaspoons", "tsp"),
    ("oz", "oz"),
    ("ounce", "oz"),
    ("ounces", "oz"),
    ("lb", "lb"),
    ("lbs", "lb"),
    ("pound", "lb"),
    ("pounds", "lb"),
    ("g", "g"),
    ("gram", "g"),
    ("grams", "g"),
    ("kg", "kg"),
    ("ml", "ml"),
    ("l", "l"),
    ("clove", "clove"),
    ("cloves", "clove"),
    ("slice", "slice"),
    ("slices", "slice"),
    ("can", "can"),
    ("cans", "can"),
    ("package", "package"),
    ("packages", "package"),
    ("bag", "bag"),
    ("bags", "bag"),
    ("pinch", "pinch"),
    ("dash", "dash"),
    ("piece", "piece"),
    ("pieces", "piece"),
];
const ABBREVIATED: &[&str] = &["tbsp", "tsp", "oz", "lb", "g", "kg", "ml", "l"];
const SIZE_WORDS: &[&str] = &["small", "medium", "large", "extra-large", "xl"];

/// Longest keyword the name mentions wins, so "peanut butter" is a snack
/// rather than dairy.
fn longest_match<T: Copy>(name: &str, table: &[(T, &[&str])]) -> Option<T> {
    let text = words(name);
    table
        .iter()
        .flat_map(|(value, keys)| keys.iter().map(move |k| (*value, *k)))
        .filter(|(_, key)| mentions(&text, key))
        .max_by_key(|(_, key)| key.len())
        .map(|(value, _)| value)
}

pub fn category(name: &str) -> GroceryCategory {
    longest_match(name, CATEGORIES).unwrap_or(GroceryCategory::PantryStaples)
}

pub fn perishability(name: &str) -> Perishability {
    longest_match(name, PERISHABILITY).unwrap_or(Perishability::Low)
}

fn amount(token: &str) -> Option<f64> {
    match token {
        "½" => return Some(0.5),
        "¼" => return Some(0.25),
        "¾" => return Some(0.75),
        "⅓" => return Some(1.0 / 3.0),
        "⅔" => return Some(2.0 / 3.0),
        _ => {}
    }
    match token.split_once('/') {
        Some((n, d)) => {
            let (n, d) = (n.parse::<f64>().ok()?, d.parse::<f64>().ok()?);
            (d != 0.0).then(|| n / d)
        }
        None => token.parse::<f64>().ok().filter(|n| n.is_finite() && *n >= 0.0),
    }
}

/// A recipe ingredient line split into amount, unit and name.
#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub amount: Option<f64>,
    pub unit: Option<&'static str>,
    pub name: String,
}

pub fn parse_ingredient(raw: &str) -> Ingredient {
    let mut cleaned = String::with_capacity(raw.len());
    let mut depth = 0usize;
    for c in raw.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => cleaned.push(' '),
            _ if depth == 0 => cleaned.extend(c.to_lowercase()),
            _ => {}
        }
    }
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let mut total: Option<f64> = None;
    let mut unit = None;
    let mut i = 0;
    while i < tokens.len() {
        if let Some(n) = amount(tokens[i]) {
            total = Some(total.unwrap_or(0.0) + n);
        } else if let Some((_, canonical)) = UNITS.iter().find(|(u, _)| *u == tokens[i]) {
            unit = unit.or(Some(*canonical));
        } else {
            break;
        }
        i += 1;
    }
    if tokens.get(i) == Some(&"of") {
        i += 1;
    }
    if tokens.get(i).is_some_and(|t| SIZE_WORDS.contains(t)) {
        i += 1;
    }

    let name = tokens[i.min(tokens.len())..].join(" ");
    Ingredient {
        amount: total,
        unit,
        name: if name.is_empty() { tokens.join(" ") } else { name },
    }
}

fn key(name: &str) -> String {
    words(name).trim().to_string()
}

fn format_amount(n: f64) -> String {
    let rounded = (n * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded}")
    }
}

#[derive(Default)]
struct Tally {
    name: String,
    by_unit: BTreeMap<&'static str, f64>,
    unmeasured: usize,
    usages: Vec<GroceryUsage>,
}

impl Tally {
    fn quantity(&self) -> String {
        let mut parts: Vec<String> = self
            .by_unit
            .iter()
            .map(|(unit, n)| match *unit {
                "" => format_amount(*n),
                unit if *n > 1.0 && !ABBREVIATED.contains(&unit) => {
                    format!("{} {unit}s", format_amount(*n))
                }
                unit => format!("{} {unit}", format_amount(*n)),
            })
            .collect();
        if parts.is_empty() {
            parts.push("as needed".to_string());
        }
        parts.join(" + ")
    }
}

/// Every ingredient of every home option, merged by name. Amounts with the
/// same unit are added up; each item lists the meals that use it.
pub fn build_grocery_list(plan: &WeeklyMealPlan) -> GroceryList {
    let mut order: Vec<String> = Vec::new();
    let mut tallies: HashMap<String, Tally> = HashMap::new();

    for (day, day_plan) in &plan.weekly_meal_plan {
        for meal in MealType::ALL {
            let home = day_plan
                .meal(meal)
                .options
                .iter()
                .filter(|o| o.option_type == OptionType::Home);
            for option in home {
                for line in &option.ingredients {
                    let ingredient = parse_ingredient(line);
                    let k = key(&ingredient.name);
                    if k.is_empty() {
                        continue;
                    }
                    let tally = tallies.entry(k.clone()).or_insert_with(|| {
                        order.push(k.clone());
                        Tally {
                            name: k.clone(),
                            ..Default::default()
                        }
                    });
                    match ingredient.amount {
                        Some(n) => *tally.by_unit.entry(ingredient.unit.unwrap_or("")).or_default() += n,
                        None => tally.unmeasured += 1,
                    }
                    let usage = GroceryUsage {
                        day: *day,
                        meal,
                        dish_name: option.dish_name.clone(),
                    };
                    if !tally.usages.contains(&usage) {
                        tally.usages.push(usage);
                    }
                }
            }
        }
    }

    let mut list = GroceryList::default();
    for k in order {
        let Some(tally) = tallies.remove(&k) else {
            continue;
        };
        let Some(first_use_day) = tally.usages.iter().map(|u| u.day).min() else {
            continue;
        };
        let category = category(&tally.name);
        let item = GroceryItem {
            quantity: tally.quantity(),
            category,
            first_use_day,
            perishability: perishability(&tally.name),
            name: tally.name,
            used_in_meals: tally.usages,
        };
        list.bucket_mut(category).push(item);
        list.total_items += 1;
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{DayPlan, Meal, MealOption};

    fn home(name: &str, ingredients: &[&str]) -> MealOption {
        MealOption {
            dish_name: name.into(),
            option_type: OptionType::Home,
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    fn dinner(options: Vec<MealOption>) -> DayPlan {
        DayPlan {
            dinner: Meal {
                options,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn ingredient_lines_split_into_amount_unit_and_name() {
        assert_eq!(
            parse_ingredient("1 1/2 cups cooked brown rice"),
            Ingredient {
                amount: Some(1.5),
                unit: Some("cup"),
                name: "cooked brown rice".into(),
            }
        );
        assert_eq!(
            parse_ingredient("2 large eggs, beaten"),
            Ingredient {
                amount: Some(2.0),
                unit: None,
                name: "eggs beaten".into(),
            }
        );
        let salt = parse_ingredient("Salt (to taste)");
        assert_eq!((salt.amount, salt.name.as_str()), (None, "salt"));
        assert_eq!(parse_ingredient("½ tsp of cumin").amount, Some(0.5));
    }

    #[test]
    fn categories_prefer_the_longest_keyword() {
        assert_eq!(category("peanut butter"), GroceryCategory::Snacks);
        assert_eq!(category("unsalted butter"), GroceryCategory::Dairy);
        assert_eq!(category("boneless chicken breast"), GroceryCategory::Proteins);
        assert_eq!(category("bell pepper"), GroceryCategory::Vegetables);
        assert_eq!(category("black pepper"), GroceryCategory::PantryStaples);
        assert_eq!(category("za'atar"), GroceryCategory::PantryStaples);
        assert_eq!(perishability("fresh spinach"), Perishability::High);
        assert_eq!(perishability("rolled oats"), Perishability::Low);
    }

    #[test]
    fn week_is_aggregated_with_usage() {
        let mut plan = WeeklyMealPlan::default();
        plan.weekly_meal_plan.insert(
            Weekday::Wednesday,
            dinner(vec![
                MealOption {
                    dish_name: "Takeout Bowl".into(),
                    ingredients: vec!["1 lb chicken".into()],
                    ..Default::default()
                },
                home("Salmon Rice", &["6 oz salmon", "1 cup rice"]),
            ]),
        );
        plan.weekly_meal_plan.insert(
            Weekday::Monday,
            dinner(vec![home("Salmon Rice", &["6 oz salmon", "1/2 cup rice", "soy sauce"])]),
        );

        let list = build_grocery_list(&plan);
        assert_eq!(list.total_items, 3, "restaurant ingredients are ignored");

        let salmon = &list.proteins[0];
        assert_eq!(salmon.name, "salmon");
        assert_eq!(salmon.quantity, "12 oz");
        assert_eq!(salmon.first_use_day, Weekday::Monday);
        assert_eq!(salmon.used_in_meals.len(), 2);
        assert_eq!(salmon.perishability, Perishability::High);

        assert_eq!(list.grains[0].quantity, "1.5 cups");
        assert_eq!(list.pantry_staples[0].name, "soy sauce");
        assert_eq!(list.pantry_staples[0].quantity, "as needed");
    }
}

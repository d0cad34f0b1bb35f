//! Diet, allergy and dislike screening of the merged week.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{
    merge::summarize,
    types::{MealOption, MealType, WeeklyMealPlan, Weekday},
};
use crate::survey::dto::SurveyInput;

const MEAT: &[&str] = &[
    "chicken", "beef", "pork", "lamb", "turkey", "bacon", "ham", "steak", "sausage",
];
const SEAFOOD: &[&str] = &["fish", "salmon", "tuna", "shrimp", "cod", "tilapia"];
const ANIMAL_PRODUCTS: &[&str] = &[
    "egg", "milk", "cheese", "yogurt", "butter", "cream", "honey", "whey",
];

fn category_terms(category: &str) -> Vec<&'static str> {
    match category {
        "vegetarian" => [MEAT, SEAFOOD].concat(),
        "vegan" => [MEAT, SEAFOOD, ANIMAL_PRODUCTS].concat(),
        "pescatarian" => MEAT.to_vec(),
        "dairy" | "dairy-free" | "lactose" => vec![
            "milk", "cheese", "yogurt", "butter", "cream", "ricotta", "mozzarella", "cheddar",
            "parmesan", "feta", "whey",
        ],
        "gluten" | "gluten-free" => vec![
            "wheat", "bread", "pasta", "flour", "tortilla", "bagel", "croissant", "muffin",
            "cracker", "barley", "rye", "couscous", "seitan", "soy sauce",
        ],
        "nuts" | "tree nuts" | "peanuts" => vec![
            "almond", "walnut", "cashew", "pecan", "pistachio", "hazelnut", "macadamia", "peanut",
            "pine nut",
        ],
        "shellfish" => vec![
            "shrimp", "crab", "lobster", "scallop", "clam", "mussel", "oyster", "crawfish",
        ],
        "fish" => vec![
            "salmon", "tuna", "cod", "tilapia", "halibut", "trout", "sardine", "anchovy",
            "mackerel",
        ],
        "eggs" => vec!["egg", "omelet", "omelette", "frittata", "quiche", "mayonnaise"],
        "soy" => vec!["soy", "tofu", "tempeh", "edamame", "miso"],
        "beef" => vec!["beef", "steak", "brisket"],
        "pork" => vec!["pork", "bacon", "ham", "sausage", "prosciutto"],
        _ => vec![],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub day: Weekday,
    pub meal_type: MealType,
    pub dish_name: String,
    pub term: String,
    pub restriction: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Forbidden {
    pub term: String,
    pub restriction: String,
    pub severity: Severity,
}

/// Diet preferences and allergies are hard limits; strict exclusions are
/// dislikes and only warn. Hard limits come first.
pub fn forbidden_terms(survey: &SurveyInput) -> Vec<Forbidden> {
    let mut out = Vec::new();
    let mut push = |term: &str, restriction: String, severity| {
        let term = term.trim().to_lowercase();
        if !term.is_empty() {
            out.push(Forbidden {
                term,
                restriction,
                severity,
            });
        }
    };

    for pref in &survey.diet_prefs {
        for term in category_terms(&pref.trim().to_lowercase()) {
            push(term, pref.clone(), Severity::Error);
        }
    }
    for allergy in &survey.food_allergies {
        let restriction = format!("allergy: {allergy}");
        push(allergy.as_str(), restriction.clone(), Severity::Error);
        for term in category_terms(&allergy.trim().to_lowercase()) {
            push(term, restriction.clone(), Severity::Error);
        }
    }
    for (category, items) in &survey.strict_exclusions {
        push(category.as_str(), format!("{category} dislike"), Severity::Warning);
        for term in category_terms(category) {
            push(term, format!("{category} dislike"), Severity::Warning);
        }
        for item in items {
            push(item.as_str(), format!("dislike: {item}"), Severity::Warning);
        }
    }
    out.sort_by_key(|f| f.severity);
    out
}

/// Lowercase words separated by single spaces, padded so a term can be
/// matched on word boundaries.
pub(crate) fn words(text: &str) -> String {
    let joined = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");
    format!(" {joined} ")
}

pub(crate) fn mentions(text: &str, term: &str) -> bool {
    let term = words(term);
    let term = term.trim();
    !term.is_empty()
        && [format!(" {term} "), format!(" {term}s "), format!(" {term}es ")]
            .iter()
            .any(|needle| text.contains(needle.as_str()))
}

fn option_text(option: &MealOption) -> String {
    let mut text = option.dish_name.clone();
    if let Some(description) = &option.description {
        text.push(' ');
        text.push_str(description);
    }
    for ingredient in &option.ingredients {
        text.push(' ');
        text.push_str(ingredient);
    }
    words(&text)
}

/// One violation per matched term, at the strictest severity that names it.
pub fn check_option(
    option: &MealOption,
    day: Weekday,
    meal_type: MealType,
    forbidden: &[Forbidden],
) -> Vec<Violation> {
    let text = option_text(option);
    let mut found: Vec<Violation> = Vec::new();
    for f in forbidden {
        if found.iter().any(|v| v.term == f.term) || !mentions(&text, &f.term) {
            continue;
        }
        found.push(Violation {
            day,
            meal_type,
            dish_name: option.dish_name.clone(),
            term: f.term.clone(),
            restriction: f.restriction.clone(),
            severity: f.severity,
        });
    }
    found
}

/// Drops every option that breaks a hard limit, renumbers what is left and
/// records all violations on the plan.
pub fn enforce(plan: &mut WeeklyMealPlan, survey: &SurveyInput) -> usize {
    let forbidden = forbidden_terms(survey);
    if forbidden.is_empty() {
        return 0;
    }

    let mut violations = Vec::new();
    let mut removed = 0;
    for (day, day_plan) in plan.weekly_meal_plan.iter_mut() {
        for meal_type in MealType::ALL {
            let meal = day_plan.meal_mut(meal_type);
            let before = meal.options.len();
            meal.options.retain(|option| {
                let found = check_option(option, *day, meal_type, &forbidden);
                let keep = !found.iter().any(|v| v.severity == Severity::Error);
                violations.extend(found);
                keep
            });
            removed += before - meal.options.len();
            for (i, option) in meal.options.iter_mut().enumerate() {
                option.option_number = Some(i as u32 + 1);
            }
        }
    }

    for v in violations.iter().filter(|v| v.severity == Severity::Error) {
        warn!(
            day = v.day.as_str(),
            meal = v.meal_type.as_str(),
            dish = %v.dish_name,
            term = %v.term,
            restriction = %v.restriction,
            "option dropped"
        );
    }
    if removed > 0 {
        plan.week_summary = summarize(&plan.weekly_meal_plan);
    }
    info!(
        stage = "restrictions",
        violations = violations.len(),
        removed,
        "restrictions checked"
    );
    plan.restriction_violations = violations;
    removed
}

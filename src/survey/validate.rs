use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::dto::{Biomarkers, SurveyInput, WeeklySchedule};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref FEET_INCHES_RE: Regex =
        Regex::new(r#"^\s*(\d+)\s*'\s*(\d+(?:\.\d+)?)?\s*(?:"|'')?\s*$"#).unwrap();
}

const GOALS: &str = "WEIGHT_LOSS, MUSCLE_GAIN, ENDURANCE, GENERAL_WELLNESS";
const ACTIVITY_LEVELS: &str =
    "SEDENTARY, LIGHTLY_ACTIVE, MODERATELY_ACTIVE, VERY_ACTIVE, EXTREMELY_ACTIVE";
const DISTANCES: &str = "close, medium, far";

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Inches from a number, a numeric string, or a `5'10"` string.
pub fn parse_height(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            if let Some(caps) = FEET_INCHES_RE.captures(s) {
                let feet: f64 = caps.get(1)?.as_str().parse().ok()?;
                let inches: f64 = caps
                    .get(2)
                    .map(|m| m.as_str().parse().unwrap_or(0.0))
                    .unwrap_or(0.0);
                Some(feet * 12.0 + inches)
            } else {
                s.trim().parse().ok()
            }
        }
        _ => None,
    }
}

/// Collects every field problem instead of stopping at the first.
struct Checker<'a> {
    body: &'a Map<String, Value>,
    prefix: &'static str,
    errors: Vec<String>,
}

impl<'a> Checker<'a> {
    fn new(body: &'a Map<String, Value>, prefix: &'static str) -> Self {
        Self {
            body,
            prefix,
            errors: Vec::new(),
        }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.body.get(key).filter(|v| !v.is_null())
    }

    fn fail(&mut self, key: &str, message: impl std::fmt::Display) {
        self.errors.push(format!("{}{key}: {message}", self.prefix));
    }

    fn text(&mut self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            _ => {
                self.fail(key, "must be a string");
                None
            }
        }
    }

    fn in_range(&mut self, key: &str, value: Option<f64>, min: f64, max: f64) -> Option<f64> {
        match value {
            Some(n) if (min..=max).contains(&n) => Some(n),
            Some(_) => {
                self.fail(key, format!("must be between {min} and {max}"));
                None
            }
            None => {
                self.fail(key, "must be a number");
                None
            }
        }
    }

    fn number(&mut self, key: &str, min: f64, max: f64) -> Option<f64> {
        let value = self.get(key)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        self.in_range(key, parsed, min, max)
    }

    fn whole(&mut self, key: &str, min: u32, max: u32) -> Option<u32> {
        let n = self.number(key, f64::from(min), f64::from(max))?;
        if n.fract() != 0.0 {
            self.fail(key, "must be a whole number");
            return None;
        }
        Some(n as u32)
    }

    fn choice<T: DeserializeOwned>(&mut self, key: &str, allowed: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(_) => {
                self.fail(key, format!("must be one of {allowed}"));
                None
            }
        }
    }

    fn list(&mut self, key: &str) -> Vec<String> {
        match self.get(key) {
            None => Vec::new(),
            Some(Value::Array(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item.as_str().map(str::trim) {
                        Some("") => {}
                        Some(s) => out.push(s.to_string()),
                        None => {
                            self.fail(key, "must be a list of strings");
                            return Vec::new();
                        }
                    }
                }
                out
            }
            Some(_) => {
                self.fail(key, "must be a list of strings");
                Vec::new()
            }
        }
    }
}

fn parse_exclusions(value: &Value, errors: &mut Vec<String>) -> BTreeMap<String, Vec<String>> {
    let Some(body) = value.as_object() else {
        errors.push("strictExclusions: must be an object of string lists".into());
        return BTreeMap::new();
    };
    let mut c = Checker::new(body, "strictExclusions.");
    let exclusions = body
        .keys()
        .map(|category| (category.trim().to_lowercase(), c.list(category)))
        .filter(|(category, _)| !category.is_empty())
        .collect();
    errors.append(&mut c.errors);
    exclusions
}

fn parse_biomarkers(value: &Value, errors: &mut Vec<String>) -> Option<Biomarkers> {
    let Some(body) = value.as_object() else {
        errors.push("biomarkers: must be an object".into());
        return None;
    };
    let mut c = Checker::new(body, "biomarkers.");
    let markers = Biomarkers {
        cholesterol: c.number("cholesterol", 0.0, 500.0),
        vitamin_d: c.number("vitaminD", 0.0, 200.0),
        iron: c.number("iron", 0.0, 300.0),
    };
    errors.append(&mut c.errors);
    Some(markers)
}

/// Validates a raw survey body. On failure every offending field is listed.
pub fn parse_survey(body: &Value) -> Result<SurveyInput, Vec<String>> {
    let Some(map) = body.as_object() else {
        return Err(vec!["body: must be a JSON object".into()]);
    };
    let mut c = Checker::new(map, "");

    let email = c.text("email").unwrap_or_default();
    if !is_valid_email(&email) {
        c.fail("email", "a valid email is required");
    }

    let height = match c.get("height") {
        None => None,
        Some(raw) => {
            let parsed = parse_height(raw);
            c.in_range("height", parsed, 48.0, 96.0)
        }
    };

    let goal = c.choice("goal", GOALS);
    if c.get("goal").is_none() {
        c.fail("goal", format!("is required ({GOALS})"));
    }

    let budget_tier = c.text("budgetTier");
    if budget_tier.is_none() {
        c.fail("budgetTier", "is required");
    }

    let weekly_meal_schedule = match c.get("weeklyMealSchedule") {
        None => None,
        Some(raw) => match serde_json::from_value::<WeeklySchedule>(raw.clone()) {
            Ok(schedule) => Some(schedule),
            Err(_) => {
                c.fail(
                    "weeklyMealSchedule",
                    "must map days to meals of home, restaurant or skip",
                );
                None
            }
        },
    };

    let mut survey = SurveyInput {
        email,
        first_name: c.text("firstName"),
        last_name: c.text("lastName"),
        age: c.whole("age", 13, 100),
        sex: c.text("sex"),
        height,
        weight: c.number("weight", 80.0, 400.0),
        zip_code: c.text("zipCode"),
        street_address: c.text("streetAddress"),
        city: c.text("city"),
        state: c.text("state"),
        goal: goal.unwrap_or(super::dto::Goal::GeneralWellness),
        activity_level: c.choice("activityLevel", ACTIVITY_LEVELS),
        budget_tier: budget_tier.unwrap_or_default(),
        diet_prefs: c.list("dietPrefs"),
        preferred_cuisines: c.list("preferredCuisines"),
        food_allergies: c.list("foodAllergies"),
        strict_exclusions: BTreeMap::new(),
        meals_out_per_week: c.whole("mealsOutPerWeek", 0, 14),
        distance_preference: c.choice("distancePreference", DISTANCES),
        weekly_meal_schedule,
        biomarkers: None,
        source: c.text("source"),
    };

    let mut errors = c.errors;
    if let Some(raw) = map.get("biomarkers").filter(|v| !v.is_null()) {
        survey.biomarkers = parse_biomarkers(raw, &mut errors);
    }
    if let Some(raw) = map.get("strictExclusions").filter(|v| !v.is_null()) {
        survey.strict_exclusions = parse_exclusions(raw, &mut errors);
    }

    if errors.is_empty() {
        Ok(survey)
    } else {
        Err(errors)
    }
}

/// Shallow-merges `patch` onto the stored survey and re-validates the result.
/// A `null` in the patch clears the field.
pub fn merge_patch(stored: &SurveyInput, patch: &Value) -> Result<SurveyInput, Vec<String>> {
    let Some(changes) = patch.as_object() else {
        return Err(vec!["body: must be a JSON object".into()]);
    };
    let mut merged = match serde_json::to_value(stored) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in changes {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    parse_survey(&Value::Object(merged))
}

//! Structural checks on a drafted workout week. Findings are attached to the
//! plan; only a missing day count rejects it (see `services::draft_plan`).

use tracing::{info, warn};

use super::dto::{Exercise, WorkoutDay, WorkoutPlan};
use crate::pipeline::plan_check::PlanCheck;

const MIN_EXERCISES: usize = 3;
const MAX_EXERCISES: usize = 12;
const MIN_MINUTES: u32 = 10;
const MAX_MINUTES: u32 = 120;
const MAX_SETS: u32 = 10;
const MAX_REPS: u32 = 50;

/// Leading number of a reps value, unless the value is a duration such as
/// "30 seconds".
fn rep_count(reps: &str) -> Option<u32> {
    let lower = reps.to_lowercase();
    if ["sec", "min", "hold"].iter().any(|unit| lower.contains(unit)) {
        return None;
    }
    let digits: String = lower.trim().chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn check_exercise(label: &str, exercise: &Exercise, check: &mut PlanCheck) {
    let name = exercise.name.trim();
    if name.is_empty() {
        check.errors.push(format!("{label}: exercise without a name"));
        return;
    }
    match exercise.sets {
        None => check.errors.push(format!("{label} {name}: sets missing")),
        Some(sets) if !(1..=MAX_SETS).contains(&sets) => {
            check.warnings.push(format!("{label} {name}: {sets} sets"))
        }
        Some(_) => {}
    }
    match exercise.reps.as_deref() {
        None => check.errors.push(format!("{label} {name}: reps or duration missing")),
        Some(reps) => {
            if let Some(n) = rep_count(reps).filter(|n| !(1..=MAX_REPS).contains(n)) {
                check.warnings.push(format!("{label} {name}: {n} reps"));
            }
        }
    }
}

fn check_day(index: usize, day: &WorkoutDay, check: &mut PlanCheck) {
    let label = if day.day.trim().is_empty() {
        check.errors.push(format!("day {}: name missing", index + 1));
        format!("day {}", index + 1)
    } else {
        day.day.clone()
    };
    if day.is_rest_day {
        return;
    }
    if day.focus.as_deref().map_or(true, |f| f.trim().is_empty()) {
        check.errors.push(format!("{label}: focus missing"));
    }

    let count = day.exercises.len();
    if !(MIN_EXERCISES..=MAX_EXERCISES).contains(&count) {
        check
            .warnings
            .push(format!("{label}: {count} exercises"));
    }
    if let Some(minutes) = day
        .duration_minutes
        .filter(|m| !(MIN_MINUTES..=MAX_MINUTES).contains(m))
    {
        check
            .warnings
            .push(format!("{label}: {minutes} minute session"));
    }
    for exercise in &day.exercises {
        check_exercise(&label, exercise, check);
    }
}

pub fn check_workout(plan: &WorkoutPlan) -> PlanCheck {
    let mut check = PlanCheck::default();
    for (index, day) in plan.weekly_plan.iter().enumerate() {
        check_day(index, day, &mut check);
    }
    check.valid = check.errors.is_empty();
    for line in &check.errors {
        warn!(stage = "workout-validation", "{line}");
    }
    info!(
        stage = "workout-validation",
        valid = check.valid,
        warnings = check.warnings.len(),
        errors = check.errors.len(),
        "workout check finished"
    );
    check
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(name: &str, sets: Option<u32>, reps: Option<&str>) -> Exercise {
        Exercise {
            name: name.into(),
            sets,
            reps: reps.map(String::from),
            ..Default::default()
        }
    }

    fn training_day(name: &str, exercises: Vec<Exercise>) -> WorkoutDay {
        WorkoutDay {
            day: name.into(),
            focus: Some("lower body".into()),
            duration_minutes: Some(40),
            exercises,
            ..Default::default()
        }
    }

    fn solid_day(name: &str) -> WorkoutDay {
        training_day(
            name,
            vec![
                exercise("Goblet Squat", Some(3), Some("12")),
                exercise("Romanian Deadlift", Some(3), Some("8-10")),
                exercise("Plank", Some(3), Some("45 seconds")),
            ],
        )
    }

    #[test]
    fn reps_read_counts_but_not_durations() {
        assert_eq!(rep_count("12"), Some(12));
        assert_eq!(rep_count("8-12"), Some(8));
        assert_eq!(rep_count("30 seconds"), None);
        assert_eq!(rep_count("1 min"), None);
        assert_eq!(rep_count("AMRAP"), None);
    }

    #[test]
    fn well_formed_week_is_valid() {
        let plan = WorkoutPlan {
            weekly_plan: vec![
                solid_day("Monday"),
                WorkoutDay {
                    day: "Tuesday".into(),
                    is_rest_day: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let check = check_workout(&plan);
        assert!(check.valid, "{check:?}");
        assert!(check.warnings.is_empty(), "{check:?}");
    }

    #[test]
    fn missing_fields_are_errors_and_odd_volumes_warn() {
        let mut short = training_day(
            "Wednesday",
            vec![
                exercise("", Some(3), Some("10")),
                exercise("Lunge", None, None),
            ],
        );
        short.focus = None;
        short.duration_minutes = Some(150);
        let mut heavy = solid_day("");
        heavy.exercises[0].sets = Some(12);
        heavy.exercises[1].reps = Some("60".into());

        let check = check_workout(&WorkoutPlan {
            weekly_plan: vec![short, heavy],
            ..Default::default()
        });
        assert!(!check.valid);
        for expected in [
            "Wednesday: focus missing",
            "Wednesday: exercise without a name",
            "Wednesday Lunge: sets missing",
            "Wednesday Lunge: reps or duration missing",
            "day 2: name missing",
        ] {
            assert!(check.errors.iter().any(|e| e == expected), "{expected} in {check:?}");
        }
        for expected in [
            "Wednesday: 2 exercises",
            "Wednesday: 150 minute session",
            "day 2 Goblet Squat: 12 sets",
            "day 2 Romanian Deadlift: 60 reps",
        ] {
            assert!(check.warnings.iter().any(|w| w == expected), "{expected} in {check:?}");
        }
    }
}

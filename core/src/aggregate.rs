//! Pure derivations over food records: percentages, meal grouping, progress
//! bands, day/week helpers. Nothing here reads the clock; callers pass
//! "today" in explicitly.

use chrono::{Datelike, Duration, NaiveDate};

use crate::models::{
    DayTotals, Food, MacroDistribution, MacroProgress, MacroTotals, MealGroups, MealSlot,
    ProgressBand,
};

/// `round(current / target * 100)`, clamped to `[0, 100]`. A non-positive
/// target yields 0.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn calculate_percentage(current: f64, target: f64) -> u32 {
    if target <= 0.0 || current.is_nan() {
        return 0;
    }
    let pct = (current / target * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

#[must_use]
pub fn calculate_remaining(current: f64, target: f64) -> f64 {
    (target - current).max(0.0)
}

/// Each macro's percentage of the combined grams, rounded independently.
/// The three results are not adjusted to sum to exactly 100.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn calculate_macro_distribution(carbs: f64, protein: f64, fat: f64) -> MacroDistribution {
    let total = carbs + protein + fat;
    if total <= 0.0 {
        return MacroDistribution::default();
    }
    let pct = |v: f64| (v / total * 100.0).round().clamp(0.0, 100.0) as u32;
    MacroDistribution {
        carbs_percentage: pct(carbs),
        protein_percentage: pct(protein),
        fat_percentage: pct(fat),
    }
}

/// Buckets records by the local hour of their own timestamp. Input order is
/// preserved inside each bucket.
#[must_use]
pub fn group_foods_by_meal(foods: &[Food]) -> MealGroups {
    let mut groups = MealGroups::default();
    for food in foods {
        groups.bucket_mut(MealSlot::of(&food.timestamp)).push(food.clone());
    }
    groups
}

#[must_use]
pub fn progress_band(percentage: u32) -> ProgressBand {
    match percentage {
        0..=25 => ProgressBand::Blue,
        26..=60 => ProgressBand::Green,
        61..=85 => ProgressBand::Yellow,
        _ => ProgressBand::Red,
    }
}

#[must_use]
pub fn macro_progress(current: f64, target: f64) -> MacroProgress {
    let percentage = calculate_percentage(current, target);
    MacroProgress {
        current,
        target,
        percentage,
        remaining: calculate_remaining(current, target),
        band: progress_band(percentage),
    }
}

pub fn foods_on(foods: &[Food], date: NaiveDate) -> impl Iterator<Item = &Food> {
    foods.iter().filter(move |f| f.timestamp.date_naive() == date)
}

#[must_use]
pub fn totals_on(foods: &[Food], date: NaiveDate) -> MacroTotals {
    MacroTotals::from_foods(foods_on(foods, date))
}

/// The seven dates of the Sunday-started week containing `selected`.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn week_dates(selected: NaiveDate) -> [NaiveDate; 7] {
    let offset = i64::from(selected.weekday().num_days_from_sunday());
    let start = selected - Duration::days(offset);
    std::array::from_fn(|i| start + Duration::days(i as i64))
}

#[must_use]
pub fn week_totals(foods: &[Food], selected: NaiveDate, today: NaiveDate) -> Vec<DayTotals> {
    week_dates(selected)
        .into_iter()
        .map(|date| DayTotals {
            date: date.format("%Y-%m-%d").to_string(),
            label: relative_day_label(date, today),
            entries: foods_on(foods, date).count(),
            totals: totals_on(foods, date),
        })
        .collect()
}

#[must_use]
pub fn relative_day_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        -1 => "Yesterday".to_string(),
        1 => "Tomorrow".to_string(),
        _ => date.format("%a").to_string(),
    }
}

#[must_use]
pub fn greeting(hour: u32) -> &'static str {
    if hour < 12 {
        "Good Morning"
    } else if hour < 18 {
        "Good Afternoon"
    } else {
        "Good Evening"
    }
}

/// "N cal left" under the goal, "N cal over" above it.
#[must_use]
pub fn calories_left_message(calories_left: f64) -> String {
    let rounded = calories_left.round();
    if rounded >= 0.0 {
        format!("{} cal left", format_number(rounded))
    } else {
        format!("{} cal over", format_number(-rounded))
    }
}

/// Thousands-separated integer rendering, e.g. `1234.4` -> `"1,234"`.
#[must_use]
pub fn format_number(value: f64) -> String {
    let rounded = value.round();
    let negative = rounded < 0.0;
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if negative { format!("-{out}") } else { out }
}

#[must_use]
pub fn format_decimal(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

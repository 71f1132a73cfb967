use chrono::{DateTime, Local, Timelike};

use crate::models::{Food, MealSlot, NewFood};

/// One row of the built-in reference table.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceFood {
    pub name: &'static str,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub serving_size: &'static str,
}

impl ReferenceFood {
    #[must_use]
    pub fn to_new_food(&self) -> NewFood {
        NewFood {
            name: self.name.to_string(),
            calories: self.calories,
            carbs: self.carbs,
            protein: self.protein,
            fat: self.fat,
            serving_size: self.serving_size.to_string(),
        }
    }

    fn stamp(&self, prefix: &str, at: DateTime<Local>) -> Food {
        self.to_new_food().into_food(prefix, at)
    }
}

const fn row(
    name: &'static str,
    calories: f64,
    carbs: f64,
    protein: f64,
    fat: f64,
    serving_size: &'static str,
) -> ReferenceFood {
    ReferenceFood {
        name,
        calories,
        carbs,
        protein,
        fat,
        serving_size,
    }
}

pub const REFERENCE_FOODS: &[ReferenceFood] = &[
    row("Apple", 95.0, 25.0, 0.5, 0.3, "1 medium (182g)"),
    row("Banana", 105.0, 27.0, 1.3, 0.4, "1 medium (118g)"),
    row("Grilled Chicken Breast", 165.0, 0.0, 31.0, 3.6, "100g"),
    row("Salmon Fillet", 206.0, 0.0, 22.0, 13.0, "100g"),
    row("Brown Rice", 216.0, 45.0, 5.0, 1.8, "1 cup cooked (195g)"),
    row("Avocado", 240.0, 12.0, 3.0, 22.0, "1 medium (150g)"),
    row("Greek Yogurt", 100.0, 3.6, 17.0, 0.4, "170g container"),
    row("Egg", 68.0, 0.6, 5.5, 4.8, "1 large (50g)"),
    row("Salad Bowl", 180.0, 10.0, 8.0, 12.0, "1 bowl (250g)"),
    row("Protein Shake", 150.0, 5.0, 25.0, 3.0, "1 scoop in water (300ml)"),
    row("Oatmeal", 158.0, 27.0, 6.0, 3.2, "1 cup cooked (234g)"),
    row("Steak", 271.0, 0.0, 26.0, 18.0, "100g"),
];

const SEARCH_ID_PREFIX: &str = "food";
const SUGGESTION_ID_PREFIX: &str = "suggestion";

/// Case-insensitive substring match over the reference table. Every hit is a
/// freshly stamped record.
#[must_use]
pub fn search_foods(query: &str) -> Vec<Food> {
    search_foods_at(query, Local::now())
}

#[must_use]
pub fn search_foods_at(query: &str, at: DateTime<Local>) -> Vec<Food> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    let needle = query.to_lowercase();
    REFERENCE_FOODS
        .iter()
        .filter(|f| f.name.to_lowercase().contains(&needle))
        .map(|f| f.stamp(SEARCH_ID_PREFIX, at))
        .collect()
}

#[must_use]
pub fn suggestion_names(slot: MealSlot) -> &'static [&'static str] {
    match slot {
        MealSlot::Breakfast => &["Oatmeal", "Greek Yogurt", "Egg", "Banana"],
        MealSlot::Lunch => &[
            "Grilled Chicken Breast",
            "Salad Bowl",
            "Brown Rice",
            "Salmon Fillet",
        ],
        MealSlot::Dinner => &["Salmon Fillet", "Steak", "Brown Rice", "Avocado"],
        MealSlot::Snacks => &["Apple", "Banana", "Greek Yogurt", "Protein Shake"],
    }
}

/// Suggestions for the current local hour.
#[must_use]
pub fn suggest_foods() -> Vec<Food> {
    suggest_foods_at(Local::now())
}

/// Suggestions for the meal slot of `at`, in reference-table order.
#[must_use]
pub fn suggest_foods_at(at: DateTime<Local>) -> Vec<Food> {
    let names = suggestion_names(MealSlot::from_hour(at.hour()));
    REFERENCE_FOODS
        .iter()
        .filter(|f| names.contains(&f.name))
        .map(|f| f.stamp(SUGGESTION_ID_PREFIX, at))
        .collect()
}

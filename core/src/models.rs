use anyhow::{Result, bail};
use chrono::{DateTime, Local, Timelike};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// A logged food entry. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Food {
    pub id: String,
    pub name: String,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub serving_size: String,
    pub timestamp: DateTime<Local>,
    /// Session image handle. Only valid for the lifetime of the process, so it
    /// never reaches the persisted `foods` slot.
    #[serde(skip_serializing, default)]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub unidentified: Option<bool>,
}

/// Nutrition values without identity, as produced by recognition or the
/// reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFood {
    pub name: String,
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
    pub serving_size: String,
}

impl NewFood {
    /// Stamp the values with a fresh id and the given creation time.
    #[must_use]
    pub fn into_food(self, id_prefix: &str, timestamp: DateTime<Local>) -> Food {
        Food {
            id: generate_food_id(id_prefix, timestamp),
            name: self.name,
            calories: self.calories,
            carbs: self.carbs,
            protein: self.protein,
            fat: self.fat,
            serving_size: self.serving_size,
            timestamp,
            image_url: None,
            unidentified: None,
        }
    }
}

/// `<prefix>_<unix millis>_<0..1000>`. Best-effort unique only.
#[must_use]
pub fn generate_food_id(prefix: &str, at: DateTime<Local>) -> String {
    let millis = at.timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1000);
    format!("{prefix}_{millis}_{suffix}")
}

pub fn validate_food(food: &NewFood) -> Result<()> {
    if food.name.trim().is_empty() {
        bail!("Food name must not be empty");
    }
    for (label, value) in [
        ("calories", food.calories),
        ("carbs", food.carbs),
        ("protein", food.protein),
        ("fat", food.fat),
    ] {
        if !value.is_finite() || value < 0.0 {
            bail!("{label} must be a non-negative number (got {value})");
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyGoals {
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

impl Default for DailyGoals {
    fn default() -> Self {
        Self {
            calories: 2000.0,
            carbs: 250.0,
            protein: 150.0,
            fat: 65.0,
        }
    }
}

impl DailyGoals {
    /// Merge-patch: fields left as `None` keep their current value.
    pub fn apply(&mut self, patch: &GoalsPatch) {
        if let Some(v) = patch.calories {
            self.calories = v;
        }
        if let Some(v) = patch.carbs {
            self.carbs = v;
        }
        if let Some(v) = patch.protein {
            self.protein = v;
        }
        if let Some(v) = patch.fat {
            self.fat = v;
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalsPatch {
    pub calories: Option<f64>,
    pub carbs: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
}

impl GoalsPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calories.is_none() && self.carbs.is_none() && self.protein.is_none() && self.fat.is_none()
    }
}

pub fn validate_goals_patch(patch: &GoalsPatch) -> Result<()> {
    if patch.is_empty() {
        bail!("Provide at least one of --calories, --carbs, --protein, --fat");
    }
    for (label, value) in [
        ("calories", patch.calories),
        ("carbs", patch.carbs),
        ("protein", patch.protein),
        ("fat", patch.fat),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                bail!("{label} goal must be a non-negative number (got {v})");
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

impl MacroTotals {
    #[must_use]
    pub fn from_foods<'a>(foods: impl IntoIterator<Item = &'a Food>) -> Self {
        foods.into_iter().fold(Self::default(), |acc, f| Self {
            calories: acc.calories + f.calories,
            carbs: acc.carbs + f.carbs,
            protein: acc.protein + f.protein,
            fat: acc.fat + f.fat,
        })
    }
}

pub const MEAL_SLOTS: &[MealSlot] = &[
    MealSlot::Breakfast,
    MealSlot::Lunch,
    MealSlot::Dinner,
    MealSlot::Snacks,
];

/// Time-of-day bins. Breakfast [5,11), lunch [11,15), dinner [17,22),
/// snacks everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
}

impl MealSlot {
    #[must_use]
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=10 => Self::Breakfast,
            11..=14 => Self::Lunch,
            17..=21 => Self::Dinner,
            _ => Self::Snacks,
        }
    }

    #[must_use]
    pub fn of(timestamp: &DateTime<Local>) -> Self {
        Self::from_hour(timestamp.hour())
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snacks => "snacks",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MealGroups {
    pub breakfast: Vec<Food>,
    pub lunch: Vec<Food>,
    pub dinner: Vec<Food>,
    pub snacks: Vec<Food>,
}

impl MealGroups {
    #[must_use]
    pub fn get(&self, slot: MealSlot) -> &[Food] {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
            MealSlot::Snacks => &self.snacks,
        }
    }

    pub(crate) fn bucket_mut(&mut self, slot: MealSlot) -> &mut Vec<Food> {
        match slot {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Dinner => &mut self.dinner,
            MealSlot::Snacks => &mut self.snacks,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.breakfast.len() + self.lunch.len() + self.dinner.len() + self.snacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct MacroDistribution {
    pub carbs_percentage: u32,
    pub protein_percentage: u32,
    pub fat_percentage: u32,
}

/// Progress-bar color band, ordered from least to most consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBand {
    Blue,
    Green,
    Yellow,
    Red,
}

impl ProgressBand {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacroProgress {
    pub current: f64,
    pub target: f64,
    pub percentage: u32,
    pub remaining: f64,
    pub band: ProgressBand,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub meals: MealGroups,
    pub totals: MacroTotals,
    pub goals: DailyGoals,
    pub calories: MacroProgress,
    pub carbs: MacroProgress,
    pub protein: MacroProgress,
    pub fat: MacroProgress,
    /// Negative when over the calorie goal.
    pub calories_left: f64,
}

/// A single record together with its macro split, for the detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodDetail {
    pub food: Food,
    pub meal: MealSlot,
    pub distribution: MacroDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTotals {
    pub date: String,
    pub label: String,
    pub entries: usize,
    pub totals: MacroTotals,
}

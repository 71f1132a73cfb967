use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::aggregate;
use crate::db::Database;
use crate::models::{
    DailyGoals, DailySummary, DayTotals, Food, FoodDetail, GoalsPatch, MealSlot, NewFood,
    validate_food, validate_goals_patch,
};
use crate::recognition::{Recognizer, VisionTransport};
use crate::reference;
use crate::store::NutritionStore;

const MANUAL_ID_PREFIX: &str = "food";

pub struct NutritionService {
    store: NutritionStore<Database>,
}

impl NutritionService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        let store = NutritionStore::open(db)
            .with_context(|| format!("Failed to load data from {}", db_path.display()))?;
        Ok(Self { store })
    }

    pub fn new_in_memory() -> Result<Self> {
        let store = NutritionStore::open(Database::open_in_memory()?)?;
        Ok(Self { store })
    }

    pub fn store(&self) -> &NutritionStore<Database> {
        &self.store
    }

    // --- Logging ---

    /// Recognize the photo and append the resulting record. Nothing is
    /// logged when recognition fails.
    pub async fn scan_and_log<T: VisionTransport>(
        &mut self,
        recognizer: &Recognizer<T>,
        image: &[u8],
    ) -> Result<Food> {
        let food = recognizer.recognize(image).await?;
        self.store.add_food(food.clone())?;
        Ok(food)
    }

    /// Validate and stamp manual or reference values with the current time.
    pub fn log_food(&mut self, food: NewFood) -> Result<Food> {
        validate_food(&food)?;
        let food = food.into_food(MANUAL_ID_PREFIX, Local::now());
        self.store.add_food(food.clone())?;
        info!(id = %food.id, name = %food.name, "Logged food");
        Ok(food)
    }

    /// Append an already stamped record, e.g. a search hit or suggestion.
    pub fn log_record(&mut self, food: Food) -> Result<Food> {
        self.store.add_food(food.clone())?;
        info!(id = %food.id, name = %food.name, "Logged food");
        Ok(food)
    }

    pub fn search(&self, query: &str) -> Vec<Food> {
        reference::search_foods(query)
    }

    pub fn suggestions(&self) -> Vec<Food> {
        reference::suggest_foods()
    }

    // --- Records ---

    pub fn get_food(&self, id: &str) -> Result<&Food> {
        self.store.get_food(id)
    }

    pub fn food_detail(&self, id: &str) -> Result<FoodDetail> {
        let food = self.store.get_food(id)?.clone();
        let distribution = aggregate::calculate_macro_distribution(food.carbs, food.protein, food.fat);
        Ok(FoodDetail {
            meal: MealSlot::of(&food.timestamp),
            food,
            distribution,
        })
    }

    pub fn delete_food(&mut self, id: &str) -> Result<bool> {
        self.store.remove_food(id)
    }

    pub fn clear_foods(&mut self) -> Result<()> {
        self.store.clear_foods()
    }

    // --- Summaries ---

    pub fn today_summary(&self) -> DailySummary {
        self.daily_summary(Local::now().date_naive())
    }

    pub fn daily_summary(&self, date: NaiveDate) -> DailySummary {
        let foods: Vec<Food> = self.store.foods_on(date).into_iter().cloned().collect();
        let meals = aggregate::group_foods_by_meal(&foods);
        let totals = self.store.totals_on(date);
        let goals = *self.store.goals();
        DailySummary {
            date: date.format("%Y-%m-%d").to_string(),
            meals,
            calories: aggregate::macro_progress(totals.calories, goals.calories),
            carbs: aggregate::macro_progress(totals.carbs, goals.carbs),
            protein: aggregate::macro_progress(totals.protein, goals.protein),
            fat: aggregate::macro_progress(totals.fat, goals.fat),
            calories_left: goals.calories - totals.calories,
            totals,
            goals,
        }
    }

    pub fn week_history(&self, selected: NaiveDate) -> Vec<DayTotals> {
        aggregate::week_totals(self.store.foods(), selected, Local::now().date_naive())
    }

    // --- Goals ---

    pub fn goals(&self) -> DailyGoals {
        *self.store.goals()
    }

    pub fn update_goals(&mut self, patch: &GoalsPatch) -> Result<DailyGoals> {
        validate_goals_patch(patch)?;
        self.store.update_goals(patch)
    }
}

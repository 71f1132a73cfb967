use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::aggregate;
use crate::db::KeyValueStore;
use crate::models::{DailyGoals, Food, GoalsPatch, MacroTotals};

pub const FOODS_KEY: &str = "foods";
pub const GOALS_KEY: &str = "dailyGoals";

/// Owns the logged foods and daily goals. Every mutation re-serializes the
/// affected slot before returning.
pub struct NutritionStore<S> {
    backend: S,
    foods: Vec<Food>,
    goals: DailyGoals,
}

impl<S: KeyValueStore> NutritionStore<S> {
    /// Load both slots. Absent slots start empty / at the default goals; a
    /// slot that is present but does not parse is an error.
    pub fn open(backend: S) -> Result<Self> {
        let foods = match backend.get(FOODS_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Stored '{FOODS_KEY}' is not a valid food list"))?,
            None => Vec::new(),
        };
        let goals = match backend.get(GOALS_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Stored '{GOALS_KEY}' is not valid daily goals"))?,
            None => DailyGoals::default(),
        };
        Ok(Self {
            backend,
            foods,
            goals,
        })
    }

    /// All entries in insertion order.
    pub fn foods(&self) -> &[Food] {
        &self.foods
    }

    pub fn goals(&self) -> &DailyGoals {
        &self.goals
    }

    pub fn get_food(&self, id: &str) -> Result<&Food> {
        match self.foods.iter().find(|f| f.id == id) {
            Some(food) => Ok(food),
            None => bail!("Food not found: {id}"),
        }
    }

    pub fn add_food(&mut self, food: Food) -> Result<()> {
        let mut foods = self.foods.clone();
        foods.push(food);
        self.commit_foods(foods)
    }

    /// Absent ids are not an error. Returns whether an entry was removed.
    pub fn remove_food(&mut self, id: &str) -> Result<bool> {
        let mut foods = self.foods.clone();
        foods.retain(|f| f.id != id);
        let removed = foods.len() != self.foods.len();
        self.commit_foods(foods)?;
        Ok(removed)
    }

    pub fn clear_foods(&mut self) -> Result<()> {
        self.commit_foods(Vec::new())
    }

    pub fn update_goals(&mut self, patch: &GoalsPatch) -> Result<DailyGoals> {
        let mut goals = self.goals;
        goals.apply(patch);
        let json = serde_json::to_string(&goals)?;
        debug!("Persisting daily goals");
        self.backend.set(GOALS_KEY, &json)?;
        self.goals = goals;
        Ok(goals)
    }

    pub fn foods_on(&self, date: NaiveDate) -> Vec<&Food> {
        aggregate::foods_on(&self.foods, date).collect()
    }

    pub fn totals_on(&self, date: NaiveDate) -> MacroTotals {
        aggregate::totals_on(&self.foods, date)
    }

    /// Entries whose local calendar day is today.
    pub fn todays_foods(&self) -> Vec<&Food> {
        self.foods_on(Local::now().date_naive())
    }

    pub fn daily_totals(&self) -> MacroTotals {
        self.totals_on(Local::now().date_naive())
    }

    /// In-memory state only changes once the write has succeeded.
    fn commit_foods(&mut self, foods: Vec<Food>) -> Result<()> {
        let json = serde_json::to_string(&foods)?;
        debug!(count = foods.len(), "Persisting foods");
        self.backend.set(FOODS_KEY, &json)?;
        self.foods = foods;
        Ok(())
    }
}

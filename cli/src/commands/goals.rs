use anyhow::Result;

use thryve_core::aggregate::format_number;
use thryve_core::models::{DailyGoals, GoalsPatch};
use thryve_core::service::NutritionService;

use super::helpers::print_json;

fn print_goals(goals: &DailyGoals) {
    println!("Daily goals:");
    println!("  Calories: {} kcal", format_number(goals.calories));
    println!("  Carbs:    {:.0}g", goals.carbs);
    println!("  Protein:  {:.0}g", goals.protein);
    println!("  Fat:      {:.0}g", goals.fat);
}

pub(crate) fn cmd_goals_show(svc: &NutritionService, json: bool) -> Result<()> {
    let goals = svc.goals();
    if json {
        print_json(&goals)
    } else {
        print_goals(&goals);
        Ok(())
    }
}

/// Only the flags given are changed.
pub(crate) fn cmd_goals_set(svc: &mut NutritionService, patch: &GoalsPatch, json: bool) -> Result<()> {
    let goals = svc.update_goals(patch)?;
    if json {
        print_json(&goals)
    } else {
        print_goals(&goals);
        Ok(())
    }
}

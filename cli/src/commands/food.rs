use anyhow::Result;
use chrono::Local;
use serde_json::json;

use thryve_core::aggregate::relative_day_label;
use thryve_core::service::NutritionService;

use super::helpers::{exit_not_found, meal_label, print_json};

pub(crate) fn cmd_show(svc: &NutritionService, id: &str, json: bool) -> Result<()> {
    let Ok(detail) = svc.food_detail(id) else {
        exit_not_found(&format!("Food not found: {id}"), json);
    };

    if json {
        return print_json(&detail);
    }

    let f = &detail.food;
    let d = &detail.distribution;
    let day = relative_day_label(f.timestamp.date_naive(), Local::now().date_naive());
    println!("{} ({})", f.name, f.serving_size);
    println!(
        "  {} {} at {} ({})",
        meal_label(detail.meal),
        day,
        f.timestamp.format("%H:%M"),
        f.timestamp.format("%Y-%m-%d")
    );
    println!("  Calories: {:.0} kcal", f.calories);
    println!("  Carbs:    {:.1}g ({}%)", f.carbs, d.carbs_percentage);
    println!("  Protein:  {:.1}g ({}%)", f.protein, d.protein_percentage);
    println!("  Fat:      {:.1}g ({}%)", f.fat, d.fat_percentage);
    println!("  ID:       {}", f.id);

    Ok(())
}

pub(crate) fn cmd_delete(svc: &mut NutritionService, id: &str, json: bool) -> Result<()> {
    if !svc.delete_food(id)? {
        exit_not_found(&format!("Food not found: {id}"), json);
    }

    if json {
        println!("{}", json!({ "deleted": id }));
    } else {
        println!("Deleted {id}");
    }

    Ok(())
}

pub(crate) fn cmd_clear(svc: &mut NutritionService, json: bool) -> Result<()> {
    let count = svc.store().foods().len();
    svc.clear_foods()?;

    if json {
        println!("{}", json!({ "cleared": count }));
    } else {
        println!("Cleared {count} entries");
    }

    Ok(())
}

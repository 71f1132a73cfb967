use anyhow::Result;
use chrono::{Local, Timelike};
use std::process;

use thryve_core::models::{Food, MealSlot, NewFood};
use thryve_core::service::NutritionService;

use super::helpers::{meal_label, print_food_table, print_json};

pub(crate) fn cmd_search(svc: &NutritionService, query: &str, json: bool) -> Result<()> {
    let results = svc.search(query);

    if results.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No results found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        print_json(&results)?;
    } else {
        let refs: Vec<&Food> = results.iter().collect();
        print_food_table(&refs);
    }

    Ok(())
}

pub(crate) fn cmd_suggest(svc: &NutritionService, json: bool) -> Result<()> {
    let suggestions = svc.suggestions();

    if json {
        print_json(&suggestions)?;
    } else {
        let slot = MealSlot::from_hour(Local::now().hour());
        println!("Suggestions for {}:", meal_label(slot));
        let refs: Vec<&Food> = suggestions.iter().collect();
        print_food_table(&refs);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_add(
    svc: &mut NutritionService,
    name: &str,
    calories: f64,
    carbs: f64,
    protein: f64,
    fat: f64,
    serving: Option<String>,
    json: bool,
) -> Result<()> {
    let food = svc.log_food(NewFood {
        name: name.trim().to_string(),
        calories,
        carbs,
        protein,
        fat,
        serving_size: serving.unwrap_or_else(|| "1 serving".to_string()),
    })?;

    if json {
        print_json(&food)?;
    } else {
        let name = &food.name;
        let id = &food.id;
        println!("Added {name} (id: {id})");
    }

    Ok(())
}

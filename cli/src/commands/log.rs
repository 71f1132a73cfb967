use anyhow::{Context, Result};
use std::path::Path;
use std::process;

use crate::gemini::GeminiClient;
use thryve_core::recognition::{RecognitionError, Recognizer};
use thryve_core::service::NutritionService;

use super::helpers::{json_error, print_food_table, print_json, prompt_choice};
use super::resolve_choice;

pub(crate) async fn cmd_scan(
    svc: &mut NutritionService,
    recognizer: &Recognizer<GeminiClient>,
    image_path: &Path,
    json: bool,
) -> Result<()> {
    let image = tokio::fs::read(image_path)
        .await
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;

    if !json {
        eprintln!("Analyzing {}...", image_path.display());
    }

    let food = match svc.scan_and_log(recognizer, &image).await {
        Ok(food) => food,
        Err(e) if json => {
            println!("{}", json_error(&format!("{e:#}")));
            let code = match e.downcast_ref::<RecognitionError>() {
                Some(RecognitionError::RateLimited { .. }) => 2,
                _ => 1,
            };
            process::exit(code);
        }
        Err(e) => return Err(e),
    };

    if json {
        print_json(&food)?;
    } else {
        let name = &food.name;
        let serving = &food.serving_size;
        let cal = food.calories;
        let p = food.protein;
        let c = food.carbs;
        let f = food.fat;
        let id = &food.id;
        println!("Logged {name} ({serving}) — {cal:.0} kcal | P:{p:.0}g C:{c:.0}g F:{f:.0}g [{id}]");
    }

    Ok(())
}

/// Search the reference table and log the chosen hit with a fresh timestamp.
pub(crate) fn cmd_log(svc: &mut NutritionService, query: &str, json: bool) -> Result<()> {
    let results = svc.search(query);

    if results.is_empty() {
        let message = format!("No food found for '{query}'");
        if json {
            println!("{}", json_error(&message));
        } else {
            eprintln!("{message}");
        }
        process::exit(2);
    }

    let chosen = if results.len() == 1 {
        0
    } else {
        let refs: Vec<&_> = results.iter().collect();
        print_food_table(&refs);
        prompt_choice(results.len())?
    };
    let values = resolve_choice(results, chosen)?;
    let food = svc.log_food(values)?;

    if json {
        print_json(&food)?;
    } else {
        let name = &food.name;
        let cal = food.calories;
        let id = &food.id;
        println!("Logged {name} — {cal:.0} kcal [{id}]");
    }

    Ok(())
}

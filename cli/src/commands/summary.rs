use anyhow::Result;
use chrono::{Local, Timelike};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use thryve_core::aggregate::{calories_left_message, format_number, greeting};
use thryve_core::models::{DayTotals, Food, MEAL_SLOTS, MacroProgress, MacroTotals};
use thryve_core::service::NutritionService;

use super::helpers::{food_line, meal_label, no_neg_zero, parse_date, print_json};

pub(crate) fn cmd_summary(svc: &NutritionService, json: bool) -> Result<()> {
    let summary = svc.today_summary();

    if json {
        return print_json(&summary);
    }

    let date = &summary.date;
    println!("{}! === {date} ===\n", greeting(Local::now().hour()));

    for slot in MEAL_SLOTS {
        let foods = summary.meals.get(*slot);
        if foods.is_empty() {
            continue;
        }
        let sub_cal = MacroTotals::from_foods(foods).calories;
        println!("  {} ({sub_cal:.0} kcal)", meal_label(*slot));
        for f in foods {
            println!("    {}", food_line(f));
        }
        println!();
    }

    if summary.meals.is_empty() {
        println!("  No entries yet today\n");
    }

    let t = &summary.totals;
    let g = &summary.goals;
    println!(
        "  TOTAL: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        no_neg_zero(t.calories),
        no_neg_zero(t.protein),
        no_neg_zero(t.carbs),
        no_neg_zero(t.fat)
    );
    println!(
        "  GOAL:  {} kcal | P:{:.0}g C:{:.0}g F:{:.0}g\n",
        format_number(g.calories),
        g.protein,
        g.carbs,
        g.fat
    );
    print_progress("Calories", &summary.calories, "kcal");
    print_progress("Protein", &summary.protein, "g");
    print_progress("Carbs", &summary.carbs, "g");
    print_progress("Fat", &summary.fat, "g");
    println!("\n  {}", calories_left_message(summary.calories_left));

    Ok(())
}

fn print_progress(label: &str, p: &MacroProgress, unit: &str) {
    const WIDTH: u32 = 20;
    let filled = (p.percentage * WIDTH / 100) as usize;
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(WIDTH as usize - filled)
    );
    println!(
        "  {label:<8} [{bar}] {:>3}% {:.0}/{:.0}{unit} ({})",
        p.percentage,
        p.current,
        p.target,
        p.band.as_str()
    );
}

pub(crate) fn cmd_history(svc: &NutritionService, date: Option<String>, json: bool) -> Result<()> {
    #[derive(Serialize)]
    struct History<'a> {
        date: String,
        week: &'a [DayTotals],
        entries: &'a [&'a Food],
    }

    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "Day")]
        label: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Entries")]
        entries: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let selected = parse_date(date)?;
    let week = svc.week_history(selected);
    let entries = svc.store().foods_on(selected);

    if json {
        return print_json(&History {
            date: selected.format("%Y-%m-%d").to_string(),
            week: &week,
            entries: &entries,
        });
    }

    if week.iter().all(|d| d.entries == 0) {
        eprintln!("No entries in the week of {selected}");
        process::exit(2);
    }

    let rows: Vec<HistoryRow> = week
        .iter()
        .map(|d| {
            let cal = no_neg_zero(d.totals.calories);
            let p = no_neg_zero(d.totals.protein);
            let c = no_neg_zero(d.totals.carbs);
            let f = no_neg_zero(d.totals.fat);
            HistoryRow {
                label: d.label.clone(),
                date: d.date.clone(),
                entries: d.entries,
                calories: format_number(cal),
                protein: format!("{p:.0}g"),
                carbs: format!("{c:.0}g"),
                fat: format!("{f:.0}g"),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    println!("\n=== {selected} ===");
    if entries.is_empty() {
        println!("  No entries");
    }
    for f in &entries {
        println!("  {}", food_line(f));
    }

    Ok(())
}

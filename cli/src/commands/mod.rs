mod food;
mod goals;
mod helpers;
mod log;
mod search;
mod summary;

use anyhow::{Context, Result};

use thryve_core::models::{Food, NewFood};

pub(crate) use food::{cmd_clear, cmd_delete, cmd_show};
pub(crate) use goals::{cmd_goals_set, cmd_goals_show};
pub(crate) use log::{cmd_log, cmd_scan};
pub(crate) use search::{cmd_add, cmd_search, cmd_suggest};
pub(crate) use summary::{cmd_history, cmd_summary};

/// Strip identity from the selected reference hit so it can be re-stamped
/// at log time.
pub(super) fn resolve_choice(results: Vec<Food>, idx: usize) -> Result<NewFood> {
    let food = results
        .into_iter()
        .nth(idx)
        .context("Selection out of range")?;
    Ok(NewFood {
        name: food.name,
        calories: food.calories,
        carbs: food.carbs,
        protein: food.protein,
        fat: food.fat,
        serving_size: food.serving_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use thryve_core::reference::search_foods;

    #[test]
    fn test_resolve_choice_keeps_values() {
        let results = search_foods("a");
        let expected = results[1].clone();
        let values = resolve_choice(results, 1).unwrap();
        assert_eq!(values.name, expected.name);
        assert!((values.calories - expected.calories).abs() < f64::EPSILON);
        assert_eq!(values.serving_size, expected.serving_size);
    }

    #[test]
    fn test_resolve_choice_out_of_range() {
        assert!(resolve_choice(search_foods("egg"), 3).is_err());
    }
}

//! CSV sink for extraction results.
//!
//! One row per discovered URL, in pipeline order, with the numeric columns
//! fixed by the field schema. Fetch failures keep their row (all sentinel
//! values, `FETCH_FAILED` set) so the output always accounts for every
//! discovered item.

use crate::models::{ExtractionResult, Field};
use std::error::Error;
use std::path::PathBuf;
use tracing::{info, instrument};

/// Write results to `{output_dir}/products_nutrition_{stamp}.csv`.
#[instrument(level = "info", skip_all, fields(count = results.len()))]
pub fn write_results(
    results: &[ExtractionResult],
    output_dir: &str,
    stamp: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let path = PathBuf::from(output_dir).join(format!("products_nutrition_{stamp}.csv"));
    let mut writer = csv::Writer::from_path(&path)?;

    let mut header = vec!["URL", "NAME"];
    header.extend(Field::ALL.iter().map(|f| f.column()));
    header.push("FETCH_FAILED");
    writer.write_record(&header)?;

    for result in results {
        let mut row = vec![result.facts.url.as_str(), result.facts.name.as_str()];
        row.extend(result.facts.numeric_values());
        row.push(if result.fetch_failed { "true" } else { "false" });
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), "Wrote CSV output");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NutritionFacts;

    #[test]
    fn test_csv_columns_follow_schema_order() {
        let dir = std::env::temp_dir().join("nutri_harvest_csv_test");
        std::fs::create_dir_all(&dir).unwrap();

        let mut facts = NutritionFacts::empty("https://loja.example/whey/p");
        facts.name = "Whey Protein 900g".to_string();
        facts.set_once(Field::Protein, "25.5".to_string());
        let results = vec![
            ExtractionResult::extracted(facts),
            ExtractionResult::fetch_failure("https://loja.example/fora/p"),
        ];

        let path = write_results(&results, dir.to_str().unwrap(), "20250506_120000").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let mut lines = written.lines();

        assert_eq!(
            lines.next().unwrap(),
            "URL,NAME,PORTION_G,CALORIES_KCAL,CARBS_G,PROTEIN_G,TOTAL_FAT_G,SAT_FAT_G,FIBER_G,SUGAR_G,SODIUM_MG,FETCH_FAILED"
        );
        assert_eq!(
            lines.next().unwrap(),
            "https://loja.example/whey/p,Whey Protein 900g,0,0,0,25.5,0,0,0,0,0,false"
        );
        assert_eq!(
            lines.next().unwrap(),
            "https://loja.example/fora/p,,0,0,0,0,0,0,0,0,0,true"
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}

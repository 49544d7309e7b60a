use crate::PredictionList;
use anyhow::Result;
use std::path::Path;

/// Export the provided predictions to CSV with headers:
/// rank,species,confidence
pub fn export_csv(predictions: &PredictionList, path: impl AsRef<Path>) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["rank", "species", "confidence"])?;

    for (index, prediction) in predictions.iter().enumerate() {
        let rank = (index + 1).to_string();
        let confidence = prediction.confidence.to_string();
        wtr.write_record([
            rank.as_str(),
            prediction.species.as_str(),
            confidence.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

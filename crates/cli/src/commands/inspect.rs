//! Inspect command - summarize a cascade model file

use anyhow::{Context as _, Result};
use cascade_faces_detection::CascadeModel;
use clap::Args;
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Args)]
pub struct InspectCommand {
    /// Cascade model file
    #[arg(short, long)]
    model: PathBuf,
}

impl InspectCommand {
    pub fn execute(self) -> Result<()> {
        let model = CascadeModel::from_file(&self.model)
            .with_context(|| format!("Failed to load cascade model {}", self.model.display()))?;

        let summary = summarize(&model);
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
        Ok(())
    }
}

fn summarize(model: &CascadeModel) -> Value {
    let stages: Vec<Value> = model
        .stages()
        .iter()
        .map(|stage| {
            json!({
                "trees": stage.trees().len(),
                "max_depth": stage.trees().iter().map(|t| t.depth()).max().unwrap_or(0),
                "threshold": stage.threshold(),
            })
        })
        .collect();

    json!({
        "stages": model.stage_count(),
        "trees": model.tree_count(),
        "max_depth": model.max_depth(),
        "stage_details": stages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_faces_detection::{Stage, Tree};

    #[test]
    fn test_summarize_counts() {
        let model = CascadeModel::new(vec![
            Stage::new(vec![Tree::new(0, vec![], vec![1.0]).unwrap()], -0.5).unwrap(),
            Stage::new(
                vec![
                    Tree::new(0, vec![], vec![0.5]).unwrap(),
                    Tree::new(0, vec![], vec![0.25]).unwrap(),
                ],
                0.5,
            )
            .unwrap(),
        ])
        .unwrap();

        let summary = summarize(&model);
        assert_eq!(summary["stages"], 2);
        assert_eq!(summary["trees"], 3);
        assert_eq!(summary["max_depth"], 0);
        assert_eq!(summary["stage_details"][1]["trees"], 2);
        assert_eq!(summary["stage_details"][0]["threshold"], -0.5);
    }
}

use std::path::Path;

use anyhow::{Context, Result};

use crate::model::Review;

/// Write reviews as a CSV table with a header row, replacing any existing file.
pub fn write_csv(path: &Path, reviews: &[Review]) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to open export {}", path.display()))?;
    for review in reviews {
        writer.serialize(review)?;
    }
    writer.flush()?;
    Ok(())
}

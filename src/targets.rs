use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::model::Target;

const NAME_COLUMNS: &[&str] = &["name", "business", "business_name"];
const URL_COLUMNS: &[&str] = &["profil", "profile", "url"];

/// Label prefixes the sheet puts in front of profile URLs.
const URL_LABELS: &[&str] = &["Google - "];

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("failed to fetch target list: {0}")]
    Fetch(String),

    #[error("failed to parse target list: {0}")]
    Parse(#[from] csv::Error),

    #[error("target list has no {0} column")]
    MissingColumn(&'static str),

    #[error("target list is empty")]
    Empty,
}

impl From<reqwest::Error> for TargetError {
    fn from(err: reqwest::Error) -> Self {
        TargetError::Fetch(err.to_string())
    }
}

/// Where the business list lives.
#[derive(Debug, Clone)]
pub enum TargetSource {
    File(PathBuf),
    /// A spreadsheet readable through its CSV export link.
    Sheet { id: String, name: String },
}

impl TargetSource {
    pub fn describe(&self) -> String {
        match self {
            TargetSource::File(path) => path.display().to_string(),
            TargetSource::Sheet { id, name } => format!("sheet {id}/{name}"),
        }
    }
}

fn sheet_csv_url(id: &str, name: &str) -> String {
    format!(
        "https://docs.google.com/spreadsheets/d/{id}/gviz/tq?tqx=out:csv&sheet={}",
        name.replace(' ', "%20")
    )
}

pub async fn fetch_targets(source: &TargetSource) -> Result<Vec<Target>, TargetError> {
    let text = match source {
        TargetSource::File(path) => std::fs::read_to_string(path)
            .map_err(|e| TargetError::Fetch(format!("{}: {e}", path.display())))?,
        TargetSource::Sheet { id, name } => {
            let resp = reqwest::get(sheet_csv_url(id, name)).await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(TargetError::Fetch(format!("sheet export returned {status}")));
            }
            resp.text().await?
        }
    };

    let targets = parse_targets(&text)?;
    info!("Loaded {} targets from {}", targets.len(), source.describe());
    Ok(targets)
}

/// Parse a target table. Rows missing a name or URL are skipped; a table that
/// yields no targets at all is an error.
pub fn parse_targets(text: &str) -> Result<Vec<Target>, TargetError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.eq_ignore_ascii_case(n)))
    };
    let name_col = find(NAME_COLUMNS).ok_or(TargetError::MissingColumn("name"))?;
    let url_col = find(URL_COLUMNS).ok_or(TargetError::MissingColumn("profile URL"))?;

    let mut targets = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let name = row.get(name_col).unwrap_or_default();
        let url = strip_label(row.get(url_col).unwrap_or_default());
        if name.is_empty() || url.is_empty() {
            warn!(row = i + 2, "Skipping target row without name or URL");
            continue;
        }
        targets.push(Target::new(name, url));
    }

    if targets.is_empty() {
        return Err(TargetError::Empty);
    }
    Ok(targets)
}

fn strip_label(cell: &str) -> &str {
    let cell = cell.trim();
    URL_LABELS
        .iter()
        .find_map(|label| cell.strip_prefix(*label))
        .unwrap_or(cell)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sheet_columns_and_strips_label() {
        let csv = "Name,Profil,Owner\n\
                   Acme Bakery,Google - https://maps.example.com/acme ,Mark\n\
                   Bistro,https://maps.example.com/bistro,Mark\n";
        let targets = parse_targets(csv).unwrap();
        assert_eq!(
            targets,
            vec![
                Target::new("Acme Bakery", "https://maps.example.com/acme"),
                Target::new("Bistro", "https://maps.example.com/bistro"),
            ]
        );
    }

    #[test]
    fn column_names_are_case_insensitive() {
        let csv = "BUSINESS,url\nAcme,https://a\n";
        assert_eq!(parse_targets(csv).unwrap(), vec![Target::new("Acme", "https://a")]);
    }

    #[test]
    fn incomplete_rows_are_skipped() {
        let csv = "Name,Profil\n,https://a\nAcme,\nBistro,https://b\n";
        assert_eq!(parse_targets(csv).unwrap(), vec![Target::new("Bistro", "https://b")]);
    }

    #[test]
    fn missing_column_is_an_error() {
        let err = parse_targets("Name,Owner\nAcme,Mark\n").unwrap_err();
        assert!(matches!(err, TargetError::MissingColumn(_)));
    }

    #[test]
    fn no_usable_rows_is_an_error() {
        assert!(matches!(parse_targets("Name,Profil\n"), Err(TargetError::Empty)));
    }

    #[test]
    fn sheet_url_encodes_worksheet_name() {
        assert_eq!(
            sheet_csv_url("abc", "Sheet 1"),
            "https://docs.google.com/spreadsheets/d/abc/gviz/tq?tqx=out:csv&sheet=Sheet%201"
        );
    }

    #[tokio::test]
    async fn missing_file_is_a_fetch_error() {
        let source = TargetSource::File(PathBuf::from("/nonexistent/targets.csv"));
        assert!(matches!(fetch_targets(&source).await, Err(TargetError::Fetch(_))));
    }

    #[tokio::test]
    async fn reads_targets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.csv");
        std::fs::write(&path, "Name,Profil\nAcme,https://a\n").unwrap();

        let targets = fetch_targets(&TargetSource::File(path)).await.unwrap();
        assert_eq!(targets, vec![Target::new("Acme", "https://a")]);
    }
}

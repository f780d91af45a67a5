//! Layout command implementation - stack annotation domains into display layers

use anyhow::{Context, Result};
use covary_core::{layout, AnnotationSet};
use std::path::Path;

use crate::error::CliError;

pub fn execute(annotations: &Path) -> Result<()> {
    if !annotations.exists() {
        return Err(CliError::file_not_found(annotations.to_path_buf()).into());
    }
    let bytes = std::fs::read(annotations).with_context(|| format!("Failed to read {}", annotations.display()))?;
    let set = AnnotationSet::from_json(&bytes).map_err(|e| CliError::invalid_format(e.to_string()))?;
    print!("{}", render_layers(&set));
    Ok(())
}

/// One line per layer listing its domains left to right.
pub fn render_layers(set: &AnnotationSet) -> String {
    let domains = set.domains();
    let mut out = String::new();
    for (depth, layer) in layout(set).iter().enumerate() {
        let mut members: Vec<_> = layer.iter().filter_map(|&idx| domains.get(idx)).collect();
        members.sort_by_key(|d| d.range().low());
        let cells: Vec<String> = members
            .iter()
            .map(|d| {
                let strand = if d.range().is_reverse() { "-" } else { "+" };
                format!("{}[{}..{}]{}", d.gene, d.range().low(), d.range().high(), strand)
            })
            .collect();
        out.push_str(&format!("layer {}: {}\n", depth, cells.join("  ")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_overlapping_genes() -> Result<()> {
        let json = br#"[
            {"gene": "gag", "locations": [{"min": 10, "max": 100}]},
            {"gene": "pol", "locations": [{"min": 80, "max": 300}]},
            {"gene": "nef", "locations": [{"min": 400, "max": 350}]}
        ]"#;
        let set = AnnotationSet::from_json(json)?;
        let rendered = render_layers(&set);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("gag[10..100]+"));
        assert!(lines[0].contains("nef[350..400]-"));
        assert!(lines[1].contains("pol[80..300]+"));
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let err = execute(Path::new("/nonexistent/genes.json")).err();
        assert!(matches!(err.map(|e| e.downcast::<CliError>()), Some(Ok(CliError::FileNotFound { .. }))));
    }
}

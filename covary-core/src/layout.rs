//! Greedy layer packing for annotation display.

use crate::annotation::{AnnotationDomain, AnnotationSet};

/// Assign every gene to the lowest layer where none of its domains overlap a
/// domain already placed there. Genes with more domains go first, ties broken
/// by start position. Each layer lists the `this_index` of its domains.
pub fn layout(annotations: &AnnotationSet) -> Vec<Vec<usize>> {
    let mut genes: Vec<Vec<&AnnotationDomain>> = annotations
        .genes()
        .iter()
        .map(|gene| annotations.gene_domains(gene.gene_index).collect())
        .collect();
    genes.sort_by_key(|domains| {
        let start = domains.iter().map(|d| d.range().low()).min().unwrap_or(0);
        (std::cmp::Reverse(domains.len()), start)
    });

    let mut layers: Vec<Vec<&AnnotationDomain>> = Vec::new();
    for domains in genes {
        let fits = |layer: &Vec<&AnnotationDomain>| {
            !domains
                .iter()
                .any(|d| layer.iter().any(|placed| placed.range().overlaps(&d.range())))
        };
        match layers.iter().position(fits) {
            Some(idx) => layers[idx].extend(domains),
            None => layers.push(domains),
        }
    }

    layers
        .into_iter()
        .map(|layer| layer.into_iter().map(|d| d.this_index).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Annotation, AnnotationResult, GeneRange};

    fn gene(name: &str, ranges: &[(i64, i64)]) -> Annotation {
        Annotation {
            gene: name.to_string(),
            locations: ranges.iter().map(|&(a, b)| GeneRange::new(a, b)).collect(),
            gene_index: 0,
        }
    }

    #[test]
    fn test_disjoint_genes_share_a_layer() -> AnnotationResult<()> {
        let set = AnnotationSet::new(vec![gene("a", &[(1, 10)]), gene("b", &[(20, 30)])])?;
        assert_eq!(layout(&set), vec![vec![0, 1]]);
        Ok(())
    }

    #[test]
    fn test_overlapping_genes_stack() -> AnnotationResult<()> {
        let set = AnnotationSet::new(vec![
            gene("small", &[(5, 15)]),
            gene("split", &[(1, 10), (40, 50)]),
            gene("late", &[(20, 30)]),
        ])?;
        // split (2 domains) goes first, small collides with it, late fits beside it
        let layers = layout(&set);
        assert_eq!(layers, vec![vec![1, 2, 3], vec![0]]);
        Ok(())
    }

    #[test]
    fn test_no_overlap_within_layer() -> AnnotationResult<()> {
        let set = AnnotationSet::new(vec![
            gene("a", &[(1, 100)]),
            gene("b", &[(50, 150)]),
            gene("c", &[(120, 90)]),
            gene("d", &[(160, 170), (1, 5)]),
        ])?;
        let domains = set.domains();
        for layer in layout(&set) {
            for (k, &x) in layer.iter().enumerate() {
                for &y in &layer[k + 1..] {
                    assert!(!domains[x].range().overlaps(&domains[y].range()));
                }
            }
        }
        Ok(())
    }
}

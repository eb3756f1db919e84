//! Genome dataset reader and writer
//!
//! Each organism takes two lines: `>name` followed by its markers. A
//! chromosome ends with `$` when linear and `@` when circular:
//!
//! ```text
//! >human
//! 1 -3 2 $ 4 5 @
//! ```

use crate::config::ChromosomeMode;
use crate::error::{PhyloError, Result};
use crate::genome::{Chromosome, ChromosomeKind, Genome, Marker};
use indexmap::IndexMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Smallest dataset the optimizer can label: fewer leaves leave no internal
/// node with three genome neighbours to improve
pub const MIN_GENOMES: usize = 4;

pub fn read_dataset(path: &Path, mode: ChromosomeMode) -> Result<IndexMap<String, Genome>> {
    let text = fs::read_to_string(path)?;
    parse_dataset(&text, mode).map_err(|e| match e {
        PhyloError::Format(msg) => PhyloError::Format(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_dataset(text: &str, mode: ChromosomeMode) -> Result<IndexMap<String, Genome>> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Err(PhyloError::Format("dataset is empty".into()));
    }
    if lines.len() % 2 != 0 {
        return Err(PhyloError::Format(
            "dataset must alternate name and marker lines".into(),
        ));
    }

    let mut genomes = IndexMap::new();
    for pair in lines.chunks(2) {
        let name = pair[0]
            .strip_prefix('>')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| PhyloError::Format(format!("expected '>name', found '{}'", pair[0])))?;
        let genome = parse_genome(pair[1])
            .map_err(|e| PhyloError::Format(format!("genome {name}: {e}")))?
            .with_name(name);
        if genomes.insert(name.to_string(), genome).is_some() {
            return Err(PhyloError::Format(format!("organism {name} appears twice")));
        }
    }

    if genomes.len() < MIN_GENOMES {
        return Err(PhyloError::Format(format!(
            "dataset has {} genome(s), at least {MIN_GENOMES} are required",
            genomes.len()
        )));
    }
    validate_dataset(&genomes, mode)?;
    Ok(genomes)
}

fn flush(token: &mut String, markers: &mut Vec<Marker>) -> std::result::Result<(), String> {
    if token.is_empty() {
        return Ok(());
    }
    let marker: Marker = token
        .parse()
        .map_err(|_| format!("invalid marker '{token}'"))?;
    if marker == 0 {
        return Err("marker 0 is not allowed".into());
    }
    markers.push(marker);
    token.clear();
    Ok(())
}

/// Markers of one genome line, chromosomes closed by `$` or `@`
fn parse_genome(line: &str) -> std::result::Result<Genome, String> {
    let mut chromosomes = Vec::new();
    let mut markers: Vec<Marker> = Vec::new();
    let mut token = String::new();

    for c in line.chars() {
        match c {
            '$' | '@' => {
                flush(&mut token, &mut markers)?;
                if markers.is_empty() {
                    return Err(format!("empty chromosome before '{c}'"));
                }
                let kind = if c == '$' {
                    ChromosomeKind::Linear
                } else {
                    ChromosomeKind::Circular
                };
                chromosomes.push(Chromosome::new(kind, std::mem::take(&mut markers)));
            }
            c if c.is_whitespace() => flush(&mut token, &mut markers)?,
            c => token.push(c),
        }
    }
    flush(&mut token, &mut markers)?;
    if !markers.is_empty() {
        return Err("last chromosome has no '$' or '@' terminator".into());
    }
    if chromosomes.is_empty() {
        return Err("no chromosomes".into());
    }
    Ok(Genome::new(chromosomes))
}

/// Equal gene counts, content `1..=n`, and the chromosome mode
pub fn validate_dataset(genomes: &IndexMap<String, Genome>, mode: ChromosomeMode) -> Result<()> {
    let Some((first_name, first)) = genomes.first() else {
        return Err(PhyloError::Format("dataset is empty".into()));
    };
    let n = first.gene_count();
    for (name, genome) in genomes {
        if genome.gene_count() != n {
            return Err(PhyloError::Format(format!(
                "genome {name} has {} genes but {first_name} has {n}",
                genome.gene_count()
            )));
        }
        genome.validate_content(n)?;
        if mode == ChromosomeMode::Unichromosomal && genome.chromosome_count() != 1 {
            return Err(PhyloError::Format(format!(
                "genome {name} has {} chromosomes; use multichromosomal mode",
                genome.chromosome_count()
            )));
        }
    }
    Ok(())
}

/// Write genomes back in the dataset format
pub fn write_genomes<'a, W: Write>(
    out: &mut W,
    genomes: impl IntoIterator<Item = (&'a str, &'a Genome)>,
) -> Result<()> {
    for (name, genome) in genomes {
        writeln!(out, ">{name}")?;
        writeln!(out, "{genome}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FOUR: &str = ">A\n1 2 3 $\n>B\n1 -2 3 $\n\n>C\n2 1 3$\n>D\n-3 -2 -1 $\n";

    #[test]
    fn test_parse_four_genomes() {
        let genomes = parse_dataset(FOUR, ChromosomeMode::Unichromosomal).unwrap();
        let names: Vec<&str> = genomes.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_eq!(genomes["C"].chromosomes[0].markers, vec![2, 1, 3]);
        assert_eq!(genomes["B"].name.as_deref(), Some("B"));
    }

    #[test]
    fn test_multichromosomal_and_circular() {
        let text = ">A\n1 2 $ 3 4 @\n>B\n1 2 3 4 $\n>C\n4 3 2 1 @\n>D\n1 $ 2 $ 3 $ 4 $\n";
        assert!(parse_dataset(text, ChromosomeMode::Unichromosomal).is_err());
        let genomes = parse_dataset(text, ChromosomeMode::Multichromosomal).unwrap();
        assert_eq!(genomes["A"].chromosome_kinds(), (1, 1));
        assert_eq!(genomes["D"].chromosome_count(), 4);
    }

    #[test]
    fn test_mismatched_gene_counts() {
        let text = ">A\n1 2 3 $\n>B\n1 2 $\n>C\n1 2 3 $\n>D\n1 2 3 $\n";
        let err = parse_dataset(text, ChromosomeMode::Unichromosomal).unwrap_err();
        assert!(matches!(err, PhyloError::Format(msg) if msg.contains("genome B has 2 genes")));
    }

    #[test]
    fn test_malformed_datasets() {
        let uni = ChromosomeMode::Unichromosomal;
        let cases = [
            "",
            ">A\n1 2 $\n>B\n",
            "A\n1 2 $\n>B\n1 2 $\n>C\n1 2 $\n>D\n1 2 $\n",
            ">A\n1 x $\n>B\n1 2 $\n>C\n1 2 $\n>D\n1 2 $\n",
            ">A\n1 2\n>B\n1 2 $\n>C\n1 2 $\n>D\n1 2 $\n",
            ">A\n1 0 $\n>B\n1 2 $\n>C\n1 2 $\n>D\n1 2 $\n",
            ">A\n1 2 $\n>A\n1 2 $\n>C\n1 2 $\n>D\n1 2 $\n",
            ">A\n1 1 $\n>B\n1 2 $\n>C\n1 2 $\n>D\n1 2 $\n",
            ">A\n1 2 $\n>B\n1 2 $\n>C\n1 2 $\n",
        ];
        for text in cases {
            assert!(
                matches!(parse_dataset(text, uni), Err(PhyloError::Format(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_write_then_read() {
        let genomes = parse_dataset(FOUR, ChromosomeMode::Unichromosomal).unwrap();
        let mut out = Vec::new();
        write_genomes(&mut out, genomes.iter().map(|(n, g)| (n.as_str(), g))).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with(">A\n1 2 3 $\n"));
        let again = parse_dataset(&text, ChromosomeMode::Unichromosomal).unwrap();
        assert_eq!(again, genomes);
    }
}

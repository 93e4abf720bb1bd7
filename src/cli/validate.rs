use std::path::{Path, PathBuf};

use clap::Args;

use crate::model::dataset::Dataset;
use crate::pipeline::Pipeline;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Input 10x directory
    #[arg(long)]
    pub(crate) input: PathBuf,

    /// TOML configuration file (load filters)
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Also write validate.tsv and gene_mapping_warnings.tsv here
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

pub fn handle(args: ValidateArgs) -> anyhow::Result<()> {
    let cfg = super::load_config(args.config.as_deref())?;
    let pipeline = Pipeline::new(cfg)?;
    let ds = pipeline.load(&args.input)?;

    let lines = validate_lines(&ds);
    for (k, v) in &lines {
        println!("{}\t{}", k, v);
    }
    if let Some(out) = &args.out {
        std::fs::create_dir_all(out)?;
        write_validate(out, &lines)?;
        write_gene_warnings(out, &ds)?;
    }
    Ok(())
}

pub(crate) fn validate_lines(ds: &Dataset) -> Vec<(&'static str, String)> {
    vec![
        ("format", ds.source.format.clone()),
        ("n_genes_raw", ds.source.n_genes_raw.to_string()),
        ("n_cells_raw", ds.source.n_cells_raw.to_string()),
        ("nnz_raw", ds.source.nnz_raw.to_string()),
        ("n_genes", ds.n_genes().to_string()),
        ("n_cells", ds.n_cells().to_string()),
        ("nnz", ds.counts.nnz().to_string()),
        (
            "duplicate_genes",
            ds.source.duplicate_genes.len().to_string(),
        ),
    ]
}

fn write_validate(out_dir: &Path, lines: &[(&'static str, String)]) -> anyhow::Result<()> {
    let mut buf = String::new();
    for (k, v) in lines {
        buf.push_str(k);
        buf.push('\t');
        buf.push_str(v);
        buf.push('\n');
    }
    std::fs::write(out_dir.join("validate.tsv"), buf)?;
    Ok(())
}

fn write_gene_warnings(out_dir: &Path, ds: &Dataset) -> anyhow::Result<()> {
    let mut buf = String::new();
    buf.push_str("symbol\tfirst_row\tdup_row\trenamed\n");
    for dup in &ds.source.duplicate_genes {
        buf.push_str(&dup.symbol);
        buf.push('\t');
        buf.push_str(&dup.first_row.to_string());
        buf.push('\t');
        buf.push_str(&dup.dup_row.to_string());
        buf.push('\t');
        buf.push_str(&dup.renamed);
        buf.push('\n');
    }
    std::fs::write(out_dir.join("gene_mapping_warnings.tsv"), buf)?;
    Ok(())
}

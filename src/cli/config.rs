use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// TOML configuration file to merge over the defaults
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
}

pub fn handle(args: ConfigArgs) -> anyhow::Result<()> {
    let cfg = super::load_config(args.config.as_deref())?;
    cfg.validate()?;
    print!("{}", cfg.to_toml_string()?);
    Ok(())
}

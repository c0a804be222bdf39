pub mod cli;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod date;
pub mod engine;
pub mod profile;
pub mod render;
pub mod trip;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args);
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting roam CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(cli.rc_overrides)
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let repo =
    datastore::JsonFileRepository::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open datastore at \
         {}",
        data_dir.display()
      )
    })?;

  let mut renderer =
    render::Renderer::new(
      &cfg, cli.json
    )?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let session = commands::Session::new(
    &repo,
    &cfg,
    cli.profile.as_deref()
  );
  commands::dispatch(
    &session,
    &mut renderer,
    inv
  )?;

  info!("done");
  Ok(())
}

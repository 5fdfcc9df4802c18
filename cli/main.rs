// Copyright 2018-2026 the Deno authors. MIT license.

use clap::Parser;

use libfunee::args::Cli;
use libfunee::bundle;
use libfunee::diagnostics::Diagnostics;
use libfunee::logging;
use libfunee::watch;

#[tokio::main]
async fn main() {
  let cli = Cli::parse();
  logging::init(cli.quiet);

  let entry = match cli.entry_url() {
    Ok(entry) => entry,
    Err(err) => {
      eprintln!("error: {err}");
      std::process::exit(1);
    }
  };

  let options = cli.bundle_options();

  let exit_code = if cli.watch {
    run_watching(&entry, &options, cli.watch_debounce()).await
  } else {
    run_once(&entry, &options).await
  };
  std::process::exit(exit_code);
}

async fn run_once(entry: &url::Url, options: &bundle::BundleOptions) -> i32 {
  match bundle::bundle(entry, options).await {
    Ok(output) => {
      println!("{output}");
      0
    }
    Err(err) => {
      Diagnostics::report(&err);
      1
    }
  }
}

async fn run_watching(entry: &url::Url, options: &bundle::BundleOptions, debounce: std::time::Duration) -> i32 {
  let watch_paths = bundle::discover_watch_paths(entry, options).await.unwrap_or_default();

  let result = watch::watch(&watch_paths, debounce, || async {
    match bundle::bundle(entry, options).await {
      Ok(output) => {
        println!("{output}");
        Ok(())
      }
      Err(err) => Err(err),
    }
  })
  .await;

  if result.is_err() {
    1
  } else {
    0
  }
}

use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Result};
use log::LevelFilter;
use shader_sandbox::{
	core::gameloop::{check, run_window, snapshot},
	SceneConfig,
};

#[derive(Debug, Default, PartialEq)]
struct Cli {
	scene: Option<PathBuf>,
	check: bool,
	snapshot: Option<PathBuf>,
}

fn parse_cli(args: &[String]) -> Result<Cli> {
	let mut cli = Cli::default();
	let mut i = 0;

	while i < args.len() {
		match args[i].as_str() {
			"--check" => {
				cli.check = true;
				i += 1;
			}
			"--snapshot" => {
				let Some(v) = args.get(i + 1) else {
					bail!("missing value for --snapshot");
				};
				cli.snapshot = Some(PathBuf::from(v));
				i += 2;
			}
			other if other.starts_with("--") => {
				bail!("unknown argument: {other} (usage: shader_sandbox [SCENE.ron] [--check] [--snapshot OUT.png])");
			}
			other => {
				if cli.scene.is_some() {
					bail!("only one scene can be previewed at a time, got another: {other}");
				}
				cli.scene = Some(PathBuf::from(other));
				i += 1;
			}
		}
	}

	Ok(cli)
}

fn main() -> Result<ExitCode> {
	env_logger::Builder::new()
		.filter_level(LevelFilter::Error)
		.filter_module("shader_sandbox", LevelFilter::Debug)
		.parse_default_env()
		.init();

	let argv: Vec<String> = std::env::args().skip(1).collect();
	let cli = parse_cli(&argv)?;

	let scene = match &cli.scene {
		Some(path) => SceneConfig::load(path)?,
		None => SceneConfig::default(),
	};

	if cli.check {
		return Ok(if check(&scene) { ExitCode::SUCCESS } else { ExitCode::FAILURE });
	}

	if let Some(output) = &cli.snapshot {
		snapshot(&scene, output)?;
		return Ok(ExitCode::SUCCESS);
	}

	run_window(&scene)?;
	Ok(ExitCode::SUCCESS)
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

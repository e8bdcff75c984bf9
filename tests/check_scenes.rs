mod common;

use std::{fs, path::Path};

use common::{scratch_dir, BROKEN};
use shader_sandbox::{core::gameloop, SceneConfig};

fn shipped(scene: &str) -> SceneConfig {
	SceneConfig::load(Path::new(env!("CARGO_MANIFEST_DIR")).join("scenes").join(scene)).unwrap()
}

#[test]
fn shipped_scenes_build() {
	assert!(gameloop::check(&shipped("pbr.ron")));
	assert!(gameloop::check(&shipped("basic.ron")));
}

#[test]
fn broken_fragments_fail_the_check() {
	let dir = scratch_dir("check");
	fs::write(dir.join("broken.frag"), BROKEN).unwrap();

	let mut scene = shipped("pbr.ron");
	scene.fragment_shaders.push(dir.join("broken.frag"));

	assert!(!gameloop::check(&scene));

	let _ = fs::remove_dir_all(dir);
}

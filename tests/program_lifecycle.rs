mod common;

use std::fs;

use common::{fragment, scratch_dir, vertex, ALBEDO, BROKEN, GRADIENT, VERTEX};
use shader_sandbox::{
	core::backend::ResourceCounts, Backend, CompiledStage, FullscreenQuad, HeadlessBackend, Program, ShaderError,
	ShaderSource, ShaderStage, UniformValue,
};

#[test]
fn programs_build_from_files_with_includes() {
	let dir = scratch_dir("lifecycle");
	fs::write(dir.join("quad.vert"), VERTEX).unwrap();
	fs::write(dir.join("tint.glsl"), "vec3 tint(vec3 color) { return color * u_roughness; }\n").unwrap();
	fs::write(
		dir.join("tinted.frag"),
		"#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;
layout(set = 0, binding = 0) uniform Params { float u_roughness; };
#include \"tint.glsl\"
void main() { fragColor = vec4(tint(vec3(vUv, 1.0)), 1.0); }
",
	)
	.unwrap();

	let mut backend = HeadlessBackend::new();
	let program = Program::build(
		&mut backend,
		&ShaderSource::file(dir.join("quad.vert"), ShaderStage::Vertex),
		&ShaderSource::file(dir.join("tinted.frag"), ShaderStage::Fragment),
	)
	.unwrap();

	assert!(program.set_float(&mut backend, "u_roughness", 0.5));
	assert_eq!(program.uniform_value(&backend, "u_roughness"), Some(UniformValue::Float(0.5)));

	program.release(&mut backend);
	assert_eq!(backend.live_resources(), ResourceCounts::default());

	let _ = fs::remove_dir_all(dir);
}

#[test]
fn missing_files_are_io_errors() {
	let mut backend = HeadlessBackend::new();
	let missing = ShaderSource::file("does/not/exist.frag", ShaderStage::Fragment);

	let err = Program::build(&mut backend, &vertex(), &missing).unwrap_err();
	assert!(matches!(err, ShaderError::Io { .. }), "{err}");
	assert!(err.to_string().contains("exist.frag"), "{err}");

	// The vertex stage compiled before the fragment failed, and is gone again
	assert_eq!(backend.live_resources(), ResourceCounts::default());
}

#[test]
fn compile_errors_name_the_stage_and_carry_the_log() {
	let mut backend = HeadlessBackend::new();

	let err = CompiledStage::compile(&mut backend, &fragment("broken.frag", BROKEN)).unwrap_err();
	match &err {
		ShaderError::Compile { origin, stage, log } => {
			assert_eq!(origin, "broken.frag");
			assert_eq!(*stage, ShaderStage::Fragment);
			assert!(!log.is_empty());
			assert_eq!(err.log(), Some(log.as_str()));
		}
		other => panic!("expected a compile error, got {other:?}"),
	}
}

#[test]
fn mismatched_interfaces_fail_to_link() {
	let mut backend = HeadlessBackend::new();
	let reads_a_normal = fragment(
		"normal.frag",
		"#version 450
layout(location = 0) in vec3 vNormal;
layout(location = 0) out vec4 fragColor;
void main() { fragColor = vec4(vNormal, 1.0); }
",
	);

	let err = Program::build(&mut backend, &vertex(), &reads_a_normal).unwrap_err();
	assert!(matches!(err, ShaderError::Link { .. }), "{err}");
	assert_eq!(backend.live_resources(), ResourceCounts::default());
}

#[test]
fn stages_in_the_wrong_slot_fail_to_link() {
	let mut backend = HeadlessBackend::new();

	let first = CompiledStage::compile(&mut backend, &vertex()).unwrap();
	let second = CompiledStage::compile(&mut backend, &vertex()).unwrap();

	assert!(matches!(
		Program::link(&mut backend, first, second),
		Err(ShaderError::Link { .. })
	));
	assert_eq!(backend.live_resources().stages, 0);
}

#[test]
fn each_build_gets_a_new_handle() {
	let mut backend = HeadlessBackend::new();

	let first = Program::build(&mut backend, &vertex(), &fragment("albedo.frag", ALBEDO)).unwrap();
	let handle = first.handle();
	first.release(&mut backend);

	let second = Program::build(&mut backend, &vertex(), &fragment("gradient.frag", GRADIENT)).unwrap();
	assert_ne!(second.handle(), handle);
	assert!(!backend.is_program_alive(handle));
}

#[test]
fn quads_draw_six_indices_inside_frames_only() {
	let mut backend = HeadlessBackend::new();
	let program = Program::build(&mut backend, &vertex(), &fragment("albedo.frag", ALBEDO)).unwrap();
	let quad = FullscreenQuad::new(&mut backend);

	quad.draw(&mut backend, &program);
	assert!(backend.draws().is_empty());

	backend.begin_frame();
	quad.draw(&mut backend, &program);
	backend.end_frame();

	assert_eq!(backend.draws().len(), 1);
	assert_eq!(backend.draws()[0].index_count, 6);
	assert_eq!(backend.draws()[0].mesh, quad.mesh());

	quad.release(&mut backend);
	program.release(&mut backend);
	assert_eq!(backend.live_resources(), ResourceCounts::default());
}

#[test]
fn repeated_compile_failures_leak_nothing() {
	let mut backend = HeadlessBackend::new();
	let broken = fragment("broken.frag", BROKEN);

	for _ in 0..1000 {
		assert!(CompiledStage::compile(&mut backend, &broken).is_err());
		assert!(Program::build(&mut backend, &vertex(), &broken).is_err());
	}

	assert_eq!(backend.live_resources(), ResourceCounts::default());
}

//! Front-end work shared by the backends: parse and validate a stage with naga, pull the
//! uniform block layout and the stage interface out of the resulting module, and check
//! that a vertex and a fragment stage fit together.

use std::error::Error;

use naga::{
	front::{glsl, wgsl},
	valid::{Capabilities, ValidationFlags, Validator},
	AddressSpace, Binding, Handle, Module, Scalar, ScalarKind, Type, TypeInner, VectorSize,
};

use crate::core::{
	shader::{ShaderLanguage, ShaderStage},
	uniform::{UniformBlock, UniformKind, UniformSlot},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Debug)]
pub struct ParsedStage {
	pub stage: ShaderStage,
	pub module: Module,
	pub entry_point: String,
	pub uniforms: Option<UniformBlock>,
	pub inputs: Vec<InterfaceVar>,
	pub outputs: Vec<InterfaceVar>,
}

/// A user-defined (`location`-bound) stage input or output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceVar {
	pub location: u32,
	pub ty: String,
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Parse and validate `source`. The `Err` is the human-readable compile log.
pub fn parse_stage(stage: ShaderStage, language: ShaderLanguage, source: &str) -> Result<ParsedStage, String> {
	let naga_stage = naga::ShaderStage::from(stage);

	let module = match language {
		ShaderLanguage::Wgsl => wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?,
		ShaderLanguage::Glsl => glsl::Frontend::default()
			.parse(&glsl::Options::from(naga_stage), source)
			.map_err(|errors| describe_glsl_errors(&errors, source))?,
	};

	Validator::new(ValidationFlags::all(), Capabilities::all())
		.validate(&module)
		.map_err(|e| describe_error(e.as_inner()))?;

	let entry_point = module
		.entry_points
		.iter()
		.find(|entry_point| entry_point.stage == naga_stage)
		.ok_or_else(|| format!("no {} entry point found", stage))?;

	let mut inputs = vec![];
	for argument in &entry_point.function.arguments {
		collect_interface(&module, argument.ty, argument.binding.as_ref(), &mut inputs);
	}

	let mut outputs = vec![];
	if let Some(result) = &entry_point.function.result {
		collect_interface(&module, result.ty, result.binding.as_ref(), &mut outputs);
	}

	Ok(ParsedStage {
		stage,
		entry_point: entry_point.name.clone(),
		uniforms: uniform_block(&module)?,
		inputs,
		outputs,
		module,
	})
}

/// Check that `vertex` and `fragment` can form a program, and return the program's
/// uniform block. The `Err` is the link log, one problem per line.
pub fn link_stages(vertex: &ParsedStage, fragment: &ParsedStage) -> Result<Option<UniformBlock>, String> {
	if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
		return Err(format!(
			"expected a vertex and a fragment stage, got a {} and a {} stage",
			vertex.stage, fragment.stage
		));
	}

	let mut problems = vec![];

	for input in &vertex.inputs {
		if input.location != 0 {
			problems.push(format!(
				"vertex input at location {} isn't provided; the quad only feeds location 0",
				input.location
			));
		}
	}

	for input in &fragment.inputs {
		match vertex.outputs.iter().find(|output| output.location == input.location) {
			None => problems.push(format!(
				"fragment input at location {} isn't written by the vertex stage",
				input.location
			)),
			Some(output) if output.ty != input.ty => problems.push(format!(
				"location {}: the vertex stage writes {} but the fragment stage reads {}",
				input.location, output.ty, input.ty
			)),
			Some(_) => {}
		}
	}

	match UniformBlock::merge(vertex.uniforms.as_ref(), fragment.uniforms.as_ref()) {
		Ok(block) if problems.is_empty() => Ok(block),
		Ok(_) => Err(problems.join("\n")),
		Err(problem) => {
			problems.push(problem);
			Err(problems.join("\n"))
		}
	}
}

/// Flags block members that exist but can't be driven from the host.
pub fn validate_uniforms(block: Option<&UniformBlock>) -> Result<(), String> {
	let unsupported = block
		.iter()
		.flat_map(|block| &block.slots)
		.filter(|slot| slot.kind == UniformKind::Unsupported)
		.map(|slot| format!("uniform `{}` has a type that can't be set from the host", slot.name))
		.collect::<Vec<_>>();

	if unsupported.is_empty() {
		Ok(())
	} else {
		Err(unsupported.join("\n"))
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

fn uniform_block(module: &Module) -> Result<Option<UniformBlock>, String> {
	let mut block = None;

	for (_, variable) in module.global_variables.iter() {
		let Some(binding) = &variable.binding else {
			continue;
		};
		let name = variable.name.as_deref().unwrap_or("<unnamed>");

		if variable.space != AddressSpace::Uniform || binding.group != 0 || binding.binding != 0 {
			return Err(format!(
				"`{}` is bound at group {}, binding {}; only a uniform block at group 0, binding 0 is supported",
				name, binding.group, binding.binding
			));
		}

		block = Some(match &module.types[variable.ty].inner {
			TypeInner::Struct { members, span } => UniformBlock {
				size: *span,
				slots: members
					.iter()
					.map(|member| UniformSlot {
						name: member.name.clone().unwrap_or_default(),
						offset: member.offset,
						kind: uniform_kind(&module.types[member.ty].inner),
					})
					.collect(),
			},

			// A lone `var<uniform> u_time: f32;`
			inner => {
				let kind = uniform_kind(inner);
				let size = match kind {
					UniformKind::Int | UniformKind::Uint | UniformKind::Float => 4,
					UniformKind::Vec3 => 12,
					UniformKind::Unsupported => return Err(format!("uniform `{}` has an unsupported type", name)),
				};

				UniformBlock {
					size,
					slots: vec![UniformSlot {
						name: name.to_owned(),
						offset: 0,
						kind,
					}],
				}
			}
		});
	}

	Ok(block)
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
	match *inner {
		TypeInner::Scalar(Scalar {
			kind: ScalarKind::Sint,
			width: 4,
		}) => UniformKind::Int,
		TypeInner::Scalar(Scalar {
			kind: ScalarKind::Uint,
			width: 4,
		}) => UniformKind::Uint,
		TypeInner::Scalar(Scalar {
			kind: ScalarKind::Float,
			width: 4,
		}) => UniformKind::Float,
		TypeInner::Vector {
			size: VectorSize::Tri,
			scalar: Scalar {
				kind: ScalarKind::Float,
				width: 4,
			},
		} => UniformKind::Vec3,
		_ => UniformKind::Unsupported,
	}
}

fn collect_interface(module: &Module, ty: Handle<Type>, binding: Option<&Binding>, out: &mut Vec<InterfaceVar>) {
	let inner = &module.types[ty].inner;

	match binding {
		Some(Binding::Location { location, .. }) => out.push(InterfaceVar {
			location: *location,
			ty: describe_type(inner),
		}),
		Some(Binding::BuiltIn(_)) => {}
		None => {
			// Entry point arguments and results can be structs of bound members
			if let TypeInner::Struct { members, .. } = inner {
				for member in members {
					collect_interface(module, member.ty, member.binding.as_ref(), out);
				}
			}
		}
	}
}

fn describe_type(inner: &TypeInner) -> String {
	let scalar = |scalar: Scalar| format!("{:?}{}", scalar.kind, u32::from(scalar.width) * 8);

	match *inner {
		TypeInner::Scalar(s) => scalar(s),
		TypeInner::Vector { size, scalar: s } => format!("vec{}<{}>", size as u8, scalar(s)),
		_ => format!("{:?}", inner),
	}
}

/// One line per error, prefixed with where it happened.
fn describe_glsl_errors(errors: &[glsl::Error], source: &str) -> String {
	errors
		.iter()
		.map(|error| {
			let location = error.meta.location(source);
			format!("{}:{}: {}", location.line_number, location.line_position, error.kind)
		})
		.collect::<Vec<_>>()
		.join("\n")
}

fn describe_error(error: &dyn Error) -> String {
	let mut message = error.to_string();
	let mut source = error.source();

	while let Some(inner) = source {
		message.push_str(": ");
		message.push_str(&inner.to_string());
		source = inner.source();
	}

	message
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	const VERTEX: &str = r#"
#version 450
layout(location = 0) in vec3 aPos;
layout(location = 0) out vec2 vUv;

void main() {
	vUv = aPos.xy * 0.5 + 0.5;
	gl_Position = vec4(aPos, 1.0);
}
"#;

	const FRAGMENT: &str = r#"
#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;

layout(set = 0, binding = 0) uniform Params {
	vec3 u_albedo;
	float u_roughness;
	int u_time;
};

void main() {
	fragColor = vec4(u_albedo * u_roughness, float(u_time));
}
"#;

	const FRAGMENT_WITHOUT_VARYING: &str = r#"
#version 450
layout(location = 0) in vec3 vNormal;
layout(location = 0) out vec4 fragColor;

void main() {
	fragColor = vec4(vNormal, 1.0);
}
"#;

	const WGSL: &str = r#"
@group(0) @binding(0) var<uniform> u_time: f32;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
	return vec4<f32>(position, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
	return vec4<f32>(u_time, 0.0, 0.0, 1.0);
}
"#;

	#[test]
	fn glsl_stages_are_reflected() {
		let vertex = parse_stage(ShaderStage::Vertex, ShaderLanguage::Glsl, VERTEX).unwrap();
		let fragment = parse_stage(ShaderStage::Fragment, ShaderLanguage::Glsl, FRAGMENT).unwrap();

		assert_eq!(vertex.uniforms, None);
		assert_eq!(vertex.inputs.len(), 1);
		assert_eq!(vertex.outputs, fragment.inputs);

		let block = fragment.uniforms.as_ref().unwrap();
		let names = block.slots.iter().map(|slot| slot.name.as_str()).collect::<Vec<_>>();
		assert_eq!(names, ["u_albedo", "u_roughness", "u_time"]);
		assert_eq!(block.slots[0].kind, UniformKind::Vec3);
		assert_eq!(block.slots[1].offset, 12);
		assert_eq!(block.slots[2].kind, UniformKind::Int);

		let linked = link_stages(&vertex, &fragment).unwrap();
		assert_eq!(linked.as_ref(), Some(block));
	}

	#[test]
	fn wgsl_picks_the_entry_point_of_the_requested_stage() {
		let vertex = parse_stage(ShaderStage::Vertex, ShaderLanguage::Wgsl, WGSL).unwrap();
		let fragment = parse_stage(ShaderStage::Fragment, ShaderLanguage::Wgsl, WGSL).unwrap();

		assert_eq!(vertex.entry_point, "vs_main");
		assert_eq!(fragment.entry_point, "fs_main");

		let block = link_stages(&vertex, &fragment).unwrap().unwrap();
		assert_eq!(block.location("u_time").map(|l| l.0), Some(0));
		assert_eq!(block.size, 4);
	}

	#[test]
	fn syntax_errors_produce_a_log() {
		let log = parse_stage(ShaderStage::Fragment, ShaderLanguage::Glsl, "#version 450\nvoid main() { oops }").unwrap_err();
		assert!(!log.is_empty());
	}

	#[test]
	fn glsl_errors_point_at_their_line() {
		let source = "#version 450\nlayout(location = 0) out vec4 fragColor;\nvoid main() { fragColor = missing; }\n";
		let log = parse_stage(ShaderStage::Fragment, ShaderLanguage::Glsl, source).unwrap_err();

		assert!(log.starts_with("3:"), "{log}");
		assert!(log.contains("missing"), "{log}");
	}

	#[test]
	fn missing_entry_points_are_compile_errors() {
		let wgsl = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
		let log = parse_stage(ShaderStage::Vertex, ShaderLanguage::Wgsl, wgsl).unwrap_err();
		assert_eq!(log, "no vertex entry point found");
	}

	#[test]
	fn other_resource_bindings_are_rejected() {
		let wgsl = r#"
@group(0) @binding(1) var<uniform> u_time: f32;
@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(u_time); }
"#;
		let log = parse_stage(ShaderStage::Fragment, ShaderLanguage::Wgsl, wgsl).unwrap_err();
		assert!(log.contains("group 0, binding 1"), "{log}");
	}

	#[test]
	fn unwritten_fragment_inputs_fail_to_link() {
		let vertex = parse_stage(ShaderStage::Vertex, ShaderLanguage::Glsl, VERTEX).unwrap();
		let fragment = parse_stage(ShaderStage::Fragment, ShaderLanguage::Glsl, FRAGMENT_WITHOUT_VARYING).unwrap();

		let log = link_stages(&vertex, &fragment).unwrap_err();
		assert!(log.contains("location 0"), "{log}");
	}

	#[test]
	fn stage_kinds_are_checked_when_linking() {
		let vertex = parse_stage(ShaderStage::Vertex, ShaderLanguage::Glsl, VERTEX).unwrap();
		let other_vertex = parse_stage(ShaderStage::Vertex, ShaderLanguage::Glsl, VERTEX).unwrap();

		assert!(link_stages(&vertex, &other_vertex).is_err());
	}
}

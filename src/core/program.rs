use log::{error, info, trace, warn};

use super::{
	backend::{Backend, ProgramHandle},
	error::{bounded_log, ShaderError},
	shader::{CompiledStage, ShaderSource, ShaderStage},
	uniform::UniformValue,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A linked vertex + fragment program.
///
/// The program is the single owner of its backend object; [`ProgramHandle`] is the cheap
/// copyable reference to it.
#[derive(Debug)]
pub struct Program {
	handle: ProgramHandle,
}

impl Program {
	/// Link `vertex` and `fragment` into a program.
	///
	/// Both stages are released whatever the outcome, the linked program doesn't need them.
	pub fn link<B: Backend + ?Sized>(
		backend: &mut B,
		vertex: CompiledStage,
		fragment: CompiledStage,
	) -> Result<Self, ShaderError> {
		let linked = if vertex.stage() != ShaderStage::Vertex || fragment.stage() != ShaderStage::Fragment {
			Err(format!(
				"expected a vertex and a fragment stage, got `{}` ({}) and `{}` ({})",
				vertex.origin(),
				vertex.stage(),
				fragment.origin(),
				fragment.stage()
			))
		} else {
			backend.link_program(vertex.handle(), fragment.handle())
		};

		vertex.release(backend);
		fragment.release(backend);

		match linked {
			Ok(handle) => {
				info!("Linked shader {}", handle);

				// Best effort, a complaint here doesn't make the program unusable
				if let Err(log) = backend.validate_program(handle) {
					warn!("Program {} didn't validate:\n{}", handle, bounded_log(&log));
				}

				Ok(Self { handle })
			}
			Err(log) => {
				let err = ShaderError::Link { log: bounded_log(&log) };
				error!("{}", err);
				Err(err)
			}
		}
	}

	/// Compile both stages and link them.
	pub fn build<B: Backend + ?Sized>(
		backend: &mut B,
		vertex: &ShaderSource,
		fragment: &ShaderSource,
	) -> Result<Self, ShaderError> {
		let vertex = CompiledStage::compile(backend, vertex)?;

		let fragment = match CompiledStage::compile(backend, fragment) {
			Ok(fragment) => fragment,
			Err(err) => {
				vertex.release(backend);
				return Err(err);
			}
		};

		Self::link(backend, vertex, fragment)
	}

	pub fn handle(&self) -> ProgramHandle {
		self.handle
	}

	/// Push `value` to the uniform called `name`.
	///
	/// Returns false when nothing was written: the program doesn't declare `name`, or
	/// declares it with another type.
	pub fn set_uniform<B: Backend + ?Sized>(&self, backend: &mut B, name: &str, value: UniformValue) -> bool {
		match backend.uniform_location(self.handle, name) {
			Some(location) => backend.set_uniform(self.handle, location, value),
			None => {
				trace!("{} has no uniform `{}`", self.handle, name);
				false
			}
		}
	}

	pub fn set_int<B: Backend + ?Sized>(&self, backend: &mut B, name: &str, value: i32) -> bool {
		self.set_uniform(backend, name, UniformValue::Int(value))
	}

	pub fn set_float<B: Backend + ?Sized>(&self, backend: &mut B, name: &str, value: f32) -> bool {
		self.set_uniform(backend, name, UniformValue::Float(value))
	}

	pub fn set_bool<B: Backend + ?Sized>(&self, backend: &mut B, name: &str, value: bool) -> bool {
		self.set_uniform(backend, name, UniformValue::Bool(value))
	}

	pub fn set_vec3<B: Backend + ?Sized>(&self, backend: &mut B, name: &str, value: [f32; 3]) -> bool {
		self.set_uniform(backend, name, UniformValue::Vec3(value))
	}

	/// The last value pushed to `name`.
	pub fn uniform_value<B: Backend + ?Sized>(&self, backend: &B, name: &str) -> Option<UniformValue> {
		backend.uniform_value(self.handle, name)
	}

	pub fn release<B: Backend + ?Sized>(self, backend: &mut B) {
		backend.release_program(self.handle);
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;
	use crate::core::{backend::headless::HeadlessBackend, error::MAX_INFO_LOG};

	const VERTEX: &str = "#version 450
layout(location = 0) in vec3 aPos;
layout(location = 0) out vec2 vUv;

void main() {
	vUv = aPos.xy;
	gl_Position = vec4(aPos, 1.0);
}
";

	const FRAGMENT: &str = "#version 450
layout(location = 0) in vec2 vUv;
layout(location = 0) out vec4 fragColor;

layout(set = 0, binding = 0) uniform Params {
	vec3 u_albedo;
	float u_roughness;
	int u_frame;
	int u_followMouse;
};

void main() {
	fragColor = vec4(u_albedo * u_roughness, float(u_frame + u_followMouse));
}
";

	fn vertex() -> ShaderSource {
		ShaderSource::inline("quad.vert", VERTEX, ShaderStage::Vertex)
	}

	fn fragment() -> ShaderSource {
		ShaderSource::inline("pbr.frag", FRAGMENT, ShaderStage::Fragment)
	}

	#[test]
	fn linking_releases_both_stages() {
		let mut backend = HeadlessBackend::new();

		let program = Program::build(&mut backend, &vertex(), &fragment()).unwrap();

		let live = backend.live_resources();
		assert_eq!((live.stages, live.programs), (0, 1));

		program.release(&mut backend);
		assert_eq!(backend.live_resources().programs, 0);
	}

	#[test]
	fn link_failures_release_both_stages() {
		let mut backend = HeadlessBackend::new();
		let lonely = "#version 450
layout(location = 3) in vec4 vColor;
layout(location = 0) out vec4 fragColor;
void main() { fragColor = vColor; }
";

		let err = Program::build(
			&mut backend,
			&vertex(),
			&ShaderSource::inline("lonely.frag", lonely, ShaderStage::Fragment),
		)
		.unwrap_err();

		assert!(matches!(&err, ShaderError::Link { log } if log.contains("location 3") && log.len() <= MAX_INFO_LOG));
		assert_eq!(backend.live_resources(), Default::default());
	}

	#[test]
	fn swapped_stages_fail_to_link() {
		let mut backend = HeadlessBackend::new();
		let first = CompiledStage::compile(&mut backend, &vertex()).unwrap();
		let second = CompiledStage::compile(&mut backend, &vertex()).unwrap();

		let err = Program::link(&mut backend, first, second).unwrap_err();

		assert!(matches!(err, ShaderError::Link { .. }));
		assert_eq!(backend.live_resources().stages, 0);
	}

	#[test]
	fn fragment_compile_failures_release_the_vertex_stage() {
		let mut backend = HeadlessBackend::new();
		let broken = ShaderSource::inline("broken.frag", "#version 450\nvoid main( {", ShaderStage::Fragment);

		let err = Program::build(&mut backend, &vertex(), &broken).unwrap_err();

		assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Fragment, .. }));
		assert_eq!(backend.live_resources(), Default::default());
	}

	#[test]
	fn uniforms_read_back_the_last_value_set() {
		let mut backend = HeadlessBackend::new();
		let program = Program::build(&mut backend, &vertex(), &fragment()).unwrap();

		assert!(program.set_vec3(&mut backend, "u_albedo", [1.0, 0.0, 0.0]));
		assert!(program.set_vec3(&mut backend, "u_albedo", [0.2, 0.4, 0.6]));
		assert!(program.set_float(&mut backend, "u_roughness", 0.3));
		assert!(program.set_int(&mut backend, "u_frame", 42));
		assert!(program.set_bool(&mut backend, "u_followMouse", true));

		assert_eq!(program.uniform_value(&backend, "u_albedo"), Some(UniformValue::Vec3([0.2, 0.4, 0.6])));
		assert_eq!(program.uniform_value(&backend, "u_roughness"), Some(UniformValue::Float(0.3)));
		assert_eq!(program.uniform_value(&backend, "u_frame"), Some(UniformValue::Int(42)));
		assert_eq!(program.uniform_value(&backend, "u_followMouse"), Some(UniformValue::Int(1)));
	}

	#[test]
	fn unknown_and_mistyped_uniforms_are_no_ops() {
		let mut backend = HeadlessBackend::new();
		let program = Program::build(&mut backend, &vertex(), &fragment()).unwrap();

		assert!(program.set_float(&mut backend, "u_roughness", 0.5));

		assert!(!program.set_float(&mut backend, "u_metallic", 1.0));
		assert!(!program.set_int(&mut backend, "u_roughness", 7));

		assert_eq!(program.uniform_value(&backend, "u_metallic"), None);
		assert_eq!(program.uniform_value(&backend, "u_roughness"), Some(UniformValue::Float(0.5)));
	}
}

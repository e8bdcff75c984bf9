pub mod headless;
pub mod reflect;
pub mod wgpu_backend;

use derive_more::{Display, From};

use super::{
	shader::{ShaderLanguage, ShaderStage},
	ui::UiFrame,
	uniform::{UniformLocation, UniformValue},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[derive(Copy, Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "stage#{}", _0)]
pub struct StageHandle(u32);

#[derive(Copy, Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "program#{}", _0)]
pub struct ProgramHandle(u32);

#[derive(Copy, Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display(fmt = "mesh#{}", _0)]
pub struct MeshHandle(u32);

/// Hands out backend handles. Handles are never reused, so two handles compare equal only
/// if they name the same backend object.
#[derive(Debug)]
pub struct HandleAllocator {
	next: u32,
}

impl Default for HandleAllocator {
	fn default() -> Self {
		Self { next: 1 }
	}
}

impl HandleAllocator {
	pub fn next<H: From<u32>>(&mut self) -> H {
		let handle = self.next;
		self.next += 1;
		H::from(handle)
	}
}

/// How many backend objects are currently alive.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
	pub stages: usize,
	pub programs: usize,
	pub meshes: usize,
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// The graphics collaborator: everything the sandbox needs from a GPU API, expressed in
/// terms of opaque handles.
///
/// Diagnostics are returned as plain strings; bounding and wrapping them into
/// [`ShaderError`](super::error::ShaderError)s is the caller's job.
pub trait Backend {
	/// Compile one stage. A failed compile must not leave a live stage behind.
	fn compile_stage(&mut self, stage: ShaderStage, language: ShaderLanguage, source: &str)
		-> Result<StageHandle, String>;

	fn release_stage(&mut self, stage: StageHandle);

	/// Link a vertex and a fragment stage. The stages stay alive; releasing them is up to
	/// the caller.
	fn link_program(&mut self, vertex: StageHandle, fragment: StageHandle) -> Result<ProgramHandle, String>;

	/// Best-effort sanity check of a linked program. An `Err` is a diagnostic, not a
	/// reason to throw the program away.
	fn validate_program(&mut self, program: ProgramHandle) -> Result<(), String>;

	fn release_program(&mut self, program: ProgramHandle);

	/// Resolve a uniform name, `None` if the program doesn't declare it.
	fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

	/// Push a value. Returns false if it didn't land (bad location, mismatched kind).
	fn set_uniform(&mut self, program: ProgramHandle, location: UniformLocation, value: UniformValue) -> bool;

	/// The last value pushed to a uniform of `program`.
	fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue>;

	fn create_mesh(&mut self, vertices: &[[f32; 3]], indices: &[u32]) -> MeshHandle;

	fn release_mesh(&mut self, mesh: MeshHandle);

	fn set_clear_color(&mut self, color: [f32; 4]);

	/// Reconfigure the render target (and thus the viewport) to a new size.
	fn resize(&mut self, width: u32, height: u32);

	/// Start a frame and clear the colour target.
	fn begin_frame(&mut self);

	fn draw(&mut self, program: ProgramHandle, mesh: MeshHandle);

	/// Paint a finished UI pass on top of the frame.
	fn paint_ui(&mut self, _frame: &UiFrame) {}

	/// Submit and present the frame.
	fn end_frame(&mut self);

	fn live_resources(&self) -> ResourceCounts;
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn handles_are_never_reused() {
		let mut handles = HandleAllocator::default();

		let a: StageHandle = handles.next();
		let b: StageHandle = handles.next();
		let c: ProgramHandle = handles.next();

		assert_ne!(a, b);
		assert_eq!(c, ProgramHandle::from(3));
		assert_eq!(a.to_string(), "stage#1");
	}
}

use std::collections::HashMap;

use log::trace;

use super::{
	reflect::{self, ParsedStage},
	Backend, HandleAllocator, MeshHandle, ProgramHandle, ResourceCounts, StageHandle,
};
use crate::core::{
	shader::{ShaderLanguage, ShaderStage},
	ui::UiFrame,
	uniform::{UniformBlock, UniformLocation, UniformValue},
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A backend without a GPU.
///
/// Stages are compiled and programs linked with naga alone, so compile and link
/// diagnostics are the real ones, and uniforms are kept in CPU-side blocks laid out
/// exactly like the GPU ones. Draws are recorded instead of rasterized.
#[derive(Default)]
pub struct HeadlessBackend {
	handles: HandleAllocator,
	stages: HashMap<StageHandle, ParsedStage>,
	programs: HashMap<ProgramHandle, HeadlessProgram>,
	meshes: HashMap<MeshHandle, usize>,

	clear_color: [f32; 4],
	size: (u32, u32),
	in_frame: bool,
	frames_presented: u64,
	draws: Vec<DrawCall>,
	ui_passes: u64,
}

struct HeadlessProgram {
	uniforms: Option<(UniformBlock, Vec<u8>)>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DrawCall {
	pub frame: u64,
	pub program: ProgramHandle,
	pub mesh: MeshHandle,
	pub index_count: usize,
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl HeadlessBackend {
	pub fn new() -> Self {
		Self::default()
	}

	/// Every draw issued so far, oldest first.
	pub fn draws(&self) -> &[DrawCall] {
		&self.draws
	}

	pub fn frames_presented(&self) -> u64 {
		self.frames_presented
	}

	pub fn ui_passes(&self) -> u64 {
		self.ui_passes
	}

	pub fn clear_color(&self) -> [f32; 4] {
		self.clear_color
	}

	pub fn size(&self) -> (u32, u32) {
		self.size
	}

	pub fn is_program_alive(&self, program: ProgramHandle) -> bool {
		self.programs.contains_key(&program)
	}
}

impl Backend for HeadlessBackend {
	fn compile_stage(
		&mut self,
		stage: ShaderStage,
		language: ShaderLanguage,
		source: &str,
	) -> Result<StageHandle, String> {
		let parsed = reflect::parse_stage(stage, language, source)?;

		let handle = self.handles.next();
		self.stages.insert(handle, parsed);
		Ok(handle)
	}

	fn release_stage(&mut self, stage: StageHandle) {
		self.stages.remove(&stage);
	}

	fn link_program(&mut self, vertex: StageHandle, fragment: StageHandle) -> Result<ProgramHandle, String> {
		let vertex = self.stages.get(&vertex).ok_or_else(|| format!("{} isn't a live stage", vertex))?;
		let fragment = self
			.stages
			.get(&fragment)
			.ok_or_else(|| format!("{} isn't a live stage", fragment))?;

		let block = reflect::link_stages(vertex, fragment)?;

		let handle = self.handles.next();
		self.programs.insert(
			handle,
			HeadlessProgram {
				uniforms: block.map(|block| {
					let staging = vec![0; block.buffer_size() as usize];
					(block, staging)
				}),
			},
		);
		Ok(handle)
	}

	fn validate_program(&mut self, program: ProgramHandle) -> Result<(), String> {
		match self.programs.get(&program) {
			Some(program) => reflect::validate_uniforms(program.uniforms.as_ref().map(|(block, _)| block)),
			None => Err(format!("{} isn't a live program", program)),
		}
	}

	fn release_program(&mut self, program: ProgramHandle) {
		self.programs.remove(&program);
	}

	fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
		let (block, _) = self.programs.get(&program)?.uniforms.as_ref()?;
		block.location(name)
	}

	fn set_uniform(&mut self, program: ProgramHandle, location: UniformLocation, value: UniformValue) -> bool {
		match self
			.programs
			.get_mut(&program)
			.and_then(|program| program.uniforms.as_mut())
		{
			Some((block, staging)) => block.write(staging, location, value),
			None => false,
		}
	}

	fn uniform_value(&self, program: ProgramHandle, name: &str) -> Option<UniformValue> {
		let (block, staging) = self.programs.get(&program)?.uniforms.as_ref()?;
		block.read(staging, block.location(name)?)
	}

	fn create_mesh(&mut self, _vertices: &[[f32; 3]], indices: &[u32]) -> MeshHandle {
		let handle = self.handles.next();
		self.meshes.insert(handle, indices.len());
		handle
	}

	fn release_mesh(&mut self, mesh: MeshHandle) {
		self.meshes.remove(&mesh);
	}

	fn set_clear_color(&mut self, color: [f32; 4]) {
		self.clear_color = color;
	}

	fn resize(&mut self, width: u32, height: u32) {
		self.size = (width, height);
	}

	fn begin_frame(&mut self) {
		self.in_frame = true;
	}

	fn draw(&mut self, program: ProgramHandle, mesh: MeshHandle) {
		if !self.in_frame || !self.programs.contains_key(&program) {
			trace!("Dropping draw of {} outside of a frame or with a dead program", program);
			return;
		}

		if let Some(&index_count) = self.meshes.get(&mesh) {
			self.draws.push(DrawCall {
				frame: self.frames_presented,
				program,
				mesh,
				index_count,
			});
		}
	}

	fn paint_ui(&mut self, _frame: &UiFrame) {
		self.ui_passes += 1;
	}

	fn end_frame(&mut self) {
		if std::mem::take(&mut self.in_frame) {
			self.frames_presented += 1;
		}
	}

	fn live_resources(&self) -> ResourceCounts {
		ResourceCounts {
			stages: self.stages.len(),
			programs: self.programs.len(),
			meshes: self.meshes.len(),
		}
	}
}

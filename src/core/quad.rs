use super::{
	backend::{Backend, MeshHandle},
	program::Program,
};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// Corners of the quad in normalized device coordinates, fed to `location 0`.
pub const QUAD_VERTICES: [[f32; 3]; 4] = [
	[1.0, 1.0, 0.0],   // top right
	[1.0, -1.0, 0.0],  // bottom right
	[-1.0, -1.0, 0.0], // bottom left
	[-1.0, 1.0, 0.0],  // top left
];

pub const QUAD_INDICES: [u32; 6] = [
	0, 1, 3, // first triangle
	1, 2, 3, // second triangle
];

/// Two triangles covering the whole viewport. The geometry never changes after creation.
#[derive(Debug)]
pub struct FullscreenQuad {
	mesh: MeshHandle,
}

impl FullscreenQuad {
	pub fn new<B: Backend + ?Sized>(backend: &mut B) -> Self {
		Self {
			mesh: backend.create_mesh(&QUAD_VERTICES, &QUAD_INDICES),
		}
	}

	pub fn mesh(&self) -> MeshHandle {
		self.mesh
	}

	pub fn draw<B: Backend + ?Sized>(&self, backend: &mut B, program: &Program) {
		backend.draw(program.handle(), self.mesh);
	}

	pub fn release<B: Backend + ?Sized>(self, backend: &mut B) {
		backend.release_mesh(self.mesh);
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

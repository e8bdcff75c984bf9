use derive_more::{Display, From};
use log::warn;
use serde::{Deserialize, Serialize};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A value pushed from the host into a program uniform.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum UniformValue {
	Int(i32),
	Float(f32),
	Bool(bool),
	Vec3([f32; 3]),
}

/// Index of a slot inside a program's [`UniformBlock`].
#[derive(Copy, Clone, Debug, Display, From, PartialEq, Eq, Hash)]
pub struct UniformLocation(pub u32);

/// What a uniform block member can hold, as far as the host is concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformKind {
	Int,
	Uint,
	Float,
	Vec3,
	/// Anything else (matrices, vec4, arrays, nested structs). Present in the block, but
	/// not settable from the host.
	Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformSlot {
	pub name: String,
	pub offset: u32,
	pub kind: UniformKind,
}

/// The reflected layout of the uniform block at `group 0, binding 0`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UniformBlock {
	pub size: u32,
	pub slots: Vec<UniformSlot>,
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

impl UniformValue {
	fn fits(&self, kind: UniformKind) -> bool {
		matches!(
			(self, kind),
			(UniformValue::Int(_) | UniformValue::Bool(_), UniformKind::Int | UniformKind::Uint)
				| (UniformValue::Float(_), UniformKind::Float)
				| (UniformValue::Vec3(_), UniformKind::Vec3)
		)
	}
}

impl UniformBlock {
	/// Merge the blocks declared by the vertex and the fragment stage.
	///
	/// Either stage may omit the block, but when both declare it they have to agree on
	/// its layout.
	pub fn merge(vertex: Option<&UniformBlock>, fragment: Option<&UniformBlock>) -> Result<Option<UniformBlock>, String> {
		match (vertex, fragment) {
			(Some(vertex), Some(fragment)) if vertex != fragment => {
				Err("the uniform block at group 0, binding 0 has a different layout in the vertex and the fragment stage".into())
			}
			(Some(block), _) | (None, Some(block)) => Ok(Some(block.clone())),
			(None, None) => Ok(None),
		}
	}

	/// The size of the GPU buffer backing this block (uniform buffers are sized in 16-byte steps).
	pub fn buffer_size(&self) -> u64 {
		u64::from(self.size.max(16)).next_multiple_of(16)
	}

	pub fn location(&self, name: &str) -> Option<UniformLocation> {
		self.slots
			.iter()
			.position(|slot| slot.name == name)
			.map(|index| UniformLocation(index as u32))
	}

	pub fn slot(&self, location: UniformLocation) -> Option<&UniformSlot> {
		self.slots.get(location.0 as usize)
	}

	/// Write `value` into the CPU-side copy of the block.
	///
	/// Returns false (and leaves `staging` untouched) when the value doesn't fit the slot.
	pub fn write(&self, staging: &mut [u8], location: UniformLocation, value: UniformValue) -> bool {
		let Some(slot) = self.slot(location) else {
			return false;
		};

		if !value.fits(slot.kind) {
			warn!("Uniform `{}` is {:?}, ignoring {:?}", slot.name, slot.kind, value);
			return false;
		}

		let offset = slot.offset as usize;
		match (value, slot.kind) {
			(UniformValue::Int(v), UniformKind::Uint) => put(staging, offset, bytemuck::bytes_of(&(v as u32))),
			(UniformValue::Int(v), _) => put(staging, offset, bytemuck::bytes_of(&v)),
			(UniformValue::Bool(v), _) => put(staging, offset, bytemuck::bytes_of(&i32::from(v))),
			(UniformValue::Float(v), _) => put(staging, offset, bytemuck::bytes_of(&v)),
			(UniformValue::Vec3(v), _) => put(staging, offset, bytemuck::bytes_of(&v)),
		}
	}

	/// Read a slot back out of the CPU-side copy of the block.
	pub fn read(&self, staging: &[u8], location: UniformLocation) -> Option<UniformValue> {
		let slot = self.slot(location)?;
		let offset = slot.offset as usize;

		let value = match slot.kind {
			UniformKind::Int => UniformValue::Int(bytemuck::pod_read_unaligned(staging.get(offset..offset + 4)?)),
			UniformKind::Uint => {
				UniformValue::Int(bytemuck::pod_read_unaligned::<u32>(staging.get(offset..offset + 4)?) as i32)
			}
			UniformKind::Float => UniformValue::Float(bytemuck::pod_read_unaligned(staging.get(offset..offset + 4)?)),
			UniformKind::Vec3 => UniformValue::Vec3(bytemuck::pod_read_unaligned(staging.get(offset..offset + 12)?)),
			UniformKind::Unsupported => return None,
		};

		Some(value)
	}
}

fn put(staging: &mut [u8], offset: usize, bytes: &[u8]) -> bool {
	match staging.get_mut(offset..offset + bytes.len()) {
		Some(target) => {
			target.copy_from_slice(bytes);
			true
		}
		None => false,
	}
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

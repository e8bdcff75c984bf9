use super::shader::{ShaderSource, ShaderStage};

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

/// A trait-object-safe version of rust_embed::Embed
pub trait Assets {
	fn get(&self, file_path: &str) -> Option<rust_embed::EmbeddedFile>;
	fn iter(&self) -> rust_embed::Filenames;
}

impl<T: rust_embed::Embed> Assets for T {
	fn get(&self, file_path: &str) -> Option<rust_embed::EmbeddedFile> {
		<Self as rust_embed::Embed>::get(file_path)
	}

	fn iter(&self) -> rust_embed::Filenames {
		<Self as rust_embed::Embed>::iter()
	}
}

/// Load an embedded shader as an inline source named after its embedded path.
pub fn embedded_shader(assets: &dyn Assets, file_path: &str, stage: ShaderStage) -> Option<ShaderSource> {
	let file = assets.get(file_path)?;
	let text = String::from_utf8_lossy(&file.data).into_owned();

	Some(ShaderSource::inline(format!("embedded:{}", file_path), text, stage))
}

/*
--------------------------------------------------------------------------------
||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||||
--------------------------------------------------------------------------------
*/

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{ShaderAssets, FALLBACK_FRAGMENT, FALLBACK_VERTEX};

	#[test]
	fn fallback_shaders_are_embedded() {
		let vertex = embedded_shader(&ShaderAssets, FALLBACK_VERTEX, ShaderStage::Vertex).unwrap();
		let fragment = embedded_shader(&ShaderAssets, FALLBACK_FRAGMENT, ShaderStage::Fragment).unwrap();

		assert_eq!(vertex.origin().to_string(), "embedded:/fallback.vert");
		assert!(fragment.read().unwrap().contains("fragColor"));
	}

	#[test]
	fn every_embedded_file_is_listed() {
		let files = ShaderAssets.iter().collect::<Vec<_>>();
		assert!(files.iter().any(|file| file == FALLBACK_FRAGMENT));
		assert!(embedded_shader(&ShaderAssets, "/missing.frag", ShaderStage::Fragment).is_none());
	}
}

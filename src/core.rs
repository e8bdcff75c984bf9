pub mod backend;
pub mod config;
pub mod display;
pub mod embed;
pub mod error;
pub mod gameloop;
pub mod gpu;
pub mod program;
pub mod quad;
pub mod render_target;
pub mod session;
pub mod shader;
pub mod ui;
pub mod uniform;

mod desk;

pub use desk::{TestDesk, crew};

//! Export contents of `utils` folder
mod utils;
mod perspective;

pub use self::{
    utils::*,
    perspective::*,
};

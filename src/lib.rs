pub mod cli;
pub mod ramgrid;

pub mod access;
pub mod alerts;
pub mod core;
pub mod materials;
pub mod subjects;

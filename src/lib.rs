pub mod commands;
pub mod compare;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod paths;
pub mod registry;
pub mod switch;
pub mod templates;
pub mod ui;
pub mod wizard;

#[cfg(test)]
pub mod test_utils;

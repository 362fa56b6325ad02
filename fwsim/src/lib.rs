pub mod scanner;
pub mod ui;

mod promise;

pub mod cbz;
pub mod cli;
pub mod converter;
pub mod epub;
pub mod opf;
pub mod pdf;

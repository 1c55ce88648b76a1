pub mod quotation;
pub mod request;
pub mod route;
pub mod step;

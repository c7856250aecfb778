pub mod api_errors;
pub mod callback;
pub mod daraja;
pub mod push;

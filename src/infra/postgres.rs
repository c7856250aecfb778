pub mod organisation_repo;
pub mod payment_request_repo;
pub mod user_repo;
